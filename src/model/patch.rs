use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// One JSON Patch instruction against a remote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn field(op: PatchOp, remote_name: &str, value: Value) -> Self {
        Self {
            op,
            path: format!("/fields/{remote_name}"),
            value: Some(value),
        }
    }

    pub fn add_relation(value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: "/relations/-".into(),
            value: Some(value),
        }
    }

    pub fn remove_relation(index: usize) -> Self {
        Self {
            op: PatchOp::Remove,
            path: format!("/relations/{index}"),
            value: None,
        }
    }
}
