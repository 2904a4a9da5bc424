use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::work_item::{ParentRef, WorkItem, WorkItemType, UNASSIGNED};

/// Link type the store uses for "this item's parent is ...".
pub const HIERARCHY_PARENT: &str = "System.LinkTypes.Hierarchy-Reverse";

/// Remote fields the pipeline understands by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KnownField {
    Title,
    State,
    WorkItemType,
    AssignedTo,
    Parent,
}

impl KnownField {
    pub const ALL: [KnownField; 5] = [
        KnownField::Title,
        KnownField::State,
        KnownField::WorkItemType,
        KnownField::AssignedTo,
        KnownField::Parent,
    ];

    pub fn remote_name(self) -> &'static str {
        match self {
            KnownField::Title => "System.Title",
            KnownField::State => "System.State",
            KnownField::WorkItemType => "System.WorkItemType",
            KnownField::AssignedTo => "System.AssignedTo",
            KnownField::Parent => "System.Parent",
        }
    }

    pub fn from_remote_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.remote_name() == name)
    }
}

/// A remote record's field map split into known fields and a passthrough bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteFields {
    known: BTreeMap<KnownField, Value>,
    passthrough: BTreeMap<String, Value>,
}

impl RemoteFields {
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut fields = Self::default();
        for (name, value) in map {
            fields.insert(name, value);
        }
        fields
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match KnownField::from_remote_name(&name) {
            Some(field) => {
                self.known.insert(field, value);
            }
            None => {
                self.passthrough.insert(name, value);
            }
        }
    }

    pub fn get(&self, field: KnownField) -> Option<&Value> {
        self.known.get(&field)
    }

    pub fn passthrough(&self) -> &BTreeMap<String, Value> {
        &self.passthrough
    }

    /// Whether the record carries a non-empty value under this remote name.
    pub fn is_populated(&self, remote_name: &str) -> bool {
        let value = match KnownField::from_remote_name(remote_name) {
            Some(field) => self.known.get(&field),
            None => self.passthrough.get(remote_name),
        };
        match value {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.get(KnownField::Title).and_then(Value::as_str)
    }

    pub fn state(&self) -> Option<&str> {
        self.get(KnownField::State).and_then(Value::as_str)
    }

    pub fn work_item_type(&self) -> Option<WorkItemType> {
        self.get(KnownField::WorkItemType)
            .and_then(Value::as_str)
            .map(WorkItemType::parse)
    }

    /// Identity fields come back as objects; older payloads use plain strings.
    pub fn assigned_to(&self) -> Option<&str> {
        match self.get(KnownField::AssignedTo)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Object(obj) => obj
                .get("displayName")
                .or_else(|| obj.get("uniqueName"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<u32> {
        self.get(KnownField::Parent)
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Relation {
    pub rel: String,
    pub url: String,
    #[serde(default)]
    pub attributes: Option<Value>,
}

impl Relation {
    pub fn is_hierarchy_parent(&self) -> bool {
        self.rel == HIERARCHY_PARENT
    }

    /// Work item id at the end of the relation URL (`.../workItems/123`).
    pub fn target_id(&self) -> Option<u32> {
        self.url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
    }
}

/// Current remote state of one record, as needed to compile a patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteItem {
    pub id: u32,
    pub fields: RemoteFields,
    pub relations: Vec<Relation>,
}

impl RemoteItem {
    /// Canonical item with the parent left as a numeric id; the snapshot
    /// builder swaps in titles once every item of the fetch is known.
    pub fn to_work_item(&self) -> WorkItem {
        WorkItem {
            id: self.id,
            title: self.fields.title().unwrap_or("(No Title)").to_string(),
            state: Some(self.fields.state().unwrap_or_default().to_string()),
            item_type: Some(
                self.fields
                    .work_item_type()
                    .unwrap_or(WorkItemType::Other("Other".into())),
            ),
            assigned_to: Some(self.fields.assigned_to().unwrap_or(UNASSIGNED).to_string()),
            parent: self.fields.parent().map_or(ParentRef::Cleared, ParentRef::Id),
            fields: self.fields.passthrough().clone(),
            is_new: false,
        }
    }
}
