use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Display value used for items with nobody assigned.
pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkItemType {
    Task,
    Epic,
    Feature,
    UserStory,
    Bug,
    /// Any type the store knows about that we don't model, kept verbatim.
    Other(String),
}

impl WorkItemType {
    /// Types offered by the type filter, in cycling order.
    pub const FILTERABLE: [WorkItemType; 5] = [
        WorkItemType::Task,
        WorkItemType::Epic,
        WorkItemType::Feature,
        WorkItemType::UserStory,
        WorkItemType::Bug,
    ];

    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "task" => WorkItemType::Task,
            "epic" => WorkItemType::Epic,
            "feature" => WorkItemType::Feature,
            "userstory" | "story" => WorkItemType::UserStory,
            "bug" => WorkItemType::Bug,
            "" => WorkItemType::Other("Other".into()),
            _ => WorkItemType::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WorkItemType::Task => "Task",
            WorkItemType::Epic => "Epic",
            WorkItemType::Feature => "Feature",
            WorkItemType::UserStory => "User Story",
            WorkItemType::Bug => "Bug",
            WorkItemType::Other(name) => name,
        }
    }
}

impl From<String> for WorkItemType {
    fn from(value: String) -> Self {
        WorkItemType::parse(&value)
    }
}

impl From<WorkItemType> for String {
    fn from(value: WorkItemType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft reference from an item to its parent.
///
/// `Unspecified` (field absent) and `Cleared` (explicit `null`) are different:
/// the first leaves the remote hierarchy untouched, the second removes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParentRef {
    #[default]
    Unspecified,
    Cleared,
    Title(String),
    Id(u32),
}

impl ParentRef {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, ParentRef::Unspecified)
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParentRef::Unspecified | ParentRef::Cleared => serializer.serialize_none(),
            ParentRef::Title(title) => serializer.serialize_str(title),
            ParentRef::Id(id) => serializer.serialize_u32(*id),
        }
    }
}

impl<'de> Deserialize<'de> for ParentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(u32),
            Title(String),
            Other(Value),
        }

        // A missing field never reaches here (`#[serde(default)]`), so `None` is an explicit null.
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => ParentRef::Cleared,
            Some(Raw::Id(0)) => ParentRef::Unspecified,
            Some(Raw::Id(id)) => ParentRef::Id(id),
            Some(Raw::Title(title)) if title.trim().is_empty() => ParentRef::Unspecified,
            Some(Raw::Title(title)) => ParentRef::Title(title.trim().to_string()),
            Some(Raw::Other(_)) => ParentRef::Unspecified,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Server identity; 0 for items that don't exist remotely yet.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: u32,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<WorkItemType>,
    #[serde(
        default,
        deserialize_with = "lenient_assignee",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "ParentRef::is_unspecified")]
    pub parent: ParentRef,
    /// Raw remote fields the canonical shape doesn't model, keyed by remote name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    /// View-only highlight flag, recomputed on every reconciliation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_new: bool,
}

impl WorkItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    #[cfg(test)]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[cfg(test)]
    pub fn with_type(mut self, item_type: WorkItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    #[cfg(test)]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to = Some(assignee.into());
        self
    }

    #[cfg(test)]
    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = parent;
        self
    }

    pub fn assignee_label(&self) -> &str {
        self.assigned_to.as_deref().unwrap_or(UNASSIGNED)
    }

    pub fn type_label(&self) -> &str {
        self.item_type.as_ref().map_or("Other", WorkItemType::as_str)
    }

    pub fn parent_label(&self) -> Option<String> {
        match &self.parent {
            ParentRef::Title(title) => Some(title.clone()),
            ParentRef::Id(id) => Some(format!("#{id}")),
            ParentRef::Unspecified | ParentRef::Cleared => None,
        }
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Value::String(s) => s.trim().trim_start_matches('#').parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Accepts a plain name or an identity object (`{"displayName": ...}`).
fn lenient_assignee<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(obj) => ["displayName", "uniqueName"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(String::from),
        _ => None,
    })
}
