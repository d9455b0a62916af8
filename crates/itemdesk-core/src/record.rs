use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Store-assigned record identifier (UUID v4).
pub type RecordId = Uuid;

/// Opaque reference to the actor (user, service, system) performing a call.
pub type ActorRef = String;

/// Reference to a field-schema template (e.g., "hardware-request").
pub type TemplateId = String;

/// Dynamic value type for custom fields, metadata and pass-through settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Human-readable name of the variant, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// Record category. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Urgent,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Work, Category::Personal, Category::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

/// Workflow status of a record.
///
/// `Completed` and `Cancelled` are terminal; see [`crate::workflow`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Pending,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Active,
        Status::Pending,
        Status::Completed,
        Status::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Pending => "pending",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Category, Priority, Status);

/// A recorded approval signal. Cleared when the record's template or
/// workflow stage changes, depending on [`crate::config::ApprovalReset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub approver: ActorRef,
    pub approved_at: DateTime<Utc>,
}

/// Everything about a record except its identity and timestamps.
///
/// Values of this type have passed validation; unvalidated input travels as
/// [`crate::draft::ItemDraft`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Priority,
    pub status: Status,
    pub assignee: Option<String>,
    pub created_by: Option<ActorRef>,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub custom_fields: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, Value>,
    pub estimated_hours: Option<f64>,
    pub budget: Option<f64>,
    pub location: Option<String>,
    pub external_refs: Vec<String>,
    pub workflow_stage: Option<String>,
    pub approval_required: bool,
    pub template_id: Option<TemplateId>,

    // Graph structure
    pub parent_item_id: Option<RecordId>,
    pub dependencies: Vec<RecordId>,
    pub linked_items: Vec<RecordId>,

    pub attachment_ids: Vec<String>,
    pub reminder_settings: Option<Value>,
    pub approval: Option<Approval>,
}

/// A persisted record: identity and server timestamps around [`ItemFields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: ItemFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            name: self.fields.name.clone(),
            status: self.fields.status,
        }
    }
}

/// Short form of a record used when listing relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: RecordId,
    pub name: String,
    pub status: Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_untagged_json_shapes() {
        let v: Value = serde_json::from_str("3").unwrap();
        assert_eq!(v, Value::Int(3));
        let v: Value = serde_json::from_str("2.5").unwrap();
        assert_eq!(v, Value::Float(2.5));
        let v: Value = serde_json::from_str(r#"{"a":[true,null]}"#).unwrap();
        let mut m = BTreeMap::new();
        m.insert("a".into(), Value::Array(vec![Value::Bool(true), Value::Null]));
        assert_eq!(v, Value::Object(m));
    }

    #[test]
    fn enum_parse_and_defaults() {
        assert_eq!(Category::parse("work"), Some(Category::Work));
        assert_eq!(Category::parse("Work"), None);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Priority::parse("critical"), Some(Priority::Critical));
        assert_eq!(Status::default(), Status::Active);
        assert_eq!(Status::parse("done"), None);
        assert!(Status::Completed.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(!Status::Pending.is_terminal());
        assert_eq!(Status::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn record_serializes_flat_camel_case() {
        let record = ItemRecord {
            id: Uuid::nil(),
            fields: ItemFields {
                name: "Ship release".into(),
                category: Some(Category::Work),
                priority: Priority::High,
                estimated_hours: Some(4.0),
                ..Default::default()
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Ship release");
        assert_eq!(json["category"], "work");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["status"], "active");
        assert_eq!(json["estimatedHours"], 4.0);
        assert!(json["parentItemId"].is_null());
        assert!(json.get("createdAt").is_some());

        let back: ItemRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
