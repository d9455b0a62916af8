use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{TemplateId, Value};

/// A custom-field definition within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Supported custom-field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    StringArray,
    Object,
}

impl FieldType {
    /// Check if a value is acceptable for this field type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Int, Value::Int(_)) => true,
            (FieldType::Float, Value::Float(_)) => true,
            (FieldType::Float, Value::Int(_)) => true, // Allow int where float expected
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::DateTime, Value::String(_)) => true, // ISO string
            (FieldType::DateTime, Value::Int(_)) => true,    // or unix timestamp
            (FieldType::StringArray, Value::Array(items)) => {
                items.iter().all(|v| matches!(v, Value::String(_)))
            }
            (FieldType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::DateTime => "datetime",
            FieldType::StringArray => "string_array",
            FieldType::Object => "object",
        }
    }
}

/// Template definition: a named bundle of allowed custom fields.
///
/// Templates are supplied by configuration; records refer to them by
/// `templateId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub inherits: Option<TemplateId>,
}

/// The flattened custom-field set a record is checked against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSchema {
    pub template_id: Option<TemplateId>,
    pub fields: BTreeMap<String, FieldDef>,
}

impl ResolvedSchema {
    /// The schema of a record without a template: no custom fields allowed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.get(key)
    }

    pub fn allows(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .values()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_from_toml() {
        let template: Template = toml::from_str(
            r#"
            id = "hardware-request"
            name = "Hardware Request"

            [[fields]]
            name = "risk"
            field_type = "string"
            required = true

            [[fields]]
            name = "units"
            field_type = "int"
            "#,
        )
        .unwrap();
        assert_eq!(template.id, "hardware-request");
        assert_eq!(template.fields.len(), 2);
        assert!(template.fields[0].required);
        assert!(!template.fields[1].required);
        assert_eq!(template.fields[1].field_type, FieldType::Int);
        assert!(template.inherits.is_none());
    }

    #[test]
    fn field_type_acceptance() {
        assert!(FieldType::Float.accepts(&Value::Int(3)));
        assert!(!FieldType::Int.accepts(&Value::Float(3.0)));
        assert!(FieldType::StringArray.accepts(&Value::Array(vec![Value::String("a".into())])));
        assert!(!FieldType::StringArray.accepts(&Value::Array(vec![Value::Int(1)])));
        assert!(FieldType::DateTime.accepts(&Value::String("2026-01-01T00:00:00Z".into())));
        assert!(!FieldType::Bool.accepts(&Value::String("true".into())));
    }

    #[test]
    fn empty_schema_allows_nothing() {
        let schema = ResolvedSchema::empty();
        assert!(!schema.allows("risk"));
        assert_eq!(schema.required_keys().count(), 0);
    }
}
