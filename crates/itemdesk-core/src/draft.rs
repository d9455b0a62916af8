//! Unvalidated record input.
//!
//! Callers describe a new record with an [`ItemDraft`] and a change with an
//! [`ItemPatch`]. Both carry enum fields as raw strings so that the validation
//! pipeline can report every bad value at once instead of failing at decode
//! time. Unknown keys are rejected during deserialization.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::record::{ItemFields, RecordId, TemplateId, Value};

/// Candidate record contents, as supplied on create or produced by merging a
/// patch over an existing record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ItemDraft {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub created_by: Option<String>,
    pub due_date: Option<String>,
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
    pub parent_item_id: Option<RecordId>,
    pub dependencies: Vec<RecordId>,
    pub linked_items: Vec<RecordId>,
    pub attachment_ids: Vec<String>,
    pub reminder_settings: Option<Value>,
}

impl ItemDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl From<&ItemFields> for ItemDraft {
    fn from(fields: &ItemFields) -> Self {
        Self {
            name: fields.name.clone(),
            description: fields.description.clone(),
            category: fields.category.map(|c| c.as_str().to_string()),
            priority: Some(fields.priority.as_str().to_string()),
            status: Some(fields.status.as_str().to_string()),
            assignee: fields.assignee.clone(),
            created_by: fields.created_by.clone(),
            due_date: fields.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            tags: fields.tags.clone(),
            custom_fields: fields.custom_fields.clone(),
            metadata: fields.metadata.clone(),
            estimated_hours: fields.estimated_hours,
            budget: fields.budget,
            location: fields.location.clone(),
            external_refs: fields.external_refs.clone(),
            workflow_stage: fields.workflow_stage.clone(),
            approval_required: fields.approval_required,
            template_id: fields.template_id.clone(),
            parent_item_id: fields.parent_item_id,
            dependencies: fields.dependencies.clone(),
            linked_items: fields.linked_items.clone(),
            attachment_ids: fields.attachment_ids.clone(),
            reminder_settings: fields.reminder_settings.clone(),
        }
    }
}

/// A partial update. Absent keys keep the stored value; `null` clears a
/// nullable field; any other value overwrites it (collections are replaced
/// whole, not appended to).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub budget: Option<Option<f64>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_refs: Option<Vec<String>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub workflow_stage: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<bool>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Option<TemplateId>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub parent_item_id: Option<Option<RecordId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<RecordId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_items: Option<Vec<RecordId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_ids: Option<Vec<String>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub reminder_settings: Option<Option<Value>>,
}

/// Distinguishes an absent key (outer `None`, via `#[serde(default)]`) from an
/// explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl ItemPatch {
    /// True when the patch carries no keys at all.
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }

    /// Lay this patch over `base`, returning the merged candidate.
    pub fn apply_to(self, mut base: ItemDraft) -> ItemDraft {
        overwrite(&mut base.name, self.name);
        overwrite(&mut base.description, self.description);
        overwrite(&mut base.category, self.category);
        overwrite(&mut base.priority, self.priority.map(Some));
        overwrite(&mut base.status, self.status.map(Some));
        overwrite(&mut base.assignee, self.assignee);
        overwrite(&mut base.created_by, self.created_by.map(Some));
        overwrite(&mut base.due_date, self.due_date);
        overwrite(&mut base.tags, self.tags);
        overwrite(&mut base.custom_fields, self.custom_fields);
        overwrite(&mut base.metadata, self.metadata);
        overwrite(&mut base.estimated_hours, self.estimated_hours);
        overwrite(&mut base.budget, self.budget);
        overwrite(&mut base.location, self.location);
        overwrite(&mut base.external_refs, self.external_refs);
        overwrite(&mut base.workflow_stage, self.workflow_stage);
        overwrite(&mut base.approval_required, self.approval_required);
        overwrite(&mut base.template_id, self.template_id);
        overwrite(&mut base.parent_item_id, self.parent_item_id);
        overwrite(&mut base.dependencies, self.dependencies);
        overwrite(&mut base.linked_items, self.linked_items);
        overwrite(&mut base.attachment_ids, self.attachment_ids);
        overwrite(&mut base.reminder_settings, self.reminder_settings);
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Category, Priority, Status};
    use uuid::Uuid;

    #[test]
    fn draft_rejects_unknown_keys() {
        let err = serde_json::from_str::<ItemDraft>(r#"{"name":"x","permissions":["all"]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("permissions"));
    }

    #[test]
    fn draft_defaults_missing_keys() {
        let draft: ItemDraft =
            serde_json::from_str(r#"{"name":"Ship release","category":"work"}"#).unwrap();
        assert_eq!(draft.name, "Ship release");
        assert_eq!(draft.category.as_deref(), Some("work"));
        assert!(draft.priority.is_none());
        assert!(!draft.approval_required);
        assert!(draft.custom_fields.is_empty());
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: ItemPatch =
            serde_json::from_str(r#"{"assignee":null,"location":"Lab 3"}"#).unwrap();
        assert_eq!(patch.assignee, Some(None));
        assert_eq!(patch.location, Some(Some("Lab 3".into())));
        assert_eq!(patch.description, None);
    }

    #[test]
    fn empty_patch_is_empty() {
        let patch: ItemPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
        let patch: ItemPatch = serde_json::from_str(r#"{"tags":[]}"#).unwrap();
        assert!(!patch.is_empty());
    }

    #[test]
    fn apply_overwrites_present_and_keeps_absent() {
        let base = ItemDraft {
            name: "Ship release".into(),
            assignee: Some("dana".into()),
            location: Some("HQ".into()),
            tags: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let patch = ItemPatch {
            assignee: Some(None),
            tags: Some(vec!["c".into()]),
            ..Default::default()
        };
        let merged = patch.apply_to(base);
        assert_eq!(merged.name, "Ship release");
        assert_eq!(merged.assignee, None);
        assert_eq!(merged.location.as_deref(), Some("HQ"));
        assert_eq!(merged.tags, vec!["c".to_string()]);
    }

    #[test]
    fn draft_from_fields_uses_wire_names() {
        let parent = Uuid::new_v4();
        let fields = ItemFields {
            name: "n".into(),
            category: Some(Category::Urgent),
            priority: Priority::Critical,
            status: Status::Pending,
            due_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1),
            parent_item_id: Some(parent),
            ..Default::default()
        };
        let draft = ItemDraft::from(&fields);
        assert_eq!(draft.category.as_deref(), Some("urgent"));
        assert_eq!(draft.priority.as_deref(), Some("critical"));
        assert_eq!(draft.status.as_deref(), Some("pending"));
        assert_eq!(draft.due_date.as_deref(), Some("2026-03-01"));
        assert_eq!(draft.parent_item_id, Some(parent));
    }

    #[test]
    fn patch_serializes_only_present_keys() {
        let patch = ItemPatch {
            status: Some("completed".into()),
            assignee: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["status"], "completed");
        assert!(obj["assignee"].is_null());
    }
}
