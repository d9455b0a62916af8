//! Validation pipeline.
//!
//! [`validate`] checks a complete candidate record and either returns the typed
//! [`ItemFields`] ready to persist or every field error it found. Rules run in
//! a fixed order and never short-circuit:
//!
//! 1. required fields (`name`) and immutable fields (`createdBy`)
//! 2. enum membership and the due date format
//! 3. custom-field keys and types against the resolved template
//! 4. numeric non-negativity
//! 5. parent existence and cycles
//! 6. workflow legality
//!
//! The function is pure: anything that needs the store (the parent check) is
//! computed by the caller and passed in through [`ValidationContext`].

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::draft::ItemDraft;
use crate::record::{Approval, Category, ItemFields, ItemRecord, Priority, Status, Value};
use crate::relationship::ParentCheck;
use crate::schema::ResolvedSchema;
use crate::workflow::Transition;

/// Field path to reason. Custom fields use the path `customFields.<key>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reason for `field`. The first reason recorded wins.
    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| reason.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, reason)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, reason)?;
        }
        Ok(())
    }
}

/// Everything besides the candidate that validation depends on.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub schema: &'a ResolvedSchema,
    /// The stored record on update, `None` on create.
    pub existing: Option<&'a ItemRecord>,
    pub parent: ParentCheck,
    /// The approval that will be kept on the record, after any reset.
    pub approval: Option<&'a Approval>,
}

/// Validate a full candidate record.
pub fn validate(
    draft: &ItemDraft,
    ctx: &ValidationContext<'_>,
) -> Result<ItemFields, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    // 1. Required and immutable fields
    if draft.name.trim().is_empty() {
        errors.add("name", "required");
    }
    if let Some(existing) = ctx.existing {
        if draft.created_by != existing.fields.created_by {
            errors.add("createdBy", "immutable");
        }
    }

    // 2. Enums and dates
    let category = match draft.category.as_deref() {
        None => None,
        Some(raw) => Category::parse(raw).or_else(|| {
            errors.add("category", "invalid category");
            None
        }),
    };
    let priority = match draft.priority.as_deref() {
        None => Priority::default(),
        Some(raw) => Priority::parse(raw).unwrap_or_else(|| {
            errors.add("priority", "invalid priority");
            Priority::default()
        }),
    };
    let status = match draft.status.as_deref() {
        None => Some(Status::default()),
        Some(raw) => Status::parse(raw).or_else(|| {
            errors.add("status", "invalid status");
            None
        }),
    };
    let due_date = match draft.due_date.as_deref() {
        None => None,
        Some(raw) => parse_due_date(raw).or_else(|| {
            errors.add("dueDate", "invalid due date");
            None
        }),
    };

    // 3. Custom fields
    check_custom_fields(&draft.custom_fields, ctx.schema, &mut errors);

    // 4. Numbers
    for (field, value) in [
        ("estimatedHours", draft.estimated_hours),
        ("budget", draft.budget),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                errors.add(field, "must be a non-negative number");
            }
        }
    }

    // 5. Relationships
    match ctx.parent {
        ParentCheck::Ok => {}
        ParentCheck::Missing => errors.add("parentItemId", "parent record not found"),
        ParentCheck::Cycle => errors.add("parentItemId", "would create a parent cycle"),
    }

    // 6. Workflow
    if let Some(to) = status {
        let transition = Transition {
            from: ctx.existing.map(|r| r.fields.status),
            to,
            approval_required: draft.approval_required,
            approved: ctx.approval.is_some(),
        };
        if let Err(e) = transition.check() {
            errors.add("status", e.to_string());
        }
    }

    if !errors.is_empty() {
        tracing::debug!(errors = %errors, "candidate record rejected");
        return Err(errors);
    }

    Ok(ItemFields {
        name: draft.name.clone(),
        description: draft.description.clone(),
        category,
        priority,
        status: status.unwrap_or_default(),
        assignee: draft.assignee.clone(),
        created_by: draft.created_by.clone(),
        due_date,
        tags: draft.tags.clone(),
        custom_fields: draft.custom_fields.clone(),
        metadata: draft.metadata.clone(),
        estimated_hours: draft.estimated_hours,
        budget: draft.budget,
        location: draft.location.clone(),
        external_refs: draft.external_refs.clone(),
        workflow_stage: draft.workflow_stage.clone(),
        approval_required: draft.approval_required,
        template_id: draft.template_id.clone(),
        parent_item_id: draft.parent_item_id,
        dependencies: draft.dependencies.clone(),
        linked_items: draft.linked_items.clone(),
        attachment_ids: draft.attachment_ids.clone(),
        reminder_settings: draft.reminder_settings.clone(),
        approval: ctx.approval.cloned(),
    })
}

fn check_custom_fields(
    values: &BTreeMap<String, Value>,
    schema: &ResolvedSchema,
    errors: &mut ValidationErrors,
) {
    for (key, value) in values {
        let path = format!("customFields.{}", key);
        match schema.field(key) {
            None => errors.add(path, "not allowed by template"),
            Some(def) if matches!(value, Value::Null) => {
                if def.required {
                    errors.add(path, "required");
                }
            }
            Some(def) if !def.field_type.accepts(value) => errors.add(
                path,
                format!(
                    "expected {}, got {}",
                    def.field_type.as_str(),
                    value.type_name()
                ),
            ),
            Some(_) => {}
        }
    }
    for key in schema.required_keys() {
        if !values.contains_key(key) {
            errors.add(format!("customFields.{}", key), "required");
        }
    }
}

/// `YYYY-MM-DD`, or an RFC 3339 timestamp whose date part is kept.
fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}
