//! Record service: the entry point callers use.
//!
//! Every operation authorizes first. Writes then resolve the template, run the
//! validation pipeline over the full candidate record, persist, and finally
//! dispatch audit, notification and backup hooks. Hook failures are logged and
//! never undo a committed write.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::config::{ApprovalReset, ConfigError, CoreConfig, ServiceConfig};
use crate::draft::{ItemDraft, ItemPatch};
use crate::error::{Result, ServiceError};
use crate::event::{AuditEvent, AuditKind};
use crate::hooks::{Action, Hooks};
use crate::record::{ActorRef, Approval, ItemFields, ItemRecord, RecordId, Value};
use crate::registry::{SchemaResolver, TemplateSource};
use crate::relationship::{ParentCheck, RelationshipIndex, Relations};
use crate::store::{now_millis, RecordStore};
use crate::validation::{validate, ValidationContext};

/// Who is calling, plus per-call options passed through to collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationContext {
    pub actor: ActorRef,
    /// Handed to the notifier untouched.
    pub notification_settings: Option<Value>,
}

impl OperationContext {
    pub fn new(actor: impl Into<ActorRef>) -> Self {
        Self {
            actor: actor.into(),
            notification_settings: None,
        }
    }

    pub fn system() -> Self {
        Self::new("system")
    }

    pub fn with_notification_settings(mut self, settings: Value) -> Self {
        self.notification_settings = Some(settings);
        self
    }
}

/// A record together with its resolved relations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    #[serde(flatten)]
    pub record: ItemRecord,
    pub relations: Relations,
}

pub struct RecordService {
    store: Arc<dyn RecordStore>,
    resolver: SchemaResolver,
    hooks: Hooks,
    config: ServiceConfig,
    // Per-record write locks. Entries die with their last holder.
    locks: Mutex<HashMap<RecordId, Weak<Mutex<()>>>>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>, templates: Arc<dyn TemplateSource>) -> Self {
        Self {
            store,
            resolver: SchemaResolver::new(templates),
            hooks: Hooks::default(),
            config: ServiceConfig::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build a service from validated configuration; templates come from
    /// `config.templates`.
    pub fn from_config(
        store: Arc<dyn RecordStore>,
        config: &CoreConfig,
        hooks: Hooks,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let registry = config.registry()?;
        Ok(Self::new(store, Arc::new(registry))
            .with_hooks(hooks)
            .with_config(config.service.clone()))
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Validate and persist a new record.
    pub fn create(&self, ctx: &OperationContext, draft: ItemDraft) -> Result<ItemRecord> {
        self.authorize(ctx, Action::Create, None)?;

        let schema = self.resolver.resolve(draft.template_id.as_deref())?;
        let parent = self.index().check_parent(None, draft.parent_item_id)?;
        let fields = validate(
            &draft,
            &ValidationContext {
                schema: &schema,
                existing: None,
                parent,
                approval: None,
            },
        )?;

        let id = self.store.put(None, fields)?;
        let record = self.load(id)?;
        tracing::info!(record = %id, actor = %ctx.actor, "record created");
        self.after_write(ctx, AuditKind::Created, &record);
        Ok(record)
    }

    pub fn get(&self, ctx: &OperationContext, id: RecordId) -> Result<ItemRecord> {
        self.authorize(ctx, Action::Read, Some(id))?;
        self.load(id)
    }

    /// Read a record and resolve its parent chain, children, dependencies,
    /// links and dependents. Dangling references are reported, not raised.
    pub fn get_with_relations(&self, ctx: &OperationContext, id: RecordId) -> Result<RecordView> {
        self.authorize(ctx, Action::Read, Some(id))?;
        let record = self.load(id)?;
        let relations = self.index().related(&record)?;
        Ok(RecordView { record, relations })
    }

    /// All records, newest first.
    pub fn list(&self, ctx: &OperationContext) -> Result<Vec<ItemRecord>> {
        self.authorize(ctx, Action::Read, None)?;
        Ok(self.store.list()?)
    }

    /// Merge `patch` over the stored record, validate the merged whole and
    /// persist it.
    pub fn update(&self, ctx: &OperationContext, id: RecordId, patch: ItemPatch) -> Result<ItemRecord> {
        self.authorize(ctx, Action::Update, Some(id))?;

        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.load(id)?;
        let candidate = patch.apply_to(ItemDraft::from(&existing.fields));
        let approval = self.carried_approval(&existing.fields, &candidate);

        let schema = self.resolver.resolve(candidate.template_id.as_deref())?;
        let parent = match self
            .index()
            .check_parent(Some(id), candidate.parent_item_id)?
        {
            // An unchanged dangling parent is tolerated; only a newly set one must exist.
            ParentCheck::Missing if candidate.parent_item_id == existing.fields.parent_item_id => {
                ParentCheck::Ok
            }
            check => check,
        };
        let fields = validate(
            &candidate,
            &ValidationContext {
                schema: &schema,
                existing: Some(&existing),
                parent,
                approval: approval.as_ref(),
            },
        )?;

        self.store.put(Some(id), fields)?;
        let record = self.load(id)?;
        tracing::info!(record = %id, actor = %ctx.actor, "record updated");
        self.after_write(ctx, AuditKind::Updated, &record);
        Ok(record)
    }

    /// Delete a record and its outgoing edges. Records that point at it are
    /// left with dangling references.
    pub fn delete(&self, ctx: &OperationContext, id: RecordId) -> Result<()> {
        self.authorize(ctx, Action::Delete, Some(id))?;

        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.load(id)?;
        self.store.delete(id)?;
        tracing::info!(record = %id, actor = %ctx.actor, "record deleted");
        self.after_write(ctx, AuditKind::Deleted, &existing);
        Ok(())
    }

    /// Record an approval signal, unlocking completion of records with
    /// `approvalRequired`.
    pub fn record_approval(
        &self,
        ctx: &OperationContext,
        id: RecordId,
        approver: impl Into<ActorRef>,
    ) -> Result<ItemRecord> {
        self.authorize(ctx, Action::Approve, Some(id))?;

        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut fields = self.load(id)?.fields;
        let approver = approver.into();
        fields.approval = Some(Approval {
            approver: approver.clone(),
            approved_at: now_millis(),
        });
        self.store.put(Some(id), fields)?;
        let record = self.load(id)?;
        tracing::info!(record = %id, approver = %approver, "approval recorded");
        self.after_write(ctx, AuditKind::Approved, &record);
        Ok(record)
    }

    fn authorize(&self, ctx: &OperationContext, action: Action, id: Option<RecordId>) -> Result<()> {
        if self.hooks.authorizer.authorize(&ctx.actor, action, id) {
            return Ok(());
        }
        tracing::warn!(actor = %ctx.actor, %action, record = ?id, "authorization denied");
        Err(ServiceError::Forbidden {
            actor: ctx.actor.clone(),
            action,
        })
    }

    fn load(&self, id: RecordId) -> Result<ItemRecord> {
        self.store.get(id)?.ok_or(ServiceError::NotFound(id))
    }

    fn index(&self) -> RelationshipIndex<'_> {
        RelationshipIndex::new(self.store.as_ref(), self.config.max_ancestor_depth)
    }

    /// The approval that survives this update under the reset policy.
    fn carried_approval(&self, existing: &ItemFields, candidate: &ItemDraft) -> Option<Approval> {
        let approval = existing.approval.clone()?;
        match self.config.approval_reset {
            ApprovalReset::Never => Some(approval),
            ApprovalReset::OnChange => {
                let changed = candidate.template_id != existing.template_id
                    || candidate.workflow_stage != existing.workflow_stage;
                if changed {
                    tracing::debug!("approval cleared by template or stage change");
                    None
                } else {
                    Some(approval)
                }
            }
        }
    }

    fn record_lock(&self, id: RecordId) -> Arc<Mutex<()>> {
        let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = table.get(&id).and_then(Weak::upgrade) {
            return lock;
        }
        table.retain(|_, weak| weak.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        table.insert(id, Arc::downgrade(&lock));
        lock
    }

    fn after_write(&self, ctx: &OperationContext, kind: AuditKind, record: &ItemRecord) {
        if self.config.audit_enabled {
            let event = AuditEvent::now(kind, record.id, ctx.actor.clone());
            if let Err(e) = self.hooks.audit.record(&event) {
                tracing::warn!(record = %record.id, %kind, error = %e, "audit hook failed");
            }
        }
        if !matches!(kind, AuditKind::Created | AuditKind::Updated) {
            return;
        }
        if self.config.notifications_enabled {
            if let Err(e) = self
                .hooks
                .notifier
                .notify(ctx.notification_settings.as_ref(), record)
            {
                tracing::warn!(record = %record.id, error = %e, "notification hook failed");
            }
        }
        if self.config.backup_enabled {
            if let Err(e) = self.hooks.backup.snapshot(record) {
                tracing::warn!(record = %record.id, error = %e, "backup hook failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryRecordStore;
    use crate::registry::TemplateRegistry;
    use chrono::Utc;

    fn service() -> RecordService {
        RecordService::new(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(TemplateRegistry::new()),
        )
    }

    #[test]
    fn record_lock_is_shared_while_held() {
        let svc = service();
        let id = uuid::Uuid::new_v4();
        let a = svc.record_lock(id);
        let b = svc.record_lock(id);
        assert!(Arc::ptr_eq(&a, &b));
        drop(a);
        drop(b);

        let c = svc.record_lock(uuid::Uuid::new_v4());
        // The dead entry for `id` was pruned when `c` was inserted.
        assert_eq!(svc.locks.lock().unwrap().len(), 1);
        drop(c);
    }

    #[test]
    fn approval_reset_policy() {
        let approval = Approval {
            approver: "lee".into(),
            approved_at: Utc::now(),
        };
        let existing = ItemFields {
            name: "x".into(),
            workflow_stage: Some("review".into()),
            approval: Some(approval.clone()),
            ..Default::default()
        };
        let mut candidate = ItemDraft::from(&existing);
        let svc = service();
        assert_eq!(svc.carried_approval(&existing, &candidate), Some(approval.clone()));

        candidate.workflow_stage = Some("shipping".into());
        assert_eq!(svc.carried_approval(&existing, &candidate), None);

        let svc = service().with_config(ServiceConfig {
            approval_reset: ApprovalReset::Never,
            ..Default::default()
        });
        assert_eq!(svc.carried_approval(&existing, &candidate), Some(approval));
    }
}
