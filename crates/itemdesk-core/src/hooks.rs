//! Collaborators the record service calls out to.
//!
//! Authorization runs before validation and can stop an operation. Audit,
//! notification and backup run after the write has committed; their errors
//! are logged by the service and never reach the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::event::AuditEvent;
use crate::record::{ItemRecord, RecordId, Value};

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Approve,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Approve => "approve",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::Read)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a best-effort collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub trait Authorizer: Send + Sync {
    /// Whether `actor` may perform `action`, on `record` when the action
    /// targets an existing one.
    fn authorize(&self, actor: &str, action: Action, record: Option<RecordId>) -> bool;
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), HookError>;
}

pub trait Notifier: Send + Sync {
    /// `settings` is the caller-supplied notification descriptor, passed
    /// through untouched.
    fn notify(&self, settings: Option<&Value>, record: &ItemRecord) -> Result<(), HookError>;
}

pub trait BackupSink: Send + Sync {
    fn snapshot(&self, record: &ItemRecord) -> Result<(), HookError>;
}

/// Permits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _actor: &str, _action: Action, _record: Option<RecordId>) -> bool {
        true
    }
}

/// Writes audit events to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), HookError> {
        tracing::info!(
            target: "itemdesk::audit",
            kind = %event.kind,
            record = %event.record_id,
            actor = %event.actor,
            at = %event.timestamp,
            "audit"
        );
        Ok(())
    }
}

/// Accepts and drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl AuditSink for Discard {
    fn record(&self, _event: &AuditEvent) -> Result<(), HookError> {
        Ok(())
    }
}

impl Notifier for Discard {
    fn notify(&self, _settings: Option<&Value>, _record: &ItemRecord) -> Result<(), HookError> {
        Ok(())
    }
}

impl BackupSink for Discard {
    fn snapshot(&self, _record: &ItemRecord) -> Result<(), HookError> {
        Ok(())
    }
}

/// The full set of collaborators injected into a `RecordService`.
#[derive(Clone)]
pub struct Hooks {
    pub authorizer: Arc<dyn Authorizer>,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn Notifier>,
    pub backup: Arc<dyn BackupSink>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            authorizer: Arc::new(AllowAll),
            audit: Arc::new(LogAuditSink),
            notifier: Arc::new(Discard),
            backup: Arc::new(Discard),
        }
    }
}

impl Hooks {
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_backup(mut self, backup: Arc<dyn BackupSink>) -> Self {
        self.backup = backup;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        assert_eq!(Action::Approve.to_string(), "approve");
        assert!(!Action::Read.is_mutating());
        assert!(Action::Delete.is_mutating());
    }

    #[test]
    fn default_hooks_allow_everything() {
        let hooks = Hooks::default();
        assert!(hooks
            .authorizer
            .authorize("anyone", Action::Delete, Some(uuid::Uuid::nil())));
    }
}
