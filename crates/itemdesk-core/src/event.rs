use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::{ActorRef, RecordId};

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Created,
    Updated,
    Deleted,
    Approved,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Created => "created",
            AuditKind::Updated => "updated",
            AuditKind::Deleted => "deleted",
            AuditKind::Approved => "approved",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event handed to the audit collaborator after a committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub record_id: RecordId,
    pub actor: ActorRef,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn now(kind: AuditKind, record_id: RecordId, actor: impl Into<ActorRef>) -> Self {
        Self {
            kind,
            record_id,
            actor: actor.into(),
            timestamp: Utc::now(),
        }
    }
}
