//! Itemdesk Core - structured item records
//!
//! This crate provides the record core behind the itemdesk server:
//!
//! - **Record**: the `ItemRecord` model with custom fields, workflow state and relationship edges
//! - **Draft**: unvalidated create/update input (`ItemDraft`, `ItemPatch`)
//! - **Schema / Registry**: custom-field templates with inheritance and a memoizing resolver
//! - **Store**: the `RecordStore` trait, an in-memory store and a SQLite store (feature `sqlite`)
//! - **Relationship**: parent chain, children, dependencies and links, with cycle checks
//! - **Validation**: the ordered validation pipeline producing per-field errors
//! - **Workflow**: status state machine and approval gating
//! - **Hooks**: authorization, audit, notification and backup collaborators
//! - **Service**: `RecordService`, the orchestrator callers use
//!
//! # Write pipeline
//!
//! ```text
//! authorize → resolve template → validate → persist → audit / notify / backup
//! ```

pub mod config;
pub mod draft;
pub mod error;
pub mod event;
pub mod hooks;
pub mod memory_store;
pub mod record;
pub mod registry;
pub mod relationship;
pub mod schema;
pub mod service;
pub mod store;
pub mod validation;
pub mod workflow;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use config::{ApprovalReset, ConfigError, CoreConfig, ServiceConfig};
pub use draft::{ItemDraft, ItemPatch};
pub use error::{Result, ServiceError};
pub use event::{AuditEvent, AuditKind};
pub use hooks::{
    Action, AllowAll, AuditSink, Authorizer, BackupSink, Discard, HookError, Hooks, LogAuditSink,
    Notifier,
};
pub use memory_store::MemoryRecordStore;
pub use record::{
    ActorRef, Approval, Category, ItemFields, ItemRecord, Priority, RecordId, RecordSummary,
    Status, TemplateId, Value,
};
pub use registry::{RegistryError, ResolveError, SchemaResolver, TemplateRegistry, TemplateSource};
pub use relationship::{ParentCheck, RelatedRecord, Relations, RelationshipIndex};
pub use schema::{FieldDef, FieldType, ResolvedSchema, Template};
pub use service::{OperationContext, RecordService, RecordView};
pub use store::{RecordStore, StoreError};
pub use validation::{validate, ValidationContext, ValidationErrors};
pub use workflow::{Transition, WorkflowError};

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteRecordStore;
