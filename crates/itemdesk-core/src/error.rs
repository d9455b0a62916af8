//! Error types for record service operations

use thiserror::Error;

use crate::hooks::Action;
use crate::record::{ActorRef, RecordId, TemplateId};
use crate::registry::ResolveError;
use crate::store::StoreError;
use crate::validation::ValidationErrors;

/// Result type alias for record service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error returned by [`RecordService`](crate::service::RecordService).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Actor '{actor}' may not {action}")]
    Forbidden { actor: ActorRef, action: Action },

    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::StoreUnavailable(other),
        }
    }
}

impl From<ResolveError> for ServiceError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::TemplateNotFound(id) | ResolveError::InheritanceCycle(id) => {
                ServiceError::TemplateNotFound(id)
            }
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::ValidationFailed(errors)
    }
}
