//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use itemdesk_core::{
    ItemDraft, ItemPatch, ItemRecord, OperationContext, RecordId, RecordService, RecordView,
    ServiceError, Value,
};

use crate::auth::Actor;
use crate::AppState;

/// Body key carrying per-call notification settings next to the record fields.
const NOTIFICATION_SETTINGS_KEY: &str = "notificationSettings";

/// Error returned by every handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::Service(ServiceError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, json!({ "error": message }))
            }
            ApiError::Service(ServiceError::ValidationFailed(errors)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "errors": errors }),
            ),
            ApiError::Service(ServiceError::TemplateNotFound(_)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "errors": { "templateId": "template not found" } }),
            ),
            ApiError::Service(ServiceError::Forbidden { .. }) => {
                (StatusCode::FORBIDDEN, json!({ "error": message }))
            }
            ApiError::Service(ServiceError::StoreUnavailable(_)) | ApiError::Internal(_) => {
                tracing::error!("{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
        };
        (status, Json(body)).into_response()
    }
}

/// Run a service call on the blocking pool.
async fn call<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&RecordService) -> itemdesk_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.service))
        .await
        .map_err(|e| ApiError::Internal(format!("Task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn parse_id(id: &str) -> Result<RecordId, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid record id: {}", id)))
}

/// Decode a record body, splitting off `notificationSettings`.
fn decode_record_body<T: DeserializeOwned>(body: &Bytes) -> Result<(T, Option<Value>), ApiError> {
    let mut value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    let settings = match value.as_object_mut() {
        Some(obj) => obj
            .remove(NOTIFICATION_SETTINGS_KEY)
            .filter(|v| !v.is_null())
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", NOTIFICATION_SETTINGS_KEY, e)))?,
        None => return Err(ApiError::BadRequest("Body must be a JSON object".to_string())),
    };
    let decoded = serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid body: {}", e)))?;
    Ok((decoded, settings))
}

fn context(actor: &Actor, settings: Option<Value>) -> OperationContext {
    let mut ctx = actor.context();
    ctx.notification_settings = settings;
    ctx
}

/// List all records, newest first
pub async fn list_details(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<ItemRecord>>, ApiError> {
    let ctx = actor.context();
    let records = call(&state, move |svc| svc.list(&ctx)).await?;
    Ok(Json(records))
}

/// Create a record
pub async fn create_details(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    body: Bytes,
) -> Result<(StatusCode, Json<ItemRecord>), ApiError> {
    let (draft, settings): (ItemDraft, _) = decode_record_body(&body)?;
    let ctx = context(&actor, settings);
    let record = call(&state, move |svc| svc.create(&ctx, draft)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get a record with its relations
pub async fn get_details(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<RecordView>, ApiError> {
    let id = parse_id(&id)?;
    let ctx = actor.context();
    let view = call(&state, move |svc| svc.get_with_relations(&ctx, id)).await?;
    Ok(Json(view))
}

/// Apply a partial update
pub async fn update_details(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ItemRecord>, ApiError> {
    let id = parse_id(&id)?;
    let (patch, settings): (ItemPatch, _) = decode_record_body(&body)?;
    let ctx = context(&actor, settings);
    let record = call(&state, move |svc| svc.update(&ctx, id, patch)).await?;
    Ok(Json(record))
}

/// Delete a record
pub async fn delete_details(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id)?;
    let ctx = actor.context();
    call(&state, move |svc| svc.delete(&ctx, id)).await?;
    Ok(Json(json!({ "success": true, "id": id.to_string() })))
}

/// Request to record an approval
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApprovalRequest {
    /// Defaults to the calling actor
    pub approver: Option<String>,
}

/// Record an approval signal
pub async fn approve_details(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ItemRecord>, ApiError> {
    let id = parse_id(&id)?;
    let request: ApprovalRequest = if body.is_empty() {
        ApprovalRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid body: {}", e)))?
    };
    let approver = request.approver.unwrap_or_else(|| actor.0.clone());
    let ctx = actor.context();
    let record = call(&state, move |svc| svc.record_approval(&ctx, id, approver)).await?;
    Ok(Json(record))
}
