use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditSink;
use crate::directory::AccountDirectory;

use super::domain::{
    AdminVerificationRequest, CounselorApplication, VerificationId, VerificationOverride,
    VerificationStatus,
};
use super::registry::{RegistryError, VerificationRegistry};
use super::service::{
    ApproveOutcome, DeleteOutcome, RejectOutcome, VerificationService, WorkflowError,
};
use crate::workflows::actor_from_headers;

/// Router builder exposing the verification workflow over JSON.
pub fn verification_router<R, D, A>(service: Arc<VerificationService<R, D, A>>) -> Router
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/verifications",
            get(list_handler::<R, D, A>).post(admin_create_handler::<R, D, A>),
        )
        .route("/api/v1/verifications/apply", post(apply_handler::<R, D, A>))
        .route(
            "/api/v1/verifications/:id",
            get(detail_handler::<R, D, A>)
                .put(edit_handler::<R, D, A>)
                .delete(delete_handler::<R, D, A>),
        )
        .route(
            "/api/v1/verifications/:id/approve",
            post(approve_handler::<R, D, A>),
        )
        .route(
            "/api/v1/verifications/:id/reject",
            post(reject_handler::<R, D, A>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    status: Option<VerificationStatus>,
}

fn error_response(error: WorkflowError) -> Response {
    let status = match &error {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::EmailTaken(_) | WorkflowError::Registry(RegistryError::Conflict) => {
            StatusCode::CONFLICT
        }
        WorkflowError::RecordNotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn apply_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    axum::Json(application): axum::Json<CounselorApplication>,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    match service.apply(application) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn admin_create_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<AdminVerificationRequest>,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.create_by_admin(request, &actor) {
        Ok(creation) => {
            let issued_credential = creation
                .activation
                .as_ref()
                .ok()
                .and_then(|activation| activation.issued_credential())
                .map(|credential| credential.reveal().to_string());
            let warning = creation
                .activation
                .as_ref()
                .err()
                .map(|error| error.to_string());
            let payload = json!({
                "record": creation.record,
                "issued_credential": issued_credential,
                "warning": warning,
                "audited": creation.audit.is_recorded(),
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    match service.list(query.status) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    Path(id): Path<String>,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    match service.find(&VerificationId(id)) {
        Ok(Some(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(None) => error_response(WorkflowError::RecordNotFound),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.approve(&VerificationId(id), &actor) {
        Ok(ApproveOutcome::Approved {
            record,
            activation,
            audit,
        }) => {
            let payload = json!({
                "record": record,
                "account_id": activation.account_id(),
                "issued_credential": activation
                    .issued_credential()
                    .map(|credential| credential.reveal().to_string()),
                "audited": audit.is_recorded(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(ApproveOutcome::AlreadyDecided(record)) => {
            let payload = json!({ "record": record, "note": "already decided" });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(ApproveOutcome::NotFound) => error_response(WorkflowError::RecordNotFound),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.reject(&VerificationId(id), &actor) {
        Ok(RejectOutcome::Rejected { record, audit }) => {
            let payload = json!({ "record": record, "audited": audit.is_recorded() });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(RejectOutcome::AlreadyDecided(record)) => {
            let payload = json!({ "record": record, "note": "already decided" });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(RejectOutcome::NotFound) => error_response(WorkflowError::RecordNotFound),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn edit_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    Path(id): Path<String>,
    axum::Json(fields): axum::Json<VerificationOverride>,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    match service.edit_override(&VerificationId(id), fields) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_handler<R, D, A>(
    State(service): State<Arc<VerificationService<R, D, A>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.delete(&VerificationId(id), &actor) {
        Ok(DeleteOutcome::Deleted { record, audit }) => {
            let payload = json!({
                "deleted": record.id,
                "audited": audit.is_recorded(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(DeleteOutcome::NotFound) => error_response(WorkflowError::RecordNotFound),
        Err(error) => error_response(error),
    }
}
