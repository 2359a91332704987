use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditSink;
use crate::directory::{AccountDirectory, AccountId, DirectoryError, Role};
use crate::workflows::actor_from_headers;

use super::service::{
    AccountAdminError, AccountAdminService, CreateAccountRequest, UpdateAccountRequest,
};

/// Router builder exposing account administration over JSON.
pub fn account_router<D, A>(service: Arc<AccountAdminService<D, A>>) -> Router
where
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/accounts",
            get(list_handler::<D, A>).post(create_handler::<D, A>),
        )
        .route(
            "/api/v1/accounts/:id",
            axum::routing::put(update_handler::<D, A>).delete(delete_handler::<D, A>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

fn error_response(error: AccountAdminError) -> Response {
    let status = match &error {
        AccountAdminError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AccountAdminError::Directory(DirectoryError::DuplicateEmail(_)) => StatusCode::CONFLICT,
        AccountAdminError::SelfDeletion => StatusCode::FORBIDDEN,
        AccountAdminError::NotFound => StatusCode::NOT_FOUND,
        AccountAdminError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn list_handler<D, A>(
    State(service): State<Arc<AccountAdminService<D, A>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    match service.list(query.search.as_deref(), query.role) {
        Ok(summaries) => (StatusCode::OK, axum::Json(summaries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<D, A>(
    State(service): State<Arc<AccountAdminService<D, A>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CreateAccountRequest>,
) -> Response
where
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.create(request, &actor) {
        Ok((summary, audit)) => {
            let payload = json!({ "account": summary, "audited": audit.is_recorded() });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<D, A>(
    State(service): State<Arc<AccountAdminService<D, A>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<UpdateAccountRequest>,
) -> Response
where
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.update(&AccountId(id), request, &actor) {
        Ok((summary, audit)) => {
            let payload = json!({ "account": summary, "audited": audit.is_recorded() });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_handler<D, A>(
    State(service): State<Arc<AccountAdminService<D, A>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.delete(&AccountId(id), &actor) {
        Ok(audit) => {
            let payload = json!({ "deleted": true, "audited": audit.is_recorded() });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}
