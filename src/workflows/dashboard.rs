//! Console landing summary: headline counts plus the latest audit activity.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;

use crate::audit::{AuditEntry, AuditError, AuditSink};
use crate::directory::{AccountDirectory, DirectoryError};
use crate::workflows::verification::registry::{RegistryError, VerificationRegistry};
use crate::workflows::verification::VerificationStatus;

const RECENT_ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_accounts: usize,
    pub pending_verifications: usize,
    pub verified_counselors: usize,
    pub recent_activity: Vec<AuditEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Read-only aggregation over the three shared stores.
pub struct DashboardService<R, D, A> {
    registry: Arc<R>,
    directory: Arc<D>,
    audit: Arc<A>,
}

impl<R, D, A> DashboardService<R, D, A>
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    pub fn new(registry: Arc<R>, directory: Arc<D>, audit: Arc<A>) -> Self {
        Self {
            registry,
            directory,
            audit,
        }
    }

    pub fn summary(&self) -> Result<DashboardSummary, DashboardError> {
        Ok(DashboardSummary {
            total_accounts: self.directory.list()?.len(),
            pending_verifications: self
                .registry
                .list(Some(VerificationStatus::Pending))?
                .len(),
            verified_counselors: self
                .registry
                .list(Some(VerificationStatus::Verified))?
                .len(),
            recent_activity: self.audit.recent(RECENT_ACTIVITY_LIMIT)?,
        })
    }
}

/// Router exposing the dashboard summary and the raw recent-activity feed.
pub fn dashboard_router<R, D, A>(service: Arc<DashboardService<R, D, A>>) -> Router
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/dashboard", get(summary_handler::<R, D, A>))
        .with_state(service)
}

pub(crate) async fn summary_handler<R, D, A>(
    State(service): State<Arc<DashboardService<R, D, A>>>,
) -> Response
where
    R: VerificationRegistry + 'static,
    D: AccountDirectory + 'static,
    A: AuditSink + 'static,
{
    match service.summary() {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
