//! Admin console workflows: counselor verification, account administration, and
//! the dashboard summary, each exposed as a service facade plus an axum router.

pub mod accounts;
pub mod dashboard;
pub mod verification;

use axum::http::HeaderMap;

use crate::audit::Actor;

/// Header carrying the acting admin's identity, stamped by the authenticating
/// proxy in front of this service. Absent header audits as "Unknown".
pub const ADMIN_IDENTITY_HEADER: &str = "x-admin-identity";

pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Actor {
    headers
        .get(ADMIN_IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(Actor::named)
        .unwrap_or_default()
}
