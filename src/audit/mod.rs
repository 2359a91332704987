//! Append-only audit trail of administrative actions. Entries are written exactly
//! once per action and never updated or removed; retention is an operational
//! concern outside the core.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short codes identifying each audited administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserCreated,
    UserUpdated,
    UserDeleted,
    VerificationCreated,
    VerificationApproved,
    VerificationRejected,
    VerificationDeleted,
}

impl AuditAction {
    pub const fn code(self) -> &'static str {
        match self {
            AuditAction::UserCreated => "USER_CREATED",
            AuditAction::UserUpdated => "USER_UPDATED",
            AuditAction::UserDeleted => "USER_DELETED",
            AuditAction::VerificationCreated => "VERIFICATION_CREATED",
            AuditAction::VerificationApproved => "VERIFICATION_APPROVED",
            AuditAction::VerificationRejected => "VERIFICATION_REJECTED",
            AuditAction::VerificationDeleted => "VERIFICATION_DELETED",
        }
    }
}

/// Identity performing an administrative action. Requests that carry no identity
/// fall back to `"Unknown"`, matching what the trail records for anonymous admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor(String);

impl Actor {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn unknown() -> Self {
        Self("Unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable record of an administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub action: AuditAction,
    pub performed_by: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only sink for administrative actions.
///
/// `append` must complete (or fail loudly) before the triggering operation is
/// considered done: the entry is the only durable record of who performed an
/// irreversible account or status change.
pub trait AuditSink: Send + Sync {
    fn append(
        &self,
        action: AuditAction,
        performed_by: &Actor,
        details: String,
    ) -> Result<AuditEntry, AuditError>;

    /// Up to `count` entries, newest first.
    fn recent(&self, count: usize) -> Result<Vec<AuditEntry>, AuditError>;
}

/// Error enumeration for audit sink failures.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Whether a committed mutation made it into the audit trail.
///
/// A failed append never un-happens the mutation; the failure is carried here so an
/// unaudited success stays distinguishable from an audited one.
#[derive(Debug)]
pub enum AuditTrail {
    Recorded(AuditEntry),
    Unrecorded(AuditError),
}

impl AuditTrail {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditTrail::Recorded(_))
    }

    pub fn entry(&self) -> Option<&AuditEntry> {
        match self {
            AuditTrail::Recorded(entry) => Some(entry),
            AuditTrail::Unrecorded(_) => None,
        }
    }
}
