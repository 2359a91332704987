use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::AccountId;

/// Identifier wrapper for verification records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationId(pub String);

impl fmt::Display for VerificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a verification request. `Verified` and `Rejected` are terminal:
/// no workflow transition leads out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, VerificationStatus::Pending)
    }

    /// Guarded transition used by approve and reject. Returns `None` when the
    /// current state admits no further transition; the administrative edit
    /// override is the only path around this.
    pub fn transition(self, decision: Decision) -> Option<VerificationStatus> {
        match self {
            VerificationStatus::Pending => Some(match decision {
                Decision::Approve => VerificationStatus::Verified,
                Decision::Reject => VerificationStatus::Rejected,
            }),
            VerificationStatus::Verified | VerificationStatus::Rejected => None,
        }
    }
}

/// The two canonical decisions an admin can take on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// A pending or decided claim that a person is a credentialed counselor.
///
/// Name, affiliation, and email are snapshots captured at submission time; they are
/// never re-derived from the linked account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: VerificationId,
    pub counselor_account_id: Option<AccountId>,
    pub counselor_name: String,
    pub professional_affiliation: String,
    pub institutional_email: String,
    pub status: VerificationStatus,
    pub request_date: DateTime<Utc>,
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// Self-service counselor application payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CounselorApplication {
    pub counselor_name: String,
    pub professional_affiliation: String,
    pub institutional_email: String,
    pub password: String,
    pub confirm_password: String,
}

impl CounselorApplication {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("counselor_name", &self.counselor_name)?;
        require("professional_affiliation", &self.professional_affiliation)?;
        validate_email(&self.institutional_email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Admin-initiated verification request. The counselor account id may be supplied
/// up front or left for the activation procedure to backfill.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminVerificationRequest {
    #[serde(default)]
    pub counselor_account_id: Option<AccountId>,
    pub counselor_name: String,
    pub professional_affiliation: String,
    pub institutional_email: String,
}

impl AdminVerificationRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("counselor_name", &self.counselor_name)?;
        require("professional_affiliation", &self.professional_affiliation)?;
        validate_email(&self.institutional_email)
    }
}

/// Full-field overwrite used by the administrative edit override, including status
/// and request date. No transition rules apply on this path.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationOverride {
    #[serde(default)]
    pub counselor_account_id: Option<AccountId>,
    pub counselor_name: String,
    pub professional_affiliation: String,
    pub institutional_email: String,
    pub status: VerificationStatus,
    pub request_date: DateTime<Utc>,
}

/// Validation errors surfaced to the caller before any mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    MissingField { field: &'static str },
    #[error("'{value}' is not a valid email address")]
    InvalidEmail { value: String },
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("password and confirmation do not match")]
    PasswordMismatch,
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain, no
/// whitespace. Deliverability is not this layer's problem.
pub(crate) fn validate_email(value: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidEmail {
        value: value.to_string(),
    };

    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}
