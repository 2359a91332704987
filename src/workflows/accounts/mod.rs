//! Admin-facing account administration: list/search, create, update with role
//! reassignment, and delete with a self-deletion guard. Every mutation lands in
//! the audit trail.

pub mod router;
pub mod service;


pub use router::account_router;
pub use service::{
    AccountAdminError, AccountAdminService, AccountSummary, CreateAccountRequest,
    UpdateAccountRequest,
};
