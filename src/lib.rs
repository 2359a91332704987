//! Administrative console core for a counseling platform: the counselor
//! credential-verification workflow, the account directory and audit contracts it
//! drives, and the HTTP surface that exposes them.

pub mod audit;
pub mod config;
pub mod directory;
pub mod error;
pub mod infra;
pub mod telemetry;
pub mod workflows;
