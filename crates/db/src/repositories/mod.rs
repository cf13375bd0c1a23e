//! Postgres implementations of the collaborator contracts.
//!
//! Each repository wraps a `PgPool` and implements one trait from
//! [`crate::store`].

pub mod job_repo;
pub mod quota_repo;
pub mod record_repo;

pub use job_repo::PgJobBackend;
pub use quota_repo::PgQuotaLedger;
pub use record_repo::PgRecordStore;
