//! In-process implementations of the collaborator contracts.
//!
//! State lives behind `tokio::sync` locks, so each implementation can be
//! shared via `Arc` between request handlers, an embedded executor and
//! tests. Nothing survives a restart.

mod jobs;
mod quota;
mod records;

pub use jobs::MemoryJobBackend;
pub use quota::MemoryQuotaLedger;
pub use records::MemoryRecordStore;
