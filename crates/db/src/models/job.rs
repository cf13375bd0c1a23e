//! Job queue row models.

use recap_core::job::JobDescriptor;
use recap_core::types::{JobId, ResourceId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

use super::status::JobState;
use crate::error::StoreError;

/// Queue-side view of a job: its descriptor plus delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub descriptor: JobDescriptor,
    pub state: JobState,
    /// Deliveries so far.
    pub attempts: u32,
    /// Earliest time the job may be delivered (again).
    pub run_at: Timestamp,
    pub last_error: Option<String>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// A row from the `summary_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub resource_id: ResourceId,
    pub owner_user_id: UserId,
    pub payload: serde_json::Value,
    pub state_id: i16,
    pub attempts: i32,
    pub run_at: Timestamp,
    pub last_error: Option<String>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state = JobState::from_id(row.state_id).ok_or_else(|| {
            StoreError::Corrupt(format!("job {} has unknown state_id {}", row.id, row.state_id))
        })?;
        Ok(Self {
            descriptor: JobDescriptor {
                id: row.id,
                resource_id: row.resource_id,
                owner_user_id: row.owner_user_id,
                payload: row.payload,
            },
            state,
            attempts: row.attempts.max(0) as u32,
            run_at: row.run_at,
            last_error: row.last_error,
            finished_at: row.finished_at,
            created_at: row.created_at,
        })
    }
}
