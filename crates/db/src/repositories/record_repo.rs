//! Repository for the `summaries` table.

use async_trait::async_trait;
use recap_core::status::{can_transition, validate_transition, ResourceStatus};
use recap_core::types::{ResourceId, UserId};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::record::{ResourceRecord, StatusUpdate, SummaryRow};
use crate::store::RecordStore;

/// Column list for `summaries` queries.
const COLUMNS: &str = "\
    id, owner_user_id, status_id, source, error_message, result, \
    created_at, updated_at";

const ALL_STATUSES: [ResourceStatus; 4] = [
    ResourceStatus::Pending,
    ResourceStatus::Processing,
    ResourceStatus::Completed,
    ResourceStatus::Failed,
];

/// Status ids from which `to` may be reached.
fn source_status_ids(to: ResourceStatus) -> Vec<i16> {
    ALL_STATUSES
        .into_iter()
        .filter(|from| can_transition(*from, to))
        .map(ResourceStatus::id)
        .collect()
}

/// Postgres-backed [`RecordStore`].
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create(
        &self,
        owner_user_id: UserId,
        source: &serde_json::Value,
    ) -> Result<ResourceRecord, StoreError> {
        let query = format!(
            "INSERT INTO summaries (owner_user_id, status_id, source) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, SummaryRow>(&query)
            .bind(owner_user_id)
            .bind(ResourceStatus::Pending.id())
            .bind(source)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get(&self, id: ResourceId) -> Result<Option<ResourceRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM summaries WHERE id = $1");
        let row = sqlx::query_as::<_, SummaryRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ResourceRecord::try_from).transpose()
    }

    /// Compare-and-set on `status_id`: the update only applies when the
    /// current status may transition to `status`.
    async fn set_status(
        &self,
        id: ResourceId,
        status: ResourceStatus,
        update: StatusUpdate,
    ) -> Result<ResourceRecord, StoreError> {
        let query = format!(
            "UPDATE summaries \
             SET status_id = $2, error_message = $3, result = $4, updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($5) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, SummaryRow>(&query)
            .bind(id)
            .bind(status.id())
            .bind(&update.error_message)
            .bind(&update.result)
            .bind(source_status_ids(status))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self.get(id).await?.ok_or(StoreError::NotFound {
                    entity: "Summary",
                    id,
                })?;
                validate_transition(current.status, status)
                    .map_err(StoreError::InvalidTransition)?;
                // The status moved between the UPDATE and the read; report it
                // as a lost race rather than retrying.
                Err(StoreError::InvalidTransition(format!(
                    "Summary {id} changed concurrently"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reachable_only_from_failed() {
        assert_eq!(
            source_status_ids(ResourceStatus::Pending),
            vec![ResourceStatus::Failed.id()]
        );
    }

    #[test]
    fn failed_reachable_from_pending_and_processing() {
        assert_eq!(
            source_status_ids(ResourceStatus::Failed),
            vec![ResourceStatus::Pending.id(), ResourceStatus::Processing.id()]
        );
    }
}
