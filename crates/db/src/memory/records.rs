use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use recap_core::status::{validate_transition, ResourceStatus};
use recap_core::types::{ResourceId, UserId};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::record::{ResourceRecord, StatusUpdate};
use crate::store::RecordStore;

#[derive(Default)]
struct Records {
    next_id: ResourceId,
    by_id: HashMap<ResourceId, ResourceRecord>,
}

/// In-memory [`RecordStore`].
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Records>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(
        &self,
        owner_user_id: UserId,
        source: &serde_json::Value,
    ) -> Result<ResourceRecord, StoreError> {
        let mut records = self.inner.write().await;
        records.next_id += 1;
        let now = Utc::now();
        let record = ResourceRecord {
            id: records.next_id,
            owner_user_id,
            status: ResourceStatus::Pending,
            source: source.clone(),
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
        };
        records.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: ResourceId) -> Result<Option<ResourceRecord>, StoreError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn set_status(
        &self,
        id: ResourceId,
        status: ResourceStatus,
        update: StatusUpdate,
    ) -> Result<ResourceRecord, StoreError> {
        let mut records = self.inner.write().await;
        let record = records.by_id.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "Summary",
            id,
        })?;

        validate_transition(record.status, status).map_err(StoreError::InvalidTransition)?;

        record.status = status;
        record.error_message = update.error_message;
        record.result = update.result;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn create_starts_pending() {
        let store = MemoryRecordStore::new();
        let record = store
            .create(7, &serde_json::json!({"url": "https://youtu.be/x"}))
            .await
            .unwrap();
        assert_eq!(record.status, ResourceStatus::Pending);
        assert_eq!(record.owner_user_id, 7);
        assert_eq!(store.get(record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn reset_to_pending_clears_error() {
        let store = MemoryRecordStore::new();
        let record = store.create(1, &serde_json::Value::Null).await.unwrap();
        store
            .set_status(record.id, ResourceStatus::Failed, StatusUpdate::error("boom"))
            .await
            .unwrap();

        let reset = store
            .set_status(record.id, ResourceStatus::Pending, StatusUpdate::default())
            .await
            .unwrap();
        assert_eq!(reset.status, ResourceStatus::Pending);
        assert!(reset.error_message.is_none());
    }

    #[tokio::test]
    async fn invalid_transition_is_refused() {
        let store = MemoryRecordStore::new();
        let record = store.create(1, &serde_json::Value::Null).await.unwrap();
        let err = store
            .set_status(
                record.id,
                ResourceStatus::Completed,
                StatusUpdate::result(serde_json::json!("x")),
            )
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::InvalidTransition(_));
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = store
            .set_status(42, ResourceStatus::Processing, StatusUpdate::default())
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::NotFound { id: 42, .. });
    }
}
