//! Summary record models.

use recap_core::status::ResourceStatus;
use recap_core::types::{ResourceId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::StoreError;

/// A summary record as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub owner_user_id: UserId,
    pub status: ResourceStatus,
    /// What to summarize (video URL, language, options).
    pub source: serde_json::Value,
    pub error_message: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Optional fields written together with a status change.
///
/// Fields left as `None` are cleared, so a reset to `pending` also wipes the
/// previous error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub error_message: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl StatusUpdate {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            result: None,
        }
    }

    pub fn result(result: serde_json::Value) -> Self {
        Self {
            error_message: None,
            result: Some(result),
        }
    }
}

/// A row from the `summaries` table.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub id: ResourceId,
    pub owner_user_id: UserId,
    pub status_id: i16,
    pub source: serde_json::Value,
    pub error_message: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<SummaryRow> for ResourceRecord {
    type Error = StoreError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        let status = ResourceStatus::from_id(row.status_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "summary {} has unknown status_id {}",
                row.id, row.status_id
            ))
        })?;
        Ok(Self {
            id: row.id,
            owner_user_id: row.owner_user_id,
            status,
            source: row.source,
            error_message: row.error_message,
            result: row.result,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
