//! Job descriptors and executor outcome reports.

use serde::{Deserialize, Serialize};

use crate::types::{JobId, ResourceId, UserId};

/// A job that has not been enqueued yet. The queue assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub resource_id: ResourceId,
    pub owner_user_id: UserId,
    pub payload: serde_json::Value,
}

/// An enqueued unit of work. Immutable once created.
///
/// `resource_id` is the summary record this job drives and doubles as the
/// event bus routing key, so every attempt and every manual retry of the
/// same resource publishes on the same channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub resource_id: ResourceId,
    pub owner_user_id: UserId,
    pub payload: serde_json::Value,
}

/// A descriptor handed to an executor together with its attempt number.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
    pub descriptor: JobDescriptor,
    /// 1-based attempt number of this delivery.
    pub attempt: u32,
}

/// What an executor reports for a resource it is working on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Started,
    Completed { result: serde_json::Value },
    Failed { error_message: String },
}

/// Outcome of a secondary async step (audio, export...) for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SecondaryOutcome {
    Started,
    Completed { result: serde_json::Value },
    Failed { error_message: String },
}
