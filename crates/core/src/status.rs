//! Resource lifecycle status and its state machine.
//!
//! Status ids match the `summaries.status_id` SMALLINT column.

use serde::{Deserialize, Serialize};

/// Processing status of a summary record.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Admitted and queued, no attempt has started yet.
    Pending = 1,
    /// The executor is working on it.
    Processing = 2,
    /// Terminal success; the record carries a result.
    Completed = 3,
    /// Terminal failure; the record carries an error message.
    Failed = 4,
}

impl ResourceStatus {
    /// Return the database status ID.
    pub fn id(self) -> i16 {
        self as i16
    }

    /// Map a database status ID back to a status.
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Processing),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further executor reports are expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the set of statuses reachable from `from`.
///
/// `Processing -> Processing` covers a second attempt reporting `started`
/// after an automatic retry. `Pending -> Failed` is the compensating write
/// when a queued record never got a live job.
pub fn valid_transitions(from: ResourceStatus) -> &'static [ResourceStatus] {
    use ResourceStatus::*;
    match from {
        Pending => &[Processing, Failed],
        Processing => &[Processing, Completed, Failed],
        Failed => &[Pending],
        Completed => &[],
    }
}

/// Check whether a transition from `from` to `to` is valid.
pub fn can_transition(from: ResourceStatus, to: ResourceStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a state transition, returning an error message for invalid ones.
pub fn validate_transition(from: ResourceStatus, to: ResourceStatus) -> Result<(), String> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(format!("Invalid transition: {from} -> {to}"))
    }
}
