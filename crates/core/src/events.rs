//! Events routed over the bus for a single resource.
//!
//! Events are transient: nothing here is persisted, and a subscriber only
//! sees what is published while it is connected.

use serde::{Deserialize, Serialize};

use crate::job::{JobOutcome, SecondaryOutcome};

/// Event name of the synthetic frame a stream opens with.
pub const EVENT_CONNECTED: &str = "connected";

/// A status change broadcast to everyone watching a resource.
///
/// Serialized with a kebab-case `type` tag, e.g.
/// `{"type":"completed","result":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResourceEvent {
    ProcessingStarted,
    Completed {
        result: serde_json::Value,
    },
    Failed {
        error_message: String,
    },
    SecondaryTaskStarted {
        task: String,
    },
    SecondaryTaskCompleted {
        task: String,
        result: serde_json::Value,
    },
    SecondaryTaskFailed {
        task: String,
        error_message: String,
    },
}

impl ResourceEvent {
    /// The wire name of this event (the `type` tag).
    pub fn name(&self) -> &'static str {
        match self {
            ResourceEvent::ProcessingStarted => "processing-started",
            ResourceEvent::Completed { .. } => "completed",
            ResourceEvent::Failed { .. } => "failed",
            ResourceEvent::SecondaryTaskStarted { .. } => "secondary-task-started",
            ResourceEvent::SecondaryTaskCompleted { .. } => "secondary-task-completed",
            ResourceEvent::SecondaryTaskFailed { .. } => "secondary-task-failed",
        }
    }

    /// Build the event for a secondary step of `task`.
    pub fn secondary(task: impl Into<String>, outcome: SecondaryOutcome) -> Self {
        let task = task.into();
        match outcome {
            SecondaryOutcome::Started => ResourceEvent::SecondaryTaskStarted { task },
            SecondaryOutcome::Completed { result } => {
                ResourceEvent::SecondaryTaskCompleted { task, result }
            }
            SecondaryOutcome::Failed { error_message } => {
                ResourceEvent::SecondaryTaskFailed {
                    task,
                    error_message,
                }
            }
        }
    }
}

impl From<JobOutcome> for ResourceEvent {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Started => ResourceEvent::ProcessingStarted,
            JobOutcome::Completed { result } => ResourceEvent::Completed { result },
            JobOutcome::Failed { error_message } => ResourceEvent::Failed { error_message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_name() {
        let events = [
            ResourceEvent::ProcessingStarted,
            ResourceEvent::Completed {
                result: serde_json::json!({"summary": "x"}),
            },
            ResourceEvent::Failed {
                error_message: "boom".into(),
            },
            ResourceEvent::secondary("audio", SecondaryOutcome::Started),
            ResourceEvent::secondary(
                "audio",
                SecondaryOutcome::Completed {
                    result: serde_json::Value::Null,
                },
            ),
            ResourceEvent::secondary(
                "audio",
                SecondaryOutcome::Failed {
                    error_message: "tts down".into(),
                },
            ),
        ];

        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn failed_carries_error_message_field() {
        let json = serde_json::to_value(ResourceEvent::Failed {
            error_message: "transcript unavailable".into(),
        })
        .unwrap();
        assert_eq!(json["error_message"], "transcript unavailable");
    }

    #[test]
    fn outcome_maps_to_event() {
        assert_eq!(
            ResourceEvent::from(JobOutcome::Started),
            ResourceEvent::ProcessingStarted
        );
        assert_eq!(
            ResourceEvent::from(JobOutcome::Failed {
                error_message: "x".into()
            }),
            ResourceEvent::Failed {
                error_message: "x".into()
            }
        );
    }
}
