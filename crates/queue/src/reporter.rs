//! The executor reporting contract.

use std::sync::Arc;

use recap_core::events::ResourceEvent;
use recap_core::job::{JobOutcome, SecondaryOutcome};
use recap_core::status::ResourceStatus;
use recap_core::types::{JobId, ResourceId};
use recap_db::models::record::{ResourceRecord, StatusUpdate};
use recap_db::RecordStore;
use recap_events::EventBus;

use crate::error::ReportError;

/// Turns executor reports into a status write followed by an event.
///
/// The write always comes first, so a client that reconciles with a record
/// read after any event sees at least that event's status.
pub struct OutcomeReporter {
    records: Arc<dyn RecordStore>,
    bus: Arc<dyn EventBus>,
}

impl OutcomeReporter {
    pub fn new(records: Arc<dyn RecordStore>, bus: Arc<dyn EventBus>) -> Self {
        Self { records, bus }
    }

    pub async fn report_outcome(
        &self,
        job_id: JobId,
        resource_id: ResourceId,
        outcome: JobOutcome,
    ) -> Result<ResourceRecord, ReportError> {
        let (status, update) = match &outcome {
            JobOutcome::Started => (ResourceStatus::Processing, StatusUpdate::default()),
            JobOutcome::Completed { result } => {
                (ResourceStatus::Completed, StatusUpdate::result(result.clone()))
            }
            JobOutcome::Failed { error_message } => {
                (ResourceStatus::Failed, StatusUpdate::error(error_message.clone()))
            }
        };

        let record = self.records.set_status(resource_id, status, update).await?;
        self.bus.publish(resource_id, outcome.into()).await?;

        tracing::info!(job_id, resource_id, status = %status, "Outcome reported");
        Ok(record)
    }

    /// Publish the event for an outcome whose status is already written.
    ///
    /// Used to finish a report that failed with [`ReportError::Bus`].
    pub async fn republish(
        &self,
        resource_id: ResourceId,
        outcome: JobOutcome,
    ) -> Result<(), ReportError> {
        self.bus.publish(resource_id, outcome.into()).await?;
        Ok(())
    }

    /// Publish progress of a downstream step. Secondary steps do not touch
    /// the record's status.
    pub async fn report_secondary(
        &self,
        resource_id: ResourceId,
        task: &str,
        outcome: SecondaryOutcome,
    ) -> Result<(), ReportError> {
        let event = ResourceEvent::secondary(task, outcome);
        tracing::debug!(resource_id, task, event = event.name(), "Secondary outcome reported");
        self.bus.publish(resource_id, event).await?;
        Ok(())
    }
}
