/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Id of a summary record, the routing key for resource events.
pub type ResourceId = DbId;

/// Id of a queued job, assigned by the queue at enqueue time.
pub type JobId = DbId;

/// Id of the user owning a resource or job.
pub type UserId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
