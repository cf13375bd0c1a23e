/// Failure of the event bus infrastructure.
///
/// Publishing to a resource nobody watches is not an error.
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// The backing transport could not take the event.
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    #[error("Event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
