use recap_core::types::DbId;

/// Failure reported by a storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// The requested status change is not allowed from the current status.
    #[error("{0}")]
    InvalidTransition(String),

    /// A stored value could not be mapped back into a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}
