use uuid::Uuid;

/// Failures of relationship operations. Every variant is recoverable at the
/// call site; none of them leaves a partially applied operation behind.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("A user cannot target themselves")]
    SelfReference,

    #[error("Not allowed: {0}")]
    Unauthorized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Interaction between these users is blocked")]
    Blocked,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    /// A denormalized counter disagreed with its edges. Always a bug.
    #[error("Follow counters of user {0} drifted from their edges")]
    CounterDrift(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}
