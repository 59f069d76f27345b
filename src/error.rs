//! Error types for the ladder service
//!
//! Policy rejections (banned, frozen, cooldown, ...) are not errors; they
//! are expressed through the outcome enums in the queue module. Errors here
//! cover malformed input, missing entities, consistency violations, and
//! storage failures.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for ladder operations
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    #[error("Invalid input: {reason}")]
    ValidationError { reason: String },

    #[error("Channel {channel_id} is not a lobby")]
    LobbyNotFound { channel_id: u64 },

    #[error("Game {game_id} not found in lobby {channel_id}")]
    GameNotFound { channel_id: u64, game_id: u32 },

    #[error("Player {user_id} is not registered in guild {guild_id}")]
    PlayerNotFound { guild_id: u64, user_id: u64 },

    #[error("Consistency violation: {message}")]
    ConsistencyViolation { message: String },

    #[error("Storage operation failed: {message}")]
    StorageFailure { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
