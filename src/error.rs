//! Error types for the matchmaking service
//!
//! Core operations return the typed [`MatchmakingError`] so callers can map
//! every failure to a stable machine-readable kind. Process-level plumbing
//! (configuration, servers, `main`) keeps using `anyhow`.

use serde::Serialize;

/// Result type alias for core matchmaking operations
pub type Result<T> = std::result::Result<T, MatchmakingError>;

/// Stable, machine-readable error kinds exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    AlreadyWaiting,
    Conflict,
    InvalidArgument,
    StoreUnavailable,
    Configuration,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyWaiting => "ALREADY_WAITING",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::StoreUnavailable => "STORE_UNAVAILABLE",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, Clone, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Club {club_id} already has a waiting match request")]
    AlreadyWaiting { club_id: u64 },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// The stable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchmakingError::Unauthorized { .. } => ErrorKind::Unauthorized,
            MatchmakingError::NotFound { .. } => ErrorKind::NotFound,
            MatchmakingError::AlreadyWaiting { .. } => ErrorKind::AlreadyWaiting,
            MatchmakingError::Conflict { .. } => ErrorKind::Conflict,
            MatchmakingError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            MatchmakingError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            MatchmakingError::ConfigurationError { .. } => ErrorKind::Configuration,
            MatchmakingError::InternalError { .. } => ErrorKind::Internal,
        }
    }

    /// Message that is safe to show to an end user
    pub fn public_message(&self) -> String {
        match self {
            MatchmakingError::StoreUnavailable { .. } => {
                "The match store is temporarily unavailable".to_string()
            }
            MatchmakingError::InternalError { .. } | MatchmakingError::ConfigurationError { .. } => {
                "Internal service error".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        MatchmakingError::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        MatchmakingError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        MatchmakingError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn club_not_found(club_id: u64) -> Self {
        MatchmakingError::NotFound {
            entity: "Club",
            id: club_id.to_string(),
        }
    }

    pub fn room_not_found(room_id: &str) -> Self {
        MatchmakingError::NotFound {
            entity: "Match room",
            id: room_id.to_string(),
        }
    }

    /// Whether this is the lost-race signal from an optimistic update
    pub fn is_conflict(&self) -> bool {
        matches!(self, MatchmakingError::Conflict { .. })
    }
}
