//! Error types and result handling for core operations.
//!
//! Defines the error taxonomy shared by the store contract and domain
//! models. Store implementations map their backend failures onto these
//! variants so the notification pipeline can distinguish an unreachable
//! store from a missing entity or a caller mistake.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for domain and store operations.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Backing store cannot be reached.
    ///
    /// Notification calls treat this as a fail-fast condition: nothing is
    /// delivered when the subscription set cannot be read.
    #[error("subscription store unavailable: {0}")]
    StoreUnavailable(String),

    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write conflicted with existing state (duplicate id, stale update).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation required a different notification shape.
    ///
    /// Raised when a single event is expected but the notification carries
    /// zero or multiple events.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl CoreError {
    /// Creates a store-unavailable error from a backend message.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    /// Creates a not-found error for an entity description.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}
