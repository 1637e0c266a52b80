//! Error taxonomy for the data-access layer.
//!
//! Every failure a store or a unit of work can surface is one of the
//! variants below. Nothing in this layer retries, recovers or re-wraps:
//! backend failures travel in [`StoreError::Backend`] with their source
//! chain intact, and every other variant is raised before the store is
//! touched at all.

use thiserror::Error;

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Standardized data-access error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required argument was missing or malformed. Raised synchronously,
    /// before any store interaction.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store could not be reached or a session could not be opened.
    #[error("connection failure: {0}")]
    Connection(String),

    /// A staged write violated a store constraint (duplicate key, foreign
    /// key, check constraint).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A staged write raced with state the store no longer holds, or a
    /// shared unit of work was already in use.
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    /// The session behind this unit of work or repository has been
    /// disposed; no further operations are possible.
    #[error("session has been disposed")]
    SessionDisposed,

    /// The operation was cancelled before the store acknowledged it. No
    /// partial result was produced and no staged write was sent.
    #[error("operation cancelled")]
    Cancelled,

    /// An engine-native failure, propagated unmodified.
    #[error("store backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    /// Wrap an engine-native error without losing its source chain.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }

    /// Whether this error is the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
