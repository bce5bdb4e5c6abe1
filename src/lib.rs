//! CourseChat - course-aware chat session client
//!
//! This library provides the chat session core of the CourseChat client: an
//! in-memory conversation log, the (course, document) context that scopes
//! outgoing messages, the HTTP transport to the message service, and the
//! session controller that ties them together with optimistic updates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod catalog;
pub mod config;
pub mod context;
pub mod session;
pub mod store;
pub mod transport;

use store::{FailureKind, MessageStatus};

/// Result type alias for CourseChat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for CourseChat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Blank or otherwise unusable input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connectivity failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Backend rejected the request with a structured error payload
    #[error("{0}")]
    Server(String),

    /// Malformed or unexpected response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No authenticated identity is available
    #[error("Not authenticated")]
    Unauthenticated,

    /// Login or registration was rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Session cannot accept the operation in its current phase
    #[error("Session not ready: {0}")]
    NotReady(String),

    /// No message with the given id exists in the store
    #[error("Message not found: {0}")]
    NotFound(String),

    /// Status change outside `pending -> confirmed | failed`
    #[error("Invalid status transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Message id
        id: String,
        /// Current status
        from: MessageStatus,
        /// Requested status
        to: MessageStatus,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl Error {
    /// Delivery failure kind recorded on a failed message, if this error is one
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::Network(_) => Some(FailureKind::Network),
            Error::Server(_) => Some(FailureKind::Server),
            Error::Protocol(_) => Some(FailureKind::Protocol),
            _ => None,
        }
    }

    /// Whether this error signals a broken store contract rather than a runtime condition
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::InvalidTransition { .. })
    }
}

/// Initialize the CourseChat library with logging
pub fn init() {
    tracing_subscriber::fmt::init();
}

#[cfg(test)]
mod tests;
