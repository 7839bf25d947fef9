// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ferry relay.
//!
//! The variants follow the failure taxonomy the engine isolates on: an
//! authentication failure ends a session, a permission failure skips one
//! target, a rate limit carries the exact wait the platform asked for, and
//! a processing failure falls back to the original media.

use std::time::Duration;

use thiserror::Error;

use crate::types::ApprovalStatus;

/// The primary error type used across all Ferry collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum FerryError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Credential invalid or expired. Terminal for the session.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Transient network failure talking to the platform or a collaborator.
    #[error("network error: {message}")]
    Network {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing rights on a chat.
    #[error("permission denied in chat {chat}: {message}")]
    Permission { chat: i64, message: String },

    /// The platform imposed a wait before the next request.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Malformed or unreachable chat reference, or otherwise invalid input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Media processing failed.
    #[error("processing error: {message}")]
    Processing {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A pending approval was already moved to a terminal state.
    #[error("approval {id} already resolved as {status}")]
    AlreadyResolved { id: String, status: ApprovalStatus },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FerryError {
    /// Shorthand for a network error without an underlying source.
    pub fn network(message: impl Into<String>) -> Self {
        FerryError::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a processing error without an underlying source.
    pub fn processing(message: impl Into<String>) -> Self {
        FerryError::Processing {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        FerryError::Storage {
            source: Box::new(source),
        }
    }

    /// Whether the failed operation may succeed if simply repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FerryError::Network { .. } | FerryError::Timeout { .. } | FerryError::RateLimited { .. }
        )
    }

    /// The exact wait reported by the platform, if this is a rate limit.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FerryError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether the error invalidates the credential it was raised for.
    pub fn is_terminal_auth(&self) -> bool {
        matches!(self, FerryError::Auth { .. })
    }
}
