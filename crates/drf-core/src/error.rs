//! # Error Types
//!
//! Domain-specific error types for drf-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  drf-core errors (this file)                                           │
//! │  ├── ExpressionError  - Evaluator could not evaluate an expression     │
//! │  └── CoreError        - Materialization failures                       │
//! │                                                                         │
//! │  drf-sync errors (separate crate)                                      │
//! │  └── SyncError        - Auth, transport, payload, config failures      │
//! │                         (CoreError arrives wrapped in SyncError::Parse) │
//! │                                                                         │
//! │  Flow: ExpressionError → CoreError (strict only) → SyncError::Parse    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Expression Error
// =============================================================================

/// An expression failed to evaluate.
///
/// Returned by [`crate::expression::Evaluator`] implementations. Under
/// non-strict mode the materializer swallows it and skips the one variable or
/// group it belonged to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExpressionError {
    /// Human readable cause, as reported by the evaluator.
    pub message: String,
}

impl ExpressionError {
    pub fn new(message: impl Into<String>) -> Self {
        ExpressionError {
            message: message.into(),
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Failures raised while turning fetched records into hosts and groups.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A server points at an operating system id missing from the catalog.
    ///
    /// ## When This Occurs
    /// - The OS catalog was fetched from a stale cache
    /// - The API user cannot see every operating system
    #[error("Operating system {operating_system} referenced by server {server_id} not found")]
    OperatingSystemNotFound { server_id: i64, operating_system: i64 },

    /// A composed variable failed under strict mode.
    #[error("Could not set {variable} for host {host}: {message}")]
    ComposeFailed {
        variable: String,
        host: String,
        message: String,
    },

    /// A composed group condition failed under strict mode.
    #[error("Could not add host {host} to group {group}: {message}")]
    GroupFailed {
        group: String,
        host: String,
        message: String,
    },

    /// A keyed group expression failed or produced nothing under strict mode.
    #[error("Could not generate group for host {host} from {key} entry: {message}")]
    KeyedGroupFailed {
        key: String,
        host: String,
        message: String,
    },

    /// A keyed group expression produced a value that cannot name a group.
    #[error("Invalid group name format for host {host} from {key}: expected a string, a list of them or a mapping, got {found}")]
    InvalidGroupName {
        key: String,
        host: String,
        found: String,
    },

    /// A record could not be converted into an evaluation context.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
