//! # Sync Error Types
//!
//! Error types for authentication, fetching, caching and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Authentication │  │     Fetching    │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Auth           │  │  Permission     │  │  Config                 │ │
//! │  │  Credentials    │  │  Unauthorized   │  │  ConfigLoad             │ │
//! │  │                 │  │  Transport      │  │  InvalidUrl             │ │
//! │  │                 │  │  Decoding       │  │                         │ │
//! │  │                 │  │  Payload        │  │                         │ │
//! │  │                 │  │  Record         │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Materializing  │  │     Local I/O   │                              │
//! │  │                 │  │                 │                              │
//! │  │  Parse          │  │  Io             │                              │
//! │  │  (wraps         │  │  (token file,   │                              │
//! │  │   CoreError)    │  │   cache files)  │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use drf_core::CoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Every way an inventory run can fail.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Authentication Errors
    // =========================================================================
    /// The token endpoint rejected the exchange (401 or 403).
    #[error("Authentication failed at {url} (status {status}): {body}")]
    Auth { url: String, status: u16, body: String },

    /// No credentials could be obtained.
    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    // =========================================================================
    // Fetch Errors
    // =========================================================================
    /// 403 on a resource. A permission warning is emitted before this.
    #[error("Permission denied: {url}: {body}")]
    Permission { url: String, body: String },

    /// 401 that survived the single refresh-and-retry.
    #[error("Unauthorized: {url}: {body}")]
    Unauthorized { url: String, body: String },

    /// Connection failure, timeout or unexpected HTTP status.
    #[error("Request to {url} failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Response body was not valid UTF-8.
    #[error("Incorrect encoding of fetched payload from django_drf API: {url}")]
    Decoding { url: String },

    /// Response body was not JSON.
    #[error("Incorrect JSON payload: {raw}")]
    Payload { url: String, raw: String },

    /// JSON did not have the shape of the expected record.
    #[error("Unexpected {resource} record: {message}")]
    Record { resource: String, message: String },

    // =========================================================================
    // Materialization Errors
    // =========================================================================
    /// Building the inventory from fetched records failed.
    #[error("failed to parse {source_name}: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: CoreError,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid inventory configuration: {0}")]
    Config(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid API base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Local I/O Errors
    // =========================================================================
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoad(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<tempfile::PersistError> for SyncError {
    fn from(err: tempfile::PersistError) -> Self {
        SyncError::Io(err.error.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the token endpoints or credential source failed.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Auth { .. } | SyncError::Credentials(_))
    }

    /// Returns true if fetching a resource failed.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            SyncError::Permission { .. }
                | SyncError::Unauthorized { .. }
                | SyncError::Transport { .. }
                | SyncError::Decoding { .. }
                | SyncError::Payload { .. }
                | SyncError::Record { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_) | SyncError::ConfigLoad(_) | SyncError::InvalidUrl(_)
        )
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Auth { status, .. } => Some(*status),
            SyncError::Permission { .. } => Some(403),
            SyncError::Unauthorized { .. } => Some(401),
            SyncError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}
