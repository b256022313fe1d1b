//! # Domain Types
//!
//! Records fetched from the DRF API and the token pair it issues.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │ OperatingSystem │   │     Server      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id, ip         │       │
//! │  │  (extra fields) │   │  (extra fields) │   │  hostname       │       │
//! │  └─────────────────┘   └────────▲────────┘   │  description    │       │
//! │                                 │            │  is_manageable  │       │
//! │                                 └────────────│  operating_system│      │
//! │                                   joined by  └─────────────────┘       │
//! │                                   id                                    │
//! │  ┌─────────────────┐                                                    │
//! │  │     Token       │  access + refresh, other fields kept opaque        │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Required fields are validated when deserializing. Everything else the API
//! sends is kept in `extra` and serialized back out unchanged, so expressions
//! can still reach it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Customer
// =============================================================================

/// The customer that scopes the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Operating System
// =============================================================================

/// An entry of the operating system catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingSystem {
    pub id: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OperatingSystem {
    /// Returns the `name` field if the API sent one.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }
}

// =============================================================================
// Server
// =============================================================================

/// A managed server belonging to the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,

    /// Address used as the inventory host name.
    pub ip: String,

    pub hostname: String,

    pub description: Option<String>,

    pub is_manageable: bool,

    /// Id of the entry in the operating system catalog.
    pub operating_system: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Server {
    /// The denormalized subset stored in the `server` host variable.
    pub fn summary(&self) -> ServerSummary {
        ServerSummary {
            id: self.id,
            hostname: self.hostname.clone(),
            ip: self.ip.clone(),
            description: self.description.clone(),
            is_manageable: self.is_manageable,
        }
    }

    /// Finds the catalog entry this server references.
    pub fn resolve_operating_system<'a>(
        &self,
        catalog: &'a [OperatingSystem],
    ) -> Option<&'a OperatingSystem> {
        catalog.iter().find(|os| os.id == self.operating_system)
    }
}

/// Value of the `server` host variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: i64,
    pub hostname: String,
    pub ip: String,
    pub description: Option<String>,
    pub is_manageable: bool,
}

// =============================================================================
// Token
// =============================================================================

/// Token pair issued by `POST /api/token/`.
///
/// Only `access` and `refresh` are interpreted. Expiry information and any
/// other field survive a save/load cycle untouched.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access: String,
    pub refresh: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Token {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Token {
            access: access.into(),
            refresh: refresh.into(),
            extra: Map::new(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}
