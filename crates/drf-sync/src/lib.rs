//! # drf-sync: Inventory Sync Engine for drf-inventory
//!
//! Everything that touches the network or the file system: configuration,
//! the token lifecycle, the response cache, the API client and the run
//! engine that feeds drf-core's materializer.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Inventory Run Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    InventoryRun (engine.rs)                      │  │
//! │  │   constructed per run from InventoryConfig                       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ResourceFetcher │  │ TokenLifecycle │  │  Materializer          │    │
//! │  │                │  │                │  │  (drf-core)            │    │
//! │  │ cache lookup   │──│ login, refresh │  │                        │    │
//! │  │ GET + 401 retry│  │ persist token  │  │  TemplateEvaluator     │    │
//! │  │ classify errors│  │                │  │  (MiniJinja)           │    │
//! │  └───────┬────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │          │                   │                                          │
//! │  ┌───────▼────────┐  ┌───────▼────────┐                                 │
//! │  │ CacheManager   │  │  TokenStore    │                                 │
//! │  │ memory/jsonfile│  │ ~/.django_drf- │                                 │
//! │  │                │  │   tokenfile    │                                 │
//! │  └────────────────┘  └────────────────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - TOML configuration with environment overrides
//! - [`error`] - Sync error types
//! - [`client`] - HTTP client and response classification
//! - [`token_store`] - Token file persistence
//! - [`auth`] - Token lifecycle and credential providers
//! - [`cache`] - Cache backends and key derivation
//! - [`fetcher`] - Cache-aware authenticated fetching
//! - [`template`] - MiniJinja expression evaluator
//! - [`engine`] - The per-run context
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use drf_core::Inventory;
//! use drf_sync::{InventoryConfig, InventoryRun, RunOptions, StaticCredentials, TemplateEvaluator};
//!
//! let config = InventoryConfig::load(None)?;
//! let credentials = Arc::new(StaticCredentials::new("admin", "secret"));
//! let run = InventoryRun::new(config, credentials, TemplateEvaluator::new(), RunOptions::default())?;
//!
//! let mut inventory = Inventory::new();
//! let summary = run.execute(&mut inventory).await?;
//! println!("{} hosts", summary.report.servers);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod template;
pub mod token_store;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{AuthState, CredentialProvider, Credentials, StaticCredentials, TokenLifecycle};
pub use cache::{cache_key, CacheManager, CacheStore, JsonFileCache, MemoryCache};
pub use client::ApiClient;
pub use config::{CachePlugin, InventoryConfig};
pub use engine::{InventoryRun, RunOptions, RunSummary};
pub use error::{SyncError, SyncResult};
pub use fetcher::{unwrap_envelope, Fetched, ResourceFetcher, Snapshot};
pub use template::TemplateEvaluator;
pub use token_store::TokenStore;
