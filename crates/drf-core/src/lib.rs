//! # drf-core: Pure Inventory Logic for drf-inventory
//!
//! Domain records, composition rules and the materializer that turns a
//! customer's servers into an Ansible inventory. No network, no file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      drf-inventory Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 drf-inventory (CLI binary)                      │   │
//! │  │        --list / --host  ──► JSON on stdout                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    drf-sync (I/O layer)                         │   │
//! │  │   config, token lifecycle, cache, HTTP fetcher, run engine      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ drf-core (THIS CRATE) ★                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐ │   │
//! │  │   │   types   │  │   rules   │  │ inventory │  │materializer│ │   │
//! │  │   │  Server   │  │  compose  │  │   Sink    │  │  per-host  │ │   │
//! │  │   │  Token    │  │  keyed    │  │ Inventory │  │  pipeline  │ │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └────────────┘ │   │
//! │  │                                                                 │   │
//! │  │        NO I/O • NO NETWORK • EVALUATOR INJECTED                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Customer, OperatingSystem, Server, Token
//! - [`rules`] - compose / groups / keyed_groups
//! - [`expression`] - the [`Evaluator`] seam and truthiness
//! - [`inventory`] - the [`InventorySink`] trait and in-memory [`Inventory`]
//! - [`materializer`] - records → hosts, variables, groups
//! - [`error`] - domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod expression;
pub mod inventory;
pub mod materializer;
pub mod rules;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ExpressionError};
pub use expression::{combine_context, is_truthy, Evaluator};
pub use inventory::{Group, Inventory, InventorySink};
pub use materializer::{MaterializeReport, Materializer, OverwrittenHost, RuleKind, SkippedRule};
pub use rules::{sanitize_group_name, ComposeRules, KeyedGroup, KeyedNames};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Plugin identifier. Config files must name it and cache keys start with it.
pub const PLUGIN_NAME: &str = "django_drf";

/// The implicit group every host belongs to.
pub const ALL_GROUP: &str = "all";
