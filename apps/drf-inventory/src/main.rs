//! # drf-inventory
//!
//! Ansible dynamic inventory script backed by a Django DRF API.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           drf-inventory CLI                             │
//! │                                                                         │
//! │  ansible ───► --list / --host ───► InventoryRun ───► DRF API           │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                              Inventory ──► JSON on stdout               │
//! │                                                                         │
//! │  logs ───► stderr (RUST_LOG)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use drf_core::Inventory;
use drf_sync::{InventoryConfig, InventoryRun, RunOptions, TemplateEvaluator};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::prompt::PromptCredentials;

#[derive(Debug, Parser)]
#[command(name = "drf-inventory", version, about = "Ansible inventory from a Django DRF API")]
struct Cli {
    /// Inventory config file (defaults to the user config dir)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the whole inventory
    #[arg(long, conflicts_with = "host")]
    list: bool,

    /// Print the variables of a single host
    #[arg(long, value_name = "IP")]
    host: Option<String>,

    /// Ignore cached API responses for this run
    #[arg(long)]
    refresh_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the inventory, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,drf_sync=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = InventoryConfig::load(cli.config.clone()).context("loading inventory config")?;

    let run = InventoryRun::new(
        config,
        Arc::new(PromptCredentials::new()),
        TemplateEvaluator::new(),
        RunOptions {
            refresh_cache: cli.refresh_cache,
        },
    )?;
    info!(
        customer_id = run.config().customer_id,
        source = %run.config().source_name(),
        auth_state = %run.auth().state(),
        "Configuration loaded"
    );

    let mut inventory = Inventory::new();
    let summary = run.execute(&mut inventory).await?;
    debug!(
        hosts = summary.report.servers,
        auth_state = %run.auth().state(),
        "Inventory ready"
    );

    let output = match cli.host.as_deref() {
        Some(host) => inventory
            .host(host)
            .map(|vars| Value::Object(vars.clone()))
            .unwrap_or_else(|| Value::Object(Default::default())),
        None => inventory.to_ansible_json(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
