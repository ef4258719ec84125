//! CLI argument definitions
//!
//! Global CLI options and configuration merging logic.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::Config;
use crate::consts::{DEFAULT_BASE, DEFAULT_FETCH_CONCURRENCY, DEFAULT_TIMEOUT_SECS};

use super::commands::Commands;

#[derive(Parser)]
#[command(name = "pvdash")]
#[command(about = "Page-view dashboard over sharded traffic statistics", version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Shard tree location (directory, file:// or http(s):// URL)
    #[arg(long, global = true, value_name = "DIR|URL")]
    pub(crate) base: Option<String>,

    /// Traffic type to select (repeatable)
    #[arg(short = 't', long = "traffic-type", global = true, value_name = "TYPE")]
    pub(crate) traffic_types: Vec<String>,

    /// Access type to select (repeatable)
    #[arg(short = 'a', long = "access-type", global = true, value_name = "TYPE")]
    pub(crate) access_types: Vec<String>,

    /// Domain to select (repeatable, "All" selects every domain)
    #[arg(short = 'd', long = "domain", global = true, value_name = "DOMAIN")]
    pub(crate) domains: Vec<String>,

    /// Output as JSON
    #[arg(short, long, global = true)]
    pub(crate) json: bool,

    /// Enable debug output (show fetch details)
    #[arg(long, global = true)]
    pub(crate) debug: bool,

    /// Compact output (short numbers, fewer columns)
    #[arg(short = 'c', long, global = true)]
    pub(crate) compact: bool,

    /// Extra attempts per date key after a failed fetch
    #[arg(long, global = true, value_name = "N")]
    pub(crate) retries: Option<usize>,

    /// Per-request timeout for HTTP shard stores
    #[arg(long, global = true, value_name = "SECS")]
    pub(crate) timeout: Option<u64>,

    /// Maximum shard fetches in flight per batch
    #[arg(long, global = true, value_name = "N")]
    pub(crate) concurrency: Option<usize>,

    /// Config file (default: ~/.config/pvdash/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,
}

impl Cli {
    /// Merge config file values into CLI (CLI args take precedence)
    pub(crate) fn with_config(mut self, config: &Config) -> Self {
        if !self.compact && config.compact {
            self.compact = true;
        }

        if self.base.is_none() {
            self.base = config.base.clone();
        }
        if self.retries.is_none() {
            self.retries = config.retries;
        }
        if self.timeout.is_none() {
            self.timeout = config.timeout_secs;
        }
        if self.concurrency.is_none() {
            self.concurrency = config.fetch_concurrency;
        }

        // Selections: an explicit flag replaces the configured default list
        if self.traffic_types.is_empty() {
            self.traffic_types = config.initial_traffic_types();
        }
        if self.access_types.is_empty() {
            self.access_types = config.initial_access_types();
        }
        if self.domains.is_empty() {
            self.domains = config.initial_domains();
        }

        self
    }

    pub(crate) fn base(&self) -> &str {
        self.base.as_deref().unwrap_or(DEFAULT_BASE)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub(crate) fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_FETCH_CONCURRENCY)
    }

    pub(crate) fn retries(&self) -> usize {
        self.retries.unwrap_or(0)
    }

    pub(crate) fn use_color(&self) -> bool {
        std::io::stdout().is_terminal()
    }
}
