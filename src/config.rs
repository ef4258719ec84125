use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::consts::{
    ACCESS_TYPE_OPTIONS, AVAILABLE_MONTHS, DEFAULT_ACCESS_TYPES, DEFAULT_DAYS, DEFAULT_DOMAINS,
    DEFAULT_MONTHS, DEFAULT_TRAFFIC_TYPES, DOMAIN_OPTIONS, TRAFFIC_TYPE_OPTIONS,
};
use crate::error::AppError;
use crate::selection::DimensionOptions;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Shard tree location: a directory or an http(s) base URL
    #[serde(default)]
    pub(crate) base: Option<String>,
    #[serde(default)]
    pub(crate) compact: bool,
    #[serde(default)]
    pub(crate) retries: Option<usize>,
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    #[serde(default)]
    pub(crate) fetch_concurrency: Option<usize>,

    // Option lists per dimension
    #[serde(default)]
    pub(crate) traffic_types: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) access_types: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) domains: Option<Vec<String>>,

    // Initial selection
    #[serde(default)]
    pub(crate) default_traffic_types: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) default_access_types: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) default_domains: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) default_days: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) default_months: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) available_months: Option<Vec<String>>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

impl Config {
    /// Load an explicit config file (must exist and parse), or the first
    /// parseable file from the default locations, or the built-in defaults.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        if let Some(path) = explicit {
            let content = fs::read_to_string(path).map_err(|e| AppError::Config {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let config = Self::parse(&content).map_err(|reason| AppError::Config {
                path: path.display().to_string(),
                reason,
            })?;
            info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        for path in Self::get_config_paths() {
            if path.exists()
                && let Ok(content) = fs::read_to_string(&path)
            {
                match Self::parse(&content) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => warn!("Failed to parse {}: {}", path.display(), e),
                }
            }
        }

        Ok(Self::default())
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str::<Config>(content).map_err(|e| e.to_string())
    }

    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. XDG config: ~/.config/pvdash/config.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("pvdash").join("config.toml"));
        }

        // 2. Platform config dir (e.g. ~/Library/Application Support/pvdash/config.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("pvdash").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        // 3. Home directory: ~/.pvdash.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".pvdash.toml"));
        }

        paths
    }

    pub(crate) fn dimension_options(&self) -> DimensionOptions {
        DimensionOptions {
            traffic_types: self
                .traffic_types
                .clone()
                .unwrap_or_else(|| owned(TRAFFIC_TYPE_OPTIONS)),
            access_types: self
                .access_types
                .clone()
                .unwrap_or_else(|| owned(ACCESS_TYPE_OPTIONS)),
            domains: self.domains.clone().unwrap_or_else(|| owned(DOMAIN_OPTIONS)),
        }
    }

    pub(crate) fn initial_traffic_types(&self) -> Vec<String> {
        self.default_traffic_types
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_TRAFFIC_TYPES))
    }

    pub(crate) fn initial_access_types(&self) -> Vec<String> {
        self.default_access_types
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_ACCESS_TYPES))
    }

    pub(crate) fn initial_domains(&self) -> Vec<String> {
        self.default_domains
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_DOMAINS))
    }

    pub(crate) fn initial_days(&self) -> Vec<String> {
        self.default_days.clone().unwrap_or_else(|| owned(DEFAULT_DAYS))
    }

    pub(crate) fn initial_months(&self) -> Vec<String> {
        self.default_months
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_MONTHS))
    }

    pub(crate) fn selectable_months(&self) -> Vec<String> {
        self.available_months
            .clone()
            .unwrap_or_else(|| owned(AVAILABLE_MONTHS))
    }
}
