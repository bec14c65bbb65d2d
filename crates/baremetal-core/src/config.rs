// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::path::PathBuf;

/// Domain manager configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// File holding the persisted domain registry
    pub domain_file: PathBuf,
    /// Node inventory/state file used by the inventory node pool
    pub node_inventory: PathBuf,
    /// Directory holding per-node boot-log (kmsg) files
    pub kmsg_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `BAREMETAL_NODE_INVENTORY`: node inventory file
    ///
    /// Optional (with defaults):
    /// - `BAREMETAL_DOMAIN_FILE`: persisted domains (default: `.data/domains.json`)
    /// - `BAREMETAL_KMSG_DIR`: boot-log directory (default: `.data/kmsg`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_inventory = std::env::var("BAREMETAL_NODE_INVENTORY")
            .map_err(|_| ConfigError::MissingEnvVar("BAREMETAL_NODE_INVENTORY"))?;
        let node_inventory = non_empty_path("BAREMETAL_NODE_INVENTORY", node_inventory)?;
        Self::from_env_with_inventory(node_inventory)
    }

    /// Load the optional settings from environment variables around an
    /// inventory path supplied by the caller (e.g. a command-line flag).
    pub fn from_env_with_inventory(node_inventory: PathBuf) -> Result<Self, ConfigError> {
        let domain_file = std::env::var("BAREMETAL_DOMAIN_FILE")
            .unwrap_or_else(|_| ".data/domains.json".to_string());
        let domain_file = non_empty_path("BAREMETAL_DOMAIN_FILE", domain_file)?;

        let kmsg_dir =
            std::env::var("BAREMETAL_KMSG_DIR").unwrap_or_else(|_| ".data/kmsg".to_string());
        let kmsg_dir = non_empty_path("BAREMETAL_KMSG_DIR", kmsg_dir)?;

        Ok(Self {
            domain_file,
            node_inventory,
            kmsg_dir,
        })
    }
}

fn non_empty_path(var: &'static str, value: String) -> Result<PathBuf, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(var, "must not be empty"));
    }
    Ok(PathBuf::from(value))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
