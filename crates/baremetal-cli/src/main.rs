// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! baremetal-dom - Bare-metal domain manager CLI
//!
//! Opens the node inventory and the persisted domain registry, runs startup
//! recovery, executes one lifecycle command and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use baremetal_core::config::Config;
use baremetal_core::domain::{DomainSpec, PowerState};
use baremetal_core::manager::DomainManager;
use baremetal_core::node_pool::{InventoryNodePool, NodePool};
use baremetal_core::persistence::FilePersistence;

#[derive(Parser)]
#[command(name = "baremetal-dom", about = "Manage domains on bare-metal nodes")]
struct Cli {
    /// Persisted domain registry
    #[arg(long, global = true, env = "BAREMETAL_DOMAIN_FILE")]
    domain_file: Option<PathBuf>,
    /// Node inventory file
    #[arg(long, global = true, env = "BAREMETAL_NODE_INVENTORY")]
    node_inventory: Option<PathBuf>,
    /// Boot-log directory
    #[arg(long, global = true, env = "BAREMETAL_KMSG_DIR")]
    kmsg_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a domain on an idle node and boot it
    Create(CreateArgs),
    /// Power a domain's node down and release it
    Destroy { name: String },
    /// Power-cycle a domain's node
    Reboot { name: String },
    /// Record a power state for a domain (name or numeric code)
    SetState { name: String, state: PowerState },
    /// List live domains in creation order
    List,
    /// Show the polling view of a domain as JSON
    Info { name: String },
    /// Show the full domain record as JSON
    Show { name: String },
    /// Show the node inventory as JSON
    Nodes,
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    memory_kb: u64,
    #[arg(long, default_value_t = 1)]
    vcpus: u32,
    #[arg(long)]
    mac_address: String,
    #[arg(long)]
    ip_address: String,
    #[arg(long, default_value = "")]
    image_id: String,
    #[arg(long, default_value = "")]
    kernel_id: String,
    #[arg(long, default_value = "")]
    ramdisk_id: String,
    /// Image staged onto the node before power on
    #[arg(long)]
    boot_image: PathBuf,
}

impl CreateArgs {
    fn into_parts(self) -> (DomainSpec, PathBuf) {
        let spec = DomainSpec {
            name: self.name,
            memory_kb: self.memory_kb,
            vcpus: self.vcpus,
            mac_address: self.mac_address,
            ip_address: self.ip_address,
            image_id: self.image_id,
            kernel_id: self.kernel_id,
            ramdisk_id: self.ramdisk_id,
        };
        (spec, self.boot_image)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "baremetal_core=info,baremetal_dom=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!(
        node_inventory = %config.node_inventory.display(),
        domain_file = %config.domain_file.display(),
        kmsg_dir = %config.kmsg_dir.display(),
        "Opening domain manager"
    );

    let pool = Arc::new(
        InventoryNodePool::open(&config.node_inventory, &config.kmsg_dir)
            .await
            .with_context(|| {
                format!("failed to open node inventory {}", config.node_inventory.display())
            })?,
    );
    info!(pool_type = pool.pool_type(), "Node pool initialized");

    let manager = DomainManager::builder()
        .persistence(Arc::new(FilePersistence::new(&config.domain_file)))
        .node_pool(pool.clone())
        .build()?
        .start()
        .await?;

    match cli.command {
        Command::Create(args) => {
            let (spec, boot_image) = args.into_parts();
            let state = manager.create_domain(spec, &boot_image).await?;
            println!("{}", state);
        }
        Command::Destroy { name } => {
            manager.destroy_domain(&name).await?;
        }
        Command::Reboot { name } => {
            let state = manager.reboot_domain(&name).await?;
            println!("{}", state);
        }
        Command::SetState { name, state } => {
            manager.change_domain_state(&name, state).await?;
        }
        Command::List => {
            for name in manager.list_domains().await {
                println!("{}", name);
            }
        }
        Command::Info { name } => {
            let info = manager.get_domain_info(&name).await;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Show { name } => {
            let record = manager
                .find_domain(&name)
                .await
                .ok_or_else(|| anyhow::anyhow!("Domain not found: {}", name))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Nodes => {
            println!("{}", serde_json::to_string_pretty(&pool.nodes().await)?);
        }
    }

    Ok(())
}

/// Environment configuration with command-line overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.node_inventory {
        Some(path) => Config::from_env_with_inventory(path.clone())?,
        None => Config::from_env()?,
    };
    if let Some(path) = &cli.domain_file {
        config.domain_file = path.clone();
    }
    if let Some(path) = &cli.kmsg_dir {
        config.kmsg_dir = path.clone();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "baremetal-dom",
            "--node-inventory",
            "nodes.json",
            "create",
            "--name",
            "vm-a",
            "--memory-kb",
            "524288",
            "--vcpus",
            "2",
            "--mac-address",
            "02:16:3e:5a:00:01",
            "--ip-address",
            "10.2.0.17",
            "--boot-image",
            "/tftpboot/vm-a/root",
        ])
        .unwrap();

        assert_eq!(cli.node_inventory, Some(PathBuf::from("nodes.json")));
        let Command::Create(args) = cli.command else {
            panic!("expected create");
        };
        let (spec, boot_image) = args.into_parts();
        assert_eq!(spec.name, "vm-a");
        assert_eq!(spec.vcpus, 2);
        assert_eq!(spec.kernel_id, "");
        assert_eq!(boot_image, PathBuf::from("/tftpboot/vm-a/root"));
    }

    #[test]
    fn test_parse_set_state_accepts_codes() {
        let cli = Cli::try_parse_from(["baremetal-dom", "set-state", "vm-a", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::SetState {
                state: PowerState::Paused,
                ..
            }
        ));

        assert!(Cli::try_parse_from(["baremetal-dom", "set-state", "vm-a", "melted"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["baremetal-dom", "list", "--kmsg-dir", "/tmp/kmsg"]).unwrap();
        assert_eq!(cli.kmsg_dir, Some(PathBuf::from("/tmp/kmsg")));
    }
}
