// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inventory-file node pool.
//!
//! Nodes are listed in a JSON inventory that doubles as the pool's state
//! file. Power control is simulated by state changes, boot logs are plain
//! files under a kmsg directory, and every mutation rewrites the inventory so
//! node bindings survive a restart:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "node_id": 1, "ip_address": "10.0.100.1", "status": "idle" },
//!     { "node_id": 2, "ip_address": "10.0.100.2", "status": { "bound": "running" },
//!       "image_path": "/tftpboot/vm-a/boot.img" }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::traits::*;
use crate::domain::{NodeId, PowerState};
use crate::persistence::file::write_atomic;

/// One node in the inventory file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryNode {
    /// Node identifier
    pub node_id: NodeId,
    /// Management IP address
    pub ip_address: String,
    /// Allocation and power status
    #[serde(default)]
    pub status: NodeStatus,
    /// Boot image staged onto the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InventoryFile {
    nodes: Vec<InventoryNode>,
}

/// Node pool backed by an inventory file.
pub struct InventoryNodePool {
    path: PathBuf,
    kmsg_dir: PathBuf,
    nodes: Mutex<Vec<InventoryNode>>,
}

impl InventoryNodePool {
    /// Open the inventory at `path`. The file must exist and list unique node ids.
    pub async fn open(path: impl Into<PathBuf>, kmsg_dir: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read(&path).await?;
        let inventory: InventoryFile = serde_json::from_slice(&content)?;

        let mut seen = HashSet::new();
        for node in &inventory.nodes {
            if !seen.insert(node.node_id) {
                return Err(NodePoolError::Other(format!(
                    "Duplicate node {} in inventory {}",
                    node.node_id,
                    path.display()
                )));
            }
        }

        info!(
            path = %path.display(),
            nodes = inventory.nodes.len(),
            idle = inventory.nodes.iter().filter(|n| n.status.is_idle()).count(),
            "Loaded node inventory"
        );

        Ok(Self {
            path,
            kmsg_dir: kmsg_dir.into(),
            nodes: Mutex::new(inventory.nodes),
        })
    }

    /// Snapshot of every node.
    pub async fn nodes(&self) -> Vec<InventoryNode> {
        self.nodes.lock().await.clone()
    }

    /// Path of a node's boot-log file.
    pub fn kmsg_path(&self, node_id: NodeId) -> PathBuf {
        self.kmsg_dir.join(format!("kmsg-{}", node_id))
    }

    /// Apply `change` to the node, rewrite the inventory, then publish the
    /// change in memory.
    async fn update<T>(
        &self,
        node_id: NodeId,
        change: impl FnOnce(&mut InventoryNode) -> Result<T>,
    ) -> Result<T> {
        let mut nodes = self.nodes.lock().await;
        let mut next = nodes.clone();
        let node = next
            .iter_mut()
            .find(|n| n.node_id == node_id)
            .ok_or(NodePoolError::UnknownNode(node_id))?;
        let value = change(node)?;

        save_inventory(&self.path, &next).await?;
        *nodes = next;
        Ok(value)
    }

    async fn node(&self, node_id: NodeId) -> Result<InventoryNode> {
        let nodes = self.nodes.lock().await;
        nodes
            .iter()
            .find(|n| n.node_id == node_id)
            .cloned()
            .ok_or(NodePoolError::UnknownNode(node_id))
    }
}

async fn save_inventory(path: &Path, nodes: &[InventoryNode]) -> Result<()> {
    let inventory = InventoryFile {
        nodes: nodes.to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&inventory)?;
    write_atomic(path, &bytes).await?;
    Ok(())
}

#[async_trait]
impl NodePool for InventoryNodePool {
    fn pool_type(&self) -> &'static str {
        "inventory"
    }

    async fn get_idle_node(&self) -> Result<NodeId> {
        let mut nodes = self.nodes.lock().await;
        let mut next = nodes.clone();
        let node = next
            .iter_mut()
            .find(|n| n.status.is_idle())
            .ok_or(NodePoolError::NoIdleNode)?;
        node.status = NodeStatus::Bound(PowerState::Building);
        let node_id = node.node_id;

        save_inventory(&self.path, &next).await?;
        *nodes = next;
        debug!(node_id = %node_id, "Node allocated");
        Ok(node_id)
    }

    async fn activate_node(&self, request: &ActivationRequest) -> Result<PowerState> {
        let node_id = request.node_id;
        self.update(node_id, |node| {
            if node.status.is_idle() {
                return Err(NodePoolError::PowerOn {
                    node_id,
                    reason: "node is not allocated".to_string(),
                });
            }
            node.status = NodeStatus::Bound(PowerState::Running);
            Ok(())
        })
        .await?;

        let line = format!(
            "{} boot {} mac={} ip={} via {}\n",
            chrono::Utc::now().to_rfc3339(),
            request.name,
            request.mac_address,
            request.ip_address,
            request.node_ip
        );
        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.kmsg_path(node_id))
            .await?;
        log.write_all(line.as_bytes()).await?;

        info!(node_id = %node_id, name = %request.name, "Node activated");
        Ok(PowerState::Running)
    }

    async fn deactivate_node(&self, node_id: NodeId) -> Result<()> {
        self.update(node_id, |node| {
            if node.status.is_idle() {
                return Err(NodePoolError::PowerOff {
                    node_id,
                    reason: "node is not allocated".to_string(),
                });
            }
            node.status = NodeStatus::Bound(PowerState::Shutoff);
            Ok(())
        })
        .await?;
        info!(node_id = %node_id, "Node deactivated");
        Ok(())
    }

    async fn set_image(&self, image_path: &Path, node_id: NodeId) -> Result<()> {
        if let Err(e) = tokio::fs::metadata(image_path).await {
            return Err(NodePoolError::ImageStaging {
                node_id,
                reason: format!("{}: {}", image_path.display(), e),
            });
        }
        self.update(node_id, |node| {
            node.image_path = Some(image_path.to_path_buf());
            Ok(())
        })
        .await
    }

    async fn init_kmsg(&self, node_id: NodeId) -> Result<()> {
        self.node(node_id).await?;
        tokio::fs::create_dir_all(&self.kmsg_dir).await?;
        tokio::fs::write(self.kmsg_path(node_id), b"").await?;
        Ok(())
    }

    async fn delete_kmsg(&self, node_id: NodeId) -> Result<()> {
        self.node(node_id).await?;
        match tokio::fs::remove_file(self.kmsg_path(node_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_ip(&self, node_id: NodeId) -> Result<String> {
        Ok(self.node(node_id).await?.ip_address)
    }

    async fn free_node(&self, node_id: NodeId) -> Result<()> {
        self.update(node_id, |node| {
            node.status = NodeStatus::Idle;
            node.image_path = None;
            Ok(())
        })
        .await?;
        debug!(node_id = %node_id, "Node freed");
        Ok(())
    }

    async fn node_status(&self, node_id: NodeId) -> Result<Option<NodeStatus>> {
        let nodes = self.nodes.lock().await;
        Ok(nodes
            .iter()
            .find(|n| n.node_id == node_id)
            .map(|n| n.status))
    }
}
