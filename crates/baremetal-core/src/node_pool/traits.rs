// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Node pool trait definitions.
//!
//! Defines the interface through which the domain manager allocates, powers
//! and queries physical nodes.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{NodeId, PowerState};

/// Errors from node pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NodePoolError {
    /// Every node is already allocated.
    #[error("No idle node")]
    NoIdleNode,

    /// The pool does not know the node.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Node failed to power on.
    #[error("Node {node_id} power on failed: {reason}")]
    PowerOn {
        /// Node that failed.
        node_id: NodeId,
        /// Failure reason.
        reason: String,
    },

    /// Node failed to power off.
    #[error("Node {node_id} power off failed: {reason}")]
    PowerOff {
        /// Node that failed.
        node_id: NodeId,
        /// Failure reason.
        reason: String,
    },

    /// Boot image could not be staged onto the node.
    #[error("Node {node_id} image staging failed: {reason}")]
    ImageStaging {
        /// Node that failed.
        node_id: NodeId,
        /// Failure reason.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for node pool operations.
pub type Result<T> = std::result::Result<T, NodePoolError>;

/// Physical status of a node as reported by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Free for allocation.
    #[default]
    Idle,
    /// Allocated to a domain, in the given power state.
    Bound(PowerState),
}

impl NodeStatus {
    /// Check if the node is free
    pub fn is_idle(&self) -> bool {
        matches!(self, NodeStatus::Idle)
    }
}

/// Everything the pool needs to power a node on for a domain.
#[derive(Debug, Clone)]
pub struct ActivationRequest {
    /// Node to activate
    pub node_id: NodeId,
    /// Management IP of the node
    pub node_ip: String,
    /// Domain name
    pub name: String,
    /// MAC address of the domain
    pub mac_address: String,
    /// IP address of the domain
    pub ip_address: String,
}

/// Trait for node pools.
///
/// Calls may block on physical operations (power control, imaging) and may
/// fail. Implementations decide their own retry policy; callers never retry.
/// `activate_node` is not assumed to be idempotent.
#[async_trait]
pub trait NodePool: Send + Sync {
    /// Pool type identifier (e.g., "mock", "inventory")
    fn pool_type(&self) -> &'static str;

    /// Allocate an idle node. Returns [`NodePoolError::NoIdleNode`] when exhausted.
    async fn get_idle_node(&self) -> Result<NodeId>;

    /// Power a node on and return the confirmed power state.
    async fn activate_node(&self, request: &ActivationRequest) -> Result<PowerState>;

    /// Power a node off. The node stays allocated.
    async fn deactivate_node(&self, node_id: NodeId) -> Result<()>;

    /// Stage a boot image onto a node.
    async fn set_image(&self, image_path: &Path, node_id: NodeId) -> Result<()>;

    /// Create the node's transient boot-log artifact.
    async fn init_kmsg(&self, node_id: NodeId) -> Result<()>;

    /// Remove the node's transient boot-log artifact.
    async fn delete_kmsg(&self, node_id: NodeId) -> Result<()>;

    /// Management IP of a node.
    async fn find_ip(&self, node_id: NodeId) -> Result<String>;

    /// Release a node back to the idle set.
    async fn free_node(&self, node_id: NodeId) -> Result<()>;

    /// Current physical status of a node, or `None` if the pool does not know it.
    async fn node_status(&self, node_id: NodeId) -> Result<Option<NodeStatus>>;
}
