// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock node pool for testing.
//!
//! A simple node pool that simulates power control over a fixed set of nodes
//! without touching any hardware. Failures can be injected per operation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::traits::*;
use crate::domain::{NodeId, PowerState};

/// Mock node state.
#[derive(Debug, Clone)]
struct MockNode {
    ip: String,
    status: NodeStatus,
    kmsg: bool,
    image: Option<PathBuf>,
}

/// Mock node pool for testing.
pub struct MockNodePool {
    nodes: Mutex<BTreeMap<NodeId, MockNode>>,
    fail_activation: AtomicBool,
    fail_deactivation: AtomicBool,
    fail_image: AtomicBool,
    fail_status: AtomicBool,
    activations: AtomicUsize,
    /// Optional delay to simulate power-on time (in milliseconds)
    pub activation_delay_ms: u64,
    /// State reported by successful activations
    pub activation_state: PowerState,
}

impl MockNodePool {
    /// Create a pool with the given nodes, all idle.
    pub fn new(nodes: impl IntoIterator<Item = (NodeId, String)>) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|(id, ip)| {
                (
                    id,
                    MockNode {
                        ip,
                        status: NodeStatus::Idle,
                        kmsg: false,
                        image: None,
                    },
                )
            })
            .collect();
        Self {
            nodes: Mutex::new(nodes),
            fail_activation: AtomicBool::new(false),
            fail_deactivation: AtomicBool::new(false),
            fail_image: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            activations: AtomicUsize::new(0),
            activation_delay_ms: 0,
            activation_state: PowerState::Running,
        }
    }

    /// Create a pool with nodes `1..=count`, node `n` at `10.0.0.n`.
    pub fn with_nodes(count: u32) -> Self {
        Self::new((1..=count).map(|i| (NodeId(i), format!("10.0.0.{}", i))))
    }

    /// Make subsequent activations fail (or succeed again).
    pub fn fail_activations(&self, fail: bool) {
        self.fail_activation.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent deactivations fail (or succeed again).
    pub fn fail_deactivations(&self, fail: bool) {
        self.fail_deactivation.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent image staging fail (or succeed again).
    pub fn fail_image_staging(&self, fail: bool) {
        self.fail_image.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent status queries fail (or succeed again).
    pub fn fail_status_queries(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Number of activation attempts so far.
    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Force a node's status, e.g. to stage a recovery scenario.
    pub async fn set_node_status(&self, node_id: NodeId, status: NodeStatus) {
        let mut nodes = self.nodes.lock().await;
        if let Some(node) = nodes.get_mut(&node_id) {
            node.status = status;
        }
    }

    /// Number of idle nodes.
    pub async fn idle_count(&self) -> usize {
        let nodes = self.nodes.lock().await;
        nodes.values().filter(|n| n.status.is_idle()).count()
    }

    /// Whether the node currently has a boot-log artifact.
    pub async fn has_kmsg(&self, node_id: NodeId) -> bool {
        let nodes = self.nodes.lock().await;
        nodes.get(&node_id).map(|n| n.kmsg).unwrap_or(false)
    }

    /// Boot image staged onto the node, if any.
    pub async fn image_of(&self, node_id: NodeId) -> Option<PathBuf> {
        let nodes = self.nodes.lock().await;
        nodes.get(&node_id).and_then(|n| n.image.clone())
    }
}

#[async_trait]
impl NodePool for MockNodePool {
    fn pool_type(&self) -> &'static str {
        "mock"
    }

    async fn get_idle_node(&self) -> Result<NodeId> {
        let mut nodes = self.nodes.lock().await;
        let (id, node) = nodes
            .iter_mut()
            .find(|(_, n)| n.status.is_idle())
            .ok_or(NodePoolError::NoIdleNode)?;
        node.status = NodeStatus::Bound(PowerState::Building);
        Ok(*id)
    }

    async fn activate_node(&self, request: &ActivationRequest) -> Result<PowerState> {
        self.activations.fetch_add(1, Ordering::SeqCst);

        if self.activation_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.activation_delay_ms)).await;
        }

        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&request.node_id)
            .ok_or(NodePoolError::UnknownNode(request.node_id))?;

        if self.fail_activation.load(Ordering::SeqCst) {
            node.status = NodeStatus::Bound(PowerState::Failed);
            return Err(NodePoolError::PowerOn {
                node_id: request.node_id,
                reason: "Mock activation failure".to_string(),
            });
        }

        node.status = NodeStatus::Bound(self.activation_state);
        Ok(self.activation_state)
    }

    async fn deactivate_node(&self, node_id: NodeId) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(NodePoolError::UnknownNode(node_id))?;

        if self.fail_deactivation.load(Ordering::SeqCst) {
            return Err(NodePoolError::PowerOff {
                node_id,
                reason: "Mock deactivation failure".to_string(),
            });
        }

        node.status = NodeStatus::Bound(PowerState::Shutoff);
        Ok(())
    }

    async fn set_image(&self, image_path: &Path, node_id: NodeId) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(NodePoolError::UnknownNode(node_id))?;

        if self.fail_image.load(Ordering::SeqCst) {
            return Err(NodePoolError::ImageStaging {
                node_id,
                reason: "Mock image staging failure".to_string(),
            });
        }

        node.image = Some(image_path.to_path_buf());
        Ok(())
    }

    async fn init_kmsg(&self, node_id: NodeId) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(NodePoolError::UnknownNode(node_id))?;
        node.kmsg = true;
        Ok(())
    }

    async fn delete_kmsg(&self, node_id: NodeId) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(NodePoolError::UnknownNode(node_id))?;
        node.kmsg = false;
        Ok(())
    }

    async fn find_ip(&self, node_id: NodeId) -> Result<String> {
        let nodes = self.nodes.lock().await;
        nodes
            .get(&node_id)
            .map(|n| n.ip.clone())
            .ok_or(NodePoolError::UnknownNode(node_id))
    }

    async fn free_node(&self, node_id: NodeId) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&node_id)
            .ok_or(NodePoolError::UnknownNode(node_id))?;
        node.status = NodeStatus::Idle;
        node.image = None;
        Ok(())
    }

    async fn node_status(&self, node_id: NodeId) -> Result<Option<NodeStatus>> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(NodePoolError::Other(format!(
                "Mock status query failure for node {}",
                node_id
            )));
        }
        let nodes = self.nodes.lock().await;
        Ok(nodes.get(&node_id).map(|n| n.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(node_id: NodeId) -> ActivationRequest {
        ActivationRequest {
            node_id,
            node_ip: "10.0.0.1".to_string(),
            name: "vm-a".to_string(),
            mac_address: "02:00:00:00:00:01".to_string(),
            ip_address: "192.168.0.10".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_pool_allocates_lowest_idle_node() {
        let pool = MockNodePool::with_nodes(3);

        assert_eq!(pool.get_idle_node().await.unwrap(), NodeId(1));
        assert_eq!(pool.get_idle_node().await.unwrap(), NodeId(2));
        assert_eq!(pool.idle_count().await, 1);

        pool.free_node(NodeId(1)).await.unwrap();
        assert_eq!(pool.get_idle_node().await.unwrap(), NodeId(1));
    }

    #[tokio::test]
    async fn test_mock_pool_exhausted() {
        let pool = MockNodePool::with_nodes(1);
        pool.get_idle_node().await.unwrap();

        let result = pool.get_idle_node().await;
        assert!(matches!(result, Err(NodePoolError::NoIdleNode)));
    }

    #[tokio::test]
    async fn test_mock_pool_activation() {
        let pool = MockNodePool::with_nodes(1);
        let node_id = pool.get_idle_node().await.unwrap();

        let state = pool.activate_node(&request(node_id)).await.unwrap();

        assert_eq!(state, PowerState::Running);
        assert_eq!(
            pool.node_status(node_id).await.unwrap(),
            Some(NodeStatus::Bound(PowerState::Running))
        );
        assert_eq!(pool.activation_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_pool_activation_failure() {
        let pool = MockNodePool::with_nodes(1);
        let node_id = pool.get_idle_node().await.unwrap();
        pool.fail_activations(true);

        let result = pool.activate_node(&request(node_id)).await;
        assert!(matches!(result, Err(NodePoolError::PowerOn { .. })));
    }

    #[tokio::test]
    async fn test_mock_pool_deactivation_keeps_node_bound() {
        let pool = MockNodePool::with_nodes(1);
        let node_id = pool.get_idle_node().await.unwrap();
        pool.activate_node(&request(node_id)).await.unwrap();

        pool.deactivate_node(node_id).await.unwrap();

        assert_eq!(
            pool.node_status(node_id).await.unwrap(),
            Some(NodeStatus::Bound(PowerState::Shutoff))
        );
        assert_eq!(pool.idle_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_pool_kmsg_and_image() {
        let pool = MockNodePool::with_nodes(1);
        let node_id = pool.get_idle_node().await.unwrap();

        pool.init_kmsg(node_id).await.unwrap();
        pool.set_image(Path::new("/images/boot.img"), node_id)
            .await
            .unwrap();
        assert!(pool.has_kmsg(node_id).await);
        assert_eq!(
            pool.image_of(node_id).await,
            Some(PathBuf::from("/images/boot.img"))
        );

        pool.delete_kmsg(node_id).await.unwrap();
        assert!(!pool.has_kmsg(node_id).await);
    }

    #[tokio::test]
    async fn test_mock_pool_status_failure() {
        let pool = MockNodePool::with_nodes(1);
        pool.fail_status_queries(true);

        assert!(matches!(
            pool.node_status(NodeId(1)).await,
            Err(NodePoolError::Other(_))
        ));

        pool.fail_status_queries(false);
        assert_eq!(
            pool.node_status(NodeId(1)).await.unwrap(),
            Some(NodeStatus::Idle)
        );
    }

    #[tokio::test]
    async fn test_mock_pool_unknown_node() {
        let pool = MockNodePool::with_nodes(1);

        assert_eq!(pool.node_status(NodeId(99)).await.unwrap(), None);
        assert!(matches!(
            pool.find_ip(NodeId(99)).await,
            Err(NodePoolError::UnknownNode(NodeId(99)))
        ));
    }
}
