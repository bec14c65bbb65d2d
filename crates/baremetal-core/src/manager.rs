// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain lifecycle manager.
//!
//! [`DomainManager`] drives domains through their state machine and keeps the
//! [`DomainRegistry`] consistent with the node pool, including across crashes.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use baremetal_core::manager::DomainManager;
//! use baremetal_core::node_pool::InventoryNodePool;
//! use baremetal_core::persistence::FilePersistence;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = Arc::new(InventoryNodePool::open("nodes.json", ".data/kmsg").await?);
//!
//!     let manager = DomainManager::builder()
//!         .persistence(Arc::new(FilePersistence::new(".data/domains.json")))
//!         .node_pool(pool)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     for name in manager.list_domains().await {
//!         println!("{}", name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! One manager owns one persisted store. Composition code must not start a
//! second manager on the same store.
//!
//! Operations that change a domain hold an in-flight marker on its name for
//! their whole duration, node pool calls included. A second create, destroy,
//! reboot or state change of the same name fails fast instead of interleaving.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{DomainInfo, DomainRecord, DomainSpec, NodeId, PowerState};
use crate::error::{Error, Result};
use crate::node_pool::{ActivationRequest, NodePool, NodePoolError, NodeStatus};
use crate::persistence::Persistence;
use crate::registry::DomainRegistry;

/// Builder for creating a [`DomainManager`].
#[derive(Default)]
pub struct DomainManagerBuilder {
    persistence: Option<Arc<dyn Persistence>>,
    node_pool: Option<Arc<dyn NodePool>>,
}

impl DomainManagerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persistence backend for the domain registry (required).
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the node pool (required).
    pub fn node_pool(mut self, pool: Arc<dyn NodePool>) -> Self {
        self.node_pool = Some(pool);
        self
    }

    /// Build the manager configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> anyhow::Result<DomainManagerConfig> {
        let persistence = self
            .persistence
            .ok_or_else(|| anyhow::anyhow!("persistence is required"))?;
        let node_pool = self
            .node_pool
            .ok_or_else(|| anyhow::anyhow!("node_pool is required"))?;

        Ok(DomainManagerConfig {
            persistence,
            node_pool,
        })
    }
}

/// Configuration for a [`DomainManager`].
pub struct DomainManagerConfig {
    persistence: Arc<dyn Persistence>,
    node_pool: Arc<dyn NodePool>,
}

impl DomainManagerConfig {
    /// Load persisted domains, reconcile them with the node pool and return
    /// a manager ready to accept operations.
    pub async fn start(self) -> anyhow::Result<DomainManager> {
        info!(
            backend = self.persistence.backend_type(),
            pool = self.node_pool.pool_type(),
            "Starting domain manager"
        );

        let mut registry = DomainRegistry::load(self.persistence).await;
        let recovery = recover_domains(&mut registry, self.node_pool.as_ref()).await?;

        Ok(DomainManager {
            registry: Mutex::new(registry),
            in_flight: std::sync::Mutex::new(HashSet::new()),
            pool: self.node_pool,
            recovery,
        })
    }
}

/// Outcome of the startup reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Records found in the persisted store.
    pub loaded: usize,
    /// Records that survived reconciliation.
    pub kept: usize,
    /// Records discarded because they were not `RUNNING`.
    pub not_running: usize,
    /// Records discarded because the pool does not confirm the node binding.
    pub stale: usize,
    /// Records discarded because their name or node repeats an earlier record.
    pub duplicate: usize,
}

/// Domain lifecycle manager.
pub struct DomainManager {
    registry: Mutex<DomainRegistry>,
    /// Names with a mutating operation in progress.
    in_flight: std::sync::Mutex<HashSet<String>>,
    pool: Arc<dyn NodePool>,
    recovery: RecoverySummary,
}

/// Marks a domain name as busy until dropped.
struct OperationGuard<'a> {
    in_flight: &'a std::sync::Mutex<HashSet<String>>,
    name: String,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

impl DomainManager {
    /// Create a new builder.
    pub fn builder() -> DomainManagerBuilder {
        DomainManagerBuilder::new()
    }

    /// What the startup reconciliation pass did.
    pub fn recovery_summary(&self) -> RecoverySummary {
        self.recovery
    }

    /// Create a domain on an idle node and boot it from `boot_image`.
    ///
    /// Returns the power state confirmed by the node pool. On any failure up to
    /// and including activation, the partial record is removed and the node is
    /// released before the error is returned.
    ///
    /// If the confirmed state cannot be persisted after a successful
    /// activation, the error is returned and nothing is rolled back: the node
    /// stays powered and the record stays `BUILDING`, in memory and on disk.
    /// The next startup recovery discards it.
    #[instrument(skip(self, spec, boot_image), fields(name = %spec.name))]
    pub async fn create_domain(&self, spec: DomainSpec, boot_image: &Path) -> Result<PowerState> {
        let name = spec.name.clone();
        let _guard = self
            .begin(&name)
            .ok_or_else(|| Error::AlreadyExists(name.clone()))?;
        if self.find_domain(&name).await.is_some() {
            return Err(Error::AlreadyExists(name));
        }

        let node_id = match self.pool.get_idle_node().await {
            Ok(node_id) => node_id,
            Err(NodePoolError::NoIdleNode) => return Err(Error::NoCapacity),
            Err(e) => return Err(e.into()),
        };
        debug!(node_id = %node_id, "Allocated node");

        let node_ip = match self.prepare_node(node_id).await {
            Ok(ip) => ip,
            Err(e) => {
                self.release_node(node_id).await;
                return Err(e);
            }
        };

        let record = DomainRecord::from_spec(spec, node_id, PowerState::Building);
        let request = ActivationRequest {
            node_id,
            node_ip,
            name: record.name.clone(),
            mac_address: record.mac_address.clone(),
            ip_address: record.ip_address.clone(),
        };

        let inserted = self.registry.lock().await.insert(record).await;
        if let Err(e) = inserted {
            self.release_node(node_id).await;
            return Err(e);
        }

        let state = match self.boot_node(boot_image, &request).await {
            Ok(state) => state,
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Domain creation failed, rolling back");
                self.discard_record(&name, node_id).await;
                self.release_node(node_id).await;
                return Err(e);
            }
        };

        self.set_bound_state(&name, node_id, state).await?;
        info!(node_id = %node_id, state = %state, "Domain created");
        Ok(state)
    }

    /// Destroy a domain: power its node down, clear the boot log, remove the
    /// record and release the node.
    ///
    /// Not best-effort: the first node pool failure is returned as is.
    /// Returns [`Error::Busy`] while another operation on the domain runs.
    #[instrument(skip(self))]
    pub async fn destroy_domain(&self, name: &str) -> Result<()> {
        let _guard = self.begin_busy(name)?;
        let record = self
            .find_domain(name)
            .await
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        self.teardown(name, record.node_id).await
    }

    /// Power-cycle a domain's node.
    ///
    /// If the node cannot be powered down, nothing changes and
    /// [`Error::PowerDownFailed`] is returned. If it cannot be powered back up,
    /// the domain is destroyed and [`Error::ActivationFailed`] is returned.
    /// Returns [`Error::Busy`] while another operation on the domain runs.
    #[instrument(skip(self))]
    pub async fn reboot_domain(&self, name: &str) -> Result<PowerState> {
        let _guard = self.begin_busy(name)?;
        let record = self
            .find_domain(name)
            .await
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let node_id = record.node_id;
        let node_ip = self.pool.find_ip(node_id).await?;

        self.pool
            .deactivate_node(node_id)
            .await
            .map_err(|source| Error::PowerDownFailed { node_id, source })?;
        self.set_bound_state(name, node_id, PowerState::Building)
            .await?;

        let request = ActivationRequest {
            node_id,
            node_ip,
            name: record.name,
            mac_address: record.mac_address,
            ip_address: record.ip_address,
        };

        match self.pool.activate_node(&request).await {
            Ok(state) => {
                self.set_bound_state(name, node_id, state).await?;
                info!(node_id = %node_id, state = %state, "Domain rebooted");
                Ok(state)
            }
            Err(source) => {
                warn!(node_id = %node_id, error = %source, "Reactivation failed, destroying domain");
                if let Err(e) = self.teardown(name, node_id).await {
                    error!(
                        node_id = %node_id,
                        error = %e,
                        "Failed to destroy domain after failed reboot"
                    );
                }
                Err(Error::ActivationFailed { node_id, source })
            }
        }
    }

    /// Set a domain's state and persist it.
    pub async fn change_domain_state(&self, name: &str, state: PowerState) -> Result<()> {
        let _guard = self.begin_busy(name)?;
        self.registry.lock().await.set_status(name, state).await?;
        debug!(name = %name, state = %state, "Domain state changed");
        Ok(())
    }

    /// Look up a live domain.
    pub async fn find_domain(&self, name: &str) -> Option<DomainRecord> {
        self.registry.lock().await.find(name).cloned()
    }

    /// Names of all live domains, in creation order.
    pub async fn list_domains(&self) -> Vec<String> {
        self.registry.lock().await.names()
    }

    /// Snapshot of all live domain records, in creation order.
    pub async fn domains(&self) -> Vec<DomainRecord> {
        self.registry.lock().await.records().to_vec()
    }

    /// Polling view of a domain. Never fails; unknown domains yield
    /// [`DomainInfo::unknown`].
    pub async fn get_domain_info(&self, name: &str) -> DomainInfo {
        match self.find_domain(name).await {
            Some(record) => DomainInfo::from_record(&record),
            None => DomainInfo::unknown(),
        }
    }

    /// Mark `name` busy, or `None` if an operation on it is already running.
    fn begin(&self, name: &str) -> Option<OperationGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(name.to_string()) {
            return None;
        }
        Some(OperationGuard {
            in_flight: &self.in_flight,
            name: name.to_string(),
        })
    }

    fn begin_busy(&self, name: &str) -> Result<OperationGuard<'_>> {
        self.begin(name).ok_or_else(|| {
            debug!(name = %name, "Domain busy");
            Error::Busy(name.to_string())
        })
    }

    /// Set the state of `name`, provided it is still bound to `node_id`.
    async fn set_bound_state(&self, name: &str, node_id: NodeId, state: PowerState) -> Result<()> {
        let mut registry = self.registry.lock().await;
        if registry.find(name).map(|d| d.node_id) != Some(node_id) {
            return Err(Error::NotFound(name.to_string()));
        }
        registry.set_status(name, state).await?;
        debug!(name = %name, state = %state, "Domain state changed");
        Ok(())
    }

    /// Power the node down, clear its boot log, drop the record and release
    /// the node. The record must still be bound to `node_id`.
    async fn teardown(&self, name: &str, node_id: NodeId) -> Result<()> {
        if self.find_domain(name).await.map(|d| d.node_id) != Some(node_id) {
            return Err(Error::NotFound(name.to_string()));
        }

        self.pool.deactivate_node(node_id).await?;
        debug!(node_id = %node_id, "Node deactivated");

        self.pool.delete_kmsg(node_id).await?;
        {
            let mut registry = self.registry.lock().await;
            if registry.find(name).map(|d| d.node_id) != Some(node_id) {
                return Err(Error::NotFound(name.to_string()));
            }
            registry.remove(name).await?;
        }
        self.pool.free_node(node_id).await?;

        info!(node_id = %node_id, "Domain destroyed");
        Ok(())
    }

    /// Create the node's boot log and look up its management IP.
    async fn prepare_node(&self, node_id: NodeId) -> Result<String> {
        self.pool.init_kmsg(node_id).await?;
        Ok(self.pool.find_ip(node_id).await?)
    }

    /// Stage the boot image and power the node on.
    async fn boot_node(&self, boot_image: &Path, request: &ActivationRequest) -> Result<PowerState> {
        self.pool.set_image(boot_image, request.node_id).await?;
        self.pool
            .activate_node(request)
            .await
            .map_err(|source| Error::ActivationFailed {
                node_id: request.node_id,
                source,
            })
    }

    /// Remove the record for `name`, but only if it is still the one bound to `node_id`.
    async fn discard_record(&self, name: &str, node_id: NodeId) {
        let mut registry = self.registry.lock().await;
        if registry.find(name).map(|d| d.node_id) != Some(node_id) {
            return;
        }
        if let Err(e) = registry.remove(name).await {
            error!(name = %name, node_id = %node_id, error = %e, "Failed to remove partial domain record");
        }
    }

    /// Give an allocated node back to the pool. Failures are logged only; the
    /// caller is already returning the error that triggered the release.
    async fn release_node(&self, node_id: NodeId) {
        if let Err(e) = self.pool.delete_kmsg(node_id).await {
            warn!(node_id = %node_id, error = %e, "Failed to clear boot log during rollback");
        }
        match self.pool.free_node(node_id).await {
            Ok(()) => debug!(node_id = %node_id, "Node released"),
            Err(e) => error!(node_id = %node_id, error = %e, "Failed to release node"),
        }
    }
}

impl std::fmt::Debug for DomainManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainManager")
            .field("pool", &self.pool.pool_type())
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

/// Reconcile persisted domains with the node pool.
///
/// Only `RUNNING` records whose node the pool still reports as bound survive;
/// they adopt the pool's state. The store is rewritten if anything changed.
async fn recover_domains(
    registry: &mut DomainRegistry,
    pool: &dyn NodePool,
) -> Result<RecoverySummary> {
    let loaded = registry.records().to_vec();
    let mut summary = RecoverySummary {
        loaded: loaded.len(),
        ..Default::default()
    };

    if loaded.is_empty() {
        debug!("No persisted domains to recover");
        return Ok(summary);
    }

    let mut kept: Vec<DomainRecord> = Vec::with_capacity(loaded.len());

    for mut record in loaded {
        if record.status != PowerState::Running {
            warn!(
                name = %record.name,
                status = %record.status,
                "Discarding domain that was not running"
            );
            summary.not_running += 1;
            continue;
        }

        if kept
            .iter()
            .any(|d| d.name == record.name || d.node_id == record.node_id)
        {
            warn!(
                name = %record.name,
                node_id = %record.node_id,
                "Discarding duplicate domain record"
            );
            summary.duplicate += 1;
            continue;
        }

        match pool.node_status(record.node_id).await {
            Ok(Some(NodeStatus::Bound(state))) => {
                debug!(name = %record.name, node_id = %record.node_id, state = %state, "Domain recovered");
                record.status = state;
                kept.push(record);
            }
            Ok(Some(NodeStatus::Idle)) | Ok(None) => {
                warn!(
                    name = %record.name,
                    node_id = %record.node_id,
                    "Discarding domain bound to an unknown or idle node"
                );
                summary.stale += 1;
            }
            Err(e) => {
                warn!(
                    name = %record.name,
                    node_id = %record.node_id,
                    error = %e,
                    "Discarding domain whose node status could not be confirmed"
                );
                summary.stale += 1;
            }
        }
    }

    summary.kept = kept.len();
    if kept.as_slice() != registry.records() {
        registry.replace_all(kept).await?;
    }

    info!(
        loaded = summary.loaded,
        kept = summary.kept,
        not_running = summary.not_running,
        stale = summary.stale,
        duplicate = summary.duplicate,
        "Domain recovery complete"
    );

    Ok(summary)
}
