// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for baremetal-core integration tests.
//!
//! Provides TestContext wiring a mock node pool and in-memory persistence
//! into a started DomainManager.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use baremetal_core::domain::{DomainRecord, DomainSpec, NodeId, PowerState};
use baremetal_core::manager::DomainManager;
use baremetal_core::node_pool::{MockNodePool, NodePool};
use baremetal_core::persistence::{MemoryPersistence, Persistence, codec};

/// Test context holding the manager and handles to its collaborators.
pub struct TestContext {
    pub pool: Arc<MockNodePool>,
    pub store: Arc<MemoryPersistence>,
    pub manager: DomainManager,
}

impl TestContext {
    /// Start a manager over `nodes` idle mock nodes and an empty store.
    pub async fn new(nodes: u32) -> Self {
        Self::with_parts(
            Arc::new(MockNodePool::with_nodes(nodes)),
            Arc::new(MemoryPersistence::new()),
        )
        .await
    }

    /// Start a manager over the given pool and store.
    pub async fn with_parts(pool: Arc<MockNodePool>, store: Arc<MemoryPersistence>) -> Self {
        let manager = start_manager(pool.clone(), store.clone()).await;
        Self {
            pool,
            store,
            manager,
        }
    }

    /// Drop the manager and start a fresh one over the same pool and store,
    /// as a process restart would.
    pub async fn restart(self) -> Self {
        let Self { pool, store, .. } = self;
        Self::with_parts(pool, store).await
    }

    /// Create a domain with default sizing.
    pub async fn create(&self, name: &str) -> baremetal_core::Result<PowerState> {
        self.manager.create_domain(spec(name), boot_image()).await
    }

    /// Records currently in the store, decoded without reconciliation.
    pub async fn persisted(&self) -> Vec<DomainRecord> {
        self.store.load().await
    }
}

/// Start a manager over arbitrary trait objects.
pub async fn start_manager(
    pool: Arc<dyn NodePool>,
    store: Arc<dyn Persistence>,
) -> DomainManager {
    DomainManager::builder()
        .persistence(store)
        .node_pool(pool)
        .build()
        .expect("builder should have all parts")
        .start()
        .await
        .expect("manager should start")
}

/// Domain spec with deterministic sizing derived from the name.
pub fn spec(name: &str) -> DomainSpec {
    DomainSpec {
        name: name.to_string(),
        memory_kb: 524288,
        vcpus: 2,
        mac_address: "02:16:3e:5a:00:01".to_string(),
        ip_address: "10.2.0.17".to_string(),
        image_id: "ami-00000003".to_string(),
        kernel_id: "aki-00000001".to_string(),
        ramdisk_id: "ari-00000002".to_string(),
    }
}

/// Boot image path handed to create.
pub fn boot_image() -> &'static Path {
    Path::new("/tftpboot/instance-00000001/root")
}

/// A persisted record bound to `node` with the given status.
pub fn record(name: &str, node: u32, status: PowerState) -> DomainRecord {
    let mut record = DomainRecord::from_spec(spec(name), NodeId(node), status);
    record.mac_address = format!("02:16:3e:5a:00:{:02x}", node);
    record
}

/// Store pre-loaded with `records`.
pub fn store_with(records: &[DomainRecord]) -> Arc<MemoryPersistence> {
    let bytes = codec::encode(records).expect("encode should succeed");
    Arc::new(MemoryPersistence::with_bytes(bytes))
}

/// Scratch path inside a temp dir.
pub fn temp_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}
