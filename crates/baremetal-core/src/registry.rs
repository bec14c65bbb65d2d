// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain Registry
//!
//! The authoritative, ordered set of live domain records. Every mutation is
//! flushed to the persistence backend before it becomes visible in memory,
//! so the in-memory view never runs ahead of what a restart would load.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{DomainRecord, NodeId, PowerState};
use crate::error::{Error, Result};
use crate::persistence::Persistence;

/// Ordered collection of domain records, unique by name and by node.
pub struct DomainRegistry {
    domains: Vec<DomainRecord>,
    store: Arc<dyn Persistence>,
}

impl DomainRegistry {
    /// Create an empty registry writing to `store`.
    ///
    /// Nothing is written until the first mutation.
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            domains: Vec::new(),
            store,
        }
    }

    /// Load the registry exactly as persisted, without reconciliation.
    pub async fn load(store: Arc<dyn Persistence>) -> Self {
        let domains = store.load().await;
        debug!(count = domains.len(), "Loaded domain registry");
        Self { domains, store }
    }

    /// Find a record by name.
    pub fn find(&self, name: &str) -> Option<&DomainRecord> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Find the record bound to a node.
    pub fn find_by_node(&self, node_id: NodeId) -> Option<&DomainRecord> {
        self.domains.iter().find(|d| d.node_id == node_id)
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.domains.iter().map(|d| d.name.clone()).collect()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[DomainRecord] {
        &self.domains
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Append a record and persist.
    pub async fn insert(&mut self, record: DomainRecord) -> Result<()> {
        if self.find(&record.name).is_some() {
            return Err(Error::AlreadyExists(record.name));
        }
        if let Some(existing) = self.find_by_node(record.node_id) {
            return Err(Error::NodeInUse {
                node_id: record.node_id,
                domain: existing.name.clone(),
            });
        }

        let mut next = self.domains.clone();
        next.push(record);
        self.commit(next).await
    }

    /// Remove a record by name and persist.
    pub async fn remove(&mut self, name: &str) -> Result<DomainRecord> {
        let index = self.position(name)?;

        let mut next = self.domains.clone();
        let removed = next.remove(index);
        self.commit(next).await?;
        Ok(removed)
    }

    /// Change a record's status and persist.
    pub async fn set_status(&mut self, name: &str, status: PowerState) -> Result<()> {
        let index = self.position(name)?;

        let mut next = self.domains.clone();
        next[index].status = status;
        self.commit(next).await
    }

    /// Replace every record and persist.
    ///
    /// Callers are responsible for name and node uniqueness.
    pub async fn replace_all(&mut self, domains: Vec<DomainRecord>) -> Result<()> {
        self.commit(domains).await
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.domains
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn commit(&mut self, next: Vec<DomainRecord>) -> Result<()> {
        self.store.save(&next).await?;
        self.domains = next;
        debug!(count = self.domains.len(), "Domain registry flushed");
        Ok(())
    }
}

impl std::fmt::Debug for DomainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainRegistry")
            .field("domains", &self.domains)
            .field("backend", &self.store.backend_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryPersistence, codec};

    fn record(name: &str, node: u32) -> DomainRecord {
        DomainRecord {
            name: name.to_string(),
            node_id: NodeId(node),
            memory_kb: 1048576,
            vcpus: 4,
            mac_address: format!("02:00:00:00:00:{:02x}", node),
            ip_address: format!("192.168.1.{}", node),
            image_id: "ami-tilera".to_string(),
            kernel_id: "aki-tilera".to_string(),
            ramdisk_id: "ari-tilera".to_string(),
            status: PowerState::Building,
        }
    }

    async fn persisted(store: &MemoryPersistence) -> Vec<DomainRecord> {
        codec::decode(&store.bytes().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_persists_immediately() {
        let store = Arc::new(MemoryPersistence::new());
        let mut registry = DomainRegistry::new(store.clone());

        registry.insert(record("vm-a", 1)).await.unwrap();

        assert_eq!(store.write_count(), 1);
        assert_eq!(persisted(&store).await, vec![record("vm-a", 1)]);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_name() {
        let store = Arc::new(MemoryPersistence::new());
        let mut registry = DomainRegistry::new(store.clone());
        registry.insert(record("vm-a", 1)).await.unwrap();

        let result = registry.insert(record("vm-a", 2)).await;

        assert!(matches!(result, Err(Error::AlreadyExists(name)) if name == "vm-a"));
        assert_eq!(registry.len(), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_shared_node() {
        let store = Arc::new(MemoryPersistence::new());
        let mut registry = DomainRegistry::new(store);
        registry.insert(record("vm-a", 1)).await.unwrap();

        let result = registry.insert(record("vm-b", 1)).await;

        assert!(matches!(
            result,
            Err(Error::NodeInUse { node_id: NodeId(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_names_keep_insertion_order() {
        let store = Arc::new(MemoryPersistence::new());
        let mut registry = DomainRegistry::new(store);
        for (i, name) in ["zeta", "alpha", "mid"].iter().enumerate() {
            registry.insert(record(name, i as u32 + 1)).await.unwrap();
        }
        registry.remove("alpha").await.unwrap();

        assert_eq!(registry.names(), vec!["zeta", "mid"]);
    }

    #[tokio::test]
    async fn test_set_status_and_remove_missing() {
        let store = Arc::new(MemoryPersistence::new());
        let mut registry = DomainRegistry::new(store.clone());
        registry.insert(record("vm-a", 1)).await.unwrap();

        registry.set_status("vm-a", PowerState::Running).await.unwrap();
        assert_eq!(persisted(&store).await[0].status, PowerState::Running);

        assert!(matches!(
            registry.set_status("ghost", PowerState::Running).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.remove("ghost").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_flush_leaves_memory_unchanged() {
        let store = Arc::new(MemoryPersistence::new());
        let mut registry = DomainRegistry::new(store.clone());
        registry.insert(record("vm-a", 1)).await.unwrap();

        store.fail_writes(true);
        assert!(registry.insert(record("vm-b", 2)).await.is_err());
        assert!(registry.set_status("vm-a", PowerState::Running).await.is_err());
        assert!(registry.remove("vm-a").await.is_err());

        assert_eq!(registry.records(), &[record("vm-a", 1)]);
        assert_eq!(persisted(&store).await, vec![record("vm-a", 1)]);
    }

    #[tokio::test]
    async fn test_load_returns_persisted_records() {
        let store = Arc::new(MemoryPersistence::new());
        {
            let mut registry = DomainRegistry::new(store.clone());
            registry.insert(record("vm-a", 1)).await.unwrap();
            registry.insert(record("vm-b", 2)).await.unwrap();
        }

        let registry = DomainRegistry::load(store).await;

        assert_eq!(registry.names(), vec!["vm-a", "vm-b"]);
        assert_eq!(registry.find_by_node(NodeId(2)).unwrap().name, "vm-b");
    }
}
