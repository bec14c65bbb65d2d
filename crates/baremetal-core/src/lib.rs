// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Baremetal Core - Domain Lifecycle Management
//!
//! This crate makes a fleet of bare-metal machines look like a hypervisor to
//! an orchestrator. It tracks "domains" (instance-like entities), each bound
//! to exactly one physical node, and exposes create, destroy, reboot and query
//! operations with the same state transitions a virtualization layer would.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator / CLI                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ create / destroy / reboot / query
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     DomainManager (lifecycle controller)                 │
//! │        state machine │ startup recovery │ rollback on node failure        │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │    DomainRegistry     │                    │          NodePool           │
//! │ ordered, flush on     │                    │ allocate │ power │ image     │
//! │ every mutation        │                    │ boot log │ status          │
//! └───────────────────────┘                    └─────────────────────────────┘
//!           │                                              │
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │ Persistence (codec +  │                    │  Physical nodes (or the     │
//! │ single durable file)  │                    │  inventory / mock pools)    │
//! └───────────────────────┘                    └─────────────────────────────┘
//! ```
//!
//! # Domain State Machine
//!
//! ```text
//!    (none) ──create──▶ BUILDING ──activate ok──▶ RUNNING (pool-reported)
//!                          │                         │
//!                   activate failed               reboot
//!                          │                         │
//!                          ▼                         ▼
//!               record removed,            BUILDING ──activate ok──▶ RUNNING
//!               node released                  │
//!                                        activate failed
//!                                              │
//!                                              ▼
//!                                     domain destroyed
//!
//!    any state ──destroy──▶ node off, boot log cleared, record removed, node released
//! ```
//!
//! # Recovery
//!
//! On start the persisted registry is never trusted blindly: records that
//! were not `RUNNING` are dropped (an operation was interrupted), and the
//! remaining ones survive only if the node pool still reports their node as
//! bound. Survivors adopt the pool's power state.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `BAREMETAL_NODE_INVENTORY` | Yes | - | Node inventory/state file |
//! | `BAREMETAL_DOMAIN_FILE` | No | `.data/domains.json` | Persisted domain registry |
//! | `BAREMETAL_KMSG_DIR` | No | `.data/kmsg` | Per-node boot-log directory |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`domain`]: Domain records, specs and power states
//! - [`error`]: Error types for lifecycle operations
//! - [`manager`]: The lifecycle manager and its startup recovery
//! - [`node_pool`]: Node pool interface plus mock and inventory implementations
//! - [`persistence`]: Registry codec and durable backends
//! - [`registry`]: The in-memory domain registry

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Domain records, specs and power states.
pub mod domain;

/// Error types for lifecycle operations.
pub mod error;

/// Domain lifecycle manager.
pub mod manager;

/// Node allocation and power control backends.
pub mod node_pool;

/// Registry codec and durable storage.
pub mod persistence;

/// In-memory domain registry.
pub mod registry;

pub use config::Config;
pub use domain::{DomainInfo, DomainRecord, DomainSpec, NodeId, PowerState};
pub use error::{Error, Result};
pub use manager::DomainManager;
