// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for baremetal-core.

use thiserror::Error;

use crate::domain::NodeId;
use crate::node_pool::NodePoolError;

/// Domain lifecycle errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No live domain matches the given name.
    #[error("Domain not found: {0}")]
    NotFound(String),

    /// A live domain already uses the given name.
    #[error("Domain already exists: {0}")]
    AlreadyExists(String),

    /// The node is already bound to another live domain.
    #[error("Node {node_id} already bound to domain {domain}")]
    NodeInUse {
        /// Node that is already bound.
        node_id: NodeId,
        /// Domain currently holding the node.
        domain: String,
    },

    /// Another operation on the domain is still in progress.
    #[error("Domain busy: {0}")]
    Busy(String),

    /// The node pool has no idle node left.
    #[error("No idle bare-metal node available")]
    NoCapacity,

    /// Node activation (power on) failed.
    #[error("Failed to boot bare-metal node {node_id}: {source}")]
    ActivationFailed {
        /// Node that failed to activate.
        node_id: NodeId,
        /// Error reported by the node pool.
        #[source]
        source: NodePoolError,
    },

    /// Node deactivation (power down) failed.
    #[error("Failed to power down bare-metal node {node_id}: {source}")]
    PowerDownFailed {
        /// Node that failed to deactivate.
        node_id: NodeId,
        /// Error reported by the node pool.
        #[source]
        source: NodePoolError,
    },

    /// Persisted domain state could not be decoded.
    #[error("Corrupt domain state: {0}")]
    CorruptState(String),

    /// Any other node pool failure, passed through unmodified.
    #[error("Node pool error: {0}")]
    NodePool(#[from] NodePoolError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using the domain lifecycle Error.
pub type Result<T> = std::result::Result<T, Error>;
