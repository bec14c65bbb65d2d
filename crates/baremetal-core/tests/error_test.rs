// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for error types and their messages.

use std::error::Error as _;

use baremetal_core::domain::NodeId;
use baremetal_core::error::Error;
use baremetal_core::node_pool::NodePoolError;

#[test]
fn test_error_display() {
    assert_eq!(
        Error::NotFound("vm-a".to_string()).to_string(),
        "Domain not found: vm-a"
    );
    assert_eq!(
        Error::AlreadyExists("vm-a".to_string()).to_string(),
        "Domain already exists: vm-a"
    );
    assert_eq!(
        Error::NodeInUse {
            node_id: NodeId(3),
            domain: "vm-b".to_string()
        }
        .to_string(),
        "Node 3 already bound to domain vm-b"
    );
    assert_eq!(Error::Busy("vm-a".to_string()).to_string(), "Domain busy: vm-a");
    assert_eq!(
        Error::NoCapacity.to_string(),
        "No idle bare-metal node available"
    );
}

#[test]
fn test_activation_failed_keeps_source() {
    let err = Error::ActivationFailed {
        node_id: NodeId(2),
        source: NodePoolError::PowerOn {
            node_id: NodeId(2),
            reason: "ipmi timeout".to_string(),
        },
    };

    assert_eq!(
        err.to_string(),
        "Failed to boot bare-metal node 2: Node 2 power on failed: ipmi timeout"
    );
    let source = err.source().expect("source should be kept");
    assert_eq!(source.to_string(), "Node 2 power on failed: ipmi timeout");
}

#[test]
fn test_power_down_failed_display() {
    let err = Error::PowerDownFailed {
        node_id: NodeId(5),
        source: NodePoolError::PowerOff {
            node_id: NodeId(5),
            reason: "bmc unreachable".to_string(),
        },
    };

    assert!(err.to_string().starts_with("Failed to power down bare-metal node 5"));
    assert!(err.source().is_some());
}

#[test]
fn test_error_conversions() {
    let err: Error = NodePoolError::UnknownNode(NodeId(8)).into();
    assert!(matches!(err, Error::NodePool(NodePoolError::UnknownNode(NodeId(8)))));
    assert_eq!(err.to_string(), "Node pool error: Unknown node: 8");

    let err: Error = std::io::Error::other("disk full").into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_node_pool_error_display() {
    assert_eq!(NodePoolError::NoIdleNode.to_string(), "No idle node");
    assert_eq!(
        NodePoolError::ImageStaging {
            node_id: NodeId(1),
            reason: "no such file".to_string()
        }
        .to_string(),
        "Node 1 image staging failed: no such file"
    );
}
