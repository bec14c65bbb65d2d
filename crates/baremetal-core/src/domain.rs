// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain data model.
//!
//! A domain is a simulated instance exclusively bound to one physical node.
//! These types are what the registry stores, what the persistence layer
//! serializes, and what the manager hands back to callers.

use serde::{Deserialize, Serialize};

/// Identifier of a physical bare-metal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Hypervisor power state of a domain.
///
/// The manager only interprets `NoState`, `Building` and `Running`. Every other
/// state is whatever the node pool reported and is stored and persisted as is.
///
/// ```text
///   (none) ──create──▶ BUILDING ──activate──▶ RUNNING (or pool-reported state)
///                          ▲                       │
///                          └────────reboot─────────┘
///   any state ──destroy──▶ (removed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Unknown; reported for domains that do not exist.
    #[default]
    NoState,
    /// Node confirmed active.
    Running,
    /// Blocked on a resource.
    Blocked,
    /// Paused.
    Paused,
    /// Shutting down.
    Shutdown,
    /// Powered off.
    Shutoff,
    /// Crashed.
    Crashed,
    /// Suspended.
    Suspended,
    /// Failed.
    Failed,
    /// Allocation or activation in progress.
    Building,
}

impl PowerState {
    /// Numeric hypervisor code for this state.
    pub fn code(self) -> u8 {
        match self {
            PowerState::NoState => 0,
            PowerState::Running => 1,
            PowerState::Blocked => 2,
            PowerState::Paused => 3,
            PowerState::Shutdown => 4,
            PowerState::Shutoff => 5,
            PowerState::Crashed => 6,
            PowerState::Suspended => 7,
            PowerState::Failed => 8,
            PowerState::Building => 9,
        }
    }

    /// State for a numeric hypervisor code.
    pub fn from_code(code: u8) -> Option<Self> {
        let state = match code {
            0 => PowerState::NoState,
            1 => PowerState::Running,
            2 => PowerState::Blocked,
            3 => PowerState::Paused,
            4 => PowerState::Shutdown,
            5 => PowerState::Shutoff,
            6 => PowerState::Crashed,
            7 => PowerState::Suspended,
            8 => PowerState::Failed,
            9 => PowerState::Building,
            _ => return None,
        };
        Some(state)
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::NoState => "no_state",
            PowerState::Running => "running",
            PowerState::Blocked => "blocked",
            PowerState::Paused => "paused",
            PowerState::Shutdown => "shutdown",
            PowerState::Shutoff => "shutoff",
            PowerState::Crashed => "crashed",
            PowerState::Suspended => "suspended",
            PowerState::Failed => "failed",
            PowerState::Building => "building",
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PowerState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if let Ok(code) = normalized.parse::<u8>() {
            return PowerState::from_code(code).ok_or_else(|| format!("Unknown power state: {}", s));
        }
        match normalized.as_str() {
            "no_state" | "nostate" => Ok(PowerState::NoState),
            "running" => Ok(PowerState::Running),
            "blocked" => Ok(PowerState::Blocked),
            "paused" => Ok(PowerState::Paused),
            "shutdown" => Ok(PowerState::Shutdown),
            "shutoff" => Ok(PowerState::Shutoff),
            "crashed" => Ok(PowerState::Crashed),
            "suspended" => Ok(PowerState::Suspended),
            "failed" => Ok(PowerState::Failed),
            "building" => Ok(PowerState::Building),
            _ => Err(format!("Unknown power state: {}", s)),
        }
    }
}

/// Caller-supplied description of a domain to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSpec {
    /// Unique domain name
    pub name: String,
    /// Memory size in KiB
    pub memory_kb: u64,
    /// Number of virtual CPUs
    pub vcpus: u32,
    /// MAC address handed to the node on activation
    pub mac_address: String,
    /// IP address handed to the node on activation
    pub ip_address: String,
    /// Boot image reference
    pub image_id: String,
    /// Kernel reference
    pub kernel_id: String,
    /// Ramdisk reference
    pub ramdisk_id: String,
}

/// A live domain bound to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Unique domain name
    pub name: String,
    /// Node exclusively bound to this domain
    pub node_id: NodeId,
    /// Memory size in KiB
    pub memory_kb: u64,
    /// Number of virtual CPUs
    pub vcpus: u32,
    /// MAC address
    pub mac_address: String,
    /// IP address
    pub ip_address: String,
    /// Boot image reference
    pub image_id: String,
    /// Kernel reference
    pub kernel_id: String,
    /// Ramdisk reference
    pub ramdisk_id: String,
    /// Current power state
    pub status: PowerState,
}

impl DomainRecord {
    /// Build a record for `spec` bound to `node_id`.
    pub fn from_spec(spec: DomainSpec, node_id: NodeId, status: PowerState) -> Self {
        Self {
            name: spec.name,
            node_id,
            memory_kb: spec.memory_kb,
            vcpus: spec.vcpus,
            mac_address: spec.mac_address,
            ip_address: spec.ip_address,
            image_id: spec.image_id,
            kernel_id: spec.kernel_id,
            ramdisk_id: spec.ramdisk_id,
            status,
        }
    }
}

/// Fixed CPU time reported for every live domain.
pub const CPU_TIME_PLACEHOLDER: u64 = 100;

/// Polling view of a domain, as returned by `get_domain_info`.
///
/// A missing domain is reported as [`DomainInfo::unknown`] rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainInfo {
    /// Power state (`NoState` when the domain does not exist)
    pub state: PowerState,
    /// Maximum memory in KiB
    pub max_mem_kb: Option<u64>,
    /// Current memory in KiB
    pub mem_kb: Option<u64>,
    /// Number of virtual CPUs
    pub num_cpu: Option<u32>,
    /// CPU time placeholder
    pub cpu_time: Option<u64>,
}

impl DomainInfo {
    /// The all-unknown tuple.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Info for a live record.
    pub fn from_record(record: &DomainRecord) -> Self {
        Self {
            state: record.status,
            max_mem_kb: Some(record.memory_kb),
            mem_kb: Some(record.memory_kb),
            num_cpu: Some(record.vcpus),
            cpu_time: Some(CPU_TIME_PLACEHOLDER),
        }
    }

    /// Whether this describes an existing domain.
    pub fn is_known(&self) -> bool {
        self.state != PowerState::NoState
    }
}
