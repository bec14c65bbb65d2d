// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire format of the persisted domain registry.
//!
//! The registry is always written whole, as a versioned JSON envelope:
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved_at": "2025-01-01T00:00:00Z",
//!   "domains": [ { "name": "vm-a", "node_id": 1, "status": "running", ... } ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainRecord;
use crate::error::{Error, Result};

/// Current envelope version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    domains: &'a [DomainRecord],
}

#[derive(Debug, Deserialize)]
struct Envelope {
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    domains: Vec<DomainRecord>,
}

/// Encode the full registry.
pub fn encode(domains: &[DomainRecord]) -> Result<Vec<u8>> {
    let envelope = EnvelopeRef {
        version: FORMAT_VERSION,
        saved_at: Utc::now(),
        domains,
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Decode a registry previously written by [`encode`].
///
/// Any malformed, truncated or foreign input is reported as
/// [`Error::CorruptState`].
pub fn decode(bytes: &[u8]) -> Result<Vec<DomainRecord>> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| Error::CorruptState(e.to_string()))?;

    if envelope.version != FORMAT_VERSION {
        return Err(Error::CorruptState(format!(
            "Unsupported format version {} (expected {})",
            envelope.version, FORMAT_VERSION
        )));
    }

    tracing::debug!(
        count = envelope.domains.len(),
        saved_at = ?envelope.saved_at,
        "Decoded persisted domains"
    );

    Ok(envelope.domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NodeId, PowerState};

    fn record(name: &str, node: u32) -> DomainRecord {
        DomainRecord {
            name: name.to_string(),
            node_id: NodeId(node),
            memory_kb: 524288,
            vcpus: 1,
            mac_address: "02:16:3e:00:00:01".to_string(),
            ip_address: "10.1.0.5".to_string(),
            image_id: "ami-00000001".to_string(),
            kernel_id: "aki-00000001".to_string(),
            ramdisk_id: "ari-00000001".to_string(),
            status: PowerState::Running,
        }
    }

    #[test]
    fn test_encode_writes_envelope() {
        let bytes = encode(&[record("vm-a", 1)]).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["version"], 1);
        assert!(json["saved_at"].is_string());
        assert_eq!(json["domains"][0]["name"], "vm-a");
        assert_eq!(json["domains"][0]["node_id"], 1);
        assert_eq!(json["domains"][0]["status"], "running");
    }

    #[test]
    fn test_decode_preserves_order() {
        let domains = vec![record("vm-b", 2), record("vm-a", 1), record("vm-c", 3)];
        let decoded = decode(&encode(&domains).unwrap()).unwrap();

        let names: Vec<_> = decoded.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["vm-b", "vm-a", "vm-c"]);
        assert_eq!(decoded, domains);
    }

    #[test]
    fn test_decode_without_saved_at() {
        let json = r#"{"version":1,"domains":[]}"#;
        assert!(decode(json.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_decode_truncated_is_corrupt() {
        let bytes = encode(&[record("vm-a", 1)]).unwrap();
        let truncated = &bytes[..bytes.len() / 2];

        assert!(matches!(decode(truncated), Err(Error::CorruptState(_))));
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        assert!(matches!(
            decode(b"\x80\x03]q\x00."),
            Err(Error::CorruptState(_))
        ));
    }

    #[test]
    fn test_decode_unknown_version_is_corrupt() {
        let json = r#"{"version":7,"domains":[]}"#;
        let err = decode(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("version 7"));
    }
}
