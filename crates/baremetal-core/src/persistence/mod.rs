// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for the domain registry.
//!
//! A backend only moves opaque bytes to and from a single durable location.
//! Encoding lives in [`codec`]; [`Persistence::save`] and
//! [`Persistence::load`] combine the two.

pub mod codec;
pub mod file;
pub mod memory;

pub use self::file::FilePersistence;
pub use self::memory::MemoryPersistence;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::DomainRecord;
use crate::error::Result;

/// Persistence interface used by the domain registry.
///
/// Single writer: exactly one registry may write to a backend.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Backend type identifier (e.g., "file", "memory")
    fn backend_type(&self) -> &'static str;

    /// Read the stored bytes, or `None` if nothing was ever written.
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored bytes.
    ///
    /// Either the new content is stored in full or the previous content is
    /// left untouched.
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Encode and store the full registry.
    async fn save(&self, domains: &[DomainRecord]) -> Result<()> {
        let bytes = codec::encode(domains)?;
        self.write(&bytes).await?;
        debug!(
            backend = self.backend_type(),
            count = domains.len(),
            "Stored domains"
        );
        Ok(())
    }

    /// Load the stored registry.
    ///
    /// Missing, empty, unreadable or corrupt state is treated as "no prior
    /// state" and yields an empty list.
    async fn load(&self) -> Vec<DomainRecord> {
        let bytes = match self.read().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(backend = self.backend_type(), "No persisted domains");
                return Vec::new();
            }
            Err(e) => {
                warn!(
                    backend = self.backend_type(),
                    error = %e,
                    "Failed to read persisted domains, starting empty"
                );
                return Vec::new();
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            debug!(backend = self.backend_type(), "Persisted domain state is empty");
            return Vec::new();
        }

        match codec::decode(&bytes) {
            Ok(domains) => domains,
            Err(e) => {
                warn!(
                    backend = self.backend_type(),
                    error = %e,
                    "Discarding unreadable domain state"
                );
                Vec::new()
            }
        }
    }
}
