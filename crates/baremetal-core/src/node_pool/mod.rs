// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Node pool module - physical node allocation and power control.

pub mod inventory;
pub mod mock;
mod traits;

pub use inventory::InventoryNodePool;
pub use mock::MockNodePool;
pub use traits::*;
