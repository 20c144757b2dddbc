// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-platform message sync for syncrelay.
//!
//! - [`ChannelRegistry`] resolves which channel mirrors which, from a cached
//!   snapshot of active pairings.
//! - [`SyncCoordinator`] drives each inbound event through the rate guard,
//!   loop suppression, the sync ledger, and the adapter dispatcher.
//! - [`HealthMonitor`] derives adapter liveness from their reports.

pub mod coordinator;
pub mod health;
pub mod locks;
pub mod registry;
pub mod retry;

pub use coordinator::{SyncCoordinator, SyncOutcome};
pub use health::HealthMonitor;
pub use locks::KeyedLocks;
pub use registry::ChannelRegistry;
pub use retry::RetryPolicy;
