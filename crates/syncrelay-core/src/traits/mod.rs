// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the engine and its collaborators.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility. Store traits are implemented by the
//! persistence layer and consumed by the registry, coordinator, and scheduler.

pub mod adapter;
pub mod counter;
pub mod dispatcher;
pub mod storage;

pub use adapter::PluginAdapter;
pub use counter::CounterStore;
pub use dispatcher::AdapterDispatcher;
pub use storage::{
    CatalogStore, HealthStore, PairingStore, PublicationStore, StorageAdapter, SyncLedger,
};
