// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for syncrelay.
//!
//! Provides the domain types, the error taxonomy, and the trait seams shared
//! by the storage layer, the sync coordinator, the publication scheduler, and
//! the adapter dispatchers.

pub mod error;
pub mod traits;
pub mod types;

pub use error::RelayError;
pub use types::{
    AdapterReport, AdapterState, AdapterStatus, AdapterType, ChannelPairing, EventAction,
    HealthStatus, InboundEvent, MediaAsset, MessageId, Metadata, NewMediaAsset, NewPairing,
    NewPreset, NewPublication, NewSyncRecord, Platform, Preset, PublicationJob,
    PublicationStatus, PublishRequest, SyncRecord, SyncStatus,
};

pub use traits::{
    AdapterDispatcher, CatalogStore, CounterStore, HealthStore, PairingStore, PluginAdapter,
    PublicationStore, StorageAdapter, SyncLedger,
};
