// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel registry with a cached snapshot of active pairings.
//!
//! Lookups on the inbound path are served from an immutable snapshot indexed
//! by both endpoints. The snapshot is rebuilt once it is older than the
//! configured TTL and thrown away on every mutation made through the registry.
//! Mutations made by other processes become visible within one TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use syncrelay_core::{ChannelPairing, NewPairing, PairingStore, Platform, RelayError};
use tokio::time::Instant;
use tracing::debug;

type EndpointKey = (Platform, String);

struct Snapshot {
    /// `None` marks a snapshot that must be rebuilt before use.
    loaded_at: Option<Instant>,
    generation: u64,
    by_endpoint: HashMap<EndpointKey, ChannelPairing>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            loaded_at: None,
            generation: 0,
            by_endpoint: HashMap::new(),
        }
    }

    fn build(pairings: Vec<ChannelPairing>, generation: u64) -> Self {
        let mut by_endpoint = HashMap::with_capacity(pairings.len() * 2);
        for pairing in pairings.into_iter().filter(|p| p.is_active) {
            by_endpoint.insert(
                (pairing.platform, pairing.channel_id.clone()),
                pairing.clone(),
            );
            by_endpoint.insert(
                (pairing.paired_platform, pairing.paired_channel_id.clone()),
                pairing,
            );
        }
        Self {
            loaded_at: Some(Instant::now()),
            generation,
            by_endpoint,
        }
    }

    fn is_fresh(&self, ttl: Duration, generation: u64) -> bool {
        self.generation == generation && self.loaded_at.is_some_and(|at| at.elapsed() < ttl)
    }
}

pub struct ChannelRegistry {
    store: Arc<dyn PairingStore>,
    ttl: Duration,
    snapshot: ArcSwap<Snapshot>,
    /// Bumped by every mutation; snapshots built from an older generation are discarded.
    generation: AtomicU64,
}

impl ChannelRegistry {
    pub fn new(store: Arc<dyn PairingStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            generation: AtomicU64::new(0),
        }
    }

    /// The active pairing that has `(platform, channel_id)` as either endpoint.
    pub async fn find_pairing(
        &self,
        platform: Platform,
        channel_id: &str,
    ) -> Result<Option<ChannelPairing>, RelayError> {
        let snapshot = self.current().await?;
        Ok(snapshot
            .by_endpoint
            .get(&(platform, channel_id.to_string()))
            .cloned())
    }

    /// Creates a pairing, or replaces pairing `id` when given.
    pub async fn upsert_pairing(
        &self,
        id: Option<i64>,
        pairing: &NewPairing,
    ) -> Result<ChannelPairing, RelayError> {
        let stored = match id {
            Some(id) => self.store.update_pairing(id, pairing).await?,
            None => self.store.insert_pairing(pairing).await?,
        };
        self.invalidate();
        debug!(
            pairing_id = stored.id,
            platform = %stored.platform,
            channel_id = %stored.channel_id,
            paired_platform = %stored.paired_platform,
            paired_channel_id = %stored.paired_channel_id,
            "pairing saved"
        );
        Ok(stored)
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<ChannelPairing, RelayError> {
        let stored = self.store.set_pairing_active(id, active).await?;
        self.invalidate();
        debug!(pairing_id = id, active, "pairing activation changed");
        Ok(stored)
    }

    /// Flips the active flag of pairing `id`.
    pub async fn toggle(&self, id: i64) -> Result<ChannelPairing, RelayError> {
        let current = self.get(id).await?;
        self.set_active(id, !current.is_active).await
    }

    /// Removes the pairing. Sync history referencing it is kept.
    pub async fn delete(&self, id: i64) -> Result<(), RelayError> {
        self.store.delete_pairing(id).await?;
        self.invalidate();
        debug!(pairing_id = id, "pairing deleted");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<ChannelPairing, RelayError> {
        self.store
            .get_pairing(id)
            .await?
            .ok_or_else(|| RelayError::not_found("pairing", id))
    }

    /// Every pairing, active or not.
    pub async fn list(&self) -> Result<Vec<ChannelPairing>, RelayError> {
        self.store.list_pairings().await
    }

    /// Drops the cached snapshot so the next lookup reloads from storage.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    async fn current(&self) -> Result<Arc<Snapshot>, RelayError> {
        let generation = self.generation.load(Ordering::Acquire);
        let cached = self.snapshot.load_full();
        if cached.is_fresh(self.ttl, generation) {
            return Ok(cached);
        }

        let pairings = self.store.list_pairings().await?;
        let fresh = Arc::new(Snapshot::build(pairings, generation));
        // A mutation during the reload makes this snapshot stale already.
        if self.generation.load(Ordering::Acquire) == generation {
            self.snapshot.store(fresh.clone());
        }
        debug!(
            endpoints = fresh.by_endpoint.len(),
            generation, "pairing snapshot reloaded"
        );
        Ok(fresh)
    }
}
