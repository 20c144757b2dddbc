// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound seam to the platform adapters.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Metadata, MessageId, Platform, PublishRequest};

/// Performs the actual cross-posting on a target platform.
///
/// Implementations report platform problems as [`RelayError::AdapterFailure`].
/// Callers bound every call with a timeout, so implementations need not.
#[async_trait]
pub trait AdapterDispatcher: PluginAdapter {
    /// Posts `content` into `channel_id` on `platform` and returns the new native message id.
    async fn relay(
        &self,
        platform: Platform,
        channel_id: &str,
        content: &str,
        metadata: &Metadata,
    ) -> Result<MessageId, RelayError>;

    /// Replaces the content of a message previously produced by [`relay`](Self::relay).
    async fn edit_relay(
        &self,
        platform: Platform,
        message_id: &str,
        content: &str,
    ) -> Result<(), RelayError>;

    /// Publishes a claimed job and returns the platform's result payload.
    async fn publish(&self, request: &PublishRequest) -> Result<Metadata, RelayError>;
}
