// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock adapter dispatcher for deterministic testing.
//!
//! `MockDispatcher` implements `AdapterDispatcher` without talking to any
//! platform. Successful relays are numbered `d1`, `d2`, ... in call order.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use syncrelay_core::{
    AdapterDispatcher, AdapterType, HealthStatus, MessageId, Metadata, Platform, PluginAdapter,
    PublishRequest, RelayError,
};

/// A captured `relay` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayCall {
    pub platform: Platform,
    pub channel_id: String,
    pub content: String,
    pub metadata: Metadata,
}

/// A captured `edit_relay` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCall {
    pub platform: Platform,
    pub message_id: String,
    pub content: String,
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// Scripted failures, consumed by any call in order.
    failures: VecDeque<String>,
    delay: Option<Duration>,
    relays: Vec<RelayCall>,
    edits: Vec<EditCall>,
    publishes: Vec<PublishRequest>,
}

/// A dispatcher that succeeds unless told otherwise and remembers every call.
#[derive(Default)]
pub struct MockDispatcher {
    state: Mutex<State>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with `message`.
    pub async fn fail_next(&self, count: usize, message: &str) {
        let mut state = self.state.lock().await;
        for _ in 0..count {
            state.failures.push_back(message.to_string());
        }
    }

    /// Sleep this long inside every call, to exercise caller timeouts.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.delay = delay;
    }

    pub async fn relays(&self) -> Vec<RelayCall> {
        self.state.lock().await.relays.clone()
    }

    pub async fn edits(&self) -> Vec<EditCall> {
        self.state.lock().await.edits.clone()
    }

    pub async fn publishes(&self) -> Vec<PublishRequest> {
        self.state.lock().await.publishes.clone()
    }

    /// Applies the configured delay, then pops a scripted failure if any.
    async fn script(&self, platform: Platform) -> Result<(), RelayError> {
        let delay = self.state.lock().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.state.lock().await.failures.pop_front() {
            Some(message) => Err(RelayError::adapter(platform, message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PluginAdapter for MockDispatcher {
    fn name(&self) -> &str {
        "mock-dispatcher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Dispatcher
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl AdapterDispatcher for MockDispatcher {
    async fn relay(
        &self,
        platform: Platform,
        channel_id: &str,
        content: &str,
        metadata: &Metadata,
    ) -> Result<MessageId, RelayError> {
        self.script(platform).await?;
        let mut state = self.state.lock().await;
        state.relays.push(RelayCall {
            platform,
            channel_id: channel_id.to_string(),
            content: content.to_string(),
            metadata: metadata.clone(),
        });
        state.next_id += 1;
        Ok(MessageId(format!("d{}", state.next_id)))
    }

    async fn edit_relay(
        &self,
        platform: Platform,
        message_id: &str,
        content: &str,
    ) -> Result<(), RelayError> {
        self.script(platform).await?;
        self.state.lock().await.edits.push(EditCall {
            platform,
            message_id: message_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<Metadata, RelayError> {
        self.script(request.preset.platform).await?;
        self.state.lock().await.publishes.push(request.clone());
        let mut result = Metadata::new();
        result.insert("external_id".into(), json!(format!("p{}", request.job_id)));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relay_ids_are_sequential() {
        let dispatcher = MockDispatcher::new();
        let meta = Metadata::new();
        let a = dispatcher
            .relay(Platform::Discord, "456", "hello", &meta)
            .await
            .unwrap();
        let b = dispatcher
            .relay(Platform::Discord, "456", "again", &meta)
            .await
            .unwrap();
        assert_eq!(a, MessageId("d1".into()));
        assert_eq!(b, MessageId("d2".into()));
        assert_eq!(dispatcher.relays().await.len(), 2);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let dispatcher = MockDispatcher::new();
        dispatcher.fail_next(1, "502 bad gateway").await;

        let err = dispatcher
            .edit_relay(Platform::Telegram, "t9", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::AdapterFailure { .. }));
        assert!(dispatcher.edits().await.is_empty());

        dispatcher
            .edit_relay(Platform::Telegram, "t9", "x")
            .await
            .unwrap();
        assert_eq!(dispatcher.edits().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_relay_does_not_consume_an_id() {
        let dispatcher = MockDispatcher::new();
        dispatcher.fail_next(1, "boom").await;
        let meta = Metadata::new();
        assert!(
            dispatcher
                .relay(Platform::Discord, "456", "a", &meta)
                .await
                .is_err()
        );
        let id = dispatcher
            .relay(Platform::Discord, "456", "a", &meta)
            .await
            .unwrap();
        assert_eq!(id.0, "d1");
    }
}
