// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP dispatcher that forwards relay and publish calls to adapter sidecars.
//!
//! Each platform adapter runs as a separate service exposing three JSON
//! endpoints under its base URL:
//!
//! - `POST /relay` with `{channel_id, content, metadata}`, answering `{message_id}`
//! - `POST /edit` with `{message_id, content}`
//! - `POST /publish` with `{job_id, preset, media, title, description}`,
//!   answering a JSON object that is stored as the job result

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use syncrelay_config::AdaptersConfig;
use syncrelay_core::{
    AdapterDispatcher, AdapterType, HealthStatus, MediaAsset, MessageId, Metadata, Platform,
    PluginAdapter, Preset, PublishRequest, RelayError,
};
use tracing::debug;

#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    headers: HeaderMap,
}

#[derive(Serialize)]
struct RelayBody<'a> {
    channel_id: &'a str,
    content: &'a str,
    metadata: &'a Metadata,
}

#[derive(Deserialize)]
struct RelayResponse {
    message_id: String,
}

#[derive(Serialize)]
struct EditBody<'a> {
    message_id: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct PublishBody<'a> {
    job_id: i64,
    preset: &'a Preset,
    media: Option<&'a MediaAsset>,
    title: Option<&'a str>,
    description: Option<&'a str>,
}

/// [`AdapterDispatcher`] backed by per-platform HTTP sidecars.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    endpoints: HashMap<Platform, Endpoint>,
}

impl HttpDispatcher {
    /// Builds a dispatcher for every endpoint in `config`.
    ///
    /// `request_timeout` caps a single HTTP exchange; the coordinator and
    /// scheduler apply their own deadlines on top.
    pub fn new(config: &AdaptersConfig, request_timeout: Duration) -> Result<Self, RelayError> {
        let mut endpoints = HashMap::new();
        for (name, endpoint) in &config.endpoints {
            let platform = Platform::from_str(name).map_err(|_| {
                RelayError::Config(format!("adapters.endpoints.{name} is not a known platform"))
            })?;

            let mut headers = HeaderMap::new();
            if let Some(token) = &endpoint.token {
                let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                    RelayError::Config(format!("invalid token for adapter `{name}`: {e}"))
                })?;
                headers.insert(AUTHORIZATION, value);
            }

            endpoints.insert(
                platform,
                Endpoint {
                    base_url: endpoint.url.trim_end_matches('/').to_string(),
                    headers,
                },
            );
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoints })
    }

    /// Platforms with a configured endpoint.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.endpoints.keys().copied().collect();
        platforms.sort_by_key(|p| p.to_string());
        platforms
    }

    async fn post<B: Serialize>(
        &self,
        platform: Platform,
        path: &str,
        body: &B,
    ) -> Result<String, RelayError> {
        let endpoint = self
            .endpoints
            .get(&platform)
            .ok_or_else(|| RelayError::adapter(platform, "no adapter endpoint configured"))?;
        let url = format!("{}/{path}", endpoint.base_url);

        let response = self
            .client
            .post(&url)
            .headers(endpoint.headers.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::AdapterFailure {
                platform,
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(%platform, path, status = %status, "adapter response received");

        let text = response.text().await.map_err(|e| RelayError::AdapterFailure {
            platform,
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(RelayError::adapter(
                platform,
                format!("adapter returned {status}: {text}"),
            ))
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(
    platform: Platform,
    body: &str,
) -> Result<T, RelayError> {
    serde_json::from_str(body).map_err(|e| RelayError::AdapterFailure {
        platform,
        message: format!("failed to parse adapter response: {e}"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl PluginAdapter for HttpDispatcher {
    fn name(&self) -> &str {
        "http-dispatcher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Dispatcher
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        if self.endpoints.is_empty() {
            Ok(HealthStatus::Degraded(
                "no adapter endpoints configured".into(),
            ))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl AdapterDispatcher for HttpDispatcher {
    async fn relay(
        &self,
        platform: Platform,
        channel_id: &str,
        content: &str,
        metadata: &Metadata,
    ) -> Result<MessageId, RelayError> {
        let body = RelayBody {
            channel_id,
            content,
            metadata,
        };
        let text = self.post(platform, "relay", &body).await?;
        let response: RelayResponse = parse_body(platform, &text)?;
        Ok(MessageId(response.message_id))
    }

    async fn edit_relay(
        &self,
        platform: Platform,
        message_id: &str,
        content: &str,
    ) -> Result<(), RelayError> {
        let body = EditBody {
            message_id,
            content,
        };
        self.post(platform, "edit", &body).await?;
        Ok(())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<Metadata, RelayError> {
        let platform = request.preset.platform;
        let body = PublishBody {
            job_id: request.job_id,
            preset: &request.preset,
            media: request.media.as_ref(),
            title: request.title.as_deref(),
            description: request.description.as_deref(),
        };
        let text = self.post(platform, "publish", &body).await?;
        if text.trim().is_empty() {
            return Ok(Metadata::new());
        }
        parse_body(platform, &text)
    }
}
