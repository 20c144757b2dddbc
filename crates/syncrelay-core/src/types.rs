// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the registry, ledger, queue, and adapter traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Free-form JSON object attached to pairings, records, presets, and results.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Platform-native identifier of a message produced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of pluggable adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Dispatcher,
    Storage,
    CounterStore,
}

/// A chat or streaming platform that syncrelay can mirror content between.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Discord,
    Youtube,
    Rutube,
    Twitch,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Telegram,
        Platform::Discord,
        Platform::Youtube,
        Platform::Rutube,
        Platform::Twitch,
    ];
}

/// Lifecycle of a [`SyncRecord`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Completed,
    Failed,
}

impl SyncStatus {
    /// States from which a record may move into `self`.
    ///
    /// Edits re-open settled records. A record in Syncing is owned by the
    /// worker that claimed it and only that worker moves it on.
    pub fn predecessors(self) -> &'static [SyncStatus] {
        match self {
            SyncStatus::Pending => &[
                SyncStatus::Pending,
                SyncStatus::Completed,
                SyncStatus::Failed,
            ],
            SyncStatus::Syncing => &[SyncStatus::Pending, SyncStatus::Failed],
            SyncStatus::Completed | SyncStatus::Failed => &[SyncStatus::Syncing],
        }
    }
}

/// Lifecycle of a [`PublicationJob`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    Queued,
    Publishing,
    Published,
    Failed,
}

/// Whether an inbound event announces a new message or an edit of a known one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Create,
    Edit,
}

/// An event pushed by a platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub platform: Platform,
    pub channel_id: String,
    pub native_message_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub action: EventAction,
}

/// A bidirectional link between a channel on one platform and a channel on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPairing {
    pub id: i64,
    pub platform: Platform,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub paired_platform: Platform,
    pub paired_channel_id: String,
    pub is_active: bool,
    pub config: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelPairing {
    /// The opposite endpoint of `(platform, channel_id)`, if it is one side of the pairing.
    pub fn counterpart(&self, platform: Platform, channel_id: &str) -> Option<(Platform, &str)> {
        if self.platform == platform && self.channel_id == channel_id {
            Some((self.paired_platform, self.paired_channel_id.as_str()))
        } else if self.paired_platform == platform && self.paired_channel_id == channel_id {
            Some((self.platform, self.channel_id.as_str()))
        } else {
            None
        }
    }
}

/// Operator input for creating or replacing a pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPairing {
    pub platform: Platform,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub paired_platform: Platform,
    pub paired_channel_id: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub config: Metadata,
}

fn default_true() -> bool {
    true
}

/// Ledger entry tracking one source message and its relayed counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: i64,
    /// Pairing the record was routed through. `None` once the pairing is deleted.
    pub pairing_id: Option<i64>,
    pub source_platform: Platform,
    pub source_channel_id: String,
    pub source_message_id: String,
    pub paired_platform: Platform,
    /// Channel the paired message lives in.
    pub paired_channel_id: String,
    pub paired_message_id: Option<String>,
    pub content: String,
    pub metadata: Metadata,
    pub status: SyncStatus,
    /// Dispatch attempts made for the current content revision.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::SyncLedger::upsert_sync_record`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncRecord {
    pub pairing_id: i64,
    pub source_platform: Platform,
    pub source_channel_id: String,
    pub source_message_id: String,
    pub paired_platform: Platform,
    pub paired_channel_id: String,
    pub content: String,
    pub metadata: Metadata,
}

/// Named target-platform configuration used for publications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: i64,
    pub name: String,
    pub platform: Platform,
    pub config: Metadata,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPreset {
    pub name: String,
    pub platform: Platform,
    #[serde(default)]
    pub config: Metadata,
}

/// Metadata of an uploaded media file. The bytes live in external storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMediaAsset {
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
}

/// A scheduled or immediate publication bound to a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationJob {
    pub id: i64,
    pub preset_id: i64,
    pub media_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// `None` means "as soon as possible".
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: PublicationStatus,
    pub result: Metadata,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Operator request for a new publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPublication {
    pub preset_id: i64,
    pub media_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Everything a dispatcher needs to publish a claimed job.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub job_id: i64,
    pub preset: Preset,
    pub media: Option<MediaAsset>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Last liveness report received from a platform adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterReport {
    pub platform: Platform,
    pub reported_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Derived liveness of a platform adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdapterState {
    Online,
    Offline,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub platform: Platform,
    pub state: AdapterState,
    pub last_report_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
