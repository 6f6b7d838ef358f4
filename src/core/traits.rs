//! Core traits and types for video publishing
//!
//! This module defines the fundamental abstractions for platform adapters,
//! the staging collaborator, and the per-request data model shared between
//! the orchestrator and every adapter.

use crate::core::error::{ErrorKind, PublishError};
use crate::core::platform::normalize_platform_name;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Video Asset
// ============================================================================

/// Immutable handle to the content being published
///
/// The payload is reference counted, so cloning an asset into a platform
/// task never copies the video bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
    name: String,
    bytes: Bytes,
}

impl VideoAsset {
    /// Create an asset from a display name and its raw bytes
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an asset from disk, using the file name as display name
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        Ok(Self::new(name, bytes))
    }

    /// Display name (original file name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw payload
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Payload size in bytes
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============================================================================
// Publish Request
// ============================================================================

/// One publish call: an asset, its title, and the destinations
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub asset: VideoAsset,
    pub title: String,
    pub platforms: Vec<String>,
}

impl PublishRequest {
    pub fn new<I, S>(asset: VideoAsset, title: impl Into<String>, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            asset,
            title: title.into(),
            platforms: platforms.into_iter().map(Into::into).collect(),
        }
    }

    /// Requested platforms, normalized and deduplicated in first-seen order
    ///
    /// Blank entries are dropped.
    pub fn normalized_platforms(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for platform in &self.platforms {
            let normalized = normalize_platform_name(platform);
            if !normalized.is_empty() && !seen.contains(&normalized) {
                seen.push(normalized);
            }
        }
        seen
    }
}

// ============================================================================
// Staging
// ============================================================================

/// Durable URL produced once per request by the staging collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedReference {
    url: String,
}

impl StagedReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for StagedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// External collaborator that turns raw bytes into a hosted URL
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Make the asset durably retrievable by URL
    ///
    /// Implementations must fail with [`PublishError::StagingFailure`].
    async fn stage(&self, asset: &VideoAsset) -> Result<StagedReference, PublishError>;
}

// ============================================================================
// Platform Adapters
// ============================================================================

/// Adapter that publishes by handing the destination a hosted URL
///
/// Implementations hold only configuration and an HTTP client. Everything
/// that belongs to a single request is passed as an argument.
#[async_trait]
pub trait ReferenceAdapter: Send + Sync {
    /// Platform name (e.g., "instagram")
    fn name(&self) -> &str;

    /// Publish the staged video and return the destination's external id
    async fn publish(&self, staged: &StagedReference, title: &str) -> Result<String, PublishError>;
}

/// Adapter that publishes by delivering the raw bytes
#[async_trait]
pub trait TransferAdapter: Send + Sync {
    /// Platform name (e.g., "tiktok")
    fn name(&self) -> &str;

    /// Upload the asset and return the destination's external id
    async fn publish(&self, asset: &VideoAsset, title: &str) -> Result<String, PublishError>;
}

/// Adapter capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Reference,
    Transfer,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Reference => "reference",
            Capability::Transfer => "transfer",
        }
    }
}

/// A resolved adapter, tagged with exactly one capability
#[derive(Clone)]
pub enum PlatformAdapter {
    Reference(Arc<dyn ReferenceAdapter>),
    Transfer(Arc<dyn TransferAdapter>),
}

impl PlatformAdapter {
    pub fn name(&self) -> &str {
        match self {
            PlatformAdapter::Reference(adapter) => adapter.name(),
            PlatformAdapter::Transfer(adapter) => adapter.name(),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            PlatformAdapter::Reference(_) => Capability::Reference,
            PlatformAdapter::Transfer(_) => Capability::Transfer,
        }
    }
}

impl fmt::Debug for PlatformAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformAdapter")
            .field("name", &self.name())
            .field("capability", &self.capability())
            .finish()
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of publishing to one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PublishOutcome {
    Success {
        external_id: String,
    },
    Failure {
        kind: ErrorKind,
        detail: String,
        attempts: u32,
    },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success { .. })
    }

    pub fn external_id(&self) -> Option<&str> {
        match self {
            PublishOutcome::Success { external_id } => Some(external_id),
            PublishOutcome::Failure { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PublishOutcome::Success { .. } => None,
            PublishOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<String, PublishError>> for PublishOutcome {
    fn from(result: Result<String, PublishError>) -> Self {
        match result {
            Ok(external_id) => PublishOutcome::Success { external_id },
            Err(error) => error.into(),
        }
    }
}

impl From<PublishError> for PublishOutcome {
    fn from(error: PublishError) -> Self {
        PublishOutcome::Failure {
            kind: error.kind(),
            attempts: error.attempts(),
            detail: error.to_string(),
        }
    }
}

/// Overall status of a publish call
///
/// `PartialOrFull` says nothing about individual platforms; inspect
/// [`AggregateResult::outcomes`] to detect partial failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Success,
    PartialOrFull,
    Failed,
}

/// Aggregate result of one publish call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub request_id: Uuid,
    pub overall_status: OverallStatus,
    pub outcomes: BTreeMap<String, PublishOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl AggregateResult {
    /// Platforms that published successfully
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(platform, _)| platform.as_str())
            .collect()
    }

    /// Platforms that failed, so the caller can retry only those
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(platform, _)| platform.as_str())
            .collect()
    }

    /// True when staging succeeded and every requested platform succeeded
    pub fn is_full_success(&self) -> bool {
        self.overall_status != OverallStatus::Failed
            && self.outcomes.values().all(PublishOutcome::is_success)
    }
}
