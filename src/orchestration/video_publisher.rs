//! Video Publisher - Fans one video out to many platforms
//!
//! Features:
//! - Single staging step per request, shared by every reference adapter
//! - One task per platform, all awaited (no short-circuit on failure)
//! - Per-platform failure isolation, including panicking adapters
//! - Optional concurrency cap

use crate::core::error::PublishError;
use crate::core::traits::{
    AggregateResult, OverallStatus, PlatformAdapter, PublishOutcome, PublishRequest,
    StagedReference, StagingStore, VideoAsset,
};
use crate::plugins::adapter_registry::AdapterRegistry;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// VideoPublisher - Orchestrates a publish request across platforms
pub struct VideoPublisher {
    registry: Arc<AdapterRegistry>,
    stager: Arc<dyn StagingStore>,
    max_concurrency: Option<usize>,
}

impl VideoPublisher {
    /// Create a new VideoPublisher
    ///
    /// # Arguments
    ///
    /// * `registry` - Adapters available to this publisher
    /// * `stager` - Store that hosts the asset before fan-out
    pub fn new(registry: Arc<AdapterRegistry>, stager: Arc<dyn StagingStore>) -> Self {
        Self {
            registry,
            stager,
            max_concurrency: None,
        }
    }

    /// Limit how many platforms are published at the same time
    ///
    /// Without a limit every requested platform runs at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency.max(1));
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Publish an asset to the given platforms
    pub async fn publish<I, S>(
        &self,
        asset: VideoAsset,
        title: impl Into<String>,
        platforms: I,
    ) -> AggregateResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = PublishRequest::new(asset, title, platforms);
        self.publish_request(&request).await
    }

    /// Publish a prepared request
    ///
    /// Never fails as a whole: staging failure is reported as an overall
    /// `Failed` status and every platform failure lands in its own outcome.
    pub async fn publish_request(&self, request: &PublishRequest) -> AggregateResult {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("publish", request_id = %request_id);

        self.run(request_id, request).instrument(span).await
    }

    async fn run(&self, request_id: Uuid, request: &PublishRequest) -> AggregateResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let platforms = request.normalized_platforms();

        let finish = |overall_status, outcomes, staging_error| AggregateResult {
            request_id,
            overall_status,
            outcomes,
            staging_error,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };

        if platforms.is_empty() {
            tracing::info!("No platforms requested, nothing to publish");
            return finish(OverallStatus::Success, BTreeMap::new(), None);
        }

        tracing::info!(
            platforms = %platforms.join(","),
            size = request.asset.len(),
            "Publishing video"
        );

        let staged = match self.stager.stage(&request.asset).await {
            Ok(staged) => staged,
            Err(error) => {
                tracing::error!(error = %error, "Staging failed, no platform will be attempted");
                return finish(OverallStatus::Failed, BTreeMap::new(), Some(error.to_string()));
            }
        };

        let outcomes = self.fan_out(&platforms, request, staged).await;

        let result = finish(OverallStatus::PartialOrFull, outcomes, None);
        tracing::info!(
            succeeded = result.succeeded().len(),
            failed = result.failed().len(),
            duration_ms = result.duration_ms,
            "Publish finished"
        );
        result
    }

    /// Run one task per platform and wait for all of them
    async fn fan_out(
        &self,
        platforms: &[String],
        request: &PublishRequest,
        staged: StagedReference,
    ) -> BTreeMap<String, PublishOutcome> {
        let permits = self.max_concurrency.unwrap_or(platforms.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = Vec::new();

        for platform in platforms {
            let semaphore = Arc::clone(&semaphore);
            let registry = Arc::clone(&self.registry);
            let asset = request.asset.clone();
            let title = request.title.clone();
            let staged = staged.clone();
            let platform_for_task = platform.clone();
            let span = tracing::info_span!("platform", platform = %platform);

            let task = tokio::spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    Self::publish_to_platform(&registry, &platform_for_task, &asset, &title, &staged)
                        .await
                }
                .instrument(span),
            );

            tasks.push((platform.clone(), task));
        }

        // Wait for all tasks and collect results
        let mut outcomes = BTreeMap::new();
        for (platform, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    tracing::error!(platform = %platform, error = %join_error, "Platform task aborted");
                    PublishError::TaskAborted {
                        platform: platform.clone(),
                        message: join_error.to_string(),
                    }
                    .into()
                }
            };
            outcomes.insert(platform, outcome);
        }

        outcomes
    }

    /// Resolve and invoke the adapter for one platform
    async fn publish_to_platform(
        registry: &AdapterRegistry,
        platform: &str,
        asset: &VideoAsset,
        title: &str,
        staged: &StagedReference,
    ) -> PublishOutcome {
        let adapter = match registry.resolve(platform) {
            Ok(adapter) => adapter,
            Err(error) => {
                tracing::warn!(error = %error, "Platform is not supported");
                return error.into();
            }
        };

        tracing::debug!(capability = adapter.capability().as_str(), "Adapter resolved");

        let result = match &adapter {
            PlatformAdapter::Reference(adapter) => adapter.publish(staged, title).await,
            PlatformAdapter::Transfer(adapter) => adapter.publish(asset, title).await,
        };

        match &result {
            Ok(external_id) => tracing::info!(external_id = %external_id, "Published"),
            Err(error) => tracing::warn!(code = error.code(), error = %error, "Publish failed"),
        }

        result.into()
    }

    /// Format an aggregate result as a human-readable summary
    pub fn format_summary(result: &AggregateResult) -> String {
        let rule = "=".repeat(60);
        let mut lines = vec![
            String::new(),
            rule.clone(),
            "📊 Publish Summary".to_string(),
            rule.clone(),
            format!("Request: {}", result.request_id),
        ];

        if let Some(staging_error) = &result.staging_error {
            lines.push(format!("\n❌ Staging failed: {}", staging_error));
        }

        let succeeded = result.succeeded();
        lines.push(format!("\n✅ Succeeded: {}", succeeded.len()));
        for platform in &succeeded {
            let external_id = result
                .outcomes
                .get(*platform)
                .and_then(PublishOutcome::external_id)
                .unwrap_or_default();
            lines.push(format!("   - {} ({})", platform, external_id));
        }

        let failed = result.failed();
        lines.push(format!("\n❌ Failed: {}", failed.len()));
        for platform in &failed {
            if let Some(PublishOutcome::Failure {
                detail, attempts, ..
            }) = result.outcomes.get(*platform)
            {
                lines.push(format!("   - {}: {} ({} attempts)", platform, detail, attempts));
            }
        }

        lines.push(format!("\n{}", rule));
        lines.push(format!(
            "Overall Status: {} ({}ms)",
            if result.is_full_success() {
                "✅ SUCCESS"
            } else if result.overall_status == OverallStatus::Failed {
                "❌ FAILED"
            } else {
                "⚠️ PARTIAL"
            },
            result.duration_ms
        ));
        lines.push(rule);

        lines.join("\n")
    }
}
