//! TikTok Plugin - Direct post through the Content Posting API
//!
//! TikTok takes the raw bytes. An init call announces the size and chunk
//! layout and returns an upload URL; the bytes are then sent to that URL in
//! ascending chunks. TikTok answers intermediate chunks with 206 and the
//! final one with 201.

use crate::core::chunked_uploader::{ChunkPlan, ChunkedUploader, DEFAULT_CHUNK_SIZE, HttpChunkSink};
use crate::core::config::{DEFAULT_TIKTOK_API_BASE, TiktokConfig};
use crate::core::error::PublishError;
use crate::core::traits::{TransferAdapter, VideoAsset};
use crate::plugins::http_client::{excerpt, parse_json_body, read_response, string_field};
use crate::security::SecureTokenManager;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

/// Registry name of this adapter
pub const PLATFORM_NAME: &str = "tiktok";

const DEFAULT_PRIVACY_LEVEL: &str = "MUTUAL_FOLLOW_FRIENDS";

/// Content type of every uploaded chunk
const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Upload session returned by the init call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    pub upload_url: String,
    pub publish_id: String,
}

/// TikTok transfer adapter
pub struct TiktokAdapter {
    client: reqwest::Client,
    api_base: String,
    access_token: Option<SecretString>,
    chunk_size: u64,
    privacy_level: String,
}

fn init_error(message: impl Into<String>) -> PublishError {
    PublishError::InitError {
        platform: PLATFORM_NAME.to_string(),
        message: message.into(),
    }
}

impl TiktokAdapter {
    pub fn new(
        client: reqwest::Client,
        config: &TiktokConfig,
        access_token: Option<SecretString>,
    ) -> Self {
        if access_token.is_none() {
            tracing::warn!(platform = PLATFORM_NAME, "No access token configured");
        }

        Self {
            client,
            api_base: config
                .api_base
                .as_deref()
                .unwrap_or(DEFAULT_TIKTOK_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            access_token,
            chunk_size: config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            privacy_level: config
                .privacy_level
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIVACY_LEVEL.to_string()),
        }
    }

    fn access_token(&self) -> Result<&str, PublishError> {
        self.access_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or_else(|| init_error("アクセストークンが設定されていません (TIKTOK_ACCESS_TOKEN)"))
    }

    fn mask(&self, text: &str) -> String {
        match &self.access_token {
            Some(token) => SecureTokenManager::new().mask_secret_in_string(text, token.expose_secret()),
            None => text.to_string(),
        }
    }

    /// Announce the upload and obtain the transfer URL
    pub async fn init_upload(
        &self,
        plan: &ChunkPlan,
        title: &str,
    ) -> Result<TransferSession, PublishError> {
        let token = self.access_token()?;
        let url = format!("{}/video/init/", self.api_base);

        tracing::info!(
            platform = PLATFORM_NAME,
            video_size = plan.total(),
            chunk_count = plan.chunk_count(),
            "Initializing upload"
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .json(&json!({
                "post_info": {
                    "title": title,
                    "privacy_level": self.privacy_level,
                },
                "source_info": {
                    "source": "FILE_UPLOAD",
                    "video_size": plan.total(),
                    "chunk_size": plan.declared_chunk_size(),
                    "total_chunk_count": plan.chunk_count(),
                },
            }))
            .send()
            .await
            .map_err(|e| init_error(format!("request failed: {}", e)))?;

        let (status, body) = read_response(response).await;
        let body = self.mask(&body);
        if !(200..300).contains(&status) {
            return Err(init_error(format!("HTTP {}: {}", status, excerpt(&body))));
        }

        let value = parse_json_body(&body).map_err(init_error)?;

        if let Some(code) = value.pointer("/error/code").and_then(|c| c.as_str())
            && code != "ok"
        {
            let message = value
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .filter(|m| !m.is_empty())
                .unwrap_or(code);
            return Err(init_error(format!("{}: {}", code, message)));
        }

        let missing = |field: &str| PublishError::ResponseParseFailure {
            platform: PLATFORM_NAME.to_string(),
            message: format!("init response has no \"{}\" field", field),
        };

        Ok(TransferSession {
            upload_url: string_field(&value, "/data/upload_url")
                .ok_or_else(|| missing("data.upload_url"))?,
            publish_id: string_field(&value, "/data/publish_id")
                .ok_or_else(|| missing("data.publish_id"))?,
        })
    }
}

#[async_trait]
impl TransferAdapter for TiktokAdapter {
    fn name(&self) -> &str {
        PLATFORM_NAME
    }

    async fn publish(&self, asset: &VideoAsset, title: &str) -> Result<String, PublishError> {
        let uploader = ChunkedUploader::new(
            PLATFORM_NAME,
            HttpChunkSink::new(self.client.clone(), VIDEO_CONTENT_TYPE),
            self.chunk_size,
        )?
        .with_partial_content(true);
        let plan = uploader.plan(asset.len());

        let session = self.init_upload(&plan, title).await?;
        tracing::info!(platform = PLATFORM_NAME, publish_id = %session.publish_id, "Upload initialized");

        let chunks = uploader.upload(&session.upload_url, asset.bytes()).await?;
        tracing::info!(
            platform = PLATFORM_NAME,
            publish_id = %session.publish_id,
            chunks,
            "Video transferred"
        );

        Ok(session.publish_id)
    }
}
