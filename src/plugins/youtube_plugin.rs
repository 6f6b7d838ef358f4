//! YouTube Plugin - Multipart upload through the Data API
//!
//! The metadata and the raw bytes go to YouTube in a single multipart request.

use crate::core::config::{DEFAULT_YOUTUBE_UPLOAD_URL, YoutubeConfig};
use crate::core::error::PublishError;
use crate::core::traits::{TransferAdapter, VideoAsset};
use crate::plugins::http_client::{excerpt, parse_json_body, read_response, string_field};
use crate::security::SecureTokenManager;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

/// Registry name of this adapter
pub const PLATFORM_NAME: &str = "youtube";

/// Largest file YouTube accepts (256 GiB)
pub const MAX_UPLOAD_SIZE: u64 = 256 * 1024 * 1024 * 1024;

/// "People & Blogs"
const DEFAULT_CATEGORY_ID: &str = "22";

/// YouTube transfer adapter
pub struct YoutubeAdapter {
    client: reqwest::Client,
    upload_url: String,
    access_token: Option<SecretString>,
    description: String,
    category_id: String,
    privacy_status: String,
    max_upload_size: u64,
}

impl YoutubeAdapter {
    pub fn new(
        client: reqwest::Client,
        config: &YoutubeConfig,
        access_token: Option<SecretString>,
    ) -> Self {
        if access_token.is_none() {
            tracing::warn!(platform = PLATFORM_NAME, "No access token configured");
        }

        Self {
            client,
            upload_url: config
                .upload_url
                .clone()
                .unwrap_or_else(|| DEFAULT_YOUTUBE_UPLOAD_URL.to_string()),
            access_token,
            description: config.description.clone().unwrap_or_default(),
            category_id: config
                .category_id
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
            privacy_status: config
                .privacy_status
                .unwrap_or_default()
                .as_str()
                .to_string(),
            max_upload_size: MAX_UPLOAD_SIZE,
        }
    }

    /// Override the size limit
    pub fn with_max_upload_size(mut self, max_upload_size: u64) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    fn init_error(message: impl Into<String>) -> PublishError {
        PublishError::InitError {
            platform: PLATFORM_NAME.to_string(),
            message: message.into(),
        }
    }

    fn commit_error(message: impl Into<String>, status: Option<u16>) -> PublishError {
        PublishError::CommitError {
            platform: PLATFORM_NAME.to_string(),
            message: message.into(),
            status,
            attempts: 1,
            exhausted: false,
        }
    }

    fn mask(&self, text: &str) -> String {
        match &self.access_token {
            Some(token) => SecureTokenManager::new().mask_secret_in_string(text, token.expose_secret()),
            None => text.to_string(),
        }
    }

    /// Video resource sent as the metadata part
    fn metadata(&self, title: &str) -> serde_json::Value {
        json!({
            "snippet": {
                "title": title,
                "description": self.description,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy_status,
            },
        })
    }

    fn build_form(&self, asset: &VideoAsset, title: &str) -> Result<Form, PublishError> {
        let metadata = Part::text(self.metadata(title).to_string())
            .mime_str("application/json")
            .map_err(|e| Self::init_error(format!("invalid metadata part: {}", e)))?;

        let media = Part::stream_with_length(reqwest::Body::from(asset.bytes().clone()), asset.len())
            .file_name(asset.name().to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| Self::init_error(format!("invalid media part: {}", e)))?;

        Ok(Form::new().part("json", metadata).part("media", media))
    }
}

#[async_trait]
impl TransferAdapter for YoutubeAdapter {
    fn name(&self) -> &str {
        PLATFORM_NAME
    }

    async fn publish(&self, asset: &VideoAsset, title: &str) -> Result<String, PublishError> {
        if asset.len() > self.max_upload_size {
            return Err(Self::init_error(format!(
                "ファイルサイズが上限を超えています ({} > {} bytes)",
                asset.len(),
                self.max_upload_size
            )));
        }

        let token = self
            .access_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or_else(|| {
                Self::init_error("アクセストークンが設定されていません (YOUTUBE_ACCESS_TOKEN)")
            })?;

        let form = self.build_form(asset, title)?;

        tracing::info!(
            platform = PLATFORM_NAME,
            file_name = asset.name(),
            size = asset.len(),
            "Uploading video"
        );

        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("uploadType", "multipart"), ("part", "snippet,status")])
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::commit_error(format!("request failed: {}", e), None))?;

        let (status, body) = read_response(response).await;
        let body = self.mask(&body);
        if status != 200 {
            return Err(Self::commit_error(
                format!("HTTP {}: {}", status, excerpt(&body)),
                Some(status),
            ));
        }

        let value = parse_json_body(&body).map_err(|message| Self::commit_error(message, None))?;
        let video_id =
            string_field(&value, "/id").ok_or_else(|| PublishError::ResponseParseFailure {
                platform: PLATFORM_NAME.to_string(),
                message: "upload response has no \"id\" field".to_string(),
            })?;

        tracing::info!(platform = PLATFORM_NAME, video_id = %video_id, "Video uploaded");
        Ok(video_id)
    }
}
