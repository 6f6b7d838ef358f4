//! HTTP staging store
//!
//! Uploads the asset once to a Cloudinary-style unsigned upload endpoint and
//! hands the hosted URL to every reference adapter of the request.

use crate::core::config::StagingConfig;
use crate::core::error::PublishError;
use crate::core::traits::{StagedReference, StagingStore, VideoAsset};
use crate::plugins::http_client::{excerpt, parse_json_body, read_response, string_field};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

/// Staging store backed by a multipart upload endpoint
#[derive(Debug, Clone)]
pub struct HttpStagingStore {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: Option<String>,
}

fn staging_failure(message: impl Into<String>) -> PublishError {
    PublishError::StagingFailure {
        message: message.into(),
    }
}

impl HttpStagingStore {
    pub fn new(
        client: reqwest::Client,
        upload_url: impl Into<String>,
        upload_preset: Option<String>,
    ) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
            upload_preset,
        }
    }

    /// Build the store from the `staging` section
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither `uploadUrl` nor `cloudName`
    /// is set.
    pub fn from_config(
        config: Option<&StagingConfig>,
        client: reqwest::Client,
    ) -> Result<Self, PublishError> {
        let config = config.ok_or_else(|| {
            PublishError::ConfigError("staging セクションが設定されていません".to_string())
        })?;
        let upload_url = config.resolved_upload_url().ok_or_else(|| {
            PublishError::ConfigError(
                "staging.cloudName または staging.uploadUrl を設定してください".to_string(),
            )
        })?;

        Ok(Self::new(client, upload_url, config.upload_preset.clone()))
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }
}

#[async_trait]
impl StagingStore for HttpStagingStore {
    async fn stage(&self, asset: &VideoAsset) -> Result<StagedReference, PublishError> {
        let file = Part::stream_with_length(reqwest::Body::from(asset.bytes().clone()), asset.len())
            .file_name(asset.name().to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| staging_failure(format!("invalid file part: {}", e)))?;

        let mut form = Form::new().part("file", file);
        if let Some(preset) = &self.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }

        tracing::info!(file_name = asset.name(), size = asset.len(), "Staging video");

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| staging_failure(format!("request failed: {}", e)))?;

        let (status, body) = read_response(response).await;
        if !(200..300).contains(&status) {
            return Err(staging_failure(format!(
                "HTTP {}: {}",
                status,
                excerpt(&body)
            )));
        }

        let value = parse_json_body(&body).map_err(staging_failure)?;
        let url = string_field(&value, "/secure_url")
            .or_else(|| string_field(&value, "/url"))
            .ok_or_else(|| staging_failure("upload response has no \"secure_url\" or \"url\" field"))?;

        tracing::info!(url = %url, "Video staged");
        Ok(StagedReference::new(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> HttpStagingStore {
        HttpStagingStore::new(
            reqwest::Client::new(),
            format!("{}/v1_1/demo/video/upload", server.uri()),
            Some("unsigned_video".to_string()),
        )
    }

    #[tokio::test]
    async fn test_stage_returns_secure_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1_1/demo/video/upload"))
            .and(body_string_contains("unsigned_video"))
            .and(body_string_contains(r#"filename="clip.mp4""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secure_url": "https://res.cloudinary.com/demo/video/upload/v1/clip.mp4",
                "url": "http://res.cloudinary.com/demo/video/upload/v1/clip.mp4"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let asset = VideoAsset::new("clip.mp4", b"video".to_vec());
        let staged = store(&server).stage(&asset).await.unwrap();

        assert_eq!(
            staged.url(),
            "https://res.cloudinary.com/demo/video/upload/v1/clip.mp4"
        );
    }

    #[tokio::test]
    async fn test_stage_falls_back_to_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"url": "http://cdn/clip.mp4"})),
            )
            .mount(&server)
            .await;

        let asset = VideoAsset::new("clip.mp4", b"video".to_vec());
        let staged = store(&server).stage(&asset).await.unwrap();

        assert_eq!(staged.url(), "http://cdn/clip.mp4");
    }

    #[tokio::test]
    async fn test_stage_failure_on_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Upload preset not found"}
            })))
            .mount(&server)
            .await;

        let asset = VideoAsset::new("clip.mp4", b"video".to_vec());
        let error = store(&server).stage(&asset).await.unwrap_err();

        assert!(matches!(error, PublishError::StagingFailure { .. }));
        assert!(error.to_string().contains("Upload preset not found"));
    }

    #[tokio::test]
    async fn test_stage_failure_on_missing_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"public_id": "x"})))
            .mount(&server)
            .await;

        let asset = VideoAsset::new("clip.mp4", b"video".to_vec());
        let error = store(&server).stage(&asset).await.unwrap_err();

        assert!(matches!(error, PublishError::StagingFailure { .. }));
    }

    #[test]
    fn test_from_config() {
        let config = StagingConfig {
            cloud_name: Some("demo".to_string()),
            upload_preset: None,
            upload_url: None,
        };
        let store = HttpStagingStore::from_config(Some(&config), reqwest::Client::new()).unwrap();
        assert_eq!(
            store.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/video/upload"
        );

        let missing = HttpStagingStore::from_config(None, reqwest::Client::new());
        assert!(matches!(missing, Err(PublishError::ConfigError(_))));

        let empty = HttpStagingStore::from_config(Some(&StagingConfig::default()), reqwest::Client::new());
        assert!(matches!(empty, Err(PublishError::ConfigError(_))));
    }
}
