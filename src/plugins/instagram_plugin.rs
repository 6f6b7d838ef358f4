//! Instagram Plugin - Reels publishing through the Graph API
//!
//! Instagram pulls the video from a hosted URL. Publishing is two calls: a
//! media container is created from the staged URL, then the container is
//! published. The publish call fails with "Media ID is not available" until
//! Instagram has finished processing the video, so it runs under the retry
//! policy.

use crate::core::config::{
    DEFAULT_INSTAGRAM_API_BASE, DEFAULT_INSTAGRAM_STATUS_API_BASE, InstagramConfig,
};
use crate::core::error::PublishError;
use crate::core::retry::{ErrorClass, RetryPolicy};
use crate::core::traits::{ReferenceAdapter, StagedReference};
use crate::plugins::http_client::{excerpt, parse_json_body, read_response, string_field};
use crate::security::SecureTokenManager;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::fmt;

/// Registry name of this adapter
pub const PLATFORM_NAME: &str = "instagram";

/// Error body fragment returned while the container is still processing
pub const NOT_READY_SIGNAL: &str = "Media ID is not available";

const DEFAULT_MEDIA_TYPE: &str = "REELS";

/// Instagram reference adapter
pub struct InstagramAdapter {
    client: reqwest::Client,
    api_base: String,
    status_api_base: String,
    account_id: Option<String>,
    access_token: Option<SecretString>,
    media_type: String,
    retry_policy: RetryPolicy,
}

/// Failure of a single `media_publish` attempt
#[derive(Debug)]
enum CommitAttemptError {
    Rejected { status: u16, body: String },
    Transport(String),
    Unreadable(String),
    MissingId,
}

impl fmt::Display for CommitAttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, body } => write!(f, "HTTP {}: {}", status, excerpt(body)),
            Self::Transport(message) => write!(f, "request failed: {}", message),
            Self::Unreadable(message) => f.write_str(message),
            Self::MissingId => f.write_str("response has no \"id\" field"),
        }
    }
}

impl CommitAttemptError {
    /// Only HTTP 400 carrying the processing signal is worth retrying
    fn classify(&self) -> ErrorClass {
        match self {
            Self::Rejected { status: 400, body } if body.contains(NOT_READY_SIGNAL) => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Permanent,
        }
    }

    fn into_publish_error(self, attempts: u32, exhausted: bool) -> PublishError {
        match self {
            Self::MissingId => PublishError::ResponseParseFailure {
                platform: PLATFORM_NAME.to_string(),
                message: self.to_string(),
            },
            Self::Rejected { status, .. } => PublishError::CommitError {
                platform: PLATFORM_NAME.to_string(),
                message: self.to_string(),
                status: Some(status),
                attempts,
                exhausted,
            },
            Self::Transport(_) | Self::Unreadable(_) => PublishError::CommitError {
                platform: PLATFORM_NAME.to_string(),
                message: self.to_string(),
                status: None,
                attempts,
                exhausted,
            },
        }
    }
}

fn init_error(message: impl Into<String>) -> PublishError {
    PublishError::InitError {
        platform: PLATFORM_NAME.to_string(),
        message: message.into(),
    }
}

impl InstagramAdapter {
    pub fn new(
        client: reqwest::Client,
        config: &InstagramConfig,
        access_token: Option<SecretString>,
        retry_policy: RetryPolicy,
    ) -> Self {
        let api_base = config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_INSTAGRAM_API_BASE)
            .trim_end_matches('/')
            .to_string();
        let status_api_base = config
            .status_api_base
            .as_deref()
            .unwrap_or(DEFAULT_INSTAGRAM_STATUS_API_BASE)
            .trim_end_matches('/')
            .to_string();

        if access_token.is_none() {
            tracing::warn!(platform = PLATFORM_NAME, "No access token configured");
        }

        Self {
            client,
            api_base,
            status_api_base,
            account_id: config.account_id.clone().filter(|id| !id.is_empty()),
            access_token,
            media_type: config
                .media_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
            retry_policy,
        }
    }

    fn account_id(&self) -> Result<&str, PublishError> {
        self.account_id
            .as_deref()
            .ok_or_else(|| init_error("accountId が設定されていません"))
    }

    fn access_token(&self) -> Result<&str, PublishError> {
        self.access_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or_else(|| init_error("アクセストークンが設定されていません (INSTAGRAM_ACCESS_TOKEN)"))
    }

    /// Keep the token out of anything that ends up in an error or a log line
    fn mask(&self, text: &str) -> String {
        match &self.access_token {
            Some(token) => SecureTokenManager::new().mask_secret_in_string(text, token.expose_secret()),
            None => text.to_string(),
        }
    }

    /// Create a media container for the hosted video, returning its id
    pub async fn create_container(
        &self,
        video_url: &str,
        caption: &str,
    ) -> Result<String, PublishError> {
        let account_id = self.account_id()?;
        let token = self.access_token()?;
        let url = format!("{}/{}/media", self.api_base, account_id);

        tracing::info!(platform = PLATFORM_NAME, video_url, "Creating media container");

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "video_url": video_url,
                "media_type": self.media_type,
                "caption": caption,
                "access_token": token,
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
        string_field(&value, "/id").ok_or_else(|| PublishError::ResponseParseFailure {
            platform: PLATFORM_NAME.to_string(),
            message: "container response has no \"id\" field".to_string(),
        })
    }

    /// Publish a container, retrying while Instagram is still processing it
    pub async fn publish_container(&self, creation_id: &str) -> Result<String, PublishError> {
        let account_id = self.account_id()?;
        let token = self.access_token()?;
        let url = format!("{}/{}/media_publish", self.api_base, account_id);

        tracing::debug!(
            platform = PLATFORM_NAME,
            max_attempts = self.retry_policy.max_attempts,
            max_wait_ms = self.retry_policy.max_total_delay().as_millis() as u64,
            "Publishing container under retry policy"
        );

        self.retry_policy
            .run(
                || self.attempt_publish(&url, token, creation_id),
                CommitAttemptError::classify,
            )
            .await
            .map_err(|failure| failure.error.into_publish_error(failure.attempts, failure.exhausted))
    }

    async fn attempt_publish(
        &self,
        url: &str,
        token: &str,
        creation_id: &str,
    ) -> Result<String, CommitAttemptError> {
        tracing::debug!(platform = PLATFORM_NAME, creation_id, "Publishing media container");

        let response = self
            .client
            .post(url)
            .json(&json!({
                "creation_id": creation_id,
                "access_token": token,
            }))
            .send()
            .await
            .map_err(|e| CommitAttemptError::Transport(e.to_string()))?;

        let (status, body) = read_response(response).await;
        let body = self.mask(&body);
        if !(200..300).contains(&status) {
            return Err(CommitAttemptError::Rejected { status, body });
        }

        let value = parse_json_body(&body).map_err(CommitAttemptError::Unreadable)?;
        string_field(&value, "/id").ok_or(CommitAttemptError::MissingId)
    }

    /// Fetch the processing status of a media container
    ///
    /// Returns the raw `status_code` (`FINISHED`, `IN_PROGRESS`, `ERROR`, ...).
    pub async fn container_status(&self, container_id: &str) -> Result<String, PublishError> {
        let token = self.access_token()?;
        let url = format!("{}/{}", self.status_api_base, container_id);

        let commit_error = |message: String, status: Option<u16>| PublishError::CommitError {
            platform: PLATFORM_NAME.to_string(),
            message,
            status,
            attempts: 1,
            exhausted: false,
        };

        let response = self
            .client
            .get(&url)
            .query(&[("fields", "status_code")])
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| commit_error(format!("request failed: {}", e), None))?;

        let (status, body) = read_response(response).await;
        let body = self.mask(&body);
        if !(200..300).contains(&status) {
            return Err(commit_error(
                format!("HTTP {}: {}", status, excerpt(&body)),
                Some(status),
            ));
        }

        let value = parse_json_body(&body).map_err(|message| commit_error(message, None))?;
        string_field(&value, "/status_code").ok_or_else(|| PublishError::ResponseParseFailure {
            platform: PLATFORM_NAME.to_string(),
            message: "status response has no \"status_code\" field".to_string(),
        })
    }
}

#[async_trait]
impl ReferenceAdapter for InstagramAdapter {
    fn name(&self) -> &str {
        PLATFORM_NAME
    }

    async fn publish(&self, staged: &StagedReference, title: &str) -> Result<String, PublishError> {
        let creation_id = self.create_container(staged.url(), title).await?;
        tracing::info!(platform = PLATFORM_NAME, creation_id = %creation_id, "Media container created");

        let media_id = self.publish_container(&creation_id).await?;
        tracing::info!(platform = PLATFORM_NAME, media_id = %media_id, "Media published");

        Ok(media_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "EAAB-test-access-token";

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(5), 2.0)
    }

    fn adapter(server: &MockServer, max_attempts: u32) -> InstagramAdapter {
        let config = InstagramConfig {
            account_id: Some("1784".to_string()),
            api_base: Some(server.uri()),
            status_api_base: Some(server.uri()),
            ..Default::default()
        };
        InstagramAdapter::new(
            reqwest::Client::new(),
            &config,
            Some(SecretString::new(TOKEN.to_string().into())),
            fast_policy(max_attempts),
        )
    }

    fn not_ready() -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "Media ID is not available", "code": 9007}
        }))
    }

    async fn mount_container(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_publish_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .and(body_partial_json(json!({
                "video_url": "https://cdn.example.com/v.mp4",
                "media_type": "REELS",
                "caption": "My holiday",
                "access_token": TOKEN,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .and(body_partial_json(json!({"creation_id": "c-1", "access_token": TOKEN})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let media_id = adapter(&server, 5).publish(&staged, "My holiday").await.unwrap();

        assert_eq!(media_id, "m-9");
    }

    #[tokio::test]
    async fn test_publish_retries_until_media_is_ready() {
        let server = MockServer::start().await;
        mount_container(&server).await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(not_ready())
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let media_id = adapter(&server, 5).publish(&staged, "title").await.unwrap();

        assert_eq!(media_id, "m-9");
    }

    #[tokio::test]
    async fn test_publish_exhausts_retry_budget() {
        let server = MockServer::start().await;
        mount_container(&server).await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(not_ready())
            .expect(3)
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter(&server, 3).publish(&staged, "title").await.unwrap_err();

        match error {
            PublishError::CommitError {
                status,
                attempts,
                exhausted,
                message,
                ..
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(attempts, 3);
                assert!(exhausted);
                assert!(message.contains(NOT_READY_SIGNAL));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_bad_request_is_not_retried() {
        let server = MockServer::start().await;
        mount_container(&server).await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Invalid OAuth access token", "code": 190}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter(&server, 5).publish(&staged, "title").await.unwrap_err();

        assert_eq!(error.attempts(), 1);
        assert!(matches!(
            error,
            PublishError::CommitError {
                exhausted: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_not_ready_signal_requires_bad_request_status() {
        let server = MockServer::start().await;
        mount_container(&server).await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(ResponseTemplate::new(500).set_body_string(NOT_READY_SIGNAL))
            .expect(1)
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter(&server, 5).publish(&staged, "title").await.unwrap_err();

        assert_eq!(error.attempts(), 1);
    }

    #[tokio::test]
    async fn test_empty_container_response_is_init_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m-9"})))
            .expect(0)
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter(&server, 5).publish(&staged, "title").await.unwrap_err();

        assert!(matches!(error, PublishError::InitError { .. }));
    }

    #[tokio::test]
    async fn test_container_without_id_is_parse_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter(&server, 5).publish(&staged, "title").await.unwrap_err();

        assert!(matches!(error, PublishError::ResponseParseFailure { .. }));
    }

    #[tokio::test]
    async fn test_unparsable_publish_response_is_not_retried() {
        let server = MockServer::start().await;
        mount_container(&server).await;

        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter(&server, 5).publish(&staged, "title").await.unwrap_err();

        assert!(matches!(
            error,
            PublishError::CommitError {
                attempts: 1,
                status: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_error_body_masks_access_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string(format!("bad token {}", TOKEN)),
            )
            .mount(&server)
            .await;

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter(&server, 5).publish(&staged, "title").await.unwrap_err();

        let display = error.to_string();
        assert!(!display.contains(TOKEN));
        assert!(display.contains("EAA...ken"));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_network() {
        let adapter = InstagramAdapter::new(
            reqwest::Client::new(),
            &InstagramConfig::default(),
            None,
            RetryPolicy::default(),
        );

        let staged = StagedReference::new("https://cdn.example.com/v.mp4");
        let error = adapter.publish(&staged, "title").await.unwrap_err();

        assert!(matches!(error, PublishError::InitError { .. }));
        assert_eq!(adapter.name(), "instagram");
    }

    #[tokio::test]
    async fn test_container_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/c-1"))
            .and(query_param("fields", "status_code"))
            .and(header("Authorization", format!("Bearer {}", TOKEN).as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status_code": "FINISHED", "id": "c-1"})),
            )
            .mount(&server)
            .await;

        let status = adapter(&server, 5).container_status("c-1").await.unwrap();

        assert_eq!(status, "FINISHED");
    }
}
