//! Configuration structures and types for video-publisher
//!
//! This module provides type-safe configuration management with serde support.

use crate::core::chunked_uploader::DEFAULT_CHUNK_SIZE;
use crate::core::error::PublishError;
use crate::core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Instagram Graph API base
pub const DEFAULT_INSTAGRAM_API_BASE: &str = "https://graph.facebook.com/v20.0";

/// Default Instagram container status API base
pub const DEFAULT_INSTAGRAM_STATUS_API_BASE: &str = "https://graph.instagram.com/v12.0";

/// Default TikTok content posting API base
pub const DEFAULT_TIKTOK_API_BASE: &str = "https://open.tiktokapis.com/v2/post/publish";

/// Default YouTube multipart upload endpoint
pub const DEFAULT_YOUTUBE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoPublishConfig {
    /// Schema version (required)
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Platform-specific configurations
    #[serde(default)]
    pub platforms: PlatformConfigs,

    /// Staging store settings (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging: Option<StagingConfig>,

    /// Commit retry settings (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// HTTP client settings (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,

    /// Publish options (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOptionsConfig>,

    /// Security settings (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

/// Platform configurations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlatformConfigs {
    /// Instagram (reference adapter)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<InstagramConfig>,

    /// TikTok (chunked transfer adapter)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<TiktokConfig>,

    /// YouTube (multipart transfer adapter)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube: Option<YoutubeConfig>,
}

/// Instagram configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InstagramConfig {
    /// Enable this platform (default: true if defined)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Instagram business account id
    #[serde(skip_serializing_if = "Option::is_none", rename = "accountId")]
    pub account_id: Option<String>,

    /// Access token (falls back to INSTAGRAM_ACCESS_TOKEN)
    #[serde(skip_serializing_if = "Option::is_none", rename = "accessToken")]
    pub access_token: Option<String>,

    /// Graph API base (default: https://graph.facebook.com/v20.0)
    #[serde(skip_serializing_if = "Option::is_none", rename = "apiBase")]
    pub api_base: Option<String>,

    /// Status API base (default: https://graph.instagram.com/v12.0)
    #[serde(skip_serializing_if = "Option::is_none", rename = "statusApiBase")]
    pub status_api_base: Option<String>,

    /// Media type of the container (default: "REELS")
    #[serde(skip_serializing_if = "Option::is_none", rename = "mediaType")]
    pub media_type: Option<String>,
}

/// TikTok configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TiktokConfig {
    /// Enable this platform (default: true if defined)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Access token (falls back to TIKTOK_ACCESS_TOKEN)
    #[serde(skip_serializing_if = "Option::is_none", rename = "accessToken")]
    pub access_token: Option<String>,

    /// Content posting API base
    #[serde(skip_serializing_if = "Option::is_none", rename = "apiBase")]
    pub api_base: Option<String>,

    /// Chunk size in bytes (default: 5 MiB)
    #[serde(skip_serializing_if = "Option::is_none", rename = "chunkSize")]
    pub chunk_size: Option<u64>,

    /// Privacy level (default: "MUTUAL_FOLLOW_FRIENDS")
    #[serde(skip_serializing_if = "Option::is_none", rename = "privacyLevel")]
    pub privacy_level: Option<String>,
}

/// YouTube configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct YoutubeConfig {
    /// Enable this platform (default: true if defined)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Access token (falls back to YOUTUBE_ACCESS_TOKEN)
    #[serde(skip_serializing_if = "Option::is_none", rename = "accessToken")]
    pub access_token: Option<String>,

    /// Multipart upload endpoint
    #[serde(skip_serializing_if = "Option::is_none", rename = "uploadUrl")]
    pub upload_url: Option<String>,

    /// Video description (default: empty)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Category id (default: "22", People & Blogs)
    #[serde(skip_serializing_if = "Option::is_none", rename = "categoryId")]
    pub category_id: Option<String>,

    /// Privacy status (default: "private")
    #[serde(skip_serializing_if = "Option::is_none", rename = "privacyStatus")]
    pub privacy_status: Option<PrivacyStatus>,
}

/// YouTube privacy status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Public => "public",
        }
    }
}

/// Staging store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StagingConfig {
    /// Cloud name used to build the upload endpoint
    #[serde(skip_serializing_if = "Option::is_none", rename = "cloudName")]
    pub cloud_name: Option<String>,

    /// Unsigned upload preset
    #[serde(skip_serializing_if = "Option::is_none", rename = "uploadPreset")]
    pub upload_preset: Option<String>,

    /// Full upload endpoint (overrides cloudName)
    #[serde(skip_serializing_if = "Option::is_none", rename = "uploadUrl")]
    pub upload_url: Option<String>,
}

impl StagingConfig {
    /// Upload endpoint, from `uploadUrl` or derived from `cloudName`
    pub fn resolved_upload_url(&self) -> Option<String> {
        self.upload_url.clone().or_else(|| {
            self.cloud_name
                .as_ref()
                .map(|name| format!("https://api.cloudinary.com/v1_1/{}/video/upload", name))
        })
    }
}

/// Retry configuration for commit calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum attempts including the first (default: 5)
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxAttempts")]
    pub max_attempts: Option<u32>,

    /// Initial backoff delay in milliseconds (default: 2000)
    #[serde(skip_serializing_if = "Option::is_none", rename = "initialDelayMs")]
    pub initial_delay_ms: Option<u64>,

    /// Backoff multiplier (default: 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

impl RetryConfig {
    /// Build the retry policy, filling unset values with defaults
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `multiplier` is below 1.0 or not finite.
    pub fn to_policy(&self) -> Result<RetryPolicy, PublishError> {
        let defaults = RetryPolicy::default();
        RetryPolicy::try_new(
            self.max_attempts.unwrap_or(defaults.max_attempts),
            self.initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            self.multiplier.unwrap_or(defaults.backoff_multiplier),
        )
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (default: 60)
    #[serde(skip_serializing_if = "Option::is_none", rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(60))
    }
}

/// Publish options configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PublishOptionsConfig {
    /// Maximum platforms published concurrently (default: all requested)
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxConcurrency")]
    pub max_concurrency: Option<usize>,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// Environment variable expansion settings
    #[serde(skip_serializing_if = "Option::is_none", rename = "envVarExpansion")]
    pub env_var_expansion: Option<EnvVarExpansionConfig>,
}

/// Environment variable expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvVarExpansionConfig {
    /// Enable environment variable expansion (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Allowed environment variable prefixes (default: all)
    #[serde(skip_serializing_if = "Option::is_none", rename = "allowedPrefixes")]
    pub allowed_prefixes: Option<Vec<String>>,

    /// Forbidden patterns (regex) for environment variable names
    #[serde(skip_serializing_if = "Option::is_none", rename = "forbiddenPatterns")]
    pub forbidden_patterns: Option<Vec<String>>,
}

impl VideoPublishConfig {
    /// Retry policy for commit calls
    pub fn retry_policy(&self) -> Result<RetryPolicy, PublishError> {
        match &self.retry {
            Some(retry) => retry.to_policy(),
            None => Ok(RetryPolicy::default()),
        }
    }

    /// Per-request HTTP timeout
    pub fn http_timeout(&self) -> Duration {
        self.http
            .as_ref()
            .map(HttpConfig::timeout)
            .unwrap_or(Duration::from_secs(60))
    }

    /// TikTok chunk size
    pub fn tiktok_chunk_size(&self) -> u64 {
        self.platforms
            .tiktok
            .as_ref()
            .and_then(|t| t.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Concurrency cap, if configured
    pub fn max_concurrency(&self) -> Option<usize> {
        self.publish.as_ref().and_then(|p| p.max_concurrency)
    }
}

/// Default configuration values
impl Default for VideoPublishConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            extends: None,
            platforms: PlatformConfigs::default(),
            staging: None,
            retry: Some(RetryConfig::default()),
            http: Some(HttpConfig::default()),
            publish: None,
            security: Some(SecurityConfig::default()),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            initial_delay_ms: Some(2000),
            multiplier: Some(2.0),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(60),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            env_var_expansion: Some(EnvVarExpansionConfig {
                enabled: Some(true),
                allowed_prefixes: None,
                forbidden_patterns: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VideoPublishConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.security.is_some());
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        assert_eq!(config.tiktok_chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_serialize_config() {
        let config = VideoPublishConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("version: '1.0'"));
        assert!(yaml.contains("maxAttempts: 5"));
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let yaml = r#"
version: "1.0"
platforms:
  instagram:
    accountId: "1784"
    accessToken: "${INSTAGRAM_ACCESS_TOKEN}"
  tiktok:
    chunkSize: 10485760
"#;
        let config: VideoPublishConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        let instagram = config.platforms.instagram.as_ref().unwrap();
        assert_eq!(instagram.account_id.as_deref(), Some("1784"));
        assert_eq!(config.tiktok_chunk_size(), 10 * 1024 * 1024);
        assert!(config.retry.is_none());
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
    }

    #[test]
    fn test_deserialize_toml_config() {
        let source = r#"
version = "1.0"

[platforms.youtube]
privacyStatus = "unlisted"
categoryId = "10"

[retry]
maxAttempts = 3
initialDelayMs = 500
"#;
        let config: VideoPublishConfig = toml::from_str(source).unwrap();
        let youtube = config.platforms.youtube.as_ref().unwrap();
        assert_eq!(youtube.privacy_status, Some(PrivacyStatus::Unlisted));

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_invalid_multiplier_is_config_error() {
        let yaml = r#"
version: "1.0"
retry:
  multiplier: -1.0
"#;
        let config: VideoPublishConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(matches!(
            config.retry_policy(),
            Err(PublishError::ConfigError(_))
        ));
    }

    #[test]
    fn test_staging_upload_url_from_cloud_name() {
        let staging = StagingConfig {
            cloud_name: Some("demo".to_string()),
            upload_preset: Some("unsigned".to_string()),
            upload_url: None,
        };
        assert_eq!(
            staging.resolved_upload_url().unwrap(),
            "https://api.cloudinary.com/v1_1/demo/video/upload"
        );

        let overridden = StagingConfig {
            upload_url: Some("http://localhost/upload".to_string()),
            ..staging
        };
        assert_eq!(
            overridden.resolved_upload_url().unwrap(),
            "http://localhost/upload"
        );
    }

    #[test]
    fn test_privacy_status_serialization() {
        let yaml = serde_yaml::to_string(&PrivacyStatus::Public).unwrap();
        assert!(yaml.contains("public"));
        assert_eq!(PrivacyStatus::default().as_str(), "private");
    }
}
