//! Configuration file loader for video-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file base name
const CONFIG_BASENAME: &str = ".video-publish";

/// Recognised configuration file extensions, in lookup order
const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "toml"];

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Explicit config file (replaces the project file lookup)
    pub config_path: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<VideoPublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "platforms.tiktok.chunkSize")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.video-publish.yaml) or the explicit config path
    /// 4. Global config (~/.video-publish.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<VideoPublishConfig, PublishError> {
        let mut configs: Vec<VideoPublishConfig> = Vec::new();

        // 5. Default values (lowest priority)
        configs.push(VideoPublishConfig::default());

        // 4. Global config
        if let Some(global_config) = Self::load_global_config(&options.env).await? {
            configs.push(global_config);
        }

        // 3. Project config
        let project_config = match &options.config_path {
            Some(path) => Some(Self::load_from_path(path).await?),
            None => Self::load_project_config(&options.project_path).await?,
        };
        if let Some(project_config) = project_config {
            configs.push(project_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        // 1. CLI arguments (highest priority)
        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Self::expand_env_vars(merged_config, &options.env)
    }

    /// Load an explicitly named configuration file
    ///
    /// Unlike the discovered files, a missing explicit file is an error.
    pub async fn load_from_path(path: &Path) -> Result<VideoPublishConfig, PublishError> {
        Self::load_config_file(path).await?.ok_or_else(|| {
            PublishError::ConfigError(format!("Config file not found: {}", path.display()))
        })
    }

    /// Load global configuration from ~/.video-publish.{yaml,yml,toml}
    async fn load_global_config(
        env: &HashMap<String, String>,
    ) -> Result<Option<VideoPublishConfig>, PublishError> {
        let home_dir = match env.get("HOME").cloned().or_else(|| env::var("HOME").ok()) {
            Some(home) => PathBuf::from(home),
            None => {
                tracing::debug!("HOME is not set, skipping global config");
                return Ok(None);
            }
        };

        Self::load_first_existing(&home_dir).await
    }

    /// Load project configuration from ./.video-publish.{yaml,yml,toml}
    async fn load_project_config(
        project_path: &Path,
    ) -> Result<Option<VideoPublishConfig>, PublishError> {
        Self::load_first_existing(project_path).await
    }

    async fn load_first_existing(dir: &Path) -> Result<Option<VideoPublishConfig>, PublishError> {
        for extension in CONFIG_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", CONFIG_BASENAME, extension));
            if let Some(config) = Self::load_config_file(&candidate).await? {
                return Ok(Some(config));
            }
        }
        Ok(None)
    }

    /// Load configuration from a YAML or TOML file
    fn load_config_file(
        file_path: &Path,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<VideoPublishConfig>, PublishError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config = Self::parse_config(file_path, &content)?;
            tracing::debug!(path = %file_path.display(), "Loaded config file");

            // Handle extends if present
            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        PublishError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                if let Some(base_config) = Self::load_config_file(&base_path).await? {
                    return Ok(Some(Self::merge_configs(vec![base_config, config])));
                }
                tracing::warn!(path = %base_path.display(), "Extended config file not found");
            }

            Ok(Some(config))
        })
    }

    /// Parse file content, choosing the format from the extension
    fn parse_config(file_path: &Path, content: &str) -> Result<VideoPublishConfig, PublishError> {
        let is_toml = file_path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            toml::from_str(content).map_err(|e| {
                PublishError::ConfigError(format!("Failed to parse TOML config: {}", e))
            })
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                PublishError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })
        }
    }

    /// Configuration with every optional section unset
    fn empty_config() -> VideoPublishConfig {
        VideoPublishConfig {
            version: String::new(),
            extends: None,
            platforms: PlatformConfigs::default(),
            staging: None,
            retry: None,
            http: None,
            publish: None,
            security: None,
        }
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<VideoPublishConfig> {
        let mut config = Self::empty_config();
        let mut has_changes = false;

        // VIDEO_PUBLISH_TIMEOUT_SECS -> http.timeoutSecs
        if let Some(timeout) = Self::parse_env::<u64>(env, "VIDEO_PUBLISH_TIMEOUT_SECS") {
            config.http = Some(HttpConfig {
                timeout_secs: Some(timeout),
            });
            has_changes = true;
        }

        // VIDEO_PUBLISH_MAX_ATTEMPTS -> retry.maxAttempts
        if let Some(max_attempts) = Self::parse_env::<u32>(env, "VIDEO_PUBLISH_MAX_ATTEMPTS") {
            config.retry = Some(RetryConfig {
                max_attempts: Some(max_attempts),
                initial_delay_ms: None,
                multiplier: None,
            });
            has_changes = true;
        }

        // VIDEO_PUBLISH_MAX_CONCURRENCY -> publish.maxConcurrency
        if let Some(max_concurrency) =
            Self::parse_env::<usize>(env, "VIDEO_PUBLISH_MAX_CONCURRENCY")
        {
            config.publish = Some(PublishOptionsConfig {
                max_concurrency: Some(max_concurrency),
            });
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }

    fn parse_env<T: std::str::FromStr>(env: &HashMap<String, String>, name: &str) -> Option<T> {
        let raw = env.get(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(variable = name, value = %raw, "Ignoring unparsable environment override");
                None
            }
        }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<VideoPublishConfig>) -> VideoPublishConfig {
        let mut result = VideoPublishConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut VideoPublishConfig, source: VideoPublishConfig) {
        // Version
        if !source.version.is_empty() {
            target.version = source.version;
        }

        // Extends
        if source.extends.is_some() {
            target.extends = source.extends;
        }

        // Platforms (whole section per platform)
        if source.platforms.instagram.is_some() {
            target.platforms.instagram = source.platforms.instagram;
        }
        if source.platforms.tiktok.is_some() {
            target.platforms.tiktok = source.platforms.tiktok;
        }
        if source.platforms.youtube.is_some() {
            target.platforms.youtube = source.platforms.youtube;
        }

        // Staging
        if source.staging.is_some() {
            target.staging = source.staging;
        }

        // Retry (field by field, env overrides set a single field)
        if let Some(source_retry) = source.retry {
            let target_retry = target.retry.get_or_insert_with(RetryConfig::default);
            if source_retry.max_attempts.is_some() {
                target_retry.max_attempts = source_retry.max_attempts;
            }
            if source_retry.initial_delay_ms.is_some() {
                target_retry.initial_delay_ms = source_retry.initial_delay_ms;
            }
            if source_retry.multiplier.is_some() {
                target_retry.multiplier = source_retry.multiplier;
            }
        }

        // HTTP
        if let Some(source_http) = source.http
            && source_http.timeout_secs.is_some()
        {
            target.http = Some(source_http);
        }

        // Publish options
        if let Some(source_publish) = source.publish
            && source_publish.max_concurrency.is_some()
        {
            target.publish = Some(source_publish);
        }

        // Security
        if source.security.is_some() {
            target.security = source.security;
        }
    }

    /// Expand environment variables in configuration
    ///
    /// Security features:
    /// - Only expands variables matching ${VAR_NAME} pattern
    /// - Respects allowedPrefixes if configured
    /// - Checks forbiddenPatterns if configured
    fn expand_env_vars(
        mut config: VideoPublishConfig,
        env: &HashMap<String, String>,
    ) -> Result<VideoPublishConfig, PublishError> {
        let expansion = config
            .security
            .as_ref()
            .and_then(|s| s.env_var_expansion.clone());

        let enabled = expansion.as_ref().and_then(|e| e.enabled).unwrap_or(true);
        if !enabled {
            return Ok(config);
        }

        let allowed_prefixes = expansion.as_ref().and_then(|e| e.allowed_prefixes.clone());

        let forbidden_patterns: Vec<Regex> = expansion
            .as_ref()
            .and_then(|e| e.forbidden_patterns.clone())
            .unwrap_or_default()
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let expand = |value: &mut Option<String>| -> Result<(), PublishError> {
            if let Some(current) = value.as_deref() {
                *value = Some(Self::expand_string(
                    current,
                    env,
                    &allowed_prefixes,
                    &forbidden_patterns,
                )?);
            }
            Ok(())
        };

        if let Some(instagram) = &mut config.platforms.instagram {
            expand(&mut instagram.account_id)?;
            expand(&mut instagram.access_token)?;
            expand(&mut instagram.api_base)?;
            expand(&mut instagram.status_api_base)?;
        }

        if let Some(tiktok) = &mut config.platforms.tiktok {
            expand(&mut tiktok.access_token)?;
            expand(&mut tiktok.api_base)?;
        }

        if let Some(youtube) = &mut config.platforms.youtube {
            expand(&mut youtube.access_token)?;
            expand(&mut youtube.upload_url)?;
        }

        if let Some(staging) = &mut config.staging {
            expand(&mut staging.cloud_name)?;
            expand(&mut staging.upload_preset)?;
            expand(&mut staging.upload_url)?;
        }

        Ok(config)
    }

    /// Expand environment variables in a single string
    fn expand_string(
        input: &str,
        env: &HashMap<String, String>,
        allowed_prefixes: &Option<Vec<String>>,
        forbidden_patterns: &[Regex],
    ) -> Result<String, PublishError> {
        let env_var_regex = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| PublishError::ConfigError(format!("Invalid env var pattern: {}", e)))?;

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];

            if forbidden_patterns.iter().any(|p| p.is_match(var_name)) {
                tracing::warn!(variable = var_name, "Environment variable matches forbidden pattern, skipping");
                continue;
            }

            if let Some(prefixes) = allowed_prefixes {
                let allowed = prefixes.iter().any(|prefix| var_name.starts_with(prefix));
                if !allowed {
                    tracing::warn!(variable = var_name, "Environment variable not allowed by prefix whitelist, skipping");
                    continue;
                }
            }

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                tracing::warn!(variable = var_name, "Environment variable not found");
            }
        }

        Ok(result)
    }

    /// Validate configuration
    pub fn validate(config: &VideoPublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string (e.g., \"1.0\")".to_string()),
                actual: Some("empty".to_string()),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Validate platforms
        Self::validate_platforms(&config.platforms, &mut errors, &mut warnings);

        // 3. Validate staging
        if config.staging.as_ref().and_then(StagingConfig::resolved_upload_url).is_none() {
            warnings.push(ConfigValidationWarning {
                field: "staging".to_string(),
                message: "Staging store is not configured".to_string(),
                suggestion: Some("Set staging.cloudName and staging.uploadPreset".to_string()),
            });
        }

        // 4. Validate retry and transport settings
        if let Some(retry) = &config.retry {
            Self::validate_retry(retry, &mut errors);
        }

        if let Some(http) = &config.http
            && http.timeout_secs == Some(0)
        {
            errors.push(ConfigValidationError {
                field: "http.timeoutSecs".to_string(),
                message: "timeoutSecs must be greater than zero".to_string(),
                expected: Some("positive integer".to_string()),
                actual: Some("0".to_string()),
            });
        }

        if config.max_concurrency() == Some(0) {
            errors.push(ConfigValidationError {
                field: "publish.maxConcurrency".to_string(),
                message: "maxConcurrency must be greater than zero".to_string(),
                expected: Some("positive integer".to_string()),
                actual: Some("0".to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Validate platform configurations
    fn validate_platforms(
        platforms: &PlatformConfigs,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let instagram_enabled = platforms
            .instagram
            .as_ref()
            .is_some_and(|c| c.enabled.unwrap_or(true));
        let tiktok_enabled = platforms
            .tiktok
            .as_ref()
            .is_some_and(|c| c.enabled.unwrap_or(true));
        let youtube_enabled = platforms
            .youtube
            .as_ref()
            .is_some_and(|c| c.enabled.unwrap_or(true));

        if !instagram_enabled && !tiktok_enabled && !youtube_enabled {
            warnings.push(ConfigValidationWarning {
                field: "platforms".to_string(),
                message: "No platform is enabled".to_string(),
                suggestion: Some("Add platforms.instagram, platforms.tiktok or platforms.youtube".to_string()),
            });
        }

        if let Some(instagram) = &platforms.instagram
            && instagram_enabled
            && instagram.account_id.as_deref().unwrap_or("").is_empty()
        {
            errors.push(ConfigValidationError {
                field: "platforms.instagram.accountId".to_string(),
                message: "accountId is required".to_string(),
                expected: Some("non-empty string".to_string()),
                actual: Some("empty".to_string()),
            });
        }

        if let Some(tiktok) = &platforms.tiktok
            && tiktok.chunk_size == Some(0)
        {
            errors.push(ConfigValidationError {
                field: "platforms.tiktok.chunkSize".to_string(),
                message: "chunkSize must be greater than zero".to_string(),
                expected: Some("positive integer (bytes)".to_string()),
                actual: Some("0".to_string()),
            });
        }
    }

    /// Validate retry settings
    fn validate_retry(retry: &RetryConfig, errors: &mut Vec<ConfigValidationError>) {
        if retry.max_attempts == Some(0) {
            errors.push(ConfigValidationError {
                field: "retry.maxAttempts".to_string(),
                message: "maxAttempts must be at least 1".to_string(),
                expected: Some("positive integer".to_string()),
                actual: Some("0".to_string()),
            });
        }

        if let Some(multiplier) = retry.multiplier
            && (!multiplier.is_finite() || multiplier < 1.0)
        {
            errors.push(ConfigValidationError {
                field: "retry.multiplier".to_string(),
                message: "multiplier must not shrink the delay".to_string(),
                expected: Some(">= 1.0".to_string()),
                actual: Some(multiplier.to_string()),
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}
