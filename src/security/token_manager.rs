//! Secure token manager with memory-safe handling and masking capabilities
//!
//! This module provides access token management for the publishing platforms,
//! using the `secrecy` crate to prevent accidental token exposure in logs or memory dumps.

use regex::Regex;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;

/// Supported platforms with their environment variable names
const PLATFORM_TOKENS: &[(&str, &str)] = &[
    ("instagram", "INSTAGRAM_ACCESS_TOKEN"),
    ("tiktok", "TIKTOK_ACCESS_TOKEN"),
    ("youtube", "YOUTUBE_ACCESS_TOKEN"),
];

/// Secure token manager for platform authentication
///
/// # Examples
///
/// ```
/// use video_publisher::security::SecureTokenManager;
/// use secrecy::ExposeSecret;
///
/// let manager = SecureTokenManager::new();
/// if let Some(token) = manager.get_token("tiktok") {
///     println!("TikTok token found: {}", manager.mask_token(token.expose_secret()));
/// }
/// ```
#[derive(Default)]
pub struct SecureTokenManager {
    platform_map: HashMap<String, String>,
}

impl SecureTokenManager {
    /// Creates a new SecureTokenManager with default platform mappings
    ///
    /// # Examples
    ///
    /// ```
    /// use video_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.get_supported_platforms().len(), 3);
    /// ```
    pub fn new() -> Self {
        let platform_map = PLATFORM_TOKENS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self { platform_map }
    }

    /// Retrieves a token for the specified platform from environment variables
    ///
    /// Returns `None` if the platform is not supported or the token is not set.
    pub fn get_token(&self, platform: &str) -> Option<SecretString> {
        let token_name = self.platform_map.get(platform)?;
        let token_value = env::var(token_name).ok()?;
        if token_value.is_empty() {
            return None;
        }
        Some(SecretString::new(token_value.into()))
    }

    /// Resolves the token for a platform, preferring the configured value
    ///
    /// A configured value that still contains an unexpanded `${VAR}` reference
    /// is ignored in favour of the platform's environment variable.
    ///
    /// # Examples
    ///
    /// ```
    /// use video_publisher::security::SecureTokenManager;
    /// use secrecy::ExposeSecret;
    ///
    /// let manager = SecureTokenManager::new();
    /// let token = manager.resolve_token("youtube", Some("ya29.configured")).unwrap();
    /// assert_eq!(token.expose_secret(), "ya29.configured");
    /// ```
    pub fn resolve_token(&self, platform: &str, configured: Option<&str>) -> Option<SecretString> {
        match configured {
            Some(value) if !value.is_empty() && !value.contains("${") => {
                Some(SecretString::new(value.to_string().into()))
            }
            _ => self.get_token(platform),
        }
    }

    /// Checks if a token is set for the specified platform
    pub fn has_token(&self, platform: &str) -> bool {
        self.get_token(platform).is_some()
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use video_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(manager.mask_token("short"), "****");
    /// ```
    pub fn mask_token(&self, token: &str) -> String {
        if token.len() < 10 || !token.is_char_boundary(3) || !token.is_char_boundary(token.len() - 3)
        {
            return "****".to_string();
        }

        let prefix = &token[..3];
        let suffix = &token[token.len() - 3..];
        format!("{}...{}", prefix, suffix)
    }

    /// Masks one specific secret in a string
    ///
    /// Adapters pass response bodies through this with their own token before
    /// the text ends up in error details or logs.
    pub fn mask_secret_in_string(&self, text: &str, secret: &str) -> String {
        if secret.is_empty() {
            return text.to_string();
        }

        match Regex::new(&regex::escape(secret)) {
            Ok(regex) => {
                let masked_token = self.mask_token(secret);
                regex.replace_all(text, masked_token.as_str()).to_string()
            }
            Err(_) => text.to_string(),
        }
    }

    /// Gets the environment variable name for a platform
    ///
    /// # Examples
    ///
    /// ```
    /// use video_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.get_token_name("instagram"), Some("INSTAGRAM_ACCESS_TOKEN"));
    /// assert_eq!(manager.get_token_name("unknown"), None);
    /// ```
    pub fn get_token_name(&self, platform: &str) -> Option<&str> {
        self.platform_map.get(platform).map(|s| s.as_str())
    }

    /// Returns a sorted list of all supported platform names
    pub fn get_supported_platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self.platform_map.keys().cloned().collect();
        platforms.sort();
        platforms
    }
}
