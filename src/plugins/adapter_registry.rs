//! Adapter Registry - Resolves platform names to adapters
//!
//! The registry is populated once at startup from the built-in adapters and is
//! read-only afterwards, so it can be shared across concurrent requests.
//!
//! # Example
//!
//! ```no_run
//! use video_publisher::core::config::VideoPublishConfig;
//! use video_publisher::plugins::AdapterRegistry;
//! use video_publisher::security::SecureTokenManager;
//!
//! # fn example() -> Result<(), video_publisher::core::PublishError> {
//! let config = VideoPublishConfig::default();
//! let registry = AdapterRegistry::from_config(&config, &SecureTokenManager::new())?;
//!
//! let adapter = registry.resolve("TikTok")?;
//! println!("{} uses {}", adapter.name(), adapter.capability().as_str());
//! # Ok(())
//! # }
//! ```

use crate::core::config::VideoPublishConfig;
use crate::core::error::PublishError;
pub use crate::core::platform::normalize_platform_name;
use crate::core::traits::{Capability, PlatformAdapter};
use crate::plugins::http_client::build_client;
use crate::plugins::instagram_plugin::{self, InstagramAdapter};
use crate::plugins::tiktok_plugin::{self, TiktokAdapter};
use crate::plugins::youtube_plugin::{self, YoutubeAdapter};
use crate::security::SecureTokenManager;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Constructor for a platform adapter
pub type AdapterFactory = Arc<dyn Fn() -> PlatformAdapter + Send + Sync>;

/// Registry mapping normalized platform names to adapter constructors
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry of built-in adapters from configuration
    ///
    /// A platform is registered unless its section sets `enabled: false`.
    /// Missing credentials are not an error here; the adapter reports them
    /// when it is asked to publish.
    pub fn from_config(
        config: &VideoPublishConfig,
        tokens: &SecureTokenManager,
    ) -> Result<Self, PublishError> {
        let client = build_client(config.http_timeout())?;
        Self::from_config_with_client(config, tokens, client)
    }

    /// Build the registry of built-in adapters sharing an existing client
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the retry section is invalid.
    pub fn from_config_with_client(
        config: &VideoPublishConfig,
        tokens: &SecureTokenManager,
        client: reqwest::Client,
    ) -> Result<Self, PublishError> {
        let mut registry = Self::new();
        let platforms = &config.platforms;

        let instagram = platforms.instagram.clone().unwrap_or_default();
        if instagram.enabled.unwrap_or(true) {
            let token = tokens.resolve_token(
                instagram_plugin::PLATFORM_NAME,
                instagram.access_token.as_deref(),
            );
            let adapter = Arc::new(InstagramAdapter::new(
                client.clone(),
                &instagram,
                token,
                config.retry_policy()?,
            ));
            registry.register(instagram_plugin::PLATFORM_NAME, move || {
                PlatformAdapter::Reference(adapter.clone())
            });
        }

        let tiktok = platforms.tiktok.clone().unwrap_or_default();
        if tiktok.enabled.unwrap_or(true) {
            let token =
                tokens.resolve_token(tiktok_plugin::PLATFORM_NAME, tiktok.access_token.as_deref());
            let adapter = Arc::new(TiktokAdapter::new(client.clone(), &tiktok, token));
            registry.register(tiktok_plugin::PLATFORM_NAME, move || {
                PlatformAdapter::Transfer(adapter.clone())
            });
        }

        let youtube = platforms.youtube.clone().unwrap_or_default();
        if youtube.enabled.unwrap_or(true) {
            let token = tokens.resolve_token(
                youtube_plugin::PLATFORM_NAME,
                youtube.access_token.as_deref(),
            );
            let adapter = Arc::new(YoutubeAdapter::new(client, &youtube, token));
            registry.register(youtube_plugin::PLATFORM_NAME, move || {
                PlatformAdapter::Transfer(adapter.clone())
            });
        }

        tracing::debug!(platforms = ?registry.names(), "Adapter registry initialized");
        Ok(registry)
    }

    /// Register a factory under a platform name
    ///
    /// The name is normalized. Registering the same name twice replaces the
    /// earlier factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> PlatformAdapter + Send + Sync + 'static,
    {
        let key = normalize_platform_name(name);
        if self.factories.insert(key.clone(), Arc::new(factory)).is_some() {
            tracing::warn!(platform = %key, "Replacing registered adapter");
        }
    }

    /// Resolve a platform name to an adapter
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::UnsupportedPlatform`] for unregistered names.
    pub fn resolve(&self, name: &str) -> Result<PlatformAdapter, PublishError> {
        let key = normalize_platform_name(name);
        self.factories
            .get(&key)
            .map(|factory| factory())
            .ok_or(PublishError::UnsupportedPlatform { platform: key })
    }

    /// Registered platform names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered platforms with their capability, sorted by name
    pub fn describe(&self) -> Vec<(String, Capability)> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let capability = self.resolve(&name).ok()?.capability();
                Some((name, capability))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.names())
            .finish()
    }
}
