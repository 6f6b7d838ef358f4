pub mod adapter_registry;
pub mod http_client;
pub mod instagram_plugin;
pub mod tiktok_plugin;
pub mod youtube_plugin;

pub use adapter_registry::{AdapterFactory, AdapterRegistry, normalize_platform_name};
pub use instagram_plugin::InstagramAdapter;
pub use tiktok_plugin::TiktokAdapter;
pub use youtube_plugin::YoutubeAdapter;
