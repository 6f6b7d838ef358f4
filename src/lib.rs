pub mod core;
pub mod orchestration;
pub mod plugins;
pub mod security;

pub use crate::core::*;
pub use orchestration::{HttpStagingStore, VideoPublisher};
pub use plugins::{AdapterRegistry, InstagramAdapter, TiktokAdapter, YoutubeAdapter};
pub use security::SecureTokenManager;
