pub mod chunked_uploader;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod platform;
pub mod retry;
pub mod traits;

pub use chunked_uploader::{ChunkPlan, ChunkSink, ChunkedUploader, HttpChunkSink};
pub use config::VideoPublishConfig;
pub use config_loader::{ConfigLoadOptions, ConfigLoader, ConfigValidationResult};
pub use error::*;
pub use platform::normalize_platform_name;
pub use retry::*;
pub use traits::*;
