//! Orchestration layer for video publishing
//!
//! This module stages a video once and fans it out to every requested
//! platform, collecting one outcome per platform.

pub mod staging;
pub mod video_publisher;

// Re-export main types for convenience
pub use staging::HttpStagingStore;
pub use video_publisher::VideoPublisher;
