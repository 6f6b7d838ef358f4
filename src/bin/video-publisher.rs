//! Video Publisher CLI
//!
//! Publish one video to Instagram, TikTok and YouTube in a single call

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use video_publisher::plugins::http_client::build_client;
use video_publisher::{
    AdapterRegistry, ConfigLoadOptions, ConfigLoader, HttpStagingStore, SecureTokenManager,
    VideoAsset, VideoPublishConfig, VideoPublisher,
};

/// Multi-platform video publishing assistant
#[derive(Parser)]
#[command(name = "video-publisher")]
#[command(version = "0.1.0")]
#[command(about = "Multi-platform video publishing assistant", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a video to one or more platforms
    Publish {
        /// Video file to publish
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Comma-separated list of platforms (instagram, tiktok, youtube)
        #[arg(short, long, value_delimiter = ',', required = true)]
        platforms: Vec<String>,

        /// Video title (also used as caption)
        #[arg(short, long)]
        title: String,

        /// Configuration file (defaults to .video-publish.yaml lookup)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the aggregate result as JSON
        #[arg(long)]
        json: bool,

        /// Maximum platforms published at the same time
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// List registered platforms and their capability
    Platforms {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate configuration
    Check {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Publish {
            file,
            platforms,
            title,
            config,
            json,
            max_concurrency,
        } => publish_command(file, platforms, title, config, json, max_concurrency).await,
        Commands::Platforms { config } => platforms_command(config).await,
        Commands::Check { config } => check_command(config).await,
    }
}

async fn load_config(config_path: Option<PathBuf>) -> Result<VideoPublishConfig> {
    let options = ConfigLoadOptions {
        project_path: PathBuf::from("."),
        config_path,
        cli_args: None,
        env: std::env::vars().collect::<HashMap<_, _>>(),
    };

    ConfigLoader::load(options)
        .await
        .context("Failed to load configuration")
}

async fn publish_command(
    file: PathBuf,
    platforms: Vec<String>,
    title: String,
    config_path: Option<PathBuf>,
    json: bool,
    max_concurrency: Option<usize>,
) -> Result<i32> {
    let config = load_config(config_path).await?;

    let validation = ConfigLoader::validate(&config);
    if !validation.valid {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
        return Ok(1);
    }

    let tokens = SecureTokenManager::new();
    let client = build_client(config.http_timeout())?;
    let registry = AdapterRegistry::from_config_with_client(&config, &tokens, client.clone())?;
    let stager = HttpStagingStore::from_config(config.staging.as_ref(), client)?;

    let mut publisher = VideoPublisher::new(Arc::new(registry), Arc::new(stager));
    if let Some(limit) = max_concurrency.or(config.max_concurrency()) {
        publisher = publisher.with_max_concurrency(limit);
    }

    let asset = read_asset(&file).await?;

    if !json {
        println!("\n🎬 video-publisher\n");
        println!("File: {} ({} bytes)", asset.name(), asset.len());
    }

    let result = publisher.publish(asset, title, platforms).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", VideoPublisher::format_summary(&result));
    }

    Ok(if result.is_full_success() { 0 } else { 1 })
}

async fn read_asset(file: &Path) -> Result<VideoAsset> {
    VideoAsset::from_path(file)
        .await
        .with_context(|| format!("Failed to read video file: {}", file.display()))
}

async fn platforms_command(config_path: Option<PathBuf>) -> Result<i32> {
    let config = load_config(config_path).await?;
    let registry = AdapterRegistry::from_config(&config, &SecureTokenManager::new())?;

    println!("\n📋 Registered platforms\n");

    if registry.is_empty() {
        println!("⚠️  No platforms enabled");
        return Ok(1);
    }

    for (name, capability) in registry.describe() {
        println!("  - {} ({})", name, capability.as_str());
    }

    println!();
    Ok(0)
}

async fn check_command(config_path: Option<PathBuf>) -> Result<i32> {
    println!("\n🔍 Configuration Check\n");

    let config = load_config(config_path).await?;
    let result = ConfigLoader::validate(&config);

    println!("{}", ConfigLoader::format_validation_result(&result));

    let tokens = SecureTokenManager::new();
    println!("\n🔑 Tokens:");
    for platform in tokens.get_supported_platforms() {
        let status = if tokens.has_token(&platform) {
            "✅"
        } else {
            "⚠️  not set"
        };
        println!("  - {}: {}", platform, status);
    }

    println!();
    Ok(if result.valid { 0 } else { 1 })
}
