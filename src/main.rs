use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_grabber::config::{Config, IconTheme};

#[derive(Parser)]
#[command(name = "epg-grabber")]
#[command(version)]
#[command(about = "Download TV listings and write an XMLTV guide")]
#[command(long_about = None)]
struct Cli {
    /// Target XMLTV file
    filepath: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of parallel requests
    #[arg(short, long, value_name = "N")]
    parallel: Option<usize>,

    /// Also write a gzip archive of the guide
    #[arg(short = 'a', long)]
    create_archive: bool,

    /// Largest poster dimension in pixels
    #[arg(long, value_name = "SIZE")]
    images_size: Option<u32>,

    /// JPEG poster quality
    #[arg(long, value_name = "N")]
    images_quality: Option<u8>,

    /// Base URL of the published guide resources
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Use channel icons adapted for light backgrounds
    #[arg(long)]
    icons_for_light_bg: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(parallel) = self.parallel {
            config.fetch.parallel = parallel;
        }
        if self.create_archive {
            config.guide.create_archive = true;
        }
        if let Some(size) = self.images_size {
            config.images.size = size;
        }
        if let Some(quality) = self.images_quality {
            config.images.quality = quality;
        }
        if let Some(base_url) = &self.base_url {
            config.guide.base_url = base_url.clone();
        }
        if self.icons_for_light_bg {
            config.guide.icon_theme = IconTheme::Light;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("epg_grabber={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EPG grabber v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    cli.apply(&mut config);

    let summary = epg_grabber::run(&config, &cli.filepath).await?;
    info!(
        "Guide written to {} ({} channels, {} programmes, {} warnings)",
        summary.output.display(),
        summary.channels,
        summary.programmes,
        summary.warnings
    );
    if let Some(archive) = summary.archive {
        info!("Archive written to {}", archive.display());
    }

    Ok(())
}
