use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portfolio_assets::keys::ObjectKey;
use portfolio_assets::models::Config;
use portfolio_assets::pipeline::AssetPipeline;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "portfolio-assets")]
#[command(about = "Transcode images to WebP and manage them in the asset bucket")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transcode an image and upload it under a group.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Logical group (e.g. project id) the asset belongs to.
        #[arg(long)]
        group: String,
        /// Encode losslessly and keep original dimensions.
        #[arg(long)]
        lossless: bool,
        /// Lossy quality between 0.0 and 1.0.
        #[arg(long, value_parser = parse_quality)]
        quality: Option<f32>,
        #[arg(long)]
        max_width: Option<u32>,
        #[arg(long)]
        max_height: Option<u32>,
    },
    /// Delete one or more assets by public URL.
    Delete {
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,
    },
    /// Print the public URL for an object key without touching the store.
    Url {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Print the object key behind a public URL without touching the store.
    Resolve {
        #[arg(value_name = "URL")]
        url: String,
    },
}

fn parse_quality(input: &str) -> std::result::Result<f32, String> {
    let quality: f32 = input
        .parse()
        .map_err(|_| format!("Invalid quality '{}'. Expected a number", input))?;
    if (0.0..=1.0).contains(&quality) {
        Ok(quality)
    } else {
        Err(format!(
            "Invalid quality '{}'. Expected a value between 0.0 and 1.0",
            input
        ))
    }
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Url { key } => {
            let key = ObjectKey::parse(&key)?;
            println!("{}", config.url_scheme().public_url(&key));
        }
        Command::Resolve { url } => {
            let key = config.url_scheme().resolve_key(&url)?;
            println!("{}", key);
        }
        Command::Upload {
            file,
            group,
            lossless,
            quality,
            max_width,
            max_height,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let mut options = config.encode;
            options.lossless |= lossless;
            if let Some(quality) = quality {
                options.quality = quality;
            }
            if let Some(width) = max_width {
                options.max_width = width;
            }
            if let Some(height) = max_height {
                options.max_height = height;
            }

            let pipeline = AssetPipeline::from_config(&config).await?;
            let asset = pipeline.upload_with(&bytes, &group, &options).await?;
            println!("{}", serde_json::to_string_pretty(&asset)?);
        }
        Command::Delete { urls } => {
            let pipeline = AssetPipeline::from_config(&config).await?;
            if let [url] = urls.as_slice() {
                pipeline.delete_one(url).await?;
            } else {
                pipeline.delete_many(&urls).await?;
            }
            info!("Deleted {} asset(s)", urls.len());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_assets=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args.command, config).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
