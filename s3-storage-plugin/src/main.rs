use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use s3_storage_plugin::{
    AwsS3StoragePlugin, LocalStoragePlugin, StorageKey, StoragePlugin, StoragePluginConfig,
    StorageService,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Backend, Command};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = load_config(&args).await?;

    match args.backend {
        Backend::S3 => {
            let plugin = AwsS3StoragePlugin::new();
            plugin.configure(config).await?;
            run(&plugin, args.command).await
        }
        Backend::Local => {
            let plugin = LocalStoragePlugin::new();
            plugin.configure(config).await?;
            run(&plugin, args.command).await
        }
    }
}

async fn load_config(args: &Args) -> anyhow::Result<StoragePluginConfig> {
    let mut config = match &args.config {
        Some(path) => StoragePluginConfig::from_file(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => match args.backend {
            Backend::S3 => {
                let Some(bucket) = &args.bucket else {
                    bail!("--bucket (or STORAGE_BUCKET) is required without --config");
                };
                StoragePluginConfig::new(
                    bucket,
                    args.region.clone().unwrap_or_else(|| "us-east-1".into()),
                )
            }
            Backend::Local => {
                let Some(root) = &args.root else {
                    bail!("--root (or STORAGE_LOCAL_ROOT) is required for the local backend");
                };
                StoragePluginConfig::local(root)
            }
        },
    };

    if let Some(bucket) = &args.bucket {
        config.bucket = bucket.clone();
    }
    if let Some(region) = &args.region {
        config.region = region.clone();
    }
    if args.endpoint.is_some() {
        config.endpoint = args.endpoint.clone();
    }
    if args.force_path_style {
        config.force_path_style = true;
    }
    if args.root.is_some() {
        config.local_root = args.root.clone();
    }
    if let Some(level) = args.access_level {
        config.default_access_level = level;
    }
    if args.identity_id.is_some() {
        config.identity_id = args.identity_id.clone();
    }
    Ok(config)
}

async fn run<S: StorageService>(plugin: &StoragePlugin<S>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Upload { key, file } => {
            let key = plugin
                .upload_file(StorageKey::new(key), &file)
                .await
                .with_context(|| format!("failed to upload {}", file.display()))?;
            println!("uploaded {key}");
        }
        Command::Download { key, file } => {
            plugin
                .download_file(key.as_str(), &file)
                .await
                .with_context(|| format!("failed to download {key}"))?;
            println!("downloaded {key} to {}", file.display());
        }
        Command::List { path } => {
            for item in plugin.list(path).await? {
                println!(
                    "{}\t{}\t{}",
                    item.size,
                    item.etag.as_deref().unwrap_or("-"),
                    item.key
                );
            }
        }
        Command::Remove { key } => {
            let key = plugin.remove(key).await?;
            println!("removed {key}");
        }
        Command::Url { key, expires_secs } => {
            let url = plugin
                .get_url(key, Duration::from_secs(expires_secs))
                .await?;
            println!("{url}");
        }
    }
    Ok(())
}
