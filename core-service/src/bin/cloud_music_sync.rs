//! Command-line driver for the provider engine.
//!
//! Provider application credentials come from the environment
//! (`DROPBOX_APP_KEY`, `DROPBOX_APP_SECRET`, `YANDEX_CLIENT_ID`,
//! `YANDEX_CLIENT_SECRET`); at least one pair must be set.

use anyhow::{Context, Result};
use bridge_traits::LogLevel;
use clap::{Parser, Subcommand};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{
    bootstrap, AccessToken, CatalogEntryId, CoreConfig, DropboxSettings, ProviderLinkId,
    ProviderType, RefreshToken, UserId, YandexDiskSettings,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "cloud-music-sync", version, about = "Manage cloud music provider links")]
struct Args {
    /// SQLite catalog location
    #[arg(long, env = "CLOUD_MUSIC_DB", default_value = "providers.db")]
    database: PathBuf,

    /// Acting user id
    #[arg(long, env = "CLOUD_MUSIC_USER")]
    user: String,

    /// Per-call timeout for provider requests, in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[arg(long, env = "DROPBOX_APP_KEY", hide_env_values = true)]
    dropbox_app_key: Option<String>,

    #[arg(long, env = "DROPBOX_APP_SECRET", hide_env_values = true)]
    dropbox_app_secret: Option<String>,

    #[arg(long, env = "YANDEX_CLIENT_ID", hide_env_values = true)]
    yandex_client_id: Option<String>,

    #[arg(long, env = "YANDEX_CLIENT_SECRET", hide_env_values = true)]
    yandex_client_secret: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the user's provider links
    List,
    /// Link a provider account and index its files
    Add {
        /// `dropbox` or `yandex_disk`
        #[arg(long)]
        provider: ProviderType,
        #[arg(long)]
        name: String,
        #[arg(long, env = "CLOUD_MUSIC_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "CLOUD_MUSIC_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
        /// Access token expiry, RFC 3339
        #[arg(long)]
        expires_at: String,
    },
    /// Re-list a link and reconcile its catalog
    Sync { link: String },
    /// Print a playable URL for a catalog entry
    Resolve { entry: String },
    /// Delete a link and its catalog
    Remove { link: String },
}

fn logging_config(args: &Args) -> LoggingConfig {
    let level = match args.verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let format = if args.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    LoggingConfig::default().with_format(format).with_level(level)
}

fn core_config(args: &Args) -> Result<CoreConfig> {
    let mut builder = CoreConfig::builder()
        .database_path(&args.database)
        .operation_timeout(Duration::from_secs(args.timeout));

    if let (Some(key), Some(secret)) = (&args.dropbox_app_key, &args.dropbox_app_secret) {
        builder = builder.dropbox(DropboxSettings::new(key, secret));
    }
    if let (Some(id), Some(secret)) = (&args.yandex_client_id, &args.yandex_client_secret) {
        builder = builder.yandex_disk(YandexDiskSettings::new(id, secret));
    }

    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(logging_config(&args))?;
    debug!(database = %args.database.display(), "Starting");

    let user = UserId::from_string(&args.user).context("--user must be a UUID")?;
    let core = bootstrap(core_config(&args)?).await?;
    let providers = core.providers();

    match args.command {
        Command::List => {
            for link in providers.get_all_providers_by_user_id(user).await? {
                println!(
                    "{}\t{}\t{}\texpires {}",
                    link.id,
                    link.provider_type.display_name(),
                    link.name,
                    link.expires_at.to_rfc3339()
                );
            }
        }
        Command::Add {
            provider,
            name,
            access_token,
            refresh_token,
            expires_at,
        } => {
            let link = providers
                .add_provider_link(
                    provider,
                    user,
                    &name,
                    AccessToken::from(access_token),
                    RefreshToken::from(refresh_token),
                    &expires_at,
                )
                .await?;
            println!("{}\t{} files", link.id, link.catalog().len());
        }
        Command::Sync { link } => {
            let id = ProviderLinkId::from_string(&link).context("link id must be a UUID")?;
            let link = providers.update_provider_link(id, user).await?;
            println!("{}\t{} files", link.id, link.catalog().len());
        }
        Command::Resolve { entry } => {
            let id = CatalogEntryId::from_string(&entry).context("entry id must be a UUID")?;
            println!("{}", providers.resolve_file_url(id, user).await?);
        }
        Command::Remove { link } => {
            let id = ProviderLinkId::from_string(&link).context("link id must be a UUID")?;
            providers.remove_provider_link(id, user).await?;
        }
    }

    core.shutdown().await;
    Ok(())
}
