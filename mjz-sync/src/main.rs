//! mjz-sync - playlist archive to catalog synchronizer
//!
//! Each subcommand is one batch: it opens the store, runs to completion (or
//! until Ctrl+C for resolution) and closes the store again.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mjz_common::config::{default_config_path, load_toml_config, LoggingConfig};
use mjz_sync::catalog::auth::{authorize_url, exchange_code, receive_authorization_code, TOKEN_URL};
use mjz_sync::config::{resolve_client_credentials, store_refresh_token};
use mjz_sync::db::episodes;
use mjz_sync::services::{
    group_into_episodes, ingest, ingest_latest, ingest_show_pages, ingest_spins, resolve_pending,
    PlaylistSynthesizer, SynthesisOutcome,
};
use mjz_sync::AppContext;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mjz-sync
#[derive(Parser, Debug)]
#[command(name = "mjz-sync")]
#[command(about = "Mirror a radio show's playlist archive into catalog playlists")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Database file (overrides the root folder)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Configuration file
    #[arg(long, env = "MJZ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store playlists from the show pages
    Scrape {
        /// First show page to read
        #[arg(long)]
        page: Option<u32>,

        /// Last show page to read
        #[arg(long)]
        last_page: Option<u32>,
    },

    /// Fetch spins for stored playlists whose spin count is off
    Spins,

    /// Store playlists aired since the newest stored one
    Latest,

    /// Group ungrouped playlists into episodes
    Episodes {
        /// Number of the most recent new episode; older ones count down
        #[arg(long)]
        start: i64,
    },

    /// Link unresolved spins to catalog songs
    Resolve,

    /// Publish episode playlists to the catalog
    Publish {
        /// Only this episode number
        #[arg(long)]
        episode: Option<i64>,
    },

    /// Retry adding tracks to playlists the catalog did not accept
    Resync,

    /// Grant catalog access and store the refresh token
    Authorize,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = load_toml_config(&config_path)?;
    init_tracing(&config.logging)?;

    info!("Starting mjz-sync {}", env!("CARGO_PKG_VERSION"));

    let ctx = AppContext::open(
        config,
        config_path,
        args.root_folder.as_deref(),
        args.database.as_deref(),
    )
    .await
    .context("Failed to open database")?;

    let result = run(&ctx, args.command).await;
    ctx.close().await;

    result
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::Scrape { page, last_page } => {
            let archive = ctx.archive()?;
            let report = ingest_show_pages(&ctx.db, &archive, page, last_page).await?;
            info!(
                playlists = report.playlists,
                duplicates = report.duplicates,
                "Scrape finished"
            );
            ingest::into_result(report)?;
        }

        Command::Spins => {
            let archive = ctx.archive()?;
            let report = ingest_spins(&ctx.db, &archive).await?;
            info!(spins = report.spins, failed = report.failed, "Spin refresh finished");
        }

        Command::Latest => {
            let archive = ctx.archive()?;
            let report = ingest_latest(&ctx.db, &archive).await?;
            info!(
                playlists = report.playlists,
                spins = report.spins,
                "Stored {} new playlists",
                report.playlists
            );
            ingest::into_result(report)?;
        }

        Command::Episodes { start } => {
            let groups = group_into_episodes(&ctx.db, start).await?;
            for group in &groups {
                info!(
                    number = group.episode.number,
                    airings = group.playlist_ids.len(),
                    "Created episode"
                );
            }
        }

        Command::Resolve => {
            let catalog = ctx.catalog().await?;
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing current spin");
                    watcher.cancel();
                }
            });

            let result = resolve_pending(&ctx.db, &catalog, &cancel).await;
            ctx.release_catalog(&catalog).await?;
            result?;
        }

        Command::Publish { episode } => {
            let catalog = ctx.catalog().await?;
            let synthesizer = PlaylistSynthesizer::new(&catalog, &ctx.config.series);

            let result = match episode {
                Some(number) => publish_one(ctx, &synthesizer, number).await,
                None => synthesizer
                    .synthesize_all(&ctx.db)
                    .await
                    .map(|report| {
                        info!(
                            created = report.created,
                            unsynced = report.unsynced,
                            incomplete = report.incomplete,
                            deferred = report.deferred,
                            failed = report.failed,
                            "Publish finished"
                        );
                    })
                    .map_err(Into::into),
            };

            ctx.release_catalog(&catalog).await?;
            result?;
        }

        Command::Resync => {
            let catalog = ctx.catalog().await?;
            let synthesizer = PlaylistSynthesizer::new(&catalog, &ctx.config.series);
            let result = synthesizer.resync_unsynced(&ctx.db).await;
            ctx.release_catalog(&catalog).await?;
            info!(synced = result?, "Resync finished");
        }

        Command::Authorize => authorize(ctx).await?,
    }

    Ok(())
}

async fn publish_one(
    ctx: &AppContext,
    synthesizer: &PlaylistSynthesizer<'_, mjz_sync::catalog::CatalogClient>,
    number: i64,
) -> Result<()> {
    let episode = {
        let mut conn = ctx.db.acquire().await?;
        episodes::find_by_number(&mut conn, number).await?
    }
    .ok_or_else(|| anyhow!("Episode {} not found", number))?;

    match synthesizer.synthesize(&ctx.db, &episode).await? {
        SynthesisOutcome::Created { playlist, synced } => {
            info!(external_id = %playlist.external_id, synced, "Published {}", playlist.name)
        }
        SynthesisOutcome::AlreadyExists { external_id } => {
            info!(external_id = %external_id, "Episode {} already published", number)
        }
        SynthesisOutcome::NoAirings => return Err(anyhow!("Episode {} has no airings", number)),
        SynthesisOutcome::Incomplete { unresolved } => {
            return Err(anyhow!(
                "Episode {} has {} unresolved spins; run resolve first",
                number,
                unresolved
            ))
        }
        SynthesisOutcome::Deferred => {
            return Err(anyhow!("Catalog refused to create a playlist for episode {}", number))
        }
    }

    Ok(())
}

async fn authorize(ctx: &AppContext) -> Result<()> {
    let (client_id, client_secret) = resolve_client_credentials(&ctx.config)?;
    let redirect_uri = ctx.config.catalog.redirect_uri.as_str();

    let url = authorize_url(&client_id, redirect_uri)?;
    println!("Open this URL in a browser to grant access:\n\n  {}\n", url);

    let code = receive_authorization_code(redirect_uri).await?;
    let tokens = exchange_code(
        &reqwest::Client::new(),
        TOKEN_URL,
        &client_id,
        &client_secret,
        &code,
        redirect_uri,
    )
    .await?;

    let refresh_token = tokens
        .refresh_token
        .ok_or_else(|| anyhow!("Token endpoint returned no refresh token"))?;
    store_refresh_token(&ctx.db, refresh_token, &ctx.config_path).await?;

    info!("Catalog access granted and stored");
    Ok(())
}
