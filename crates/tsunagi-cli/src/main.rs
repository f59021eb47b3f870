use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tsunagi_api::ProviderError;
use tsunagi_core::cache::{CacheStats, SqliteCache};
use tsunagi_core::config::AppConfig;
use tsunagi_core::error::TsunagiError;
use tsunagi_runtime::AiringLookup;

#[derive(Parser)]
#[command(name = "tsunagi", about = "List sync and query cache maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Look up when the next episode of a media item airs
    Airing {
        /// AniList media ID
        media_id: u64,
    },
    /// Inspect or reset the local query cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the merged config as TOML
    Show,
    /// Print the user config file location
    Path,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print document counts as JSON
    Stats,
    /// Delete every cached document
    Clear,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Local(#[from] TsunagiError),
    #[error("schedule client: {0}")]
    Schedule(#[from] ProviderError),
    #[error("output: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tsunagi=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    let config = AppConfig::load()?;

    match command {
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let rendered =
                    toml::to_string_pretty(&config).map_err(|e| CliError::Output(e.to_string()))?;
                print!("{rendered}");
            }
            ConfigAction::Path => println!("{}", AppConfig::config_path().display()),
        },
        Command::Airing { media_id } => {
            let lookup = AiringLookup::from_config(&config.schedule)?;
            if !lookup.is_enabled() {
                tracing::info!("Schedule lookups are disabled in config");
            }
            match lookup.next_airing(media_id).await {
                Some(at) => println!("{}", at.to_rfc3339()),
                None => println!("No upcoming episode scheduled"),
            }
        }
        Command::Cache { action } => {
            if !config.cache.persistent {
                println!("{}", no_persistent_cache(&action));
                return Ok(());
            }

            let path = AppConfig::ensure_cache_path()?;
            let cache = SqliteCache::open(&path)?;
            match action {
                CacheAction::Stats => print_stats(cache.stats().await?)?,
                CacheAction::Clear => {
                    let removed = cache.clear().await?;
                    tracing::info!(removed, path = %path.display(), "Cleared query cache");
                }
            }
        }
    }
    Ok(())
}

fn no_persistent_cache(action: &CacheAction) -> &'static str {
    match action {
        CacheAction::Stats => {
            "No persistent cache configured (cache.persistent = false); nothing to report"
        }
        CacheAction::Clear => {
            "No persistent cache configured (cache.persistent = false); nothing to clear"
        }
    }
}

fn print_stats(stats: CacheStats) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(&stats).map_err(|e| CliError::Output(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}
