//! respcache - inspect and maintain a file-backed response cache
//!
//! Operates on the persistent store at `CACHE_STORAGE_PATH` (or `--path`)
//! under the configured namespace. Values are JSON.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use response_cache::cache::fingerprint;
use response_cache::{Backend, CacheStats, Config, FileStorage, ResponseCache};

/// Inspect and maintain a file-backed response cache.
#[derive(Parser, Debug)]
#[command(name = "respcache", version)]
struct Cli {
    /// Storage file (overrides CACHE_STORAGE_PATH)
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Key prefix (overrides CACHE_NAMESPACE)
    #[arg(long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cache key for a resource id or override key
    ///
    /// Several parts (e.g. an action and its parameters) are hashed into one id.
    Key {
        #[arg(required = true)]
        parts: Vec<String>,
        #[arg(long = "override")]
        override_key: Option<String>,
    },
    /// Print a cached value
    Get { key: String },
    /// Store a JSON value
    Set {
        key: String,
        /// JSON value; bare words are stored as strings
        value: String,
        /// Time-to-live in milliseconds (default: CACHE_DEFAULT_TTL_MS)
        #[arg(long, allow_hyphen_values = true)]
        ttl_ms: Option<i64>,
    },
    /// Remove one key
    Delete { key: String },
    /// Remove every key in the namespace
    Clear,
    /// Print statistics as JSON
    Inspect,
    /// Remove expired and unreadable entries
    Purge,
    /// Purge every CACHE_CLEANUP_INTERVAL seconds until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "response_cache=info,respcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.path {
        config.storage_path = path;
    }
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }

    run(&open_cache(&config), &config, cli.command).await
}

fn open_cache(config: &Config) -> ResponseCache<Value> {
    ResponseCache::builder()
        .config(config.cache_config())
        .namespace(config.namespace.clone())
        .local_storage(FileStorage::open(&config.storage_path))
        .build()
}

async fn run(cache: &ResponseCache<Value>, config: &Config, command: Command) -> Result<()> {
    let backend = Backend::Local;
    match command {
        Command::Key {
            parts,
            override_key,
        } => {
            let resource_id = resource_id(&parts);
            println!("{}", cache.build_key(&resource_id, override_key.as_deref()));
        }
        Command::Get { key } => match cache.read(&key, backend) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => bail!("No cached value for '{}'", key),
        },
        Command::Set { key, value, ttl_ms } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            cache.write(&key, value, ttl_ms, backend, None);
            let expected = ttl_ms.map_or(true, |ttl| ttl > 0);
            if expected && !cache.contains(&key, backend) {
                bail!("Value for '{}' was not stored (see log for details)", key);
            }
            info!(key = %key, "Stored cache entry");
        }
        Command::Delete { key } => {
            if cache.invalidate(&key, backend) {
                info!(key = %key, "Deleted cache entry");
            } else {
                info!(key = %key, "No cache entry to delete");
            }
        }
        Command::Clear => {
            let size = cache.inspect(backend).size;
            cache.invalidate_all(backend);
            info!("Cleared {} entries from {}", size, config.storage_path.display());
        }
        Command::Inspect => {
            let stats = cache.stats(backend);
            let report = render_stats(&stats, config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Purge => {
            let removed = cache.purge_expired(backend);
            info!("Purged {} expired entries", removed);
        }
        Command::Watch => watch(config).await?,
    }
    Ok(())
}

fn resource_id(parts: &[String]) -> String {
    match parts {
        [single] => single.clone(),
        _ => fingerprint(parts),
    }
}

/// Periodically purges the file store until Ctrl+C or SIGTERM.
///
/// The file is reopened on every pass so writes from other processes are seen.
async fn watch(config: &Config) -> Result<()> {
    let interval = Duration::from_secs(config.cleanup_interval.max(1));
    info!(
        "Purging {} every {} s",
        config.storage_path.display(),
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = open_cache(config).purge_expired(Backend::Local);
                if removed > 0 {
                    info!("TTL cleanup: removed {} expired entries", removed);
                } else {
                    debug!("TTL cleanup: no expired entries found");
                }
            }
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received, stopping watch");
                return Ok(());
            }
        }
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}

fn render_stats(stats: &CacheStats, config: &Config) -> Result<Value> {
    let mut report = serde_json::to_value(stats).context("Failed to encode stats")?;
    report["path"] = json!(config.storage_path.display().to_string());
    report["namespace"] = json!(config.namespace);
    report["oldestAccess"] = json!(stats.oldest_access.and_then(format_millis));
    report["newestAccess"] = json!(stats.newest_access.and_then(format_millis));
    Ok(report)
}

fn format_millis(ms: u64) -> Option<String> {
    let ms = i64::try_from(ms).ok()?;
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}
