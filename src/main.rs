//! akk_cache - demo executable
//!
//! Reads each file given on the command line through a `FileCache`, twice,
//! and reports where the bytes came from along with the cache statistics.

use std::env;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use akk_cache::{spawn_prune_task, Config, FileCache};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the file cache with configured parameters
/// 4. Start background prune task
/// 5. Read every path argument twice (miss, then hit)
/// 6. Wait for Ctrl+C when `--wait` is passed, then shut down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "akk_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        capacity_bytes = config.file_cache_capacity,
        max_file_size = config.max_file_size,
        timeout_ms = config.timeout_ms,
        prune_interval_ms = config.prune_interval_ms,
        "Configuration loaded"
    );

    let cache = Arc::new(FileCache::from_config(&config));
    let prune_handle = spawn_prune_task(cache.clone(), config.prune_interval());

    let mut wait = false;
    for arg in env::args().skip(1) {
        if arg == "--wait" {
            wait = true;
            continue;
        }
        for _ in 0..2 {
            match cache.get_file_bytes(&arg) {
                Ok(bytes) => {
                    info!(path = %arg, len = bytes.len(), source = ?bytes.source, "Read file")
                }
                Err(err) => {
                    warn!("{}", err);
                    break;
                }
            }
        }
    }

    let stats = serde_json::to_string(&cache.stats()).context("serializing cache stats")?;
    info!(
        files = cache.cached_files_count(),
        used_bytes = cache.used_size(),
        "Cache stats: {}",
        stats
    );

    if wait {
        info!("Waiting for Ctrl+C");
        signal::ctrl_c().await.context("installing Ctrl+C handler")?;
    }

    prune_handle.abort();
    info!("Shutdown complete");
    Ok(())
}
