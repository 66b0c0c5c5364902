//! Shared environment configuration for the decathlon binaries.
//!
//! Covers `DECATHLON_BASE_PATH`, the rayon pool size and the global tracing
//! subscriber.

use std::path::PathBuf;

use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

pub const DEFAULT_THREADS: usize = 8;

/// Read `DECATHLON_BASE_PATH` (default `"."`) and make it the working directory.
pub fn init_base_path() -> Result<PathBuf> {
    let base_path = std::env::var("DECATHLON_BASE_PATH").unwrap_or_else(|_| ".".to_string());
    let path = PathBuf::from(&base_path);
    std::env::set_current_dir(&path)?;
    let cwd = std::env::current_dir()?;
    info!(base_path = %base_path, cwd = %cwd.display(), "working directory set");
    Ok(path)
}

/// Thread count: `requested`, else `RAYON_NUM_THREADS`, else `OMP_NUM_THREADS`, else 8.
pub fn thread_count(requested: Option<usize>) -> usize {
    requested
        .or_else(|| {
            std::env::var("RAYON_NUM_THREADS")
                .or_else(|_| std::env::var("OMP_NUM_THREADS"))
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_THREADS)
}

/// Build the global rayon pool. Tolerates an already-initialised pool.
pub fn init_rayon_threads(requested: Option<usize>) -> usize {
    let num_threads = thread_count(requested);
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        warn!(error = %e, "rayon pool already initialised");
    }
    info!(threads = num_threads, "rayon pool ready");
    num_threads
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `json` set, log lines are
/// newline-delimited JSON. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry.with(fmt::layer().with_target(false)).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_thread_count_wins() {
        assert_eq!(thread_count(Some(3)), 3);
        assert!(thread_count(None) > 0);
        assert!(thread_count(Some(0)) > 0);
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
