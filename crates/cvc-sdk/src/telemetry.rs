//! Log output for applications embedding a scope.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install a global `fmt` subscriber filtered by `config.level`, with
/// `RUST_LOG` taking precedence when set.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes. Safe to call more than once.
pub fn init(config: &LogConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .is_ok()
}

fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
