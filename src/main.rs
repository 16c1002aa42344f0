//! poll-echo server binary.
//!
//! Features:
//! - One thread, one readiness query per loop iteration
//! - `select`, `poll` and mio (epoll/kqueue) backends
//! - Bounded client table; connections beyond capacity are closed on accept
//! - Configuration via CLI arguments or TOML file
//! - Clean shutdown on SIGINT/SIGTERM

use poll_echo::config::Config;
use poll_echo::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        backend = ?config.backend,
        max_clients = config.max_clients,
        chunk_size = config.chunk_size,
        prefix = %config.prefix,
        "Starting poll-echo server"
    );

    runtime::run(config)?;
    Ok(())
}
