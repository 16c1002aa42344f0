//! Configuration module for the poll-echo server and client.
//!
//! The server supports both command-line arguments and a TOML configuration
//! file. CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::net::{AddrParseError, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Readiness backend used by the server event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `select(2)`: readability only.
    #[default]
    Select,
    /// `poll(2)`: readability plus out-of-band hangup/error.
    Poll,
    /// mio (epoll on Linux, kqueue on macOS).
    Mio,
}

impl Backend {
    /// Reply prefix used when no explicit prefix is configured.
    pub fn default_prefix(self) -> &'static str {
        match self {
            Backend::Select => "Server received: ",
            Backend::Poll => "Server (poll) received: ",
            Backend::Mio => "Server (mio) received: ",
        }
    }
}

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "poll-echo")]
#[command(author = "poll-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "A single-threaded readiness-multiplexed TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8080)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Readiness backend
    #[arg(short = 'b', long, value_enum)]
    pub backend: Option<Backend>,

    /// Maximum number of simultaneous clients
    #[arg(short = 'm', long)]
    pub max_clients: Option<usize>,

    /// Readiness query timeout in milliseconds
    #[arg(long)]
    pub poll_timeout_ms: Option<u64>,

    /// Maximum bytes read from a client per readiness event
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Literal prepended to every echoed chunk
    #[arg(long)]
    pub prefix: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Command-line arguments for the console client
#[derive(Parser, Debug)]
#[command(name = "poll-echo-client")]
#[command(author = "poll-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "Interactive console client for the poll-echo server", long_about = None)]
pub struct ClientArgs {
    /// Server IPv4 address (e.g., 127.0.0.1)
    pub server: Ipv4Addr,

    /// Server port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ClientArgs {
    /// Socket address of the server.
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::from((self.server, self.port))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connections: ConnectionsConfig,
    #[serde(default)]
    pub echo: EchoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    /// Readiness backend
    #[serde(default)]
    pub backend: Backend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
            backend: Backend::default(),
        }
    }
}

/// Connection table configuration
#[derive(Debug, Deserialize)]
pub struct ConnectionsConfig {
    /// Maximum number of simultaneous clients
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Readiness query timeout in milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

/// Echo transform configuration
#[derive(Debug, Deserialize)]
pub struct EchoConfig {
    /// Reply prefix; backend default when absent
    pub prefix: Option<String>,
    /// Read chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            chunk_size: default_chunk_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_backlog() -> i32 {
    3
}

fn default_max_clients() -> usize {
    10
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_chunk_size() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub backlog: i32,
    pub backend: Backend,
    pub max_clients: usize,
    pub poll_timeout: Duration,
    pub chunk_size: usize,
    pub prefix: String,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen: SocketAddr = listen
            .parse()
            .map_err(|e| ConfigError::InvalidListen(listen.clone(), e))?;

        let backend = cli.backend.unwrap_or(toml_config.server.backend);
        let prefix = cli
            .prefix
            .or(toml_config.echo.prefix)
            .unwrap_or_else(|| backend.default_prefix().to_string());

        let config = Config {
            listen,
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            backend,
            max_clients: cli
                .max_clients
                .unwrap_or(toml_config.connections.max_clients),
            poll_timeout: Duration::from_millis(
                cli.poll_timeout_ms
                    .unwrap_or(toml_config.connections.poll_timeout_ms),
            ),
            chunk_size: cli.chunk_size.unwrap_or(toml_config.echo.chunk_size),
            prefix,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1"));
        }
        if self.backlog <= 0 {
            return Err(ConfigError::Invalid("backlog must be at least 1"));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidListen(String, AddrParseError),
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidListen(addr, e) => {
                write!(f, "Invalid listen address '{addr}': {e}")
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.backlog, 3);
        assert_eq!(config.server.backend, Backend::Select);
        assert_eq!(config.connections.max_clients, 10);
        assert_eq!(config.connections.poll_timeout_ms, 1000);
        assert_eq!(config.echo.chunk_size, 1024);
        assert!(config.echo.prefix.is_none());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:9090"
            backlog = 16
            backend = "poll"

            [connections]
            max_clients = 32
            poll_timeout_ms = 250

            [echo]
            prefix = "echo: "
            chunk_size = 4096

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9090");
        assert_eq!(config.server.backlog, 16);
        assert_eq!(config.server.backend, Backend::Poll);
        assert_eq!(config.connections.max_clients, 32);
        assert_eq!(config.connections.poll_timeout_ms, 250);
        assert_eq!(config.echo.prefix.as_deref(), Some("echo: "));
        assert_eq!(config.echo.chunk_size, 4096);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_merge_defaults() {
        let cli = CliArgs::parse_from(["poll-echo"]);
        let config = Config::merge(cli, TomlConfig::default()).unwrap();

        assert_eq!(config.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.backlog, 3);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.prefix, "Server received: ");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:9090"
            backend = "select"

            [connections]
            max_clients = 4
        "#,
        )
        .unwrap();
        let cli = CliArgs::parse_from([
            "poll-echo",
            "--listen",
            "127.0.0.1:7070",
            "--backend",
            "poll",
        ]);

        let config = Config::merge(cli, toml_config).unwrap();
        assert_eq!(config.listen, "127.0.0.1:7070".parse().unwrap());
        assert_eq!(config.backend, Backend::Poll);
        assert_eq!(config.max_clients, 4);
        assert_eq!(config.prefix, "Server (poll) received: ");
    }

    #[test]
    fn test_explicit_prefix_wins_over_backend_default() {
        let cli = CliArgs::parse_from(["poll-echo", "-b", "mio", "--prefix", "> "]);
        let config = Config::merge(cli, TomlConfig::default()).unwrap();
        assert_eq!(config.backend, Backend::Mio);
        assert_eq!(config.prefix, "> ");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cli = CliArgs::parse_from(["poll-echo", "--listen", "not-an-addr"]);
        assert!(matches!(
            Config::merge(cli, TomlConfig::default()),
            Err(ConfigError::InvalidListen(..))
        ));

        let cli = CliArgs::parse_from(["poll-echo", "--max-clients", "0"]);
        assert!(matches!(
            Config::merge(cli, TomlConfig::default()),
            Err(ConfigError::Invalid(_))
        ));

        let cli = CliArgs::parse_from(["poll-echo", "--chunk-size", "0"]);
        assert!(matches!(
            Config::merge(cli, TomlConfig::default()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_client_args() {
        let args = ClientArgs::parse_from(["poll-echo-client", "127.0.0.1"]);
        assert_eq!(args.server_addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(args.connect_timeout(), Duration::from_secs(5));

        assert!(ClientArgs::try_parse_from(["poll-echo-client"]).is_err());
        assert!(ClientArgs::try_parse_from(["poll-echo-client", "localhost"]).is_err());
        assert!(ClientArgs::try_parse_from(["poll-echo-client", "::1"]).is_err());
        assert!(
            ClientArgs::try_parse_from(["poll-echo-client", "127.0.0.1", "10.0.0.1"]).is_err()
        );
    }
}
