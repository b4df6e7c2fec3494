//! Command-line, environment and runtime-file configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::exclusion::ExcludePatterns;
use crate::timeout::RetryPolicy;

/// Command-line interface of the gateway binary
///
/// Every connection flag falls back to a `WAREHOUSE_*` environment variable.
#[derive(Parser, Clone)]
#[command(name = "warehouse-gateway", author, version, about)]
pub struct Cli {
    /// Warehouse connection string (driver selected by scheme)
    #[arg(long, env = "WAREHOUSE_DSN", hide_env_values = true)]
    pub dsn: String,

    /// Compute warehouse to use for the session
    #[arg(long, env = "WAREHOUSE_NAME")]
    pub warehouse: Option<String>,

    /// Default database
    #[arg(long, env = "WAREHOUSE_DATABASE")]
    pub database: Option<String>,

    /// Default schema
    #[arg(long, env = "WAREHOUSE_SCHEMA")]
    pub schema: Option<String>,

    /// Role to assume for the session
    #[arg(long, env = "WAREHOUSE_ROLE")]
    pub role: Option<String>,

    /// Register write_query and create_table
    #[arg(long, default_value_t = false)]
    pub allow_write: bool,

    /// Tool names to withhold, comma separated
    #[arg(long, value_delimiter = ',')]
    pub exclude_tools: Vec<String>,

    /// Expose the configured schema's tables as context resources
    #[arg(long, default_value_t = false)]
    pub prefetch: bool,

    /// JSON runtime config holding exclusion patterns
    #[arg(long, default_value = "runtime_config.json")]
    pub config_file: PathBuf,

    /// Write logs to <DIR>/warehouse_gateway.log instead of stderr
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,

    #[arg(long, default_value_t = 60)]
    pub query_timeout_secs: u64,

    /// Retries for connection errors and timeouts
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Age after which the warehouse session is re-established
    #[arg(long, default_value_t = 1800)]
    pub session_ttl_secs: u64,

    #[arg(long, default_value_t = 5)]
    pub max_connections: u32,
}

/// Contents of the runtime config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub exclude_patterns: ExcludePatterns,
}

impl RuntimeConfig {
    /// Load from `path`; a missing file yields the empty config
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        if !path.exists() {
            log::info!(
                "Runtime config {} not found, using no exclusion patterns",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config: RuntimeConfig = serde_json::from_str(&text).map_err(|e| {
            GatewayError::Config(format!("Invalid runtime config {}: {}", path.display(), e))
        })?;

        log::info!("✓ Loaded runtime config from {}", path.display());
        Ok(config)
    }
}

/// Session-level warehouse settings
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub dsn: SecretString,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub max_connections: u32,
    pub session_ttl: Duration,
}

impl ConnectionSettings {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: SecretString::from(dsn.into()),
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            max_connections: 5,
            session_ttl: Duration::from_secs(1800),
        }
    }

    /// `USE` statements issued on every new connection, in order
    pub fn session_statements(&self) -> Vec<String> {
        [
            ("WAREHOUSE", &self.warehouse),
            ("ROLE", &self.role),
            ("DATABASE", &self.database),
            ("SCHEMA", &self.schema),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.as_ref().map(|v| format!("USE {} {}", kind, v)))
        .collect()
    }
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub connection: ConnectionSettings,
    pub allow_write: bool,
    pub exclude_tools: Vec<String>,
    pub prefetch: bool,
    pub exclude_patterns: ExcludePatterns,
    pub retry: RetryPolicy,
}

impl ServerConfig {
    /// Resolve CLI flags and the runtime config file
    pub fn from_cli(cli: &Cli) -> Result<Self, GatewayError> {
        let runtime = RuntimeConfig::load(&cli.config_file)?;
        Self::from_parts(cli, runtime)
    }

    pub fn from_parts(cli: &Cli, runtime: RuntimeConfig) -> Result<Self, GatewayError> {
        for name in [&cli.warehouse, &cli.database, &cli.schema, &cli.role]
            .into_iter()
            .flatten()
        {
            crate::validate::validate_identifier(name)
                .map_err(|e| GatewayError::Config(e.to_string()))?;
        }

        if cli.prefetch && (cli.database.is_none() || cli.schema.is_none()) {
            return Err(GatewayError::Config(
                "--prefetch requires --database and --schema".to_string(),
            ));
        }

        let connection = ConnectionSettings {
            dsn: SecretString::from(cli.dsn.clone()),
            warehouse: cli.warehouse.clone(),
            database: cli.database.clone(),
            schema: cli.schema.clone(),
            role: cli.role.clone(),
            max_connections: cli.max_connections.max(1),
            session_ttl: Duration::from_secs(cli.session_ttl_secs),
        };

        let retry = RetryPolicy {
            query_timeout: Duration::from_secs(cli.query_timeout_secs),
            max_retries: cli.max_retries,
            ..RetryPolicy::default()
        };

        Ok(Self {
            connection,
            allow_write: cli.allow_write,
            exclude_tools: cli
                .exclude_tools
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            prefetch: cli.prefetch,
            exclude_patterns: runtime.exclude_patterns,
            retry,
        })
    }

    pub fn is_tool_excluded(&self, name: &str) -> bool {
        self.exclude_tools.iter().any(|t| t == name)
    }
}
