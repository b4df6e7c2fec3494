// Warehouse gateway binary
//
// Serves the warehouse tools over MCP stdio. Logs go to stderr, or to
// <log-dir>/warehouse_gateway.log, never to stdout.
//
// REQUIRED: --dsn or WAREHOUSE_DSN.

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;
use std::fs::OpenOptions;

use warehouse_gateway::{Cli, ServerConfig, redact_dsn, run_server, validate_dsn};

const LOG_FILE_NAME: &str = "warehouse_gateway.log";

fn init_logging(cli: &Cli) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(cli.log_level);
    // RUST_LOG refines the --log-level default
    builder.parse_default_env();

    match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(env_logger::Target::Stderr);
        }
    }

    builder.try_init().context("Failed to initialize logger")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let dsn = SecretString::from(cli.dsn.clone());
    let driver = validate_dsn(&dsn).context("Invalid WAREHOUSE_DSN")?;
    log::info!("Connecting to {} ({})", redact_dsn(&dsn), driver);

    let config = ServerConfig::from_cli(&cli)?;
    if config.allow_write {
        log::warn!("Write tools enabled: write_query and create_table are available");
    }

    run_server(config).await
}
