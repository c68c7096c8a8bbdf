//! voicemail-dal - command-line entry point.
//!
//! Runs statements through the transactional provider against the database
//! named by `--database` / `VOICEMAIL_DAL_DATABASE`.

use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use voicemail_dal::config::{Command, Config};
use voicemail_dal::{DalError, Provider, Query, QueryParam};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays valid JSON
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(config: &Config) -> Result<serde_json::Value, DalError> {
    let provider_config = config.provider_config()?;
    let provider = Provider::from_config(&provider_config)?;
    info!(
        backend = provider.name(),
        url = %provider_config.masked_connection_string(),
        "Using database"
    );

    match &config.command {
        Command::Check => {
            provider.run_query(&Query::new("SELECT 1")).await?;
            Ok(json!({ "status": "ok", "provider": provider.name() }))
        }
        Command::Exec { sql, params } => {
            let values = params.iter().map(|p| QueryParam::parse_loose(p)).collect();
            let result = provider
                .run_query(&Query::with_values(sql.as_str(), values))
                .await?;
            serde_json::to_value(&result)
                .map_err(|e| DalError::internal(format!("Failed to serialize result: {}", e)))
        }
        Command::Info => Ok(json!({
            "provider": provider_config.kind.display_name(),
            "database": provider_config.database,
            "url": provider_config.masked_connection_string(),
            "date_type": provider.date_type(),
        })),
    }
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    match run(&config).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!(error = %e, "Failed to render output");
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            std::process::exit(1);
        }
    }
}
