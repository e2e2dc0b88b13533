/*
 * fxdesk - Currency Trading Desk
 * Main entry point for the application
 */

use anyhow::Context;
use clap::Parser;
use fxdesk::{cli::Shell, config::{Config, LogFormat, LoggingConfig}, service::TradeService};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "fxdesk", version, about = "Currency trading desk with cached exchange rates")]
struct Args {
    /// Configuration file (defaults to ./fxdesk.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single command instead of the interactive prompt
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!("Starting fxdesk");

    let mut shell = Shell::new(TradeService::new(config));

    if args.command.is_empty() {
        shell.run().await.map_err(|e| {
            error!("Command prompt stopped: {}", e);
            e
        })?;
    } else {
        let reply = shell.execute_args(args.command).await;
        println!("{}", reply.output);
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&logging.dir)
        .with_context(|| format!("Failed to create log directory {}", logging.dir.display()))?;
    let log_path = logging.dir.join("actions.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    let writer = Mutex::new(file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fxdesk={}", logging.level)));

    let (text, json) = match logging.format {
        LogFormat::Text => (Some(fmt::layer().with_ansi(false).with_writer(writer)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(writer))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
    Ok(())
}
