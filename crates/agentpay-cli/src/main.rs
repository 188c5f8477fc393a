//! AgentPay CLI - Escrow demos and negotiation document tools
//!
//! # Usage
//!
//! ```bash
//! # Settle an escrow end to end and write its audit record
//! agentpay demo settle
//!
//! # Refund instead, with your own negotiation documents
//! agentpay demo refund --intent intent.json --trigger trigger.json
//!
//! # Task id an intent document binds to
//! agentpay hash intent.json
//!
//! # Environment overrides
//! AGENTPAY__AUDIT__OUTPUT_DIR=/tmp/audit agentpay demo settle
//! ```

mod commands;
mod config;
mod display;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::demo::{DemoOptions, Scenario};
use crate::commands::{demo, hash};
use crate::config::{AppConfig, LoggingConfig};

/// AgentPay - Escrowed payments between buyers and agents
#[derive(Parser, Debug)]
#[command(name = "agentpay")]
#[command(author = "AgentPay Contributors")]
#[command(version)]
#[command(about = "Escrow lifecycle demos and replayable audit records", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one escrow lifecycle against an in-memory ledger
    Demo {
        /// How the escrow ends
        #[arg(value_enum)]
        scenario: Scenario,

        /// Intent document (JSON); a built-in sample is used if omitted
        #[arg(long)]
        intent: Option<PathBuf>,

        /// Payment trigger document (JSON); a built-in sample is used if omitted
        #[arg(long)]
        trigger: Option<PathBuf>,

        /// Directory for the audit record (overrides audit.output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the content hash (task id) of a negotiation document
    Hash {
        /// Document to hash
        file: PathBuf,

        /// Also print the canonical serialisation
        #[arg(long)]
        canonical: bool,
    },
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .try_init()?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        chain = %config.chain.name,
        chain_id = config.chain.chain_id,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Demo {
            scenario,
            intent,
            trigger,
            output_dir,
        } => {
            demo::run(
                &config,
                scenario,
                DemoOptions {
                    intent,
                    trigger,
                    output_dir,
                },
            )
            .await?;
        }
        Commands::Hash { file, canonical } => {
            hash::run(&file, canonical).await?;
        }
    }

    Ok(())
}
