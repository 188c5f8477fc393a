//! CLI Configuration
//!
//! Layered with the `config` crate: an optional `--config` file, then
//! `config/default` and `config/local`, then `AGENTPAY__*` environment
//! variables. Every field has a default, so an empty environment yields a
//! working development setup.

use std::path::PathBuf;

use agentpay_audit::ReconcileOptions;
use agentpay_types::{Amount, ChainInfo};
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ledger identity
    #[serde(default)]
    pub chain: ChainConfig,

    /// Audit reconciliation and storage
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Demo scenario settings
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_name")]
    pub name: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: default_chain_name(),
            chain_id: default_chain_id(),
        }
    }
}

impl ChainConfig {
    pub fn info(&self) -> ChainInfo {
        ChainInfo::new(self.name.clone(), self.chain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory audit records are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Prefix of the proof URI reported in audit records
    #[serde(default = "default_proof_uri_prefix")]
    pub proof_uri_prefix: String,

    /// Fail reconciliation when the intent does not hash to the task id
    #[serde(default)]
    pub verify_task_binding: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            proof_uri_prefix: default_proof_uri_prefix(),
            verify_task_binding: false,
        }
    }
}

impl AuditConfig {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            proof_uri_prefix: self.proof_uri_prefix.clone(),
            verify_task_binding: self.verify_task_binding,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Amounts are decimal strings in whole units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_payer_funding")]
    pub payer_funding: String,

    #[serde(default = "default_escrow_amount")]
    pub escrow_amount: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            payer_funding: default_payer_funding(),
            escrow_amount: default_escrow_amount(),
        }
    }
}

impl DemoConfig {
    pub fn payer_funding(&self) -> anyhow::Result<Amount> {
        Amount::parse_decimal(&self.payer_funding)
            .with_context(|| format!("invalid demo.payer_funding {:?}", self.payer_funding))
    }

    pub fn escrow_amount(&self) -> anyhow::Result<Amount> {
        Amount::parse_decimal(&self.escrow_amount)
            .with_context(|| format!("invalid demo.escrow_amount {:?}", self.escrow_amount))
    }
}

fn default_chain_name() -> String {
    "local".to_string()
}

fn default_chain_id() -> u64 {
    31337
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./audit")
}

fn default_proof_uri_prefix() -> String {
    "proof://".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_payer_funding() -> String {
    "1".to_string()
}

fn default_escrow_amount() -> String {
    "0.05".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // Environment variables with AGENTPAY_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("AGENTPAY")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("failed to read configuration")?;
        config
            .try_deserialize()
            .context("failed to parse configuration")
    }
}
