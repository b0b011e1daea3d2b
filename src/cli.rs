use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

use crate::anomaly::AnomalyScanner;
use crate::config::{Config, SecretSource};
use crate::ports::{FraudLogStore, TransactionRepository};
use crate::services::{bounded, FraudRecorder, FraudScanService};

#[derive(Parser)]
#[command(name = "turnstile-core")]
#[command(about = "Turnstile Core - signed event tickets with duplicate-use and anomaly detection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Use process-local stores instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Run an anomaly scan over all transactions
    Scan {
        /// Flag transactions scoring strictly below this value
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,

        /// Append a fraud log entry per flagged transaction
        #[arg(long)]
        record: bool,
    },

    /// Transaction commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Fraud log commands
    #[command(subcommand)]
    Fraud(FraudCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Show a transaction by ID
    Show {
        /// Transaction UUID
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum FraudCommands {
    /// List the most recent fraud log entries
    Log {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_scan(
    config: &Config,
    ledger: Arc<dyn TransactionRepository>,
    fraud_log: Arc<dyn FraudLogStore>,
    threshold: Option<f64>,
    record: bool,
) -> anyhow::Result<()> {
    let recorder = FraudRecorder::new(fraud_log, config.fraud_log_retry, config.ledger_timeout);
    let service = FraudScanService::new(
        ledger,
        recorder,
        AnomalyScanner::new(config.scan),
        config.ledger_timeout,
    );

    let outcome = if record {
        service.scan_and_record(threshold).await?
    } else {
        crate::outcome::Outcome::clean(service.scan(threshold).await?)
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if outcome.value.insufficient_data {
        println!("! Not enough transactions to scan ({} found)", outcome.value.sample_size);
    } else {
        println!(
            "✓ Scan complete: {} of {} transactions flagged",
            outcome.value.count, outcome.value.sample_size
        );
    }

    Ok(())
}

pub async fn handle_tx_show(
    config: &Config,
    ledger: &dyn TransactionRepository,
    tx_id: Uuid,
) -> anyhow::Result<()> {
    match bounded(config.ledger_timeout, ledger.get_by_id(tx_id)).await {
        Ok(tx) => {
            println!("{}", serde_json::to_string_pretty(&tx)?);
            Ok(())
        }
        Err(crate::ports::RepositoryError::NotFound(_)) => {
            tracing::warn!("Transaction {} not found", tx_id);
            anyhow::bail!("Transaction {} not found", tx_id)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_fraud_log(
    config: &Config,
    fraud_log: &dyn FraudLogStore,
    limit: i64,
) -> anyhow::Result<()> {
    let entries = bounded(config.ledger_timeout, fraud_log.list(limit.max(1), 0)).await?;

    if entries.is_empty() {
        println!("No fraud log entries");
        return Ok(());
    }

    for entry in entries {
        let tx = entry
            .transaction_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<20}  {}  {}",
            entry.created_at.to_rfc3339(),
            entry.reason.as_str(),
            tx,
            entry.details
        );
    }

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for migrations"))?;
    let pool = crate::db::create_pool(url, config.ledger_timeout).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");
    config.validate()?;

    let secret_source = match config.signing_secret_source {
        SecretSource::Env => "env",
        SecretSource::Vault => "vault",
    };

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!(
        "  Database URL: {}",
        config
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("  Signing Secret: **** (source: {})", secret_source);
    println!("  Anomaly Threshold: {}", config.scan.threshold);
    println!("  Scan Min Samples: {}", config.scan.min_samples);
    println!("  Scan Contamination: {}", config.scan.contamination);
    println!("  Ledger Timeout: {} ms", config.ledger_timeout.as_millis());
    println!(
        "  Fraud Scan Schedule: {}",
        config.fraud_scan_schedule.as_deref().unwrap_or("(disabled)")
    );

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
