use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use turnstile_core::adapters::{
    InMemoryFraudLog, InMemoryLedger, PostgresFraudLog, PostgresTransactionRepository,
};
use turnstile_core::cli::{self, Cli, Commands, DbCommands, FraudCommands, TxCommands};
use turnstile_core::config::{Config, LogFormat, SecretSource};
use turnstile_core::ports::{FraudLogStore, TransactionRepository};
use turnstile_core::secrets::SecretsManager;
use turnstile_core::services::ScanScheduler;
use turnstile_core::signing::{Signer, SigningSecret};
use turnstile_core::{create_app, db, AppState};

type Stores = (Arc<dyn TransactionRepository>, Arc<dyn FraudLogStore>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
        Commands::Serve { in_memory } => serve(config, in_memory).await,
        Commands::Scan { threshold, record } => {
            let (ledger, fraud_log) = open_stores(&config, false).await?;
            cli::handle_scan(&config, ledger, fraud_log, threshold, record).await
        }
        Commands::Tx(TxCommands::Show { tx_id }) => {
            let (ledger, _) = open_stores(&config, false).await?;
            cli::handle_tx_show(&config, ledger.as_ref(), tx_id).await
        }
        Commands::Fraud(FraudCommands::Log { limit }) => {
            let (_, fraud_log) = open_stores(&config, false).await?;
            cli::handle_fraud_log(&config, fraud_log.as_ref(), limit).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config, in_memory: bool) -> anyhow::Result<()> {
    let signer = load_signer(&config).await?;
    let (ledger, fraud_log) = open_stores(&config, in_memory).await?;

    let state = AppState::build(&config, signer, ledger, fraud_log);

    if let Some(expression) = &config.fraud_scan_schedule {
        let scheduler = ScanScheduler::new(expression, state.fraud_scan.clone())
            .map_err(|e| anyhow::anyhow!("invalid FRAUD_SCAN_SCHEDULE: {}", e))?;
        tracing::info!(next_run = ?scheduler.next_run(), "Fraud scan scheduler started");
        scheduler.start();
    }

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn load_signer(config: &Config) -> anyhow::Result<Signer> {
    let secret: SigningSecret = match config.signing_secret_source {
        SecretSource::Env => config
            .signing_secret
            .clone()
            .context("TICKET_SIGNING_SECRET is not set")?,
        SecretSource::Vault => {
            let secret = tokio::time::timeout(config.ledger_timeout, fetch_vault_secret())
                .await
                .context("timed out reading the signing secret from Vault")??;
            tracing::info!("Signing secret loaded from Vault");
            secret
        }
    };

    if secret.is_empty() {
        anyhow::bail!("signing secret must not be empty");
    }

    Ok(Signer::new(secret))
}

async fn fetch_vault_secret() -> anyhow::Result<SigningSecret> {
    let manager = SecretsManager::new().await?;
    manager.get_signing_secret().await
}

async fn open_stores(config: &Config, in_memory: bool) -> anyhow::Result<Stores> {
    if in_memory {
        tracing::warn!("Using in-memory stores; data is lost on shutdown");
        let ledger: Arc<dyn TransactionRepository> = Arc::new(InMemoryLedger::new());
        let fraud_log: Arc<dyn FraudLogStore> = Arc::new(InMemoryFraudLog::new());
        return Ok((ledger, fraud_log));
    }

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required unless --in-memory is set")?;

    let pool = db::create_pool(database_url, config.ledger_timeout).await?;
    db::run_migrations(&pool).await?;

    let ledger: Arc<dyn TransactionRepository> =
        Arc::new(PostgresTransactionRepository::new(pool.clone()));
    let fraud_log: Arc<dyn FraudLogStore> = Arc::new(PostgresFraudLog::new(pool));
    Ok((ledger, fraud_log))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
