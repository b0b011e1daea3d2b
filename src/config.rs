use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::anomaly::ScanConfig;
use crate::services::RetryPolicy;
use crate::signing::SigningSecret;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Env,
    Vault,
}

impl FromStr for SecretSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "env" => Ok(SecretSource::Env),
            "vault" => Ok(SecretSource::Vault),
            other => anyhow::bail!("SIGNING_SECRET_SOURCE must be 'env' or 'vault', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
        }
    }
}

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub signing_secret_source: SecretSource,
    /// Present when the source is `Env`; filled in from Vault otherwise.
    pub signing_secret: Option<SigningSecret>,
    pub admin_api_key: String,
    pub scan: ScanConfig,
    pub ledger_timeout: Duration,
    pub fraud_log_retry: RetryPolicy,
    pub fraud_scan_schedule: Option<String>,
    pub log_format: LogFormat,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let signing_secret_source: SecretSource = env_or("SIGNING_SECRET_SOURCE", SecretSource::Env)?;
        let signing_secret = env::var("TICKET_SIGNING_SECRET").ok().map(SigningSecret::new);

        if signing_secret_source == SecretSource::Env && signing_secret.is_none() {
            anyhow::bail!("TICKET_SIGNING_SECRET is required when SIGNING_SECRET_SOURCE=env");
        }

        let defaults = ScanConfig::default();
        let config = Config {
            server_port: env_or("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").ok(),
            signing_secret_source,
            signing_secret,
            admin_api_key: env::var("ADMIN_API_KEY").context("ADMIN_API_KEY is required")?,
            scan: ScanConfig {
                threshold: env_or("ANOMALY_THRESHOLD", defaults.threshold)?,
                min_samples: env_or("SCAN_MIN_SAMPLES", defaults.min_samples)?,
                contamination: env_or("SCAN_CONTAMINATION", defaults.contamination)?,
                ..defaults
            },
            ledger_timeout: Duration::from_millis(env_or("LEDGER_TIMEOUT_MS", 5_000)?),
            fraud_log_retry: RetryPolicy {
                max_retries: env_or("FRAUD_LOG_MAX_RETRIES", 2)?,
                backoff: Duration::from_millis(env_or("FRAUD_LOG_RETRY_BACKOFF_MS", 50)?),
            },
            fraud_scan_schedule: env::var("FRAUD_SCAN_SCHEDULE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            log_format: env_or("LOG_FORMAT", LogFormat::Text)?,
            log_request_body: env_or("LOG_REQUEST_BODY", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.admin_api_key.trim().is_empty() {
            anyhow::bail!("ADMIN_API_KEY must not be empty");
        }
        if matches!(&self.signing_secret, Some(secret) if secret.is_empty()) {
            anyhow::bail!("TICKET_SIGNING_SECRET must not be empty");
        }
        if self.ledger_timeout.is_zero() {
            anyhow::bail!("LEDGER_TIMEOUT_MS must be greater than 0");
        }
        self.scan.validate().map_err(|e| anyhow::anyhow!(e))?;
        if let Some(expr) = &self.fraud_scan_schedule {
            cron::Schedule::from_str(expr)
                .map_err(|e| anyhow::anyhow!("FRAUD_SCAN_SCHEDULE is not a valid cron expression: {}", e))?;
        }

        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            server_port: 3000,
            database_url: None,
            signing_secret_source: SecretSource::Env,
            signing_secret: Some(SigningSecret::new("secret")),
            admin_api_key: "admin".to_string(),
            scan: ScanConfig::default(),
            ledger_timeout: Duration::from_secs(5),
            fraud_log_retry: RetryPolicy::default(),
            fraud_scan_schedule: None,
            log_format: LogFormat::Text,
            log_request_body: false,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_empty_admin_key() {
        let mut cfg = config();
        cfg.admin_api_key = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_cron_expression() {
        let mut cfg = config();
        cfg.fraud_scan_schedule = Some("every five minutes".to_string());
        assert!(cfg.validate().is_err());

        cfg.fraud_scan_schedule = Some("0 */5 * * * *".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_contamination() {
        let mut cfg = config();
        cfg.scan.contamination = 0.9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_enums() {
        assert_eq!("VAULT".parse::<SecretSource>().unwrap(), SecretSource::Vault);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn debug_output_hides_secret() {
        assert!(!format!("{:?}", config()).contains("\"secret\""));
    }
}
