use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::FraudScanService;

/// Runs `scan_and_record` on a cron schedule.
#[derive(Clone)]
pub struct ScanScheduler {
    schedule: Schedule,
    service: Arc<FraudScanService>,
}

impl ScanScheduler {
    pub fn new(expression: &str, service: Arc<FraudScanService>) -> Result<Self, cron::error::Error> {
        Ok(Self {
            schedule: Schedule::from_str(expression)?,
            service,
        })
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            while let Some(next) = scheduler.next_run() {
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                match scheduler.service.scan_and_record(None).await {
                    Ok(outcome) => tracing::info!(
                        flagged = outcome.value.count,
                        sample_size = outcome.value.sample_size,
                        warnings = outcome.warnings.len(),
                        "Scheduled fraud scan finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "Scheduled fraud scan failed"),
                }
            }
            tracing::warn!("Fraud scan schedule has no upcoming runs; scheduler stopped");
        })
    }
}
