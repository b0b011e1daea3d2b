//! Statistical outlier scan over the transaction set.
//!
//! Flags are advisory. They feed the fraud log or an operator and never reverse
//! a transaction.

pub mod features;
pub mod isolation_forest;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::validation::{validate_contamination, validate_threshold, ValidationResult};

pub use features::{FeatureRow, ScanInput};
pub use isolation_forest::{ForestParams, IsolationForest};

pub const DEFAULT_THRESHOLD: f64 = -0.1;
pub const DEFAULT_MIN_SAMPLES: usize = 10;
pub const DEFAULT_CONTAMINATION: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConfig {
    /// Flag when the decision score is strictly below this value.
    pub threshold: f64,
    /// Below this many transactions a scan returns nothing.
    pub min_samples: usize,
    /// Expected outlier share; a prior, not a cap on the flagged count.
    pub contamination: f64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
            contamination: DEFAULT_CONTAMINATION,
            n_estimators: forest.n_estimators,
            max_samples: forest.max_samples,
            seed: forest.seed,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> ValidationResult {
        validate_threshold(self.threshold)?;
        validate_contamination(self.contamination)?;
        Ok(())
    }

    fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators.max(1),
            max_samples: self.max_samples.max(1),
            contamination: self.contamination,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedTransaction {
    pub transaction_id: Uuid,
    pub score: f64,
    pub features: FeatureRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub flagged: Vec<FlaggedTransaction>,
    pub count: usize,
    pub sample_size: usize,
    pub threshold: f64,
    /// Fewer transactions than the minimum sample size; not an error.
    pub insufficient_data: bool,
}

#[derive(Debug, Clone)]
pub struct AnomalyScanner {
    config: ScanConfig,
}

impl AnomalyScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Score `transactions` with a freshly fitted model and return the ones whose
    /// decision score is strictly below `threshold`.
    pub fn scan(
        &self,
        transactions: &[Transaction],
        threshold: f64,
    ) -> Result<ScanReport, crate::validation::ValidationError> {
        let inputs: Vec<ScanInput> = transactions.iter().map(ScanInput::from).collect();
        self.scan_inputs(&inputs, threshold, Utc::now())
    }

    pub fn scan_inputs(
        &self,
        inputs: &[ScanInput],
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<ScanReport, crate::validation::ValidationError> {
        validate_threshold(threshold)?;

        if inputs.len() < self.config.min_samples || inputs.is_empty() {
            tracing::debug!(
                sample_size = inputs.len(),
                min_samples = self.config.min_samples,
                "Not enough transactions to scan"
            );
            return Ok(ScanReport {
                flagged: Vec::new(),
                count: 0,
                sample_size: inputs.len(),
                threshold,
                insufficient_data: true,
            });
        }

        let features: Vec<FeatureRow> = inputs
            .iter()
            .map(|input| FeatureRow::extract(input, now))
            .collect();
        let matrix: Vec<Vec<f64>> = features.iter().map(FeatureRow::to_vec).collect();

        let forest = IsolationForest::fit(&matrix, &self.config.forest_params());
        let scores = forest.decision_function(&matrix);

        let flagged: Vec<FlaggedTransaction> = inputs
            .iter()
            .zip(features)
            .zip(scores)
            .filter(|(_, score)| *score < threshold)
            .map(|((input, features), score)| FlaggedTransaction {
                transaction_id: input.transaction_id,
                score,
                features,
            })
            .collect();

        tracing::info!(
            sample_size = inputs.len(),
            flagged = flagged.len(),
            threshold,
            offset = forest.offset(),
            "Anomaly scan completed"
        );

        Ok(ScanReport {
            count: flagged.len(),
            flagged,
            sample_size: inputs.len(),
            threshold,
            insufficient_data: false,
        })
    }
}
