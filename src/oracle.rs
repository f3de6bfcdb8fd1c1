//! The churn classifier seen as a black box.
//!
//! Sessions only ever talk to a [`ChurnOracle`]; which model sits behind it
//! (the local logistic artifact or a remote model server) is decided once at
//! startup.

use crate::artifact::ModelArtifact;
use crate::errors::AppError;
use crate::models::{ClassProbabilities, CustomerRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Probability pairs may drift from 1.0 by this much before being rejected.
const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Numeric columns a logistic artifact may weight.
pub const NUMERIC_COLUMNS: [&str; 8] = [
    "Age",
    "IsActiveMember",
    "HasCrCard",
    "NumOfProducts",
    "Tenure",
    "Balance",
    "EstimatedSalary",
    "CreditScore",
];

/// Categorical columns a logistic artifact may one-hot encode.
pub const CATEGORICAL_COLUMNS: [&str; 2] = ["Gender", "Geography"];

/// Pre-trained churn classifier.
///
/// Implementations are shared read-only between sessions.
#[async_trait]
pub trait ChurnOracle: Send + Sync {
    /// One label per row, in input order: `1` = churn, `0` = stay.
    async fn predict(&self, records: &[CustomerRecord]) -> Result<Vec<u8>, AppError>;

    /// One `(stay, churn)` probability pair per row, in input order.
    async fn predict_proba(
        &self,
        records: &[CustomerRecord],
    ) -> Result<Vec<ClassProbabilities>, AppError>;

    /// Human-readable identification for health output and logs.
    fn describe(&self) -> String;
}

/// Ensures the oracle answered once per row with binary labels.
pub fn check_labels(labels: &[u8], expected_rows: usize) -> Result<(), AppError> {
    if labels.len() != expected_rows {
        return Err(AppError::Prediction(format!(
            "model returned {} labels for {} rows",
            labels.len(),
            expected_rows
        )));
    }
    if let Some(bad) = labels.iter().find(|l| **l > 1) {
        return Err(AppError::Prediction(format!(
            "model returned unknown label {}",
            bad
        )));
    }
    Ok(())
}

/// Ensures the oracle answered once per row with proper distributions.
pub fn check_probabilities(
    probabilities: &[ClassProbabilities],
    expected_rows: usize,
) -> Result<(), AppError> {
    if probabilities.len() != expected_rows {
        return Err(AppError::Prediction(format!(
            "model returned {} probability rows for {} rows",
            probabilities.len(),
            expected_rows
        )));
    }

    for (idx, p) in probabilities.iter().enumerate() {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(p.stay_probability)
            || !in_unit(p.churn_probability)
            || (p.stay_probability + p.churn_probability - 1.0).abs() > PROBABILITY_TOLERANCE
        {
            return Err(AppError::Prediction(format!(
                "model returned an invalid distribution for row {}: ({}, {})",
                idx + 1,
                p.stay_probability,
                p.churn_probability
            )));
        }
    }
    Ok(())
}

fn require_rows(records: &[CustomerRecord]) -> Result<(), AppError> {
    if records.is_empty() {
        return Err(AppError::Prediction("no records to score".to_string()));
    }
    Ok(())
}

// ============ Logistic model artifact ============

/// Weight for one numeric column, applied to `(value - mean) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericTerm {
    pub weight: f64,
    #[serde(default)]
    pub mean: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

/// Serialized logistic regression over the customer columns.
///
/// Categorical levels missing from the artifact are the reference level and
/// contribute nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    #[serde(default)]
    pub numeric: BTreeMap<String, NumericTerm>,
    #[serde(default)]
    pub categorical: BTreeMap<String, BTreeMap<String, f64>>,
}

impl LogisticModel {
    /// Rejects artifacts that reference columns the records don't have.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.intercept.is_finite() {
            anyhow::bail!("intercept must be finite");
        }
        for (column, term) in &self.numeric {
            if !NUMERIC_COLUMNS.contains(&column.as_str()) {
                anyhow::bail!("unknown numeric column '{}'", column);
            }
            if !term.weight.is_finite() || !term.mean.is_finite() {
                anyhow::bail!("non-finite weight or mean for '{}'", column);
            }
            if !term.scale.is_finite() || term.scale == 0.0 {
                anyhow::bail!("scale for '{}' must be finite and non-zero", column);
            }
        }
        for (column, levels) in &self.categorical {
            if !CATEGORICAL_COLUMNS.contains(&column.as_str()) {
                anyhow::bail!("unknown categorical column '{}'", column);
            }
            if levels.values().any(|w| !w.is_finite()) {
                anyhow::bail!("non-finite level weight for '{}'", column);
            }
        }
        Ok(())
    }

    /// Probability mass on the churn class for one record.
    pub fn churn_probability(&self, record: &CustomerRecord) -> f64 {
        let mut z = self.intercept;

        for (column, term) in &self.numeric {
            if let Some(value) = numeric_value(record, column) {
                z += term.weight * (value - term.mean) / term.scale;
            }
        }

        for (column, levels) in &self.categorical {
            let level = match column.as_str() {
                "Gender" => record.gender.as_str(),
                "Geography" => record.geography.as_str(),
                _ => continue,
            };
            z += levels.get(level).copied().unwrap_or(0.0);
        }

        sigmoid(z)
    }
}

fn numeric_value(record: &CustomerRecord, column: &str) -> Option<f64> {
    let value = match column {
        "Age" => f64::from(record.age),
        "IsActiveMember" => f64::from(u8::from(record.is_active_member)),
        "HasCrCard" => f64::from(u8::from(record.has_credit_card)),
        "NumOfProducts" => f64::from(record.num_of_products),
        "Tenure" => f64::from(record.tenure),
        "Balance" => record.balance,
        "EstimatedSalary" => record.estimated_salary,
        "CreditScore" => record.credit_score,
        _ => return None,
    };
    Some(value)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Oracle backed by a local logistic artifact.
pub struct LogisticOracle {
    model: LogisticModel,
    fingerprint: String,
}

impl LogisticOracle {
    /// Loads and validates the artifact at `path`.
    pub fn from_path(path: &Path, expected_sha256: Option<&str>) -> anyhow::Result<Self> {
        let artifact = ModelArtifact::load(path, expected_sha256)?;
        let model: LogisticModel = serde_json::from_slice(&artifact.bytes).map_err(|e| {
            anyhow::anyhow!("Model artifact {} is not valid: {}", path.display(), e)
        })?;
        model.validate()?;

        tracing::info!(
            "Loaded logistic model from {} ({} numeric, {} categorical terms, sha256 {})",
            path.display(),
            model.numeric.len(),
            model.categorical.len(),
            artifact.short_fingerprint()
        );

        Ok(Self {
            model,
            fingerprint: artifact.short_fingerprint().to_string(),
        })
    }

    /// Wraps an in-memory model.
    pub fn from_model(model: LogisticModel) -> anyhow::Result<Self> {
        model.validate()?;
        let bytes = serde_json::to_vec(&model)?;
        let artifact = ModelArtifact::new(bytes);
        Ok(Self {
            model,
            fingerprint: artifact.short_fingerprint().to_string(),
        })
    }
}

#[async_trait]
impl ChurnOracle for LogisticOracle {
    async fn predict(&self, records: &[CustomerRecord]) -> Result<Vec<u8>, AppError> {
        require_rows(records)?;
        Ok(records
            .iter()
            .map(|r| u8::from(self.model.churn_probability(r) >= 0.5))
            .collect())
    }

    async fn predict_proba(
        &self,
        records: &[CustomerRecord],
    ) -> Result<Vec<ClassProbabilities>, AppError> {
        require_rows(records)?;
        Ok(records
            .iter()
            .map(|r| ClassProbabilities::from_churn(self.model.churn_probability(r)))
            .collect())
    }

    fn describe(&self) -> String {
        format!("logistic:{}", self.fingerprint)
    }
}
