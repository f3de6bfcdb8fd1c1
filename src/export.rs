//! CSV export of scored working sets.

use crate::errors::AppError;
use crate::models::{CustomerRecord, Decision, Gender, Geography, PredictionResult};
use serde::{Deserialize, Serialize};

/// Download name used for exported results.
pub const EXPORT_FILENAME: &str = "churn_predictions.csv";

/// One exported line: the record's columns plus its outcome.
///
/// The csv crate can't flatten nested structs, so the record columns are
/// spelled out here in model order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "Surname")]
    pub surname: String,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Geography")]
    pub geography: Geography,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "IsActiveMember")]
    pub is_active_member: u8,
    #[serde(rename = "HasCrCard")]
    pub has_credit_card: u8,
    #[serde(rename = "NumOfProducts")]
    pub num_of_products: u32,
    #[serde(rename = "Tenure")]
    pub tenure: u32,
    #[serde(rename = "Balance")]
    pub balance: f64,
    #[serde(rename = "EstimatedSalary")]
    pub estimated_salary: f64,
    #[serde(rename = "CreditScore")]
    pub credit_score: f64,
    #[serde(rename = "Prediction")]
    pub prediction: Decision,
    #[serde(rename = "Churn_Probability")]
    pub churn_probability: f64,
}

impl From<&PredictionResult> for ExportRow {
    fn from(result: &PredictionResult) -> Self {
        let r = &result.record;
        Self {
            surname: r.surname.clone(),
            gender: r.gender,
            geography: r.geography,
            age: r.age,
            is_active_member: u8::from(r.is_active_member),
            has_credit_card: u8::from(r.has_credit_card),
            num_of_products: r.num_of_products,
            tenure: r.tenure,
            balance: r.balance,
            estimated_salary: r.estimated_salary,
            credit_score: r.credit_score,
            prediction: result.decision,
            churn_probability: result.churn_probability,
        }
    }
}

impl ExportRow {
    /// Splits an exported line back into the record and its outcome.
    pub fn into_parts(self) -> (CustomerRecord, Decision, f64) {
        let record = CustomerRecord {
            surname: self.surname,
            gender: self.gender,
            geography: self.geography,
            age: self.age,
            is_active_member: self.is_active_member == 1,
            has_credit_card: self.has_credit_card == 1,
            num_of_products: self.num_of_products,
            tenure: self.tenure,
            balance: self.balance,
            estimated_salary: self.estimated_salary,
            credit_score: self.credit_score,
        };
        (record, self.prediction, self.churn_probability)
    }
}

/// Serializes results as UTF-8 CSV with a header row.
pub fn export_csv(results: &[PredictionResult]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for result in results {
        writer
            .serialize(ExportRow::from(result))
            .map_err(|e| AppError::InternalError(format!("CSV export failed: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV export failed: {}", e)))
}

/// Reads an exported file back into rows.
pub fn read_export(bytes: &[u8]) -> Result<Vec<ExportRow>, AppError> {
    csv::Reader::from_reader(bytes)
        .deserialize()
        .collect::<Result<Vec<ExportRow>, _>>()
        .map_err(|e| AppError::Decode(format!("not a prediction export: {}", e)))
}
