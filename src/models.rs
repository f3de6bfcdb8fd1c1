use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sentinel stored when a customer has no surname.
pub const MISSING_SURNAME: &str = "N/A";

// ============ Domain Models ============

/// Customer gender as accepted by the churn model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Country the customer banks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geography {
    France,
    Spain,
    Germany,
}

impl Geography {
    pub const ALL: [Geography; 3] = [Geography::France, Geography::Spain, Geography::Germany];

    pub fn as_str(&self) -> &'static str {
        match self {
            Geography::France => "France",
            Geography::Spain => "Spain",
            Geography::Germany => "Germany",
        }
    }
}

impl FromStr for Geography {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Geography::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the working table.
///
/// Serialized with the model's column names so the same shape is used for
/// uploads, oracle requests and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(
        rename = "Surname",
        default = "missing_surname",
        deserialize_with = "surname::deserialize"
    )]
    pub surname: String,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Geography")]
    pub geography: Geography,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "IsActiveMember", with = "flag")]
    pub is_active_member: bool,
    #[serde(rename = "HasCrCard", with = "flag")]
    pub has_credit_card: bool,
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
}

/// Column order expected by the model.
pub const RECORD_COLUMNS: [&str; 11] = [
    "Surname",
    "Gender",
    "Geography",
    "Age",
    "IsActiveMember",
    "HasCrCard",
    "NumOfProducts",
    "Tenure",
    "Balance",
    "EstimatedSalary",
    "CreditScore",
];

fn missing_surname() -> String {
    MISSING_SURNAME.to_string()
}

/// Blank surnames collapse to the `N/A` sentinel.
mod surname {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(super::missing_surname))
    }
}

/// Yes/no attributes travel as 0/1.
///
/// Decoding is lenient about the source: numbers, booleans and
/// `yes`/`no`/`true`/`false` strings are all accepted.
mod flag {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FlagVisitor)
    }

    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("0 or 1 (or yes/no)")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
            }
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            if v == 0.0 {
                Ok(false)
            } else if v == 1.0 {
                Ok(true)
            } else {
                Err(E::invalid_value(de::Unexpected::Float(v), &self))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "1.0" | "yes" | "true" => Ok(true),
                "0" | "0.0" | "no" | "false" => Ok(false),
                _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
            }
        }
    }
}

/// Outcome of thresholding a churn probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Churn,
    Stay,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Churn => "CHURN",
            Decision::Stay => "STAY",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-row class probabilities returned by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub stay_probability: f64,
    pub churn_probability: f64,
}

impl ClassProbabilities {
    pub fn from_churn(churn_probability: f64) -> Self {
        Self {
            stay_probability: 1.0 - churn_probability,
            churn_probability,
        }
    }
}

/// A working-set record together with its scored outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub record: CustomerRecord,
    /// Stay mass exactly as the oracle reported it.
    pub stay_probability: f64,
    pub churn_probability: f64,
    pub decision: Decision,
}

/// Aggregate outcome counts, also used as pie-chart data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub stay_count: usize,
    pub churn_count: usize,
    pub stay_share: f64,
    pub churn_share: f64,
    /// Raw probabilities when exactly one record was scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single: Option<ClassProbabilities>,
}

/// Wizard step a session is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Home,
    InsertData,
    Review,
    Predict,
}

// ============ Request Models ============

/// Raw manual-entry form. Every widget may be left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualEntry {
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub geography: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    /// `"yes"` or `"no"`.
    #[serde(default)]
    pub is_active_member: Option<String>,
    /// `"yes"` or `"no"`.
    #[serde(default)]
    pub has_credit_card: Option<String>,
    #[serde(default)]
    pub num_of_products: Option<i64>,
    #[serde(default)]
    pub tenure: Option<i64>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub estimated_salary: Option<f64>,
    #[serde(default)]
    pub credit_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub step: Step,
}

// ============ Response Models ============

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub step: Step,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
    pub records: Vec<CustomerRecord>,
}

#[derive(Debug, Serialize)]
pub struct RecordAdded {
    pub record: CustomerRecord,
    pub working_set_size: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchLoaded {
    pub filename: String,
    pub rows_loaded: usize,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub threshold: f64,
    pub results: Vec<PredictionResult>,
    pub summary: Summary,
}

/// Single-page form answer.
#[derive(Debug, Serialize)]
pub struct QuickPrediction {
    pub record: CustomerRecord,
    pub decision: Decision,
    pub churn_probability: f64,
    pub confidence_percent: u32,
    pub message: String,
}
