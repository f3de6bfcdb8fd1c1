//! Customer batch workstation: the per-session working set and the
//! predict/summarize workflow over it.

use crate::errors::AppError;
use crate::models::{
    ClassProbabilities, CustomerRecord, Decision, ManualEntry, PredictionResult, Step, Summary,
};
use crate::oracle::{check_labels, check_probabilities, ChurnOracle};
use crate::validation::validate_manual_entry;
use chrono::{DateTime, Utc};

/// Threshold rule: ties go to churn.
pub fn classify(churn_probability: f64, threshold: f64) -> Decision {
    if churn_probability >= threshold {
        Decision::Churn
    } else {
        Decision::Stay
    }
}

/// Rejects thresholds outside `[0, 1]`.
pub fn check_threshold(threshold: f64) -> Result<f64, AppError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(AppError::BadRequest(format!(
            "threshold must be between 0 and 1 (got {})",
            threshold
        )))
    }
}

/// Counts decisions for the outcome chart.
pub fn summarize(results: &[PredictionResult]) -> Summary {
    let churn_count = results
        .iter()
        .filter(|r| r.decision == Decision::Churn)
        .count();
    let stay_count = results.len() - churn_count;

    let share = |count: usize| {
        if results.is_empty() {
            0.0
        } else {
            count as f64 / results.len() as f64
        }
    };

    // Counts of a single row say nothing, so the raw pair is exposed as well.
    let single = match results {
        [only] => Some(ClassProbabilities {
            stay_probability: only.stay_probability,
            churn_probability: only.churn_probability,
        }),
        _ => None,
    };

    Summary {
        stay_count,
        churn_count,
        stay_share: share(stay_count),
        churn_share: share(churn_count),
        single,
    }
}

/// State owned by one interactive session.
#[derive(Debug, Clone)]
pub struct Workstation {
    step: Step,
    working_set: Vec<CustomerRecord>,
    threshold: f64,
    created_at: DateTime<Utc>,
}

impl Workstation {
    /// Fresh session on the Home step with an empty working set.
    pub fn new(default_threshold: f64) -> Self {
        Self {
            step: Step::Home,
            working_set: Vec::new(),
            threshold: default_threshold,
            created_at: Utc::now(),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.working_set
    }

    pub fn len(&self) -> usize {
        self.working_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working_set.is_empty()
    }

    /// Any step is reachable from any other.
    pub fn navigate(&mut self, step: Step) {
        tracing::debug!("Session step {:?} -> {:?}", self.step, step);
        self.step = step;
    }

    /// Validates a manual entry and appends it. Nothing is inserted on failure.
    pub fn add_manual_entry(&mut self, entry: &ManualEntry) -> Result<&CustomerRecord, AppError> {
        let record = validate_manual_entry(entry)?;
        self.working_set.push(record);
        tracing::info!(
            "Manual entry added, working set now {} row(s)",
            self.working_set.len()
        );
        Ok(&self.working_set[self.working_set.len() - 1])
    }

    /// Replaces the working set wholesale with decoded upload rows.
    pub fn load_batch(&mut self, records: Vec<CustomerRecord>) {
        tracing::info!(
            "Batch replaces working set ({} -> {} row(s))",
            self.working_set.len(),
            records.len()
        );
        self.working_set = records;
    }

    pub fn clear(&mut self) {
        tracing::info!("Clearing {} row(s) from working set", self.working_set.len());
        self.working_set.clear();
    }

    /// Resolves an optional threshold against the session's last used one.
    pub fn resolve_threshold(&self, requested: Option<f64>) -> Result<f64, AppError> {
        check_threshold(requested.unwrap_or(self.threshold))
    }

    /// Scores the whole working set as a single batch.
    ///
    /// Any oracle failure fails the whole batch; no partial results are
    /// returned. On success the threshold becomes the session default.
    pub async fn predict(
        &mut self,
        oracle: &dyn ChurnOracle,
        threshold: f64,
    ) -> Result<Vec<PredictionResult>, AppError> {
        let threshold = check_threshold(threshold)?;
        let results = score(oracle, &self.working_set, threshold).await?;
        self.threshold = threshold;
        Ok(results)
    }
}

/// Runs `records` through the oracle and thresholds each churn probability.
pub async fn score(
    oracle: &dyn ChurnOracle,
    records: &[CustomerRecord],
    threshold: f64,
) -> Result<Vec<PredictionResult>, AppError> {
    if records.is_empty() {
        return Err(AppError::Prediction(
            "working set is empty, add or upload customers first".to_string(),
        ));
    }

    let labels = oracle.predict(records).await?;
    check_labels(&labels, records.len())?;
    let probabilities = oracle.predict_proba(records).await?;
    check_probabilities(&probabilities, records.len())?;

    let results: Vec<PredictionResult> = records
        .iter()
        .zip(probabilities)
        .map(|(record, p)| PredictionResult {
            record: record.clone(),
            stay_probability: p.stay_probability,
            churn_probability: p.churn_probability,
            decision: classify(p.churn_probability, threshold),
        })
        .collect();

    let churned = results
        .iter()
        .filter(|r| r.decision == Decision::Churn)
        .count();
    tracing::info!(
        "Scored {} row(s) at threshold {}: {} churn, {} stay",
        results.len(),
        threshold,
        churned,
        results.len() - churned
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Geography};

    fn result(churn_probability: f64, threshold: f64) -> PredictionResult {
        PredictionResult {
            record: CustomerRecord {
                surname: "N/A".to_string(),
                gender: Gender::Male,
                geography: Geography::Spain,
                age: 30,
                is_active_member: false,
                has_credit_card: true,
                num_of_products: 1,
                tenure: 3,
                balance: 0.0,
                estimated_salary: 40_000.0,
                credit_score: 600.0,
            },
            stay_probability: 1.0 - churn_probability,
            churn_probability,
            decision: classify(churn_probability, threshold),
        }
    }

    #[test]
    fn test_tie_goes_to_churn() {
        assert_eq!(classify(0.5, 0.5), Decision::Churn);
        assert_eq!(classify(0.4999, 0.5), Decision::Stay);
        assert_eq!(classify(0.0, 0.0), Decision::Churn);
        assert_eq!(classify(1.0, 1.0), Decision::Churn);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(check_threshold(0.0).is_ok());
        assert!(check_threshold(1.0).is_ok());
        assert!(check_threshold(-0.01).is_err());
        assert!(check_threshold(1.01).is_err());
        assert!(check_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_summary_counts_and_shares() {
        let results = vec![result(0.9, 0.5), result(0.1, 0.5), result(0.7, 0.5), result(0.2, 0.5)];
        let summary = summarize(&results);

        assert_eq!(summary.churn_count, 2);
        assert_eq!(summary.stay_count, 2);
        assert_eq!(summary.churn_share, 0.5);
        assert!(summary.single.is_none());
    }

    #[test]
    fn test_single_result_exposes_probabilities() {
        let summary = summarize(&[result(0.8, 0.5)]);

        assert_eq!(summary.churn_count, 1);
        assert_eq!(summary.stay_count, 0);
        let single = summary.single.unwrap();
        assert!((single.churn_probability - 0.8).abs() < 1e-12);
        assert!((single.stay_probability - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_single_result_keeps_oracle_pair() {
        let mut only = result(0.8, 0.5);
        only.stay_probability = 0.2000004;

        let single = summarize(&[only]).single.unwrap();

        assert_eq!(single.stay_probability, 0.2000004);
        assert_eq!(single.churn_probability, 0.8);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.stay_count + summary.churn_count, 0);
        assert_eq!(summary.churn_share, 0.0);
    }

    #[test]
    fn test_navigation_keeps_working_set() {
        let mut ws = Workstation::new(0.5);
        assert_eq!(ws.step(), Step::Home);

        ws.load_batch(vec![result(0.1, 0.5).record]);
        ws.navigate(Step::Predict);
        ws.navigate(Step::InsertData);

        assert_eq!(ws.step(), Step::InsertData);
        assert_eq!(ws.len(), 1);
    }

    #[test]
    fn test_resolve_threshold_uses_session_default() {
        let ws = Workstation::new(0.35);
        assert_eq!(ws.resolve_threshold(None).unwrap(), 0.35);
        assert_eq!(ws.resolve_threshold(Some(0.9)).unwrap(), 0.9);
        assert!(ws.resolve_threshold(Some(2.0)).is_err());
    }
}
