use crate::circuit_breaker::{create_oracle_circuit_breaker, OracleCircuitBreaker};
use crate::errors::AppError;
use crate::models::{ClassProbabilities, CustomerRecord};
use crate::oracle::ChurnOracle;
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct LabelsResponse {
    predictions: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ProbabilitiesResponse {
    probabilities: Vec<[f64; 2]>,
}

/// Client for a model server exposing `predict` / `predict_proba` over HTTP.
///
/// Both endpoints take `{"instances": [...]}` with one object per customer,
/// keyed by the model's column names.
#[derive(Clone)]
pub struct RemoteOracle {
    client: reqwest::Client,
    base_url: String,
    breaker: OracleCircuitBreaker,
}

impl RemoteOracle {
    /// Creates a new `RemoteOracle`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the model server.
    /// * `timeout` - Per-request timeout.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create model client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            breaker: create_oracle_circuit_breaker(),
        })
    }

    /// Posts a batch to `endpoint` through the circuit breaker.
    ///
    /// Only unavailability counts against the breaker; a 4xx answer means the
    /// server is up and rejected the batch itself.
    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        records: &[CustomerRecord],
    ) -> Result<T, AppError> {
        let is_outage = |e: &AppError| matches!(e, AppError::OracleUnavailable(_));

        match self
            .breaker
            .call_with(is_outage, self.send(endpoint, records))
            .await
        {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Model server circuit open, rejecting {} call", endpoint);
                Err(AppError::OracleUnavailable(
                    "model server circuit is open".to_string(),
                ))
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        records: &[CustomerRecord],
    ) -> Result<T, AppError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::info!("Scoring {} row(s) via {}", records.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "instances": records }))
            .send()
            .await
            .map_err(|e| AppError::OracleUnavailable(format!("model request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Model server returned {}: {}", status, error_text);

            return Err(if status.is_client_error() {
                AppError::Prediction(format!(
                    "model server rejected the batch ({}): {}",
                    status, error_text
                ))
            } else {
                AppError::OracleUnavailable(format!(
                    "model server returned {}: {}",
                    status, error_text
                ))
            });
        }

        response.json::<T>().await.map_err(|e| {
            AppError::Prediction(format!("Failed to parse model response: {}", e))
        })
    }
}

#[async_trait]
impl ChurnOracle for RemoteOracle {
    async fn predict(&self, records: &[CustomerRecord]) -> Result<Vec<u8>, AppError> {
        let response: LabelsResponse = self.post("predict", records).await?;
        Ok(response.predictions)
    }

    async fn predict_proba(
        &self,
        records: &[CustomerRecord],
    ) -> Result<Vec<ClassProbabilities>, AppError> {
        let response: ProbabilitiesResponse = self.post("predict_proba", records).await?;
        Ok(response
            .probabilities
            .into_iter()
            .map(|[stay_probability, churn_probability]| ClassProbabilities {
                stay_probability,
                churn_probability,
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("remote:{}", self.base_url)
    }
}
