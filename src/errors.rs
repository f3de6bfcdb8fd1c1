use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// A single violated rule on a manual entry or an uploaded row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Field (column) the rule applies to, e.g. `"CreditScore"`.
    pub field: String,
    /// User-facing message.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// One or more manual-entry (or uploaded row) rules were violated.
    Validation(Vec<FieldError>),
    /// Uploaded file could not be decoded into customer records.
    Decode(String),
    /// The oracle rejected the batch or returned an unusable answer.
    Prediction(String),
    /// The oracle could not be reached (transport failure, 5xx, open circuit).
    OracleUnavailable(String),
    /// Resource not found error (unknown or expired session).
    NotFound(String),
    /// The session store refused a new session.
    SessionLimit(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Field-level messages carried by a validation error, if any.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AppError::Validation(errors) => errors,
            AppError::WithContext { source, .. } => source.field_errors(),
            _ => &[],
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "Validation failed: {}", messages.join("; "))
            }
            AppError::Decode(msg) => write!(f, "Could not read file: {}", msg),
            AppError::Prediction(msg) => write!(f, "Prediction failed: {}", msg),
            AppError::OracleUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::SessionLimit(msg) => write!(f, "Session limit: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(errors) => {
                tracing::info!("Rejected entry with {} violation(s)", errors.len());
                let body = Json(json!({
                    "error": "Validation failed",
                    "details": errors,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::Decode(msg) => {
                tracing::warn!("Upload decode error: {}", msg);
                (StatusCode::BAD_REQUEST, format!("Could not read file: {}", msg))
            }
            AppError::Prediction(msg) => {
                tracing::warn!("Prediction error: {}", msg);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("Prediction failed: {}", msg),
                )
            }
            AppError::OracleUnavailable(msg) => {
                tracing::error!("Oracle unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Prediction model unavailable".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::SessionLimit(msg) => {
                tracing::warn!("Session refused: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return (**source).clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::OracleUnavailable(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context message to add.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Arguments
    ///
    /// * `f` - A closure that produces the context message.
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation(vec![]), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::Decode("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Prediction("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                AppError::OracleUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AppError::SessionLimit("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::InternalError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_context_delegates_status() {
        let result: Result<(), AppError> = Err(AppError::Decode("bad header".into()));
        let err = result.context("uploading batch").unwrap_err();

        assert_eq!(
            err.to_string(),
            "uploading batch: Could not read file: bad header"
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_field_errors_through_context() {
        let err = AppError::WithContext {
            source: Box::new(AppError::Validation(vec![FieldError::new(
                "CreditScore",
                "Credit Score must be greater than 0",
            )])),
            context: "manual entry".into(),
        };

        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "CreditScore");
    }
}
