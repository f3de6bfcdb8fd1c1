use crate::config::Config;
use crate::decode::decode_upload;
use crate::errors::{AppError, ResultExt};
use crate::export::{export_csv, EXPORT_FILENAME};
use crate::models::*;
use crate::oracle::{check_labels, check_probabilities, ChurnOracle};
use crate::session::SessionStore;
use crate::validation::{validate_batch, validate_manual_entry};
use crate::workstation::{summarize, Workstation};
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Pre-trained churn classifier, read-only and shared by every session.
    pub oracle: Arc<dyn ChurnOracle>,
    /// Live sessions, each owning its own working set.
    pub sessions: SessionStore,
}

fn session_view(id: Uuid, ws: &Workstation) -> SessionView {
    SessionView {
        session_id: id,
        step: ws.step(),
        threshold: ws.threshold(),
        created_at: ws.created_at(),
        records: ws.records().to_vec(),
    }
}

/// Health check endpoint.
///
/// Returns the service status, the oracle in use and the live session count.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "churn-workstation",
            "version": env!("CARGO_PKG_VERSION"),
            "oracle": state.oracle.describe(),
            "active_sessions": state.sessions.active_sessions(),
        })),
    )
}

/// POST /api/v1/predict
///
/// Single-page form: scores one customer without touching any session.
/// The decision is the model's own label; confidence is reported for the
/// chosen class.
pub async fn quick_predict(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<ManualEntry>,
) -> Result<Json<QuickPrediction>, AppError> {
    tracing::info!("POST /predict");

    let record = validate_manual_entry(&entry)?;
    let rows = std::slice::from_ref(&record);

    let labels = state.oracle.predict(rows).await?;
    check_labels(&labels, 1)?;
    let probabilities = state.oracle.predict_proba(rows).await?;
    check_probabilities(&probabilities, 1)?;

    let churn_probability = probabilities[0].churn_probability;
    let churn_percent = (churn_probability * 100.0).round() as u32;
    let (decision, confidence_percent, message) = if labels[0] == 1 {
        (Decision::Churn, churn_percent, "Customer will churn")
    } else {
        (Decision::Stay, 100 - churn_percent, "Customer will not churn")
    };

    Ok(Json(QuickPrediction {
        record,
        decision,
        churn_probability,
        confidence_percent,
        message: format!("{} with {} % confidence", message, confidence_percent),
    }))
}

/// POST /api/v1/sessions
///
/// Opens a session on the Home step with an empty working set.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let (id, handle) = state.sessions.create().await?;
    let ws = handle.lock().await;
    Ok((StatusCode::CREATED, Json(session_view(id, &ws))))
}

/// GET /api/v1/sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(&id).await?;
    let ws = handle.lock().await;
    Ok(Json(session_view(id, &ws)))
}

/// DELETE /api/v1/sessions/:id
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.end(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {} not found or expired", id)))
    }
}

/// PUT /api/v1/sessions/:id/step
///
/// Wizard navigation. The working set is carried across steps untouched.
pub async fn set_step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<StepRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(&id).await?;
    let mut ws = handle.lock().await;
    ws.navigate(request.step);
    Ok(Json(session_view(id, &ws)))
}

/// GET /api/v1/sessions/:id/records
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CustomerRecord>>, AppError> {
    let handle = state.sessions.get(&id).await?;
    let ws = handle.lock().await;
    Ok(Json(ws.records().to_vec()))
}

/// POST /api/v1/sessions/:id/records
///
/// Validates a manual entry and appends it to the working set.
pub async fn add_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(entry): Json<ManualEntry>,
) -> Result<(StatusCode, Json<RecordAdded>), AppError> {
    tracing::info!("POST /sessions/{}/records", id);

    let handle = state.sessions.get(&id).await?;
    let mut ws = handle.lock().await;
    let record = ws.add_manual_entry(&entry)?.clone();

    Ok((
        StatusCode::CREATED,
        Json(RecordAdded {
            record,
            working_set_size: ws.len(),
        }),
    ))
}

/// DELETE /api/v1/sessions/:id/records
pub async fn clear_records(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(&id).await?;
    let mut ws = handle.lock().await;
    ws.clear();
    Ok(Json(session_view(id, &ws)))
}

/// POST /api/v1/sessions/:id/upload
///
/// Replaces the working set with the rows of the multipart `file` field.
/// A file that fails to decode (or, in strict mode, to validate) leaves the
/// working set as it was.
pub async fn upload_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<BatchLoaded>, AppError> {
    tracing::info!("POST /sessions/{}/upload", id);

    let handle = state.sessions.get(&id).await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Upload is missing a file name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Decode(format!("could not read upload: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("Missing 'file' field".to_string()))?;

    let records = decode_upload(&filename, &bytes)?;
    if state.config.strict_batch_validation {
        validate_batch(&records).with_context(|| format!("Validating {}", filename))?;
    }

    let rows_loaded = records.len();
    handle.lock().await.load_batch(records);

    Ok(Json(BatchLoaded {
        filename,
        rows_loaded,
    }))
}

fn parse_predict_request(body: &[u8]) -> Result<PredictRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PredictRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid predict request: {}", e)))
}

/// POST /api/v1/sessions/:id/predict
///
/// Scores the working set at the requested (or last used) threshold.
/// An empty body means the last used threshold; anything else must parse.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, AppError> {
    let requested = parse_predict_request(&body)?.threshold;
    tracing::info!("POST /sessions/{}/predict - threshold: {:?}", id, requested);

    let handle = state.sessions.get(&id).await?;
    let mut ws = handle.lock().await;
    let threshold = ws.resolve_threshold(requested)?;
    let results = ws.predict(state.oracle.as_ref(), threshold).await?;
    let summary = summarize(&results);

    Ok(Json(PredictionResponse {
        threshold,
        results,
        summary,
    }))
}

/// GET /api/v1/sessions/:id/export
///
/// Scores the working set and serves the augmented table as a CSV download.
pub async fn export(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    tracing::info!("GET /sessions/{}/export - threshold: {:?}", id, query.threshold);

    let handle = state.sessions.get(&id).await?;
    let mut ws = handle.lock().await;
    let threshold = ws.resolve_threshold(query.threshold)?;
    let results = ws.predict(state.oracle.as_ref(), threshold).await?;
    let bytes = export_csv(&results)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        bytes,
    )
        .into_response())
}
