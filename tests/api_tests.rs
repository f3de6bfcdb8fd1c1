/// HTTP surface tests driving the router in-process
/// Each test builds a fresh app with a deterministic stub oracle
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use churn_workstation::config::Config;
use churn_workstation::errors::AppError;
use churn_workstation::handlers::AppState;
use churn_workstation::models::{ClassProbabilities, CustomerRecord};
use churn_workstation::oracle::ChurnOracle;
use churn_workstation::routes::router;
use churn_workstation::session::SessionStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Scores customers by balance: anyone above 50k is likely to leave.
struct BalanceOracle;

impl BalanceOracle {
    fn churn(record: &CustomerRecord) -> f64 {
        if record.balance > 50_000.0 {
            0.8
        } else {
            0.2
        }
    }
}

#[async_trait]
impl ChurnOracle for BalanceOracle {
    async fn predict(&self, records: &[CustomerRecord]) -> Result<Vec<u8>, AppError> {
        Ok(records
            .iter()
            .map(|r| u8::from(Self::churn(r) >= 0.5))
            .collect())
    }

    async fn predict_proba(
        &self,
        records: &[CustomerRecord],
    ) -> Result<Vec<ClassProbabilities>, AppError> {
        Ok(records
            .iter()
            .map(|r| ClassProbabilities::from_churn(Self::churn(r)))
            .collect())
    }

    fn describe(&self) -> String {
        "stub:balance".to_string()
    }
}

const BOUNDARY: &str = "X-CHURN-BOUNDARY";

const BATCH_CSV: &str = "Surname,Gender,Geography,Age,IsActiveMember,HasCrCard,NumOfProducts,Tenure,Balance,EstimatedSalary,CreditScore\n\
Ng,Male,Germany,52,0,1,3,8,120000,80000,590\n\
Olsen,Female,Spain,33,1,1,1,2,0,45000,710\n";

fn app_with(config: Config) -> Router {
    let sessions = SessionStore::new(Duration::from_secs(60), 100, config.default_threshold);
    router(Arc::new(AppState {
        config,
        oracle: Arc::new(BalanceOracle),
        sessions,
    }))
}

fn app() -> Router {
    app_with(Config::default())
}

fn scenario_entry() -> Value {
    json!({
        "gender": "Female",
        "geography": "France",
        "age": 40,
        "is_active_member": "yes",
        "has_credit_card": "no",
        "num_of_products": 2,
        "tenure": 5,
        "balance": 10000.0,
        "estimated_salary": 50000.0,
        "credit_score": 650.0
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let (status, bytes) = send(app, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn upload(app: &Router, session: &str, filename: &str, contents: &str) -> (StatusCode, Value) {
    upload_bytes(app, session, filename, contents.as_bytes()).await
}

async fn upload_bytes(
    app: &Router,
    session: &str,
    filename: &str,
    contents: &[u8],
) -> (StatusCode, Value) {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = BOUNDARY,
        f = filename
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/sessions/{}/upload", session))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn open_session(app: &Router) -> String {
    let (status, body) = send_json(app, "POST", "/api/v1/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["step"], "home");
    assert_eq!(body["records"], json!([]));
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_reports_oracle() {
    let app = app();
    let (status, body) = send_json(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["oracle"], "stub:balance");
}

#[tokio::test]
async fn test_wizard_flow_manual_entry_to_export() {
    let app = app();
    let id = open_session(&app).await;

    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/api/v1/sessions/{}/step", id),
        Some(json!({"step": "insert_data"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/records", id),
        Some(scenario_entry()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["record"]["Surname"], "N/A");
    assert_eq!(body["record"]["IsActiveMember"], 1);
    assert_eq!(body["working_set_size"], 1);

    let (_, body) = send_json(
        &app,
        "PUT",
        &format!("/api/v1/sessions/{}/step", id),
        Some(json!({"step": "predict"})),
    )
    .await;
    assert_eq!(body["step"], "predict");
    assert_eq!(body["records"].as_array().unwrap().len(), 1);

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/predict", id),
        Some(json!({"threshold": 0.2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["decision"], "CHURN");
    assert_eq!(body["summary"]["churn_count"], 1);
    assert_eq!(body["summary"]["stay_count"], 0);
    assert_eq!(body["summary"]["single"]["churn_probability"], 0.2);

    // Export reuses the last threshold when none is given
    let request = Request::builder()
        .uri(format!("/api/v1/sessions/{}/export", id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("Prediction,Churn_Probability"));
    assert!(lines[1].ends_with("CHURN,0.2"));
}

#[tokio::test]
async fn test_invalid_entry_reports_all_fields() {
    let app = app();
    let id = open_session(&app).await;

    let mut entry = scenario_entry();
    entry["credit_score"] = json!(0);
    entry.as_object_mut().unwrap().remove("gender");

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/records", id),
        Some(entry),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let details = body["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert!(details
        .iter()
        .any(|d| d["message"].as_str().unwrap().contains("Credit Score")));

    let (_, records) =
        send_json(&app, "GET", &format!("/api/v1/sessions/{}/records", id), None).await;
    assert_eq!(records, json!([]));
}

#[tokio::test]
async fn test_upload_replaces_working_set() {
    let app = app();
    let id = open_session(&app).await;

    send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/records", id),
        Some(scenario_entry()),
    )
    .await;

    let (status, body) = upload(&app, &id, "batch.csv", BATCH_CSV).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_loaded"], 2);

    let (_, records) =
        send_json(&app, "GET", &format!("/api/v1/sessions/{}/records", id), None).await;
    let surnames: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["Surname"].as_str().unwrap())
        .collect();
    assert_eq!(surnames, vec!["Ng", "Olsen"]);

    let (_, body) = send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/predict", id),
        None,
    )
    .await;
    assert_eq!(body["threshold"], 0.5);
    assert_eq!(body["summary"]["churn_count"], 1);
    assert_eq!(body["summary"]["stay_count"], 1);
    assert_eq!(body["summary"]["churn_share"], 0.5);
    assert!(body["summary"].get("single").is_none());
}

#[tokio::test]
async fn test_spreadsheet_upload() {
    let app = app();
    let id = open_session(&app).await;

    let workbook = include_bytes!("fixtures/customers.xlsx");
    let (status, body) = upload_bytes(&app, &id, "customers.xlsx", workbook).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_loaded"], 2);

    let (_, records) =
        send_json(&app, "GET", &format!("/api/v1/sessions/{}/records", id), None).await;
    assert_eq!(records[0]["Surname"], "Ng");
    assert_eq!(records[0]["HasCrCard"], 1);
    assert_eq!(records[1]["Surname"], "N/A");
}

#[tokio::test]
async fn test_bad_upload_keeps_working_set() {
    let app = app();
    let id = open_session(&app).await;
    upload(&app, &id, "batch.csv", BATCH_CSV).await;

    let (status, _) = upload(&app, &id, "batch.csv", "Surname,Age\nNg,52\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = upload(&app, &id, "batch.pdf", BATCH_CSV).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, records) =
        send_json(&app, "GET", &format!("/api/v1/sessions/{}/records", id), None).await;
    assert_eq!(records.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_strict_mode_rejects_out_of_domain_rows() {
    let app = app();
    let id = open_session(&app).await;

    let csv = BATCH_CSV.replace("Olsen,Female,Spain,33", "Olsen,Female,Spain,12");
    let (status, body) = upload(&app, &id, "batch.csv", &csv).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Row 2:"));

    let lenient = app_with(Config {
        strict_batch_validation: false,
        ..Config::default()
    });
    let id = open_session(&lenient).await;
    let (status, body) = upload(&lenient, &id, "batch.csv", &csv).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_loaded"], 2);
}

#[tokio::test]
async fn test_clear_and_empty_prediction() {
    let app = app();
    let id = open_session(&app).await;
    upload(&app, &id, "batch.csv", BATCH_CSV).await;

    let (status, body) = send_json(
        &app,
        "DELETE",
        &format!("/api/v1/sessions/{}/records", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"], json!([]));

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/predict", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_sessions_do_not_share_working_sets() {
    let app = app();
    let first = open_session(&app).await;
    let second = open_session(&app).await;

    upload(&app, &first, "batch.csv", BATCH_CSV).await;

    let (_, records) = send_json(
        &app,
        "GET",
        &format!("/api/v1/sessions/{}/records", second),
        None,
    )
    .await;
    assert_eq!(records, json!([]));
}

#[tokio::test]
async fn test_ended_and_unknown_sessions() {
    let app = app();
    let id = open_session(&app).await;

    let (status, _) =
        send_json(&app, "DELETE", &format!("/api/v1/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, "GET", &format!("/api/v1/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(
        &app,
        "GET",
        "/api/v1/sessions/00000000-0000-0000-0000-000000000000/records",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_threshold_out_of_range() {
    let app = app();
    let id = open_session(&app).await;
    upload(&app, &id, "batch.csv", BATCH_CSV).await;

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/predict", id),
        Some(json!({"threshold": 1.2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_threshold_is_rejected() {
    let app = app();
    let id = open_session(&app).await;
    upload(&app, &id, "batch.csv", BATCH_CSV).await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/predict", id),
        Some(json!({"threshold": "0.95"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid predict request"));

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/sessions/{}/predict", id))
        .body(Body::from("threshold=0.95"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was scored, so the session keeps its default threshold
    let (_, view) = send_json(&app, "GET", &format!("/api/v1/sessions/{}", id), None).await;
    assert_eq!(view["threshold"], 0.5);
}

#[tokio::test]
async fn test_single_page_prediction() {
    let app = app();

    let mut entry = scenario_entry();
    entry["balance"] = json!(90000.0);
    let (status, body) = send_json(&app, "POST", "/api/v1/predict", Some(entry)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "CHURN");
    assert_eq!(body["confidence_percent"], 80);
    assert_eq!(body["message"], "Customer will churn with 80 % confidence");

    let (status, body) = send_json(&app, "POST", "/api/v1/predict", Some(scenario_entry())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "STAY");
    assert_eq!(body["confidence_percent"], 80);

    let (status, body) = send_json(&app, "POST", "/api/v1/predict", Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"].as_array().unwrap().len(), 10);
}
