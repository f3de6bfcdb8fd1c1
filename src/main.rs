use axum::{routing::get, Router};
use churn_workstation::config::Config;
use churn_workstation::handlers::{self, AppState};
use churn_workstation::oracle::{ChurnOracle, LogisticOracle};
use churn_workstation::oracle_client::RemoteOracle;
use churn_workstation::routes::api_routes;
use churn_workstation::session::SessionStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Picks the model backend: a remote model server when `ORACLE_URL` is set,
/// otherwise the local logistic artifact.
fn build_oracle(config: &Config) -> anyhow::Result<Arc<dyn ChurnOracle>> {
    match config.oracle_url {
        Some(ref url) => {
            let oracle = RemoteOracle::new(
                url.clone(),
                Duration::from_secs(config.oracle_timeout_secs),
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?;
            Ok(Arc::new(oracle))
        }
        None => {
            let oracle = LogisticOracle::from_path(
                Path::new(&config.model_path),
                config.model_sha256.as_deref(),
            )?;
            Ok(Arc::new(oracle))
        }
    }
}

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The prediction oracle (local artifact or remote model server).
/// - The session store.
/// - HTTP routes and middleware (CORS, Rate Limiting, body limits).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_workstation=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let oracle = build_oracle(&config)?;
    tracing::info!("✓ Prediction oracle ready: {}", oracle.describe());

    // Sessions expire after SESSION_TTL_SECS of inactivity
    let sessions = SessionStore::new(
        Duration::from_secs(config.session_ttl_secs),
        config.max_sessions,
        config.default_threshold,
    );
    tracing::info!(
        "Session store initialized ({}s idle TTL, {} max sessions)",
        config.session_ttl_secs,
        config.max_sessions
    );

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        oracle,
        sessions,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = api_routes(config.max_upload_bytes).layer(
        ServiceBuilder::new()
            // Request size limit: uploads are the largest legitimate payload
            .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
            // Rate limiting: 10 req/sec per IP, burst of 20
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
