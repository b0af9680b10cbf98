//! Skillgraph API Gateway
//!
//! HTTP front of the inference engine.
//! Handles:
//! - Asynchronous profile runs and their job status
//! - Graph exports for visualization
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod jobs;
mod middleware;

use anyhow::Context;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    routing::{delete, get},
    Router,
};
use jobs::JobRegistry;
use metrics_exporter_prometheus::PrometheusBuilder;
use skillgraph_common::{config::AppConfig, metrics, oracle::create_oracle, ScoringOracle};
use skillgraph_ingestion::{create_source, ActivitySource};
use skillgraph_search::InferenceEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: InferenceEngine,
    pub oracle: Arc<dyn ScoringOracle>,
    pub source: Arc<dyn ActivitySource>,
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        oracle: Arc<dyn ScoringOracle>,
        source: Arc<dyn ActivitySource>,
    ) -> Self {
        Self {
            engine: InferenceEngine::new(config.clone(), oracle.clone()),
            config,
            oracle,
            source,
            jobs: Arc::new(JobRegistry::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting Skillgraph API Gateway v{}", skillgraph_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exposed on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Wire providers
    let oracle = create_oracle(&config)?;
    let source = create_source(&config.source)?;
    info!(oracle = oracle.name(), source = source.name(), "Providers ready");

    let state = AppState::new(config.clone(), oracle, source);
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Open connections get `shutdown_timeout` to drain after the signal
    let shutdown = CancellationToken::new();
    let signalled = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        signalled.cancel();
    });
    let drain_limit = config.shutdown_timeout();
    tokio::select! {
        served = server => served?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(drain_limit).await;
        } => warn!(
            timeout_secs = drain_limit.as_secs(),
            "Shutdown timed out, dropping open connections"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Profile endpoints
        .route(
            "/profiles/{login}",
            get(handlers::profiles::get_profile).post(handlers::profiles::start_profile),
        )
        .route("/profiles/{login}/run", delete(handlers::profiles::cancel_run))

        // Graph endpoints
        .route("/graph/{login}", get(handlers::graph::get_graph))

        // Job endpoints
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests));

    let app = Router::new().nest("/v2", api_routes);
    with_layers(app, &state.config).with_state(state)
}

/// Cross-cutting layers shared by every route
fn with_layers(mut app: Router<AppState>, config: &AppConfig) -> Router<AppState> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&config.rate_limit);
        let limit = config.rate_limit.requests_per_second;
        app = app.layer(axum::middleware::from_fn(move |request: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone(), limit)
        }));
    }

    app.layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests.max(1)))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use skillgraph_common::oracle::StaticOracle;
    use skillgraph_ingestion::records::{ActivitySnapshot, CommitRecord, DeveloperRecord, RepositoryRecord};
    use skillgraph_ingestion::IngestionError;
    use std::time::Duration;
    use tower::ServiceExt;

    fn fixture(login: &str) -> ActivitySnapshot {
        let commits = (0..8)
            .map(|i| CommitRecord {
                sha: format!("{:040x}", i + 1),
                message: if i % 2 == 0 {
                    "Add tokio runtime and cargo workspace".to_string()
                } else {
                    "Tweak readme badges".to_string()
                },
                ..Default::default()
            })
            .collect();
        ActivitySnapshot {
            developer: DeveloperRecord {
                login: login.to_string(),
                ..Default::default()
            },
            repositories: vec![RepositoryRecord {
                full_name: format!("{}/engine", login),
                language: Some("Rust".into()),
                stars: 3,
                commits,
                ..Default::default()
            }],
        }
    }

    /// Serves the fixture for every login
    struct FixtureSource;

    #[async_trait]
    impl ActivitySource for FixtureSource {
        async fn fetch(&self, login: &str) -> Result<ActivitySnapshot, IngestionError> {
            if login == "missing" {
                return Err(IngestionError::Source(format!("no activity for {}", login)));
            }
            Ok(fixture(login))
        }

        fn name(&self) -> &str {
            "fixture"
        }
    }

    fn state(config: AppConfig) -> AppState {
        AppState::new(
            Arc::new(config),
            Arc::new(StaticOracle::new(0.9)),
            Arc::new(FixtureSource),
        )
    }

    fn app() -> Router {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config.search.iterations = 16;
        create_router(state(config))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Poll until the run leaves the processing state
    async fn settle(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        for _ in 0..200 {
            let (status, json) = send(app, "GET", uri, Body::empty()).await;
            if status != StatusCode::ACCEPTED {
                return (status, json);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run did not settle");
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = send(&app(), "GET", "/v2/health", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");

        let (status, json) = send(&app(), "GET", "/v2/ready", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["checks"]["oracle"], "static");
    }

    #[tokio::test]
    async fn test_first_profile_request_starts_a_run() {
        let app = app();
        let (status, json) = send(&app, "GET", "/v2/profiles/ferris", Body::empty()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "processing");
        assert!(json["job_id"].is_string());

        let (status, profile) = settle(&app, "/v2/profiles/ferris").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["developer"], "ferris");
        let skills: Vec<&str> = profile["skills"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["name"].as_str())
            .collect();
        assert!(skills.contains(&"rust"));
    }

    #[tokio::test]
    async fn test_graph_matches_profile() {
        let app = app();
        let (status, _) = send(&app, "GET", "/v2/graph/ferris", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, accepted) = send(&app, "POST", "/v2/profiles/ferris", Body::empty()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let (_, profile) = settle(&app, "/v2/profiles/ferris").await;
        let (status, graph) = settle(&app, "/v2/graph/ferris").await;
        assert_eq!(status, StatusCode::OK);

        let mut exported: Vec<String> = graph["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["group"] == "skill")
            .filter_map(|n| n["id"].as_str())
            .map(|id| id.trim_start_matches("skill:").to_string())
            .collect();
        exported.sort();
        let mut profiled: Vec<String> = profile["skills"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["name"].as_str().map(String::from))
            .collect();
        profiled.sort();
        assert_eq!(exported, profiled);

        let job_uri = format!("/v2/jobs/{}", accepted["job_id"].as_str().unwrap());
        let (status, job) = send(&app, "GET", &job_uri, Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["status"], "completed");
    }

    #[tokio::test]
    async fn test_post_with_snapshot_and_skills() {
        let app = app();
        let body = serde_json::json!({
            "snapshot": fixture("ferris"),
            "skills": ["rust"],
        });
        let (status, _) = send(&app, "POST", "/v2/profiles/ferris", Body::from(body.to_string())).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, profile) = settle(&app, "/v2/profiles/ferris").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["skills"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_reports_error() {
        let app = app();
        let (status, _) = send(&app, "POST", "/v2/profiles/missing", Body::empty()).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, json) = settle(&app, "/v2/profiles/missing").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "SOURCE_ERROR");
        assert!(json["error"]["details"]["job_id"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_login_rejected() {
        let (status, json) = send(&app(), "GET", "/v2/profiles/not_a_login", Body::empty()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let (status, _) = send(&app(), "POST", "/v2/profiles/ferris", Body::from("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_without_run_is_not_found() {
        let (status, _) = send(&app(), "DELETE", "/v2/profiles/ferris/run", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config.server.request_timeout_secs = 1;

        let routes = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "done"
            }),
        );
        let app = with_layers(routes, &config).with_state(state(config));

        let started = std::time::Instant::now();
        let (status, _) = send(&app, "GET", "/slow", Body::empty()).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let uri = format!("/v2/jobs/{}", uuid::Uuid::new_v4());
        let (status, json) = send(&app(), "GET", &uri, Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "JOB_NOT_FOUND");
    }
}
