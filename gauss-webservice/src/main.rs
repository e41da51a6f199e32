use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod handler;
mod model;
mod openapi;
mod verify;

use crate::config::ServiceConfig;
use crate::handler::AppState;
use crate::openapi::ApiDoc;
use crate::verify::VerificationSupervisor;

/// Installs the global subscriber and bridges `log` records from the solver
/// crates into it. Called once, before anything else logs.
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gauss_webservice=debug,gauss_lsolver=debug"));

    let result = if json {
        tracing::subscriber::set_global_default(
            Registry::default().with(env_filter).with(fmt::layer().json()),
        )
    } else {
        tracing::subscriber::set_global_default(
            Registry::default().with(env_filter).with(fmt::layer()),
        )
    };
    if let Err(e) = result {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to set logger: {}", e);
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(health_check))
        .route("/solve", post(handler::solve_handler))
        .route("/solve/sequential", post(handler::solve_sequential_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(config.json_logs);
    tracing::info!(
        bind_addr = %config.bind_addr,
        default_workers = ?config.default_workers,
        verify = config.verify,
        max_rows = config.max_rows,
        max_workers = config.max_workers,
        "Gauss webservice started, waiting for requests"
    );

    let supervisor = config
        .verify
        .then(|| VerificationSupervisor::start(config.verify_max_in_flight));
    let state = AppState::new(config.clone(), supervisor.as_ref().map(|s| s.queue()));
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", config.bind_addr, e);
            return;
        }
    };
    tracing::info!("Listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    // The router, and with it every queue handle, is gone once serve returns.
    if let Some(supervisor) = supervisor {
        let summary = supervisor.shutdown().await;
        tracing::info!(
            matched = summary.matched,
            mismatched = summary.mismatched,
            failed = summary.failed,
            dropped = summary.dropped,
            "Verification drained"
        );
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    ),
    tag = "Gauss Webservice"
)]
pub async fn health_check() -> &'static str {
    tracing::debug!("Health check endpoint hit");
    "Gauss Webservice is running!"
}
