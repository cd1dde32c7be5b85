use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, LogFormat};
use crate::event::MachineReport;
use crate::handler::{HandleError, History, StateService};
use crate::store::{day_key, DayStore, FileDayStore};

/// Initialize tracing subscriber.
/// Uses RUST_LOG env var for filtering (defaults to info).
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_ansi(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_target(false)).init(),
    }
}

/// Build the HTTP surface over a shared service.
///
/// The force-inject route is only mounted when `debug_routes` is set.
pub fn build_router<S>(service: Arc<StateService<S>>, debug_routes: bool) -> Router
where
    S: DayStore + 'static,
{
    let mut router = Router::new()
        .route("/api/machine_state", post(handle_receive::<S>))
        .route("/api/machine_state/days", get(handle_days::<S>))
        .route(
            "/api/machine_state/history/:machine_id",
            get(handle_live_history::<S>),
        )
        .route(
            "/api/machine_state/history/:machine_id/:date",
            get(handle_day_history::<S>),
        )
        .route("/health", get(|| async { "ok" }));

    if debug_routes {
        warn!("debug routes enabled: GET /debug/{{machine_id}}/{{state}} accepts unauthenticated writes");
        router = router.route("/debug/:machine_id/:state", get(handle_force_inject::<S>));
    }

    router.layer(CorsLayer::permissive()).with_state(service)
}

/// Open the day store, bind, and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let store = FileDayStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open data dir {}", config.data_dir.display()))?;
    let service = Arc::new(StateService::with_capacity(store, config.max_events));
    let app = build_router(service, config.debug_routes);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(
        listen = %config.listen,
        data_dir = %config.data_dir.display(),
        max_events = config.max_events,
        "machinestate listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

impl IntoResponse for HandleError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

// Always acknowledged, whatever the body holds.
async fn handle_receive<S: DayStore>(
    State(service): State<Arc<StateService<S>>>,
    body: Bytes,
) -> Json<JsonValue> {
    let report = MachineReport::from_body(&body);
    service.receive(&report).await;
    Json(json!({ "ok": true }))
}

async fn handle_live_history<S: DayStore>(
    State(service): State<Arc<StateService<S>>>,
    Path(machine_id): Path<String>,
) -> Json<History> {
    Json(service.live_history(&machine_id))
}

async fn handle_day_history<S: DayStore>(
    State(service): State<Arc<StateService<S>>>,
    Path((machine_id, date)): Path<(String, String)>,
) -> Result<Json<History>, HandleError> {
    service.day_history(&machine_id, &date).await.map(Json)
}

async fn handle_days<S: DayStore>(
    State(service): State<Arc<StateService<S>>>,
) -> Result<Json<JsonValue>, HandleError> {
    let days: Vec<String> = service.days().await?.into_iter().map(day_key).collect();
    Ok(Json(json!({ "days": days })))
}

async fn handle_force_inject<S: DayStore>(
    State(service): State<Arc<StateService<S>>>,
    Path((machine_id, state)): Path<(String, String)>,
) -> Response {
    // Only unsigned digits match, as with a typed path segment.
    if state.is_empty() || !state.bytes().all(|b| b.is_ascii_digit()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Ok(state) = state.parse::<i64>() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    service.force_inject(&machine_id, state).await;
    Json(json!({ "forced": state, "machine": machine_id })).into_response()
}
