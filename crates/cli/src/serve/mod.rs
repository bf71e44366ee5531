//! `pgben serve` -- HTTP JSON API for the grant lifecycle.
//!
//! Runs the lifecycle manager over the in-memory storage backend with
//! `axum` + `tokio`.
//!
//! Security features:
//! - CORS headers on all responses
//! - Per-IP rate limiting (default: 60 req/min, `server.rate_limit` or PGBEN_RATE_LIMIT)
//! - Optional API key authentication (`server.api_key` or PGBEN_API_KEY)
//!
//! Endpoints:
//! - GET   /health                                 - Server status (exempt from auth)
//! - GET   /concessoes                             - List grants (status, request_id, judicial, limit, offset)
//! - POST  /concessoes                             - Create the grant for a request if absent
//! - GET   /concessoes/{id}                        - One grant
//! - GET   /concessoes/{id}/historico              - Status history of a grant
//! - GET   /concessoes/{id}/pagamentos             - Payment installments of a grant
//! - PATCH /concessoes/{id}/status                 - Generic status update
//! - POST  /concessoes/{id}/suspender              - Suspend
//! - POST  /concessoes/{id}/bloquear               - Block
//! - POST  /concessoes/{id}/desbloquear            - Unblock
//! - POST  /concessoes/{id}/reativar               - Reactivate
//! - POST  /concessoes/{id}/cancelar               - Cancel
//! - POST  /concessoes/{id}/prorrogar              - Prorogate a ceased grant
//! - POST  /concessoes/{id}/encerramento-automatico - Run the automatic closure check
//! - GET   /motivos/{operation}                    - Active reasons, with ETag
//! - POST  /solicitacoes                           - Register a request
//! - POST  /tipos-beneficio                        - Register a benefit type
//! - PATCH /pagamentos/{id}/status                 - Payment status change + closure check
//!
//! All responses use Content-Type: application/json. Errors are
//! `{"error": "..."}` with 400 (validation), 404, 409 (concurrent
//! modification) or 500.

mod grants;
mod handlers;
mod middleware;
mod reasons;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{middleware as axum_middleware, Json, Router};
use pgben_lifecycle::{GrantLifecycleManager, LifecycleError, ReasonCatalog};
use pgben_storage::MemoryStorage;
use tower_http::cors::{Any, CorsLayer};

use self::grants::{
    handle_block, handle_cancel, handle_check_closure, handle_create_grant, handle_get_grant,
    handle_grant_history, handle_grant_payments, handle_list_grants, handle_prorogate,
    handle_reactivate, handle_suspend, handle_unblock, handle_update_status,
};
use self::handlers::{
    handle_health, handle_not_found, handle_register_benefit_type, handle_register_request,
    handle_update_payment_status,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::reasons::handle_reasons;
use self::state::{AppState, RateLimiter};
use crate::config::PgbenConfig;
use crate::registry;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

/// Map a lifecycle failure to its HTTP status. Internal failures were
/// already logged with detail where they were converted.
fn lifecycle_error(e: LifecycleError) -> Response {
    let status = match &e {
        LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
        LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifecycleError::Conflict { .. } => StatusCode::CONFLICT,
        LifecycleError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, &e.to_string())
}

/// Build the router over an already-populated state.
fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/concessoes",
            get(handle_list_grants).post(handle_create_grant),
        )
        .route("/concessoes/{id}", get(handle_get_grant))
        .route("/concessoes/{id}/historico", get(handle_grant_history))
        .route("/concessoes/{id}/pagamentos", get(handle_grant_payments))
        .route("/concessoes/{id}/status", patch(handle_update_status))
        .route("/concessoes/{id}/suspender", post(handle_suspend))
        .route("/concessoes/{id}/bloquear", post(handle_block))
        .route("/concessoes/{id}/desbloquear", post(handle_unblock))
        .route("/concessoes/{id}/reativar", post(handle_reactivate))
        .route("/concessoes/{id}/cancelar", post(handle_cancel))
        .route("/concessoes/{id}/prorrogar", post(handle_prorogate))
        .route(
            "/concessoes/{id}/encerramento-automatico",
            post(handle_check_closure),
        )
        .route("/motivos/{operation}", get(handle_reasons))
        .route("/solicitacoes", post(handle_register_request))
        .route("/tipos-beneficio", post(handle_register_benefit_type))
        .route(
            "/pagamentos/{id}/status",
            patch(handle_update_payment_status),
        )
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server described by `config`.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls (requires the `tls` feature). Otherwise
/// it uses plain HTTP.
pub async fn start_server(
    config: PgbenConfig,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(MemoryStorage::new());
    registry::seed(storage.as_ref(), &config).await?;

    let reasons = if config.reasons.is_empty() {
        ReasonCatalog::builtin()
    } else {
        ReasonCatalog::new(config.reasons.clone())
    };
    let manager = GrantLifecycleManager::new(storage).with_reason_catalog(reasons);

    let server = &config.server;
    if server.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    tracing::info!(
        rate_limit = server.rate_limit,
        benefit_types = config.benefit_types.len(),
        requests = config.requests.len(),
        "server state initialised"
    );

    let state = Arc::new(AppState {
        manager,
        rate_limiter: RateLimiter::new(server.rate_limit),
        api_key: server.api_key.clone(),
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", server.port);

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        tracing::info!("pgben listening on https://{addr}");
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("pgben listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
