//! Health, registration and payment route handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pgben_storage::BenefitTypeRecord;
use serde::Deserialize;
use time::OffsetDateTime;

use super::grants::{parse_body, respond};
use super::json_error;
use super::state::AppState;
use crate::config::RequestSeed;
use crate::registry::{self, RegistryError};

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentStatusBody {
    status: String,
}

fn registry_error(e: RegistryError) -> Response {
    let status = match &e {
        RegistryError::Duplicate { .. } => StatusCode::CONFLICT,
        RegistryError::UnknownBenefitType(_) | RegistryError::Invalid(_) => {
            StatusCode::BAD_REQUEST
        }
        RegistryError::Storage(inner) => {
            tracing::error!(error = %inner, "registration failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };
    json_error(status, &e.to_string())
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// POST /solicitacoes
pub(crate) async fn handle_register_request(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RequestSeed>, JsonRejection>,
) -> Response {
    let seed = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    let record = seed.into_record(OffsetDateTime::now_utc());
    match registry::register_request(state.manager.storage().as_ref(), record).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => registry_error(e),
    }
}

/// POST /tipos-beneficio
pub(crate) async fn handle_register_benefit_type(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BenefitTypeRecord>, JsonRejection>,
) -> Response {
    let record = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    match registry::register_benefit_type(state.manager.storage().as_ref(), record).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => registry_error(e),
    }
}

/// PATCH /pagamentos/{id}/status
///
/// Runs the automatic closure check for the owning grant after the update.
pub(crate) async fn handle_update_payment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<PaymentStatusBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(state.manager.update_payment_status(&id, &body.status).await)
}
