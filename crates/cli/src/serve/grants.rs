//! Grant ("concessão") route handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pgben_core::GrantStatus;
use pgben_lifecycle::LifecycleError;
use pgben_storage::GrantFilter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::state::AppState;
use super::{json_error, lifecycle_error};

// ── Request bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct CreateGrantBody {
    request_id: String,
    actor_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    status: String,
    actor_id: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Body of block, unblock and cancel. A missing reason is rejected by the
/// lifecycle as blank.
#[derive(Debug, Deserialize)]
pub(crate) struct ReasonBody {
    actor_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuspendBody {
    actor_id: String,
    #[serde(default)]
    reason: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    review_date: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReactivateBody {
    actor_id: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProrogateBody {
    actor_id: String,
    #[serde(default)]
    judicial_document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    status: Option<String>,
    request_id: Option<String>,
    judicial: Option<bool>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    items: Vec<pgben_storage::GrantRecord>,
    total: usize,
    limit: usize,
    offset: usize,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Unwrap a JSON body, turning extractor rejections into 400s.
pub(super) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, &e.body_text()))
}

pub(super) fn respond<T: Serialize>(result: Result<T, LifecycleError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /concessoes
pub(crate) async fn handle_list_grants(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(q) => q,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.body_text()),
    };
    let status = match params.status.as_deref().map(str::parse::<GrantStatus>) {
        None => None,
        Some(Ok(s)) => Some(s),
        Some(Err(e)) => return lifecycle_error(e.into()),
    };
    let filter = GrantFilter {
        status,
        request_id: params.request_id,
        judicial_determination: params.judicial,
        offset: params.offset.unwrap_or(0),
        limit: params.limit.unwrap_or(0),
    };

    match state.manager.list(&filter).await {
        Ok(page) => {
            let response = ListResponse {
                items: page.items,
                total: page.total,
                limit: filter.limit,
                offset: filter.offset,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}

/// POST /concessoes
pub(crate) async fn handle_create_grant(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateGrantBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(
        state
            .manager
            .create_if_absent(&body.request_id, &body.actor_id)
            .await,
    )
}

/// GET /concessoes/{id}
pub(crate) async fn handle_get_grant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    respond(state.manager.get(&id).await)
}

/// GET /concessoes/{id}/historico
pub(crate) async fn handle_grant_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.history(&id).await {
        Ok(entries) => {
            (StatusCode::OK, Json(serde_json::json!({ "items": entries }))).into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}

/// GET /concessoes/{id}/pagamentos
pub(crate) async fn handle_grant_payments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    respond(state.manager.payments(&id).await)
}

/// PATCH /concessoes/{id}/status
pub(crate) async fn handle_update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(
        state
            .manager
            .update_status(&id, &body.status, &body.actor_id, body.reason.as_deref())
            .await,
    )
}

/// POST /concessoes/{id}/suspender
pub(crate) async fn handle_suspend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SuspendBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(
        state
            .manager
            .suspend(&id, &body.actor_id, &body.reason, body.review_date)
            .await,
    )
}

/// POST /concessoes/{id}/bloquear
pub(crate) async fn handle_block(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(state.manager.block(&id, &body.actor_id, &body.reason).await)
}

/// POST /concessoes/{id}/desbloquear
pub(crate) async fn handle_unblock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(state.manager.unblock(&id, &body.actor_id, &body.reason).await)
}

/// POST /concessoes/{id}/reativar
pub(crate) async fn handle_reactivate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ReactivateBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(
        state
            .manager
            .reactivate(&id, &body.actor_id, body.reason.as_deref())
            .await,
    )
}

/// POST /concessoes/{id}/cancelar
pub(crate) async fn handle_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    respond(state.manager.cancel(&id, &body.actor_id, &body.reason).await)
}

/// POST /concessoes/{id}/prorrogar
pub(crate) async fn handle_prorogate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ProrogateBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(b) => b,
        Err(r) => return r,
    };
    let result = state
        .manager
        .prorogate(&id, &body.actor_id, body.judicial_document_id.as_deref())
        .await;
    match result {
        Ok(grant) => (StatusCode::CREATED, Json(grant)).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

/// POST /concessoes/{id}/encerramento-automatico
pub(crate) async fn handle_check_closure(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.manager.check_automatic_closure(&id).await {
        Ok(closed) => {
            let response = serde_json::json!({
                "closed": closed.is_some(),
                "grant": closed,
            });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}
