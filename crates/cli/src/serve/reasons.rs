//! Reason catalog endpoint with conditional-request support.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};

use super::state::AppState;
use super::{json_error, lifecycle_error};

/// SHA-256 of the compact JSON form, as lowercase hex.
pub(crate) fn compute_etag(value: &serde_json::Value) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(value)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

/// Whether an `If-None-Match` header value matches `etag` (quoted or bare,
/// possibly in a comma-separated list, or `*`).
fn matches_etag(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*"
            || candidate.trim_start_matches("W/").trim_matches('"') == etag
    })
}

/// GET /motivos/{operation}
///
/// Active reasons for an operation. The catalog is fixed for the lifetime
/// of the process, so the ETag only changes across restarts with a
/// different configuration.
pub(crate) async fn handle_reasons(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
    headers: HeaderMap,
) -> Response {
    let entries = match state.manager.reasons(&operation) {
        Ok(entries) => entries,
        Err(e) => return lifecycle_error(e),
    };
    let body = serde_json::json!({
        "operation": operation.trim().to_lowercase(),
        "items": entries,
    });
    let etag = match compute_etag(&body) {
        Ok(etag) => etag,
        Err(e) => {
            tracing::error!(error = %e, "failed to compute reason catalog etag");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };
    let etag_quoted = format!("\"{etag}\"");

    if let Some(inm) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        if matches_etag(inm, &etag) {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Ok(val) = etag_quoted.parse() {
                response.headers_mut().insert(header::ETAG, val);
            }
            return response;
        }
    }

    let mut response = Json(body).into_response();
    if let Ok(val) = etag_quoted.parse() {
        response.headers_mut().insert(header::ETAG, val);
    }
    response
}
