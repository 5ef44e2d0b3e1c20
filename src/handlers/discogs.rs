use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;
use super::{TOO_MANY_REQUESTS, admit};
use crate::discogs::{DiscogsError, LookupResponse};
use crate::error::{ApiError, rate_limit_headers};
use crate::rate_limit::DISCOGS_LOOKUP;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LookupQuery {
    catno: Option<String>,
}

// GET /api/discogs-lookup?catno=...
pub async fn discogs_lookup_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LookupQuery>,
) -> Result<(HeaderMap, Json<LookupResponse>), ApiError> {
    let decision = admit(&state, &headers, &DISCOGS_LOOKUP, TOO_MANY_REQUESTS)?;

    match lookup(&state, query).await {
        Ok(response) => Ok((rate_limit_headers(&decision), Json(response))),
        Err(err) => Err(err.with_quota(decision)),
    }
}

async fn lookup(state: &AppState, query: LookupQuery) -> Result<LookupResponse, ApiError> {
    let catno = query
        .catno
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Invalid catalog number".to_string()))?;

    if let Some(cached) = state.lookup_cache.get(&catno) {
        return Ok(cached);
    }

    let response = match state.discogs.search(&catno).await {
        Ok(response) => response,
        Err(DiscogsError::Status(status)) => {
            tracing::error!(%status, "Discogs API error");
            return Err(ApiError::Upstream {
                status: upstream_status(status),
                message: "Failed to search Discogs database".to_string(),
            });
        }
        Err(err) => {
            tracing::error!(error = %err, "Discogs lookup failed");
            return Err(ApiError::internal(
                state.settings.environment,
                "Internal server error during Discogs lookup",
                err,
            ));
        }
    };

    tracing::info!(releases = response.results.len(), "Discogs lookup finished");
    state.lookup_cache.insert(&catno, response.clone());
    Ok(response)
}

// Discogs' own status is passed through, but only as an error status
fn upstream_status(status: StatusCode) -> StatusCode {
    if status.is_client_error() || status.is_server_error() {
        status
    } else {
        StatusCode::BAD_GATEWAY
    }
}
