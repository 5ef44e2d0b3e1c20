use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use serde_json::{Value, json};
use std::sync::Arc;
use super::{TOO_MANY_REQUESTS, admit};
use crate::auth::{CurrentUser, Principal};
use crate::error::{ApiError, rate_limit_headers};
use crate::models::{Record, RecordInput, RecordList, RecordPatch};
use crate::rate_limit::{CREATE_RECORD, FETCH_RECORDS, MODIFY_RECORD};
use crate::state::AppState;
use crate::store::StoreError;
use crate::validation::{validate_new_record, validate_patch};

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid record ID".to_string()))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Record not found".to_string())
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Duplicate => ApiError::Conflict(err.to_string()),
    }
}

// GET /api/records
pub async fn list_records_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<RecordList>), ApiError> {
    let decision = admit(&state, &headers, &FETCH_RECORDS, TOO_MANY_REQUESTS)?;

    let records = state.records.list(&user.id).await;
    Ok((rate_limit_headers(&decision), Json(RecordList::single_page(records))))
}

// POST /api/records
pub async fn create_record_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    body: Result<Json<RecordInput>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Record>), ApiError> {
    let decision = admit(&state, &headers, &CREATE_RECORD, TOO_MANY_REQUESTS)?;

    match create(&state, &user, body).await {
        Ok(record) => Ok((StatusCode::CREATED, rate_limit_headers(&decision), Json(record))),
        Err(err) => Err(err.with_quota(decision)),
    }
}

async fn create(
    state: &AppState,
    user: &Principal,
    body: Result<Json<RecordInput>, JsonRejection>,
) -> Result<Record, ApiError> {
    let Json(input) = body.map_err(bad_body)?;
    let new_record = validate_new_record(input).map_err(ApiError::Validation)?;

    let record = state
        .records
        .create(new_record, &user.id)
        .await
        .map_err(store_error)?;

    tracing::info!(record_id = record.id, user = %user.id, "record added");
    Ok(record)
}

// GET /api/records/{id}
pub async fn get_record_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let id = parse_id(&id)?;
    state
        .records
        .get(id, &user.id)
        .await
        .map(Json)
        .ok_or_else(not_found)
}

// PUT /api/records/{id}
pub async fn update_record_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<RecordPatch>, JsonRejection>,
) -> Result<(HeaderMap, Json<Record>), ApiError> {
    let id = parse_id(&id)?;
    let decision = admit(&state, &headers, &MODIFY_RECORD, TOO_MANY_REQUESTS)?;

    match update(&state, &user, id, body).await {
        Ok(record) => Ok((rate_limit_headers(&decision), Json(record))),
        Err(err) => Err(err.with_quota(decision)),
    }
}

async fn update(
    state: &AppState,
    user: &Principal,
    id: i64,
    body: Result<Json<RecordPatch>, JsonRejection>,
) -> Result<Record, ApiError> {
    let Json(patch) = body.map_err(bad_body)?;
    let patch = validate_patch(patch).map_err(ApiError::Validation)?;

    state
        .records
        .update(id, patch, &user.id)
        .await
        .map_err(store_error)?
        .ok_or_else(not_found)
}

// DELETE /api/records/{id}
pub async fn delete_record_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<Value>), ApiError> {
    let id = parse_id(&id)?;
    let decision = admit(&state, &headers, &MODIFY_RECORD, TOO_MANY_REQUESTS)?;

    if state.records.delete(id, &user.id).await.is_none() {
        return Err(not_found().with_quota(decision));
    }

    tracing::info!(record_id = id, user = %user.id, "record deleted");
    Ok((
        rate_limit_headers(&decision),
        Json(json!({ "message": "Record deleted successfully" })),
    ))
}
