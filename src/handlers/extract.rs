use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, StatusCode},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use super::admit;
use crate::auth::{CurrentUser, Principal};
use crate::error::{ApiError, rate_limit_headers};
use crate::extraction::{ExtractedRecord, ExtractionError, ImageError, ImageUpload};
use crate::metrics::EXTRACTION_LATENCY;
use crate::rate_limit::EXTRACT_RECORD;
use crate::state::AppState;

const TOO_MANY_EXTRACTIONS: &str = "Too many extraction requests. Please wait before trying again.";

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(ImageError::TooLarge.to_string())
    } else {
        ApiError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}

fn image_error(err: ImageError) -> ApiError {
    match err {
        ImageError::TooLarge => ApiError::PayloadTooLarge(err.to_string()),
        ImageError::Missing => ApiError::BadRequest(err.to_string()),
        ImageError::UnsupportedType => ApiError::BadRequest(format!("Invalid file: {err}")),
    }
}

// Pull the "image" part out of the form, skipping anything else
async fn read_image(mut multipart: Multipart) -> Result<ImageUpload, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(ImageUpload {
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(image_error(ImageError::Missing))
}

// POST /api/extract-record
pub async fn extract_record_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(HeaderMap, Json<Value>), ApiError> {
    let decision = admit(&state, &headers, &EXTRACT_RECORD, TOO_MANY_EXTRACTIONS)?;

    match extract(&state, &user, multipart).await {
        Ok(record) => Ok((rate_limit_headers(&decision), Json(json!({ "data": record })))),
        Err(err) => Err(err.with_quota(decision)),
    }
}

async fn extract(
    state: &AppState,
    user: &Principal,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ExtractedRecord, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let image = read_image(multipart).await?;
    image.validate().map_err(image_error)?;

    tracing::info!(
        user = %user.id,
        content_type = %image.content_type,
        size = image.bytes.len(),
        "extracting record from photo"
    );

    let start_time = Instant::now();
    let result = state.extractor.extract(&image).await;
    EXTRACTION_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map_err(|err| {
        tracing::error!(error = %err, "record extraction failed");
        match err {
            ExtractionError::Timeout => ApiError::Timeout(
                "AI processing took too long. Please try with a smaller or clearer image."
                    .to_string(),
            ),
            ExtractionError::Throttled => ApiError::Unavailable(
                "AI service temporarily unavailable. Please try again later.".to_string(),
            ),
            ExtractionError::NotConfigured => {
                ApiError::Unavailable("AI extraction is not configured.".to_string())
            }
            other => ApiError::internal(
                state.settings.environment,
                "Failed to extract record information. Please ensure the image is clear and try again.",
                other,
            ),
        }
    })
}
