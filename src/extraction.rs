//! Photo-based record extraction through a vision model.
//!
//! The uploaded image is inlined as a base64 data URL and sent to an
//! OpenAI-compatible chat completions endpoint, which is asked to answer
//! with a JSON object describing the record.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use crate::models::Condition;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

const PROMPT: &str = "Analyze this vinyl record image and extract all visible information. \
Look for the album title, artist name, release year, record label, catalog number, and assess \
the visual condition using one of: Mint, Near Mint, Very Good Plus, Very Good, Good Plus, Good, \
Fair, Poor. If any information is not clearly visible, leave those fields empty. Be as accurate \
as possible. Answer with a single JSON object with the keys title, artist, year, genre, label, \
catalog_number, condition and notes.";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("vision model did not answer in time")]
    Timeout,
    #[error("vision service is rate limited or out of quota")]
    Throttled,
    #[error("vision service is not configured")]
    NotConfigured,
    #[error("vision service answered {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("vision model returned an unusable answer: {0}")]
    Malformed(String),
    #[error("vision request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("No image provided")]
    Missing,
    #[error("File must be a JPEG, PNG, or WebP image")]
    UnsupportedType,
    #[error("File too large. Maximum size is 10MB.")]
    TooLarge,
}

// Uploaded photo
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.bytes.is_empty() {
            return Err(ImageError::Missing);
        }
        if !ALLOWED_IMAGE_TYPES.contains(&self.content_type.as_str()) {
            return Err(ImageError::UnsupportedType);
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge);
        }
        Ok(())
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.bytes))
    }
}

// What the model read off the sleeve
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_number: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// Models sometimes invent grades; anything off the scale is dropped
fn lenient_condition<'de, D>(deserializer: D) -> Result<Option<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Race `call` against a timer.
///
/// On expiry the future is dropped, which abandons our interest in the
/// result; the remote side may still finish the work.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ExtractionError>
where
    F: Future<Output = Result<T, ExtractionError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ExtractionError::Timeout)?
}

// Parse the model's message, tolerating a ```json fence around it
pub fn parse_extraction(content: &str) -> Result<ExtractedRecord, ExtractionError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(|e| ExtractionError::Malformed(e.to_string()))
}

#[derive(Clone)]
pub struct ExtractionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ExtractionClient {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url,
            model,
            api_key,
            timeout,
        }
    }

    pub async fn extract(&self, image: &ImageUpload) -> Result<ExtractedRecord, ExtractionError> {
        let api_key = self.api_key.as_deref().ok_or(ExtractionError::NotConfigured)?;
        with_timeout(self.timeout, self.complete(api_key, image.data_url())).await
    }

    async fn complete(&self, api_key: &str, data_url: String) -> Result<ExtractedRecord, ExtractionError> {
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }],
            "response_format": { "type": "json_object" },
        });

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(classify_failure(status, body));
        }

        let chat: ChatResponse = res.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractionError::Malformed("empty completion".to_string()))?;
        parse_extraction(&content)
    }
}

// Quota and throttling answers are temporary, everything else is a hard failure
fn classify_failure(status: StatusCode, body: String) -> ExtractionError {
    let lower = body.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || lower.contains("rate limit")
        || lower.contains("quota")
    {
        return ExtractionError::Throttled;
    }
    // keep error bodies short, they end up in logs
    let body: String = body.chars().take(200).collect();
    ExtractionError::Upstream { status, body }
}
