use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use crate::identity::Environment;
use crate::rate_limit::{Decision, QuotaError};

const GENERIC_MESSAGE: &str = "An error occurred while processing your request";

// Single field failure reported by validation
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// API error type, rendered as `{"error": {"code", "message", ...}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{message}")]
    RateLimited {
        decision: Decision,
        retry_after: u64,
        message: &'static str,
    },

    // Upstream service answered with a non-success status
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("{0}")]
    Unavailable(String),

    // Details are only exposed outside production, and even then redacted
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    #[error("rate limit misconfigured: {0}")]
    Quota(#[from] QuotaError),

    // Failure after the gate admitted the request; the slot is spent, so report it
    #[error("{inner}")]
    Admitted {
        decision: Decision,
        inner: Box<ApiError>,
    },
}

impl ApiError {
    pub fn rate_limited(decision: Decision, now: u64, message: &'static str) -> Self {
        ApiError::RateLimited {
            decision,
            retry_after: decision.retry_after_secs(now),
            message,
        }
    }

    pub fn internal(env: Environment, message: &str, err: impl std::fmt::Display) -> Self {
        if env.is_production() {
            return ApiError::Internal {
                message: GENERIC_MESSAGE.to_string(),
                details: None,
            };
        }
        ApiError::Internal {
            message: message.to_string(),
            details: Some(redact_secrets(&err.to_string())),
        }
    }

    /// Attach the admission decision so the response still reports quota usage.
    pub fn with_quota(self, decision: Decision) -> Self {
        match self {
            ApiError::Admitted { .. } | ApiError::RateLimited { .. } => self,
            inner => ApiError::Admitted {
                decision,
                inner: Box::new(inner),
            },
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } | ApiError::Quota(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Admitted { inner, .. } => inner.status(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal { .. } | ApiError::Quota(_) => "INTERNAL_ERROR",
            ApiError::Admitted { inner, .. } => inner.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Admitted { decision, inner } = self {
            let mut response = inner.into_response();
            response.headers_mut().extend(rate_limit_headers(&decision));
            return response;
        }

        let status = self.status();
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        let mut headers = HeaderMap::new();
        match &self {
            ApiError::Validation(fields) => {
                error["details"] = json!(fields);
            }
            ApiError::Internal {
                details: Some(details),
                ..
            } => {
                error["details"] = json!(details);
            }
            ApiError::RateLimited {
                decision,
                retry_after,
                ..
            } => {
                error["retry_after"] = json!(retry_after);
                headers = rate_limit_headers(decision);
                headers.insert("retry-after", HeaderValue::from(*retry_after));
            }
            ApiError::Quota(err) => {
                tracing::error!(error = %err, "rate limit quota misconfigured");
            }
            _ => {}
        }

        (status, headers, Json(json!({ "error": error }))).into_response()
    }
}

// X-RateLimit-* headers, reset is epoch milliseconds
pub fn rate_limit_headers(decision: &Decision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_at));
    headers
}

const SENSITIVE_KEYS: [&str; 10] = [
    "api_key",
    "api-key",
    "apikey",
    "connection_string",
    "connection-string",
    "database_url",
    "database-url",
    "password",
    "secret",
    "token",
];

// Replace values following sensitive keys ("password=...", "api_key: ...") with [REDACTED]
pub fn redact_secrets(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    let bytes = message.as_bytes();
    let mut out = String::with_capacity(message.len());
    let mut i = 0;

    while i < bytes.len() {
        let key_len = SENSITIVE_KEYS
            .iter()
            .copied()
            .chain(["key"])
            .find(|k| lower[i..].starts_with(k))
            .map(str::len);

        if let Some(len) = key_len {
            let mut j = i + len;
            if matches!(bytes.get(j), Some(b'=') | Some(b':')) {
                j += 1;
                while bytes.get(j).is_some_and(|b| *b == b' ' || *b == b'\t') {
                    j += 1;
                }
                let value_start = j;
                while bytes.get(j).is_some_and(|b| !b.is_ascii_whitespace()) {
                    j += 1;
                }
                if j > value_start {
                    out.push_str("[REDACTED]");
                    i = j;
                    continue;
                }
            }
        }

        // advance one whole char to stay on utf-8 boundaries
        let ch = message[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8().max(1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn redacts_sensitive_values() {
        assert_eq!(
            redact_secrets("connect failed password=hunter2 host=db"),
            "connect failed [REDACTED] host=db"
        );
        assert_eq!(redact_secrets("API_KEY: abc123"), "[REDACTED]");
        assert_eq!(redact_secrets("secret:  s3cr3t done"), "[REDACTED] done");
        assert_eq!(redact_secrets("Token=xyz"), "[REDACTED]");
        assert_eq!(redact_secrets("no secrets here"), "no secrets here");
        assert_eq!(redact_secrets("ümlaut key=1 ok"), "ümlaut [REDACTED] ok");
    }

    #[test]
    fn internal_hides_details_in_production() {
        let err = ApiError::internal(Environment::Production, "Failed", "token=abc");
        assert_eq!(err.to_string(), GENERIC_MESSAGE);
        assert!(matches!(err, ApiError::Internal { details: None, .. }));

        let err = ApiError::internal(Environment::Development, "Failed", "token=abc");
        match err {
            ApiError::Internal { details, .. } => assert_eq!(details.as_deref(), Some("[REDACTED]")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limited_response_carries_headers() {
        let decision = Decision {
            admitted: false,
            limit: 5,
            remaining: 0,
            reset_at: 60_000,
        };
        let response = ApiError::rate_limited(decision, 5, "Too many requests").into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "60000");
        assert_eq!(response.headers()["retry-after"], "60");

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn admitted_failure_keeps_quota_headers() {
        let decision = Decision {
            admitted: true,
            limit: 5,
            remaining: 3,
            reset_at: 60_000,
        };
        let response = ApiError::Validation(vec![FieldError::new("title", "Title is required")])
            .with_quota(decision)
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "3");
        assert_eq!(response.headers()["x-ratelimit-reset"], "60000");
        assert!(response.headers().get("retry-after").is_none());

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["details"][0]["field"], "title");
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let response = ApiError::Validation(vec![FieldError::new("title", "Title is required")])
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Validation failed");
        assert_eq!(json["error"]["details"][0]["field"], "title");
    }
}
