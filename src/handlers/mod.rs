mod discogs;
mod extract;
mod health;
mod metrics;
mod records;

pub use discogs::discogs_lookup_handler;
pub use extract::extract_record_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use records::{
    create_record_handler, delete_record_handler, get_record_handler, list_records_handler,
    update_record_handler,
};

use axum::http::HeaderMap;
use crate::error::ApiError;
use crate::identity::resolve_client_ip;
use crate::metrics::{ADMISSIONS, DENIALS, REQUEST_TOTAL};
use crate::rate_limit::{Decision, Quota};
use crate::state::AppState;

// Rate limit guard run before any protected work
fn admit(
    state: &AppState,
    headers: &HeaderMap,
    quota: &Quota,
    denied_message: &'static str,
) -> Result<Decision, ApiError> {
    REQUEST_TOTAL.inc();

    // only validated addresses (or "anonymous") ever reach the key or the logs
    let identity = resolve_client_ip(headers, state.settings.environment);
    let decision = state.gate.check(quota, &identity)?;

    if !decision.admitted {
        DENIALS.with_label_values(&[quota.action]).inc();
        tracing::warn!(
            action = quota.action,
            client = %identity,
            limit = quota.limit,
            reset_at = decision.reset_at,
            "rate limit exceeded"
        );
        return Err(ApiError::rate_limited(
            decision,
            state.gate.now_millis(),
            denied_message,
        ));
    }

    ADMISSIONS.with_label_values(&[quota.action]).inc();
    Ok(decision)
}

const TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";
