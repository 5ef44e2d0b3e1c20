//! Caller authentication.
//!
//! Sessions are owned by an upstream auth proxy which asserts the signed-in
//! user through `x-user-*` headers. This module only turns those headers into
//! a [`Principal`] and applies the guest-access rule.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use serde::Serialize;
use std::sync::Arc;
use crate::error::ApiError;
use crate::identity::Environment;
use crate::state::AppState;

pub const GUEST_USER_ID: &str = "guest-user";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub email: String,
}

impl Principal {
    pub fn guest() -> Self {
        Self {
            id: GUEST_USER_ID.to_string(),
            display_name: "Guest User".to_string(),
            email: "guest@example.com".to_string(),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// Principal asserted by the auth proxy, if any
pub fn session_principal(headers: &HeaderMap) -> Option<Principal> {
    let id = header_value(headers, "x-user-id")?;
    Some(Principal {
        id: id.to_string(),
        display_name: header_value(headers, "x-user-name").unwrap_or(id).to_string(),
        email: header_value(headers, "x-user-email").unwrap_or_default().to_string(),
    })
}

/// Guest access needs both a development deployment and the explicit opt-in.
pub fn effective_user(
    session: Option<Principal>,
    env: Environment,
    allow_guest: bool,
) -> Option<Principal> {
    match session {
        Some(user) => Some(user),
        None if env == Environment::Development && allow_guest => Some(Principal::guest()),
        None => None,
    }
}

// Extractor for handlers that need a signed-in user
pub struct CurrentUser(pub Principal);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let settings = &state.settings;
        effective_user(
            session_principal(&parts.headers),
            settings.environment,
            settings.allow_guest_access,
        )
        .map(CurrentUser)
        .ok_or(ApiError::Unauthorized)
    }
}
