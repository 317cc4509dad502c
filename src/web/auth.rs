//! Basic-auth gate
//!
//! Every request — HTTP or viewer upgrade — must carry the shared
//! credential before any other work happens. Rejections carry a structured
//! JSON body so API clients can surface the reason.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::protocol::ApiResponse;
use crate::web::server::AppState;

/// Pre-computed `Authorization` header value for the configured credential.
#[derive(Debug, Clone)]
pub struct AuthKey {
    header: String,
}

impl AuthKey {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            header: format!("Basic {}", BASE64.encode(format!("{username}:{password}"))),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        value == self.header
    }
}

/// Middleware applied to every route of both listeners.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let supplied = match request.headers().get(header::AUTHORIZATION) {
        None => return unauthorized("No auth header received"),
        Some(value) => value.to_str().map(str::to_owned),
    };
    match supplied {
        Ok(value) if state.auth.matches(&value) => next.run(request).await,
        _ => unauthorized("Invalid credentials"),
    }
}

fn unauthorized(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"camera stream\"")],
        Json(ApiResponse::<()>::error(reason)),
    )
        .into_response()
}
