//! HTTP route handlers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

use crate::protocol::{ApiResponse, TemperatureReading};
use crate::telemetry::ACCEPTED_INTERVALS;
use crate::web::server::AppState;

/// `/` — permanent redirect to the viewer page.
pub async fn root() -> impl IntoResponse {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, "/index.html")],
    )
}

/// `/index.html` — templated viewer page
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    Html(state.templates.index.render(&[
        ("WIDTH", state.video.width.to_string()),
        ("HEIGHT", state.video.height.to_string()),
        ("COLOR", state.display.color.clone()),
        ("BGCOLOR", state.display.bgcolor.clone()),
        ("TEMPARATURE", current_temp_display(&state)),
        ("WS_PORT", state.ws_port.to_string()),
    ]))
    .into_response()
}

/// `/jsmpg.js` — static player script
pub async fn player_script(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        state.templates.player_script.clone(),
    )
}

/// `/temparature` — current reading as JSON (route keeps its historical
/// spelling).
pub async fn temparature(State(state): State<Arc<AppState>>) -> Response {
    match state.sensor.read() {
        Ok(temparature) => Json(TemperatureReading { temparature }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "temperature read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Sensor unavailable")),
            )
                .into_response()
        }
    }
}

#[derive(serde::Deserialize)]
pub struct HistoryQuery {
    interval: Option<String>,
}

/// `/history?interval=<hours>` — templated history view over one of the
/// accepted hour windows. Defaults to 6 hours when no interval is given;
/// anything non-numeric or outside the accepted set is a 400.
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let interval = match query.interval.as_deref() {
        None => 6,
        Some(raw) => match raw.parse::<u32>() {
            Ok(hours) if ACCEPTED_INTERVALS.contains(&hours) => hours,
            _ => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<()>::error("Interval incorrect")),
                )
                    .into_response();
            }
        },
    };

    let rows = match state.store.history(interval) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "history query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("History unavailable")),
            )
                .into_response();
        }
    };
    let data = serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string());

    Html(state.templates.history.render(&[
        ("DATA", data),
        ("TEMPARATURE", current_temp_display(&state)),
        ("IS6", active_flag(interval == 6)),
        ("IS12", active_flag(interval == 12)),
        ("IS24", active_flag(interval == 24)),
        ("IS168", active_flag(interval == 168)),
        ("IS720", active_flag(interval == 720)),
    ]))
    .into_response()
}

// A failed sensor read should not take the page down with it.
fn current_temp_display(state: &AppState) -> String {
    match state.sensor.read() {
        Ok(temp) => format!("{temp:.1}"),
        Err(e) => {
            tracing::warn!(error = %e, "temperature read failed");
            "--".to_string()
        }
    }
}

fn active_flag(active: bool) -> String {
    if active { "active" } else { "" }.to_string()
}
