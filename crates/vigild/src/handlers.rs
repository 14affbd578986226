//! HTTP API handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use vigil_alerts::{Alert, AlertState, Matcher, Silence};
use vigil_config::ConfigDocument;
use vigil_notify::StatsSnapshot;

use crate::engine::{HealthSnapshot, SloStatus};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response body of `GET /api/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` while the engine ticks on schedule, `"stale"` otherwise.
    pub status: String,
    /// Liveness counters of the evaluation loop.
    #[serde(flatten)]
    pub engine: HealthSnapshot,
    /// Alerts currently tracked, all states.
    pub alerts: usize,
    /// Silences active right now.
    pub silences: usize,
    /// Notification dispatch counters.
    pub notifications: StatsSnapshot,
}

/// `GET /api/health` — engine liveness plus store and dispatch counters.
///
/// Answers 200 while the last tick is within twice the configured
/// interval, 503 once the loop goes quiet.
pub async fn get_health(State(state): State<AppState>) -> Response {
    let now = Utc::now();
    let interval = state.config().current().engine.tick_interval;
    let health = state.engine().health();
    let live = health.is_live(now, interval);

    let body = HealthResponse {
        status: if live { "ok" } else { "stale" }.to_string(),
        engine: health.snapshot(),
        alerts: state.engine().store().count(),
        silences: state.engine().silences().active_at(now).len(),
        notifications: state.stats().snapshot(),
    };
    let code = if live {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

/// Query parameters of `GET /api/alerts`.
#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    /// Restrict the listing to one lifecycle state.
    pub state: Option<String>,
}

/// `GET /api/alerts` — tracked alerts, oldest first, optionally
/// filtered by state.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    let mut alerts = state.engine().store().all();
    if let Some(raw) = query.state.as_deref() {
        let wanted = parse_state(raw)?;
        alerts.retain(|alert| alert.state == wanted);
    }
    Ok(Json(alerts))
}

fn parse_state(raw: &str) -> ApiResult<AlertState> {
    match raw {
        "pending" => Ok(AlertState::Pending),
        "firing" => Ok(AlertState::Firing),
        "resolved" => Ok(AlertState::Resolved),
        other => Err(ApiError::InvalidRequest(format!(
            "unknown alert state {other:?}, expected pending, firing, or resolved"
        ))),
    }
}

/// `GET /api/slos` — budget standing of every objective as of the last
/// completed tick.
pub async fn list_slos(State(state): State<AppState>) -> Json<Vec<SloStatus>> {
    Json(state.engine().slo_statuses())
}

/// `GET /api/silences` — every known silence, including expired ones
/// awaiting garbage collection.
pub async fn list_silences(State(state): State<AppState>) -> Json<Vec<Silence>> {
    Json(state.engine().silences().list())
}

/// Request body of `POST /api/silences`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SilenceRequest {
    /// Matchers selecting the alerts to silence.
    pub matchers: Vec<Matcher>,
    /// When the silence starts; defaults to now.
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    /// When the silence expires.
    pub ends_at: DateTime<Utc>,
    /// Who created the silence.
    pub created_by: String,
    /// Why the alerts are silenced.
    #[serde(default)]
    pub comment: String,
}

/// `POST /api/silences` — creates a silence.
pub async fn create_silence(
    State(state): State<AppState>,
    Json(request): Json<SilenceRequest>,
) -> ApiResult<(StatusCode, Json<Silence>)> {
    let starts_at = request.starts_at.unwrap_or_else(Utc::now);
    let silence = Silence::new(
        request.matchers,
        starts_at,
        request.ends_at,
        request.created_by,
        request.comment,
    )?;
    let stored = state.engine().silences().create(silence)?;
    info!(id = %stored.id, ends_at = %stored.ends_at, "silence created");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `DELETE /api/silences/{id}` — expires a silence immediately.
pub async fn delete_silence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Silence>> {
    let expired = state.engine().silences().expire(&id, Utc::now())?;
    info!(id = %expired.id, "silence expired");
    Ok(Json(expired))
}

/// Response body of `POST /api/reload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    /// SLI definitions in the new configuration.
    pub slis: usize,
    /// Objectives in the new configuration.
    pub slos: usize,
    /// Receivers in the new configuration.
    pub receivers: usize,
}

/// `POST /api/reload` — re-reads the config file, validates it, and
/// swaps it in atomically. On any error the previous configuration
/// stays active. On success, notification groups are rebuilt under
/// the new route tree.
pub async fn reload_config(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let document = ConfigDocument::load(state.config_path())?;
    let compiled = document.validate()?;
    let response = ReloadResponse {
        slis: compiled.slis.len(),
        slos: compiled.objectives.len(),
        receivers: compiled.receivers.len(),
    };
    state.config().install(Arc::new(compiled));
    state.engine().reroute_active(Utc::now());
    info!(path = %state.config_path().display(), "configuration reloaded");
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("pending", AlertState::Pending; "pending")]
    #[test_case("firing", AlertState::Firing; "firing")]
    #[test_case("resolved", AlertState::Resolved; "resolved")]
    fn parses_alert_state(raw: &str, expected: AlertState) {
        assert_eq!(parse_state(raw).unwrap(), expected);
    }

    #[test_case("active"; "prometheus spelling")]
    #[test_case("FIRING"; "wrong case")]
    #[test_case(""; "empty")]
    fn rejects_unknown_alert_state(raw: &str) {
        let err = parse_state(raw).unwrap_err();
        assert!(err.to_string().contains("unknown alert state"));
    }

    #[test]
    fn silence_request_defaults_are_optional() {
        let request: SilenceRequest = serde_json::from_value(serde_json::json!({
            "matchers": [{"name": "service", "op": "=", "value": "checkout"}],
            "ends_at": "2025-06-01T14:00:00Z",
            "created_by": "oncall"
        }))
        .unwrap();
        assert!(request.starts_at.is_none());
        assert!(request.comment.is_empty());
    }
}
