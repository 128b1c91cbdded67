use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    auth::{
        gate::{access_gate, AccessGate, RoutePolicy},
        jwt::JwtKeys,
    },
    db,
    state::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub uptime_seconds: u64,
    pub database_status: &'static str,
}

impl HealthReport {
    pub fn new(uptime_seconds: u64, database_up: bool) -> Self {
        Self {
            status: "ok",
            timestamp: OffsetDateTime::now_utc(),
            uptime_seconds,
            database_status: if database_up { "up" } else { "down" },
        }
    }
}

pub fn router(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route_layer(from_fn_with_state(
            AccessGate::new(keys, RoutePolicy::PUBLIC),
            access_gate,
        ))
}

/// `GET /` moves permanently to `/health`.
pub async fn root() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/health")])
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let database_up = db::ping(&state.db).await;
    if !database_up {
        tracing::warn!("health check: database unreachable");
    }
    Json(HealthReport::new(
        state.started_at.elapsed().as_secs(),
        database_up,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_camel_case() {
        let v = serde_json::to_value(HealthReport::new(42, false)).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["uptimeSeconds"], 42);
        assert_eq!(v["databaseStatus"], "down");
        assert!(v["timestamp"].as_str().unwrap().contains('T'));
    }
}
