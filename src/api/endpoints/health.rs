//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub available_ambulances: usize,
    pub live_subscribers: usize,
}

/// `GET /api/health`: liveness plus a database round-trip.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let available_ambulances = ctx
        .with_db(|_, conn| Ok(db::list_available_ambulances(conn)?.len()))
        .await?;

    Ok(Json(HealthResponse {
        status: "ok",
        service: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        uptime_secs: ctx.core.uptime().as_secs(),
        available_ambulances,
        live_subscribers: ctx.core.hub().receiver_count(),
    }))
}
