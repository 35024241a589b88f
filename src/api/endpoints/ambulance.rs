//! Fleet endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db;
use crate::models::{AmbulanceUnit, EmergencyRequest, GeoPoint, NewAmbulance};

#[derive(Deserialize)]
pub struct FleetQuery {
    pub available: Option<bool>,
}

#[derive(Serialize)]
pub struct FleetResponse {
    pub ambulances: Vec<AmbulanceUnit>,
    pub total: usize,
    pub available: usize,
}

#[derive(Serialize)]
pub struct AmbulanceDetail {
    pub ambulance: AmbulanceUnit,
    /// The mission the unit is currently serving, if any.
    pub active_emergency: Option<EmergencyRequest>,
}

#[derive(Deserialize)]
pub struct LocationUpdate {
    pub ambulance_id: Uuid,
    pub lat: f64,
    pub lng: f64,
}

/// `GET /api/ambulance`: optional `?available=true|false`.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<FleetQuery>,
) -> Result<Json<FleetResponse>, ApiError> {
    let ambulances = ctx
        .with_db(move |_, conn| Ok(db::list_ambulances(conn, query.available)?))
        .await?;
    Ok(Json(FleetResponse {
        total: ambulances.len(),
        available: ambulances.iter().filter(|a| a.is_available).count(),
        ambulances,
    }))
}

/// `POST /api/ambulance`: register a unit.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewAmbulance>,
) -> Result<(StatusCode, Json<AmbulanceUnit>), ApiError> {
    let unit = ctx
        .with_db(move |core, conn| Ok(core.dispatcher(conn).register_ambulance(body)?))
        .await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

/// `GET /api/ambulance/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<AmbulanceDetail>, ApiError> {
    let id = parse_id(&id, "ambulance")?;
    let detail = ctx
        .with_db(move |_, conn| {
            let ambulance = db::get_ambulance(conn, &id)?
                .ok_or_else(|| ApiError::NotFound(format!("Ambulance not found: {id}")))?;
            let active_emergency = db::find_active_emergency_for_ambulance(conn, &id)?;
            Ok(AmbulanceDetail {
                ambulance,
                active_emergency,
            })
        })
        .await?;
    Ok(Json(detail))
}

/// `POST /api/ambulance/location`: crew position fix, broadcast live.
pub async fn update_location(
    State(ctx): State<ApiContext>,
    Json(body): Json<LocationUpdate>,
) -> Result<Json<AmbulanceUnit>, ApiError> {
    let point = GeoPoint::new(body.lat, body.lng);
    let unit = ctx
        .with_db(move |core, conn| Ok(core.dispatcher(conn).record_location(&body.ambulance_id, point)?))
        .await?;
    Ok(Json(unit))
}
