//! Emergency endpoints: intake, lookup, lifecycle, handover.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db;
use crate::dispatch::{complete_handover, DispatchOutcome};
use crate::models::{
    AmbulanceUnit, EmergencyRequest, EmergencyStatus, Hospital, MedicalRecord, NewEmergency, Vitals,
};

#[derive(Deserialize)]
pub struct EmergencyListQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct EmergencyListResponse {
    pub emergencies: Vec<EmergencyRequest>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct EmergencyDetail {
    pub emergency: EmergencyRequest,
    pub ambulance: Option<AmbulanceUnit>,
    pub hospital: Option<Hospital>,
    pub record: Option<MedicalRecord>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: EmergencyStatus,
    pub destination_hospital_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ManualAssignment {
    pub ambulance_id: Uuid,
}

/// Accepts the wire form (`EnRoute`) or the storage form (`en_route`).
fn parse_status(raw: &str) -> Result<EmergencyStatus, ApiError> {
    let raw = raw.trim();
    EmergencyStatus::from_str(raw)
        .ok()
        .or_else(|| serde_json::from_value(serde_json::Value::String(raw.to_string())).ok())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown emergency status: {raw}")))
}

/// `POST /api/emergency/request`: create and auto-dispatch.
///
/// Returns 201 whether or not a unit was found; `assignment` is null
/// when the request stays Pending.
pub async fn request(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewEmergency>,
) -> Result<(StatusCode, Json<DispatchOutcome>), ApiError> {
    let outcome = ctx
        .with_db(move |core, conn| Ok(core.dispatcher(conn).intake(body)?))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `GET /api/emergency`: newest first, optional `?status=`.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<EmergencyListQuery>,
) -> Result<Json<EmergencyListResponse>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let emergencies = ctx
        .with_db(move |_, conn| Ok(db::list_emergencies(conn, status)?))
        .await?;
    Ok(Json(EmergencyListResponse {
        total: emergencies.len(),
        emergencies,
    }))
}

/// `GET /api/emergency/:id`: request with its unit, destination and record.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<EmergencyDetail>, ApiError> {
    let id = parse_id(&id, "emergency")?;
    let detail = ctx
        .with_db(move |_, conn| {
            let emergency = db::get_emergency(conn, &id)?
                .ok_or_else(|| ApiError::NotFound(format!("Emergency not found: {id}")))?;
            let ambulance = match emergency.ambulance_id {
                Some(aid) => db::get_ambulance(conn, &aid)?,
                None => None,
            };
            let hospital = match emergency.destination_hospital_id {
                Some(hid) => db::get_hospital(conn, &hid)?,
                None => None,
            };
            let record = db::get_record_for_emergency(conn, &id)?;
            Ok(EmergencyDetail {
                emergency,
                ambulance,
                hospital,
                record,
            })
        })
        .await?;
    Ok(Json(detail))
}

/// `POST /api/emergency/:id/status`: crew or dispatcher lifecycle move.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<EmergencyRequest>, ApiError> {
    let id = parse_id(&id, "emergency")?;
    let updated = ctx
        .with_db(move |core, conn| {
            Ok(core
                .dispatcher(conn)
                .advance(&id, body.status, body.destination_hospital_id)?)
        })
        .await?;
    Ok(Json(updated))
}

/// `POST /api/emergency/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<EmergencyRequest>, ApiError> {
    let id = parse_id(&id, "emergency")?;
    let cancelled = ctx
        .with_db(move |core, conn| Ok(core.dispatcher(conn).cancel(&id)?))
        .await?;
    Ok(Json(cancelled))
}

/// `POST /api/emergency/:id/assign`: dispatcher override.
pub async fn assign(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(body): Json<ManualAssignment>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    let id = parse_id(&id, "emergency")?;
    let outcome = ctx
        .with_db(move |core, conn| Ok(core.dispatcher(conn).assign_manually(&id, &body.ambulance_id)?))
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/emergency/:id/dispatch`: retry auto-dispatch for a Pending request.
pub async fn redispatch(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    let id = parse_id(&id, "emergency")?;
    let outcome = ctx
        .with_db(move |core, conn| Ok(core.dispatcher(conn).dispatch_pending(&id)?))
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/emergency/:id/handover`: vitals in, Delivered out.
pub async fn handover(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(vitals): Json<Vitals>,
) -> Result<(StatusCode, Json<MedicalRecord>), ApiError> {
    let id = parse_id(&id, "emergency")?;
    let record = ctx
        .with_db(move |core, conn| {
            Ok(complete_handover(
                conn,
                core.hub(),
                &id,
                &vitals,
                core.config.assign_retries,
            )?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_query_accepts_both_spellings() {
        assert_eq!(parse_status("en_route").unwrap(), EmergencyStatus::EnRoute);
        assert_eq!(parse_status("EnRoute").unwrap(), EmergencyStatus::EnRoute);
        assert_eq!(parse_status(" pending ").unwrap(), EmergencyStatus::Pending);
        assert!(matches!(parse_status("lost"), Err(ApiError::BadRequest(_))));
    }
}
