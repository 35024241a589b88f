//! Hospital endpoints, including the incoming-patients view.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db;
use crate::dispatch::incoming_records;
use crate::models::{Hospital, MedicalRecord};

#[derive(Serialize)]
pub struct HospitalListResponse {
    pub hospitals: Vec<Hospital>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct IncomingResponse {
    pub hospital_id: uuid::Uuid,
    pub incoming: Vec<MedicalRecord>,
}

/// `GET /api/hospital`: active facilities.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<HospitalListResponse>, ApiError> {
    let hospitals = ctx
        .with_db(|_, conn| Ok(db::list_hospitals(conn, true)?))
        .await?;
    Ok(Json(HospitalListResponse {
        total: hospitals.len(),
        hospitals,
    }))
}

/// `GET /api/hospital/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Hospital>, ApiError> {
    let id = parse_id(&id, "hospital")?;
    let hospital = ctx
        .with_db(move |_, conn| {
            db::get_hospital(conn, &id)?
                .ok_or_else(|| ApiError::NotFound(format!("Hospital not found: {id}")))
        })
        .await?;
    Ok(Json(hospital))
}

/// `GET /api/hospital/:id/incoming`: En Route patients headed here.
pub async fn incoming(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<IncomingResponse>, ApiError> {
    let id = parse_id(&id, "hospital")?;
    let incoming = ctx
        .with_db(move |_, conn| Ok(incoming_records(conn, &id)?))
        .await?;
    Ok(Json(IncomingResponse {
        hospital_id: id,
        incoming,
    }))
}
