//! Archived medical records.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::MedicalRecord;

#[derive(Deserialize)]
pub struct RecordsQuery {
    /// Case-insensitive patient name match.
    pub patient: Option<String>,
}

#[derive(Serialize)]
pub struct RecordsResponse {
    pub records: Vec<MedicalRecord>,
    pub total: usize,
}

/// `GET /api/records`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let patient = query.patient.filter(|p| !p.trim().is_empty());
    let records = ctx
        .with_db(move |_, conn| Ok(db::list_medical_records(conn, patient.as_deref())?))
        .await?;
    Ok(Json(RecordsResponse {
        total: records.len(),
        records,
    }))
}
