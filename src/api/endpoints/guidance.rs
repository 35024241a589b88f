//! AI first-aid guidance endpoint.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::guidance::FirstAidGuidance;

#[derive(Deserialize)]
pub struct GuidanceRequest {
    /// Short description of the situation, e.g. "severe bleeding from forearm".
    pub descriptor: String,
}

/// `POST /api/emergency/guidance`
///
/// One call to the model, no retry. Failures surface as 502.
pub async fn first_aid(
    State(ctx): State<ApiContext>,
    Json(body): Json<GuidanceRequest>,
) -> Result<Json<FirstAidGuidance>, ApiError> {
    let core = ctx.core.clone();
    let guidance = tokio::task::spawn_blocking(move || core.guide().guidance(&body.descriptor)).await??;
    Ok(Json(guidance))
}
