//! Dispatch API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! REST routes are nested under `/api/`; the socket lives at `/ws`.
//!
//! Layers (outermost → innermost): CORS → access log → handler.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CoreState;

/// Build the full dispatch router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/emergency", get(endpoints::emergency::list))
        .route("/emergency/request", post(endpoints::emergency::request))
        .route("/emergency/guidance", post(endpoints::guidance::first_aid))
        .route("/emergency/:id", get(endpoints::emergency::detail))
        .route("/emergency/:id/status", post(endpoints::emergency::update_status))
        .route("/emergency/:id/cancel", post(endpoints::emergency::cancel))
        .route("/emergency/:id/assign", post(endpoints::emergency::assign))
        .route("/emergency/:id/dispatch", post(endpoints::emergency::redispatch))
        .route("/emergency/:id/handover", post(endpoints::emergency::handover))
        .route(
            "/ambulance",
            get(endpoints::ambulance::list).post(endpoints::ambulance::register),
        )
        .route("/ambulance/location", post(endpoints::ambulance::update_location))
        .route("/ambulance/:id", get(endpoints::ambulance::detail))
        .route("/hospital", get(endpoints::hospital::list))
        .route("/hospital/:id", get(endpoints::hospital::detail))
        .route("/hospital/:id/incoming", get(endpoints::hospital::incoming))
        .route("/records", get(endpoints::records::list));

    Router::new()
        .nest("/api", api)
        .route("/ws", get(websocket::ws_upgrade))
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::access_log::log_access))
        .layer(CorsLayer::permissive())
}
