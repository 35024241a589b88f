//! Application state shared by every request handler.
//!
//! Wrapped in `Arc` at startup. Holds configuration and the long-lived
//! collaborators; database connections are opened per unit of work.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::config::DispatchConfig;
use crate::db;
use crate::dispatch::Dispatcher;
use crate::events::EventHub;
use crate::guidance::{FirstAidGuide, GuidanceError, OllamaGuide};
use crate::routing::{DistanceMatrixClient, EtaEstimator, RoutingError, StraightLineEstimator};

pub struct CoreState {
    pub config: DispatchConfig,
    hub: EventHub,
    estimator: Arc<dyn EtaEstimator>,
    fallback: StraightLineEstimator,
    guide: Arc<dyn FirstAidGuide>,
    started_at: Instant,
}

impl CoreState {
    pub fn new(
        config: DispatchConfig,
        estimator: Arc<dyn EtaEstimator>,
        guide: Arc<dyn FirstAidGuide>,
    ) -> Self {
        let fallback = StraightLineEstimator::from_kmh(config.average_speed_kmh);
        let hub = EventHub::new(config.event_buffer);
        Self {
            config,
            hub,
            estimator,
            fallback,
            guide,
            started_at: Instant::now(),
        }
    }

    /// Build the production collaborators. Without a maps key the
    /// straight-line estimator is the primary one.
    ///
    /// Constructs blocking HTTP clients, so call outside the async runtime.
    pub fn from_config(config: DispatchConfig) -> Result<Self, CoreError> {
        let estimator: Arc<dyn EtaEstimator> = match config.maps_api_key.as_deref() {
            Some(key) => {
                tracing::info!(url = %config.maps_url, "Routing via distance matrix");
                Arc::new(DistanceMatrixClient::new(&config.maps_url, key, config.routing_timeout)?)
            }
            None => {
                tracing::info!(
                    speed_kmh = config.average_speed_kmh,
                    "No maps API key, routing by straight-line distance"
                );
                Arc::new(StraightLineEstimator::from_kmh(config.average_speed_kmh))
            }
        };
        let guide = Arc::new(OllamaGuide::new(
            &config.ollama_url,
            &config.guidance_model,
            config.guidance_timeout,
        )?);
        Ok(Self::new(config, estimator, guide))
    }

    /// Open a connection to the dispatch database.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn guide(&self) -> &dyn FirstAidGuide {
        self.guide.as_ref()
    }

    pub fn dispatcher<'a>(&'a self, conn: &'a mut Connection) -> Dispatcher<'a> {
        Dispatcher::new(
            conn,
            self.estimator.as_ref(),
            &self.fallback,
            &self.hub,
            self.config.assign_retries,
        )
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Routing setup failed: {0}")]
    Routing(#[from] RoutingError),
    #[error("Guidance setup failed: {0}")]
    Guidance(#[from] GuidanceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
