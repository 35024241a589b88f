//! Travel-time estimation for dispatch candidates.
//!
//! `EtaEstimator` is the single seam to the routing provider. Callers
//! treat any failure as a cue to fall back to `StraightLineEstimator`.

pub mod distance_matrix;
pub mod straight_line;

pub use distance_matrix::DistanceMatrixClient;
pub use straight_line::StraightLineEstimator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::GeoPoint;

/// Where a duration figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Routing,
    StraightLine,
}

/// Per-origin result, index-aligned with the origins passed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginEstimate {
    Duration { seconds: u32, source: EstimateSource },
    /// Provider element status, e.g. `ZERO_RESULTS`.
    Failed { status: String },
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Cannot reach routing service at {0}")]
    Connection(String),

    #[error("Routing request timed out after {0}s")]
    Timeout(u64),

    #[error("Routing service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Routing request rejected: {0}")]
    Rejected(String),

    #[error("Failed to parse routing response: {0}")]
    ResponseParsing(String),

    #[error("Routing response has {got} rows for {expected} origins")]
    LengthMismatch { expected: usize, got: usize },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Travel time from each origin to one destination.
pub trait EtaEstimator: Send + Sync {
    fn estimate(
        &self,
        origins: &[GeoPoint],
        destination: GeoPoint,
    ) -> Result<Vec<OriginEstimate>, RoutingError>;
}
