use super::{EstimateSource, EtaEstimator, OriginEstimate, RoutingError};
use crate::models::GeoPoint;

/// Haversine distance divided by an average road speed.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineEstimator {
    speed_mps: f64,
}

impl StraightLineEstimator {
    /// Non-positive or non-finite speeds fall back to 40 km/h.
    pub fn from_kmh(kmh: f64) -> Self {
        let kmh = if kmh.is_finite() && kmh > 0.0 { kmh } else { 40.0 };
        Self {
            speed_mps: kmh * 1000.0 / 3600.0,
        }
    }

    pub fn seconds_for(&self, distance_m: f64) -> u32 {
        (distance_m / self.speed_mps).round().clamp(0.0, u32::MAX as f64) as u32
    }

    pub fn estimate_one(&self, origin: &GeoPoint, destination: &GeoPoint) -> u32 {
        self.seconds_for(origin.distance_m(destination))
    }
}

impl EtaEstimator for StraightLineEstimator {
    fn estimate(
        &self,
        origins: &[GeoPoint],
        destination: GeoPoint,
    ) -> Result<Vec<OriginEstimate>, RoutingError> {
        Ok(origins
            .iter()
            .map(|o| OriginEstimate::Duration {
                seconds: self.estimate_one(o, &destination),
                source: EstimateSource::StraightLine,
            })
            .collect())
    }
}
