//! Nearest-unit selection.
//!
//! Ranking is by estimated travel time. Equal times fall back to
//! straight-line distance, then unit id, so the outcome never depends on
//! the order the pool was read in.

use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{AmbulanceUnit, GeoPoint};
use crate::routing::{EstimateSource, EtaEstimator, OriginEstimate, StraightLineEstimator};

/// An available unit with a known position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub unit_id: Uuid,
    /// Version read with the pool; the claim is conditional on it.
    pub version: i64,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub unit_id: Uuid,
    pub version: i64,
    pub location: GeoPoint,
    pub duration_secs: u32,
    pub distance_m: f64,
    pub source: EstimateSource,
}

/// Units that can be ranked: available and with a location fix.
pub fn candidates_from_pool(pool: &[AmbulanceUnit]) -> Vec<Candidate> {
    pool.iter()
        .filter(|u| u.is_available)
        .filter_map(|u| {
            u.location.map(|location| Candidate {
                unit_id: u.id,
                version: u.version,
                location,
            })
        })
        .collect()
}

/// Attach a duration to each candidate. Origins the estimator could not
/// route, or all of them when it fails outright, get a straight-line
/// estimate instead.
pub fn estimate_candidates(
    candidates: &[Candidate],
    patient: GeoPoint,
    estimator: &dyn EtaEstimator,
    fallback: &StraightLineEstimator,
) -> Vec<RankedCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let origins: Vec<GeoPoint> = candidates.iter().map(|c| c.location).collect();
    let estimates = match estimator.estimate(&origins, patient) {
        Ok(estimates) if estimates.len() == candidates.len() => Some(estimates),
        Ok(estimates) => {
            tracing::warn!(
                expected = candidates.len(),
                got = estimates.len(),
                "Routing returned wrong number of estimates, using straight-line for all"
            );
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Routing failed, using straight-line for all candidates");
            None
        }
    };

    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let distance_m = c.location.distance_m(&patient);
            let straight = || (fallback.seconds_for(distance_m), EstimateSource::StraightLine);
            let (duration_secs, source) = match estimates.as_ref().map(|e| &e[i]) {
                Some(OriginEstimate::Duration { seconds, source }) => (*seconds, *source),
                Some(OriginEstimate::Failed { status }) => {
                    tracing::info!(unit_id = %c.unit_id, status = %status, "No route for unit, using straight-line");
                    straight()
                }
                None => straight(),
            };
            RankedCandidate {
                unit_id: c.unit_id,
                version: c.version,
                location: c.location,
                duration_secs,
                distance_m,
                source,
            }
        })
        .collect()
}

fn compare(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    a.duration_secs
        .cmp(&b.duration_secs)
        .then_with(|| a.distance_m.total_cmp(&b.distance_m))
        .then_with(|| a.unit_id.cmp(&b.unit_id))
}

/// Best first. Used by the assignment loop to fall through on conflict.
pub fn rank_candidates(mut candidates: Vec<RankedCandidate>) -> Vec<RankedCandidate> {
    candidates.sort_by(compare);
    candidates
}

/// Minimal-duration candidate, `None` for an empty set.
pub fn select_nearest(candidates: &[RankedCandidate]) -> Option<RankedCandidate> {
    candidates.iter().min_by(|a, b| compare(a, b)).copied()
}
