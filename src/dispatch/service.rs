//! Request-scoped dispatch operations that publish events.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::assignment::{advance_status, assign, assign_unit, with_transient_retry, Assignment};
use super::lifecycle::transition;
use super::selector::{candidates_from_pool, estimate_candidates, rank_candidates, Candidate, RankedCandidate};
use super::DispatchError;
use crate::db::{
    find_active_emergency_for_ambulance, get_ambulance, get_emergency, get_hospital,
    insert_ambulance, insert_emergency, list_available_ambulances, update_ambulance_location,
    DatabaseError,
};
use crate::events::{DispatchEvent, EventHub};
use crate::models::{
    AmbulanceUnit, EmergencyRequest, EmergencyStatus, GeoPoint, NewAmbulance, NewEmergency,
};
use crate::routing::{EstimateSource, EtaEstimator, StraightLineEstimator};

/// The unit attached to a request, with the estimate that chose it.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedUnit {
    pub ambulance_id: Uuid,
    pub plate_number: String,
    pub eta_secs: Option<u32>,
    pub distance_m: Option<f64>,
    pub source: Option<EstimateSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub emergency: EmergencyRequest,
    /// `None` when no unit could be assigned; the request stays Pending.
    pub assignment: Option<AssignedUnit>,
}

/// Borrows one connection plus the shared collaborators for the length
/// of a request.
pub struct Dispatcher<'a> {
    conn: &'a mut Connection,
    estimator: &'a dyn EtaEstimator,
    fallback: &'a StraightLineEstimator,
    hub: &'a EventHub,
    retry_attempts: u32,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        conn: &'a mut Connection,
        estimator: &'a dyn EtaEstimator,
        fallback: &'a StraightLineEstimator,
        hub: &'a EventHub,
        retry_attempts: u32,
    ) -> Self {
        Self {
            conn,
            estimator,
            fallback,
            hub,
            retry_attempts,
        }
    }

    /// Create a Pending request, announce it, then try to assign a unit.
    pub fn intake(&mut self, request: NewEmergency) -> Result<DispatchOutcome, DispatchError> {
        request.validate().map_err(DispatchError::Validation)?;
        if let Some(hospital_id) = request.destination_hospital_id {
            if get_hospital(self.conn, &hospital_id)?.is_none() {
                return Err(DispatchError::HospitalNotFound(hospital_id));
            }
        }

        let emergency = EmergencyRequest::new_pending(request, Utc::now());
        insert_emergency(self.conn, &emergency)?;
        tracing::info!(
            emergency_id = %emergency.id,
            severity = %emergency.severity,
            emergency_type = %emergency.emergency_type,
            "Emergency received"
        );
        self.hub.publish(DispatchEvent::NewEmergency {
            emergency: emergency.clone(),
        });

        self.dispatch_pending(&emergency.id)
    }

    /// Rank the available pool for a Pending request and claim the best
    /// unit. A lost claim moves on to the next-best candidate; when the
    /// ranking runs out the request stays Pending.
    pub fn dispatch_pending(&mut self, emergency_id: &Uuid) -> Result<DispatchOutcome, DispatchError> {
        let emergency = get_emergency(self.conn, emergency_id)?
            .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;
        transition(emergency.status, EmergencyStatus::Assigned)?;

        let pool = list_available_ambulances(self.conn)?;
        let candidates = candidates_from_pool(&pool);
        if candidates.is_empty() {
            tracing::info!(emergency_id = %emergency_id, "No ambulance available, request stays pending");
            return Ok(DispatchOutcome {
                emergency,
                assignment: None,
            });
        }

        let ranked = rank_candidates(estimate_candidates(
            &candidates,
            emergency.pickup,
            self.estimator,
            self.fallback,
        ));

        for candidate in &ranked {
            let attempts = self.retry_attempts;
            let result = with_transient_retry(attempts, || {
                assign(self.conn, emergency_id, &candidate.unit_id, candidate.version)
            });
            match result {
                Ok(assignment) => return Ok(self.announce(assignment, Some(candidate))),
                Err(DispatchError::UnitUnavailable(unit_id))
                | Err(DispatchError::AmbulanceNotFound(unit_id)) => {
                    tracing::warn!(
                        emergency_id = %emergency_id,
                        ambulance_id = %unit_id,
                        "Lost claim on ambulance, trying next candidate"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(
            emergency_id = %emergency_id,
            candidates = ranked.len(),
            "Every candidate was claimed elsewhere, request stays pending"
        );
        let emergency = get_emergency(self.conn, emergency_id)?
            .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;
        Ok(DispatchOutcome {
            emergency,
            assignment: None,
        })
    }

    /// Dispatcher override: assign a named unit regardless of ranking.
    pub fn assign_manually(
        &mut self,
        emergency_id: &Uuid,
        ambulance_id: &Uuid,
    ) -> Result<DispatchOutcome, DispatchError> {
        let attempts = self.retry_attempts;
        let assignment =
            with_transient_retry(attempts, || assign_unit(self.conn, emergency_id, ambulance_id))?;

        let estimate = assignment.unit.location.and_then(|location| {
            let candidate = Candidate {
                unit_id: assignment.unit.id,
                version: assignment.unit.version,
                location,
            };
            estimate_candidates(
                &[candidate],
                assignment.emergency.pickup,
                self.estimator,
                self.fallback,
            )
            .into_iter()
            .next()
        });
        Ok(self.announce(assignment, estimate.as_ref()))
    }

    fn announce(&self, assignment: Assignment, estimate: Option<&RankedCandidate>) -> DispatchOutcome {
        let Assignment { emergency, unit } = assignment;
        let assigned = AssignedUnit {
            ambulance_id: unit.id,
            plate_number: unit.plate_number.clone(),
            eta_secs: estimate.map(|c| c.duration_secs),
            distance_m: estimate.map(|c| c.distance_m),
            source: estimate.map(|c| c.source),
        };

        self.hub.publish(DispatchEvent::AmbulanceAssigned {
            emergency_id: emergency.id,
            ambulance_id: unit.id,
            plate_number: unit.plate_number,
            pickup: emergency.pickup,
            eta_secs: assigned.eta_secs,
            source: assigned.source,
            hospital_id: emergency.destination_hospital_id,
        });

        DispatchOutcome {
            emergency,
            assignment: Some(assigned),
        }
    }

    /// Lifecycle move with event. See `advance_status`.
    pub fn advance(
        &mut self,
        emergency_id: &Uuid,
        to: EmergencyStatus,
        destination: Option<Uuid>,
    ) -> Result<EmergencyRequest, DispatchError> {
        let attempts = self.retry_attempts;
        let updated = with_transient_retry(attempts, || {
            advance_status(self.conn, emergency_id, to, destination)
        })?;
        self.publish_status(&updated);
        Ok(updated)
    }

    pub fn cancel(&mut self, emergency_id: &Uuid) -> Result<EmergencyRequest, DispatchError> {
        self.advance(emergency_id, EmergencyStatus::Cancelled, None)
    }

    pub(crate) fn publish_status(&self, emergency: &EmergencyRequest) {
        self.hub.publish(DispatchEvent::EmergencyStatus {
            emergency_id: emergency.id,
            status: emergency.status,
            ambulance_id: emergency.ambulance_id,
            hospital_id: emergency.destination_hospital_id,
        });
    }

    /// Store a crew position fix and broadcast it.
    pub fn record_location(
        &mut self,
        ambulance_id: &Uuid,
        location: GeoPoint,
    ) -> Result<AmbulanceUnit, DispatchError> {
        if !location.is_valid() {
            return Err(DispatchError::Validation(format!(
                "Coordinates out of range: {},{}",
                location.lat, location.lng
            )));
        }
        if !update_ambulance_location(self.conn, ambulance_id, location, &Utc::now())? {
            return Err(DispatchError::AmbulanceNotFound(*ambulance_id));
        }
        let unit = get_ambulance(self.conn, ambulance_id)?
            .ok_or(DispatchError::AmbulanceNotFound(*ambulance_id))?;
        let mission = find_active_emergency_for_ambulance(self.conn, ambulance_id)?;

        tracing::debug!(ambulance_id = %ambulance_id, lat = location.lat, lng = location.lng, "Location updated");
        self.hub.publish(DispatchEvent::AmbulanceLocationUpdate {
            ambulance_id: *ambulance_id,
            lat: location.lat,
            lng: location.lng,
            emergency_id: mission.map(|m| m.id),
        });
        Ok(unit)
    }

    /// Add a unit to the fleet. It joins the pool immediately.
    pub fn register_ambulance(&mut self, new: NewAmbulance) -> Result<AmbulanceUnit, DispatchError> {
        if new.plate_number.trim().is_empty() {
            return Err(DispatchError::Validation("Plate number is required".into()));
        }
        if let Some(location) = new.location {
            if !location.is_valid() {
                return Err(DispatchError::Validation("Unit coordinates out of range".into()));
            }
        }
        if let Some(hospital_id) = new.hospital_id {
            if get_hospital(self.conn, &hospital_id)?.is_none() {
                return Err(DispatchError::HospitalNotFound(hospital_id));
            }
        }

        let unit = AmbulanceUnit::from_new(new, Utc::now());
        match insert_ambulance(self.conn, &unit) {
            Ok(()) => {}
            Err(DatabaseError::ConstraintViolation(_)) => {
                return Err(DispatchError::DuplicatePlate(unit.plate_number));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(ambulance_id = %unit.id, plate = %unit.plate_number, "Ambulance registered");
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::db::{claim_ambulance, open_database, open_memory_database};
    use crate::events::Topic;
    use crate::routing::{OriginEstimate, RoutingError};
    use crate::testing::{add_hospital, add_unit, intake, temp_db, FailingEstimator, FnEstimator, PATIENT};

    fn speed() -> StraightLineEstimator {
        StraightLineEstimator::from_kmh(40.0)
    }

    #[test]
    fn intake_with_empty_pool_stays_pending() {
        let mut conn = open_memory_database().unwrap();
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);

        let outcome = d.intake(intake("Ana")).unwrap();
        assert_eq!(outcome.emergency.status, EmergencyStatus::Pending);
        assert!(outcome.assignment.is_none());
    }

    #[test]
    fn intake_assigns_fastest_unit() {
        let mut conn = open_memory_database().unwrap();
        let a = add_unit(&conn, "AMB-A", Some(PATIENT.offset_m(1_000.0, 0.0)));
        let b = add_unit(&conn, "AMB-B", Some(PATIENT.offset_m(3_000.0, 0.0)));
        let c = add_unit(&conn, "AMB-C", Some(PATIENT.offset_m(2_000.0, 0.0)));
        let durations = [(a.id, 480), (b.id, 320), (c.id, 900)];
        let pool_order: Vec<Uuid> = crate::db::list_available_ambulances(&conn)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        let est = FnEstimator(move |origins: &[GeoPoint], _: GeoPoint| {
            assert_eq!(origins.len(), 3);
            Ok(pool_order
                .iter()
                .map(|id| {
                    let secs = durations.iter().find(|(u, _)| u == id).map(|(_, s)| *s).unwrap();
                    OriginEstimate::Duration { seconds: secs, source: EstimateSource::Routing }
                })
                .collect())
        });
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &est, &fallback, &hub, 3);

        let outcome = d.intake(intake("Ana")).unwrap();
        let assigned = outcome.assignment.unwrap();
        assert_eq!(assigned.ambulance_id, b.id);
        assert_eq!(assigned.eta_secs, Some(320));
        assert_eq!(outcome.emergency.status, EmergencyStatus::Assigned);
    }

    #[test]
    fn routing_outage_still_assigns_by_straight_line() {
        let mut conn = open_memory_database().unwrap();
        let _far = add_unit(&conn, "AMB-FAR", Some(PATIENT.offset_m(6_000.0, 0.0)));
        let near = add_unit(&conn, "AMB-NEAR", Some(PATIENT.offset_m(800.0, 0.0)));
        let _unlocated = add_unit(&conn, "AMB-NOFIX", None);
        let hub = EventHub::new(16);
        let fallback = speed();
        let est = FnEstimator(|_: &[GeoPoint], _: GeoPoint| Err(RoutingError::Timeout(5)));
        let mut d = Dispatcher::new(&mut conn, &est, &fallback, &hub, 3);

        let assigned = d.intake(intake("Ana")).unwrap().assignment.unwrap();
        assert_eq!(assigned.ambulance_id, near.id);
        assert_eq!(assigned.source, Some(EstimateSource::StraightLine));
    }

    #[test]
    fn second_request_gets_next_unit() {
        let mut conn = open_memory_database().unwrap();
        let near = add_unit(&conn, "AMB-1", Some(PATIENT.offset_m(500.0, 0.0)));
        let next = add_unit(&conn, "AMB-2", Some(PATIENT.offset_m(1_500.0, 0.0)));
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);

        let first = d.intake(intake("Ana")).unwrap().assignment.unwrap();
        let second = d.intake(intake("Ben")).unwrap().assignment.unwrap();
        assert_eq!(first.ambulance_id, near.id);
        assert_eq!(second.ambulance_id, next.id);
        let third = d.intake(intake("Cy")).unwrap();
        assert!(third.assignment.is_none());
    }

    #[test]
    fn lost_claim_falls_through_to_next_candidate() {
        let (_dir, path) = temp_db();
        let mut conn = open_database(&path).unwrap();
        let best = add_unit(&conn, "AMB-1", Some(PATIENT.offset_m(500.0, 0.0)));
        let runner_up = add_unit(&conn, "AMB-2", Some(PATIENT.offset_m(1_500.0, 0.0)));

        // A rival dispatcher claims the best unit between our pool read
        // and our claim.
        let rival = Mutex::new(open_database(&path).unwrap());
        let contested = best.id;
        let est = FnEstimator(move |_: &[GeoPoint], _: GeoPoint| {
            let rival = rival.lock().unwrap();
            assert!(claim_ambulance(&rival, &contested, 0, &Utc::now()).unwrap());
            Err(RoutingError::Timeout(1))
        });
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &est, &fallback, &hub, 3);

        let outcome = d.intake(intake("Ana")).unwrap();
        assert_eq!(outcome.assignment.unwrap().ambulance_id, runner_up.id);
        assert_eq!(outcome.emergency.status, EmergencyStatus::Assigned);
    }

    #[test]
    fn dispatch_pending_rejects_non_pending() {
        let mut conn = open_memory_database().unwrap();
        add_unit(&conn, "AMB-1", Some(PATIENT.offset_m(500.0, 0.0)));
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);

        let outcome = d.intake(intake("Ana")).unwrap();
        let err = d.dispatch_pending(&outcome.emergency.id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition(_)));
    }

    #[test]
    fn manual_assignment_of_unlocated_unit_has_no_eta() {
        let mut conn = open_memory_database().unwrap();
        let unit = add_unit(&conn, "AMB-1", None);
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);

        let pending = d.intake(intake("Ana")).unwrap();
        assert!(pending.assignment.is_none());
        let outcome = d.assign_manually(&pending.emergency.id, &unit.id).unwrap();
        let assigned = outcome.assignment.unwrap();
        assert_eq!(assigned.ambulance_id, unit.id);
        assert!(assigned.eta_secs.is_none());

        let err = d.assign_manually(&pending.emergency.id, &unit.id).unwrap_err();
        assert!(matches!(err, DispatchError::UnitUnavailable(_)));
    }

    #[tokio::test]
    async fn assignment_is_announced_to_crew_and_center() {
        let mut conn = open_memory_database().unwrap();
        let unit = add_unit(&conn, "AMB-1", Some(PATIENT.offset_m(500.0, 0.0)));
        let hub = EventHub::new(16);
        let mut crew = hub.subscribe();
        crew.join(Topic::Ambulance(unit.id));
        let mut center = hub.subscribe();
        center.join(Topic::DispatchCenter);

        let fallback = speed();
        let outcome = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3)
            .intake(intake("Ana"))
            .unwrap();

        let first = center.recv().await.unwrap();
        assert_eq!(first.name(), "new_emergency");
        let second = center.recv().await.unwrap();
        assert_eq!(second.name(), "ambulance_assigned");

        let crew_event = tokio::time::timeout(Duration::from_secs(1), crew.recv())
            .await
            .unwrap()
            .unwrap();
        match crew_event.as_ref() {
            DispatchEvent::AmbulanceAssigned { emergency_id, ambulance_id, .. } => {
                assert_eq!(*emergency_id, outcome.emergency.id);
                assert_eq!(*ambulance_id, unit.id);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn location_update_tags_active_mission() {
        let mut conn = open_memory_database().unwrap();
        let unit = add_unit(&conn, "AMB-1", Some(PATIENT.offset_m(500.0, 0.0)));
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);
        let outcome = d.intake(intake("Ana")).unwrap();

        let mut patient = hub.subscribe();
        patient.join(Topic::Emergency(outcome.emergency.id));
        let moved = PATIENT.offset_m(250.0, 0.0);
        let updated = d.record_location(&unit.id, moved).unwrap();
        assert_eq!(updated.location, Some(moved));

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let event = rt.block_on(patient.recv()).unwrap();
        assert_eq!(event.name(), "ambulance_location_update");
    }

    #[test]
    fn location_update_validates_input() {
        let mut conn = open_memory_database().unwrap();
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);
        assert!(matches!(
            d.record_location(&Uuid::new_v4(), PATIENT),
            Err(DispatchError::AmbulanceNotFound(_))
        ));
        assert!(matches!(
            d.record_location(&Uuid::new_v4(), GeoPoint::new(95.0, 0.0)),
            Err(DispatchError::Validation(_))
        ));
    }

    #[test]
    fn register_rejects_duplicates_and_unknown_hospital() {
        let mut conn = open_memory_database().unwrap();
        let h = add_hospital(&conn, "General");
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);
        let new = |plate: &str, hospital_id| NewAmbulance {
            plate_number: plate.into(),
            driver_name: None,
            location: Some(PATIENT),
            unit_type: None,
            equipped_for: vec!["Cardiac".into()],
            hospital_id,
        };

        let unit = d.register_ambulance(new("AMB-900", Some(h.id))).unwrap();
        assert!(unit.is_available);
        assert!(matches!(
            d.register_ambulance(new("AMB-900", None)),
            Err(DispatchError::DuplicatePlate(p)) if p == "AMB-900"
        ));
        assert!(matches!(
            d.register_ambulance(new("AMB-901", Some(Uuid::new_v4()))),
            Err(DispatchError::HospitalNotFound(_))
        ));
        assert!(matches!(d.register_ambulance(new(" ", None)), Err(DispatchError::Validation(_))));
    }

    #[test]
    fn assignment_inherits_unit_home_hospital() {
        let mut conn = open_memory_database().unwrap();
        let h = add_hospital(&conn, "General");
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);
        d.register_ambulance(NewAmbulance {
            plate_number: "AMB-1".into(),
            driver_name: None,
            location: Some(PATIENT.offset_m(300.0, 0.0)),
            unit_type: None,
            equipped_for: vec![],
            hospital_id: Some(h.id),
        })
        .unwrap();

        let outcome = d.intake(intake("Ana")).unwrap();
        assert_eq!(outcome.emergency.destination_hospital_id, Some(h.id));
    }

    #[test]
    fn cancel_publishes_status_and_frees_unit() {
        let mut conn = open_memory_database().unwrap();
        let unit = add_unit(&conn, "AMB-1", Some(PATIENT.offset_m(300.0, 0.0)));
        let hub = EventHub::new(16);
        let fallback = speed();
        let mut d = Dispatcher::new(&mut conn, &FailingEstimator, &fallback, &hub, 3);
        let outcome = d.intake(intake("Ana")).unwrap();

        let cancelled = d.cancel(&outcome.emergency.id).unwrap();
        assert_eq!(cancelled.status, EmergencyStatus::Cancelled);
        drop(d);
        assert!(get_ambulance(&conn, &unit.id).unwrap().unwrap().is_available);
    }
}
