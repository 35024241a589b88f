//! Test fakes and fixtures shared across modules.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;
use tempfile::TempDir;

use crate::db::{insert_ambulance, insert_hospital, open_database};
use crate::guidance::{FirstAidGuidance, FirstAidGuide, GuidanceError, GuidanceSeverity};
use crate::models::{
    AmbulanceType, AmbulanceUnit, GeoPoint, Hospital, HospitalCapacity, NewAmbulance, NewEmergency,
};
use crate::routing::{EtaEstimator, OriginEstimate, RoutingError};

/// Estimator backed by a closure.
pub struct FnEstimator<F>(pub F)
where
    F: Fn(&[GeoPoint], GeoPoint) -> Result<Vec<OriginEstimate>, RoutingError> + Send + Sync;

impl<F> EtaEstimator for FnEstimator<F>
where
    F: Fn(&[GeoPoint], GeoPoint) -> Result<Vec<OriginEstimate>, RoutingError> + Send + Sync,
{
    fn estimate(
        &self,
        origins: &[GeoPoint],
        destination: GeoPoint,
    ) -> Result<Vec<OriginEstimate>, RoutingError> {
        (self.0)(origins, destination)
    }
}

/// Estimator that always fails, forcing straight-line estimates.
pub struct FailingEstimator;

impl EtaEstimator for FailingEstimator {
    fn estimate(&self, _: &[GeoPoint], _: GeoPoint) -> Result<Vec<OriginEstimate>, RoutingError> {
        Err(RoutingError::Connection("test".into()))
    }
}

/// Guide returning a canned response and recording descriptors.
pub struct MockGuide {
    response: Result<FirstAidGuidance, String>,
    pub seen: Mutex<Vec<String>>,
}

impl MockGuide {
    pub fn new(title: &str, steps: &[&str]) -> Self {
        Self {
            response: Ok(FirstAidGuidance {
                title: title.to_string(),
                steps: steps.iter().map(|s| s.to_string()).collect(),
                severity: GuidanceSeverity::High,
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            response: Err("ollama down".into()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl FirstAidGuide for MockGuide {
    fn guidance(&self, descriptor: &str) -> Result<FirstAidGuidance, GuidanceError> {
        if descriptor.trim().is_empty() {
            return Err(GuidanceError::EmptyDescriptor);
        }
        self.seen.lock().unwrap().push(descriptor.to_string());
        self.response
            .clone()
            .map_err(GuidanceError::Connection)
    }
}

/// File-backed database in a temp dir. Keep the `TempDir` alive.
pub fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dispatch.db");
    open_database(&path).unwrap();
    (dir, path)
}

pub const PATIENT: GeoPoint = GeoPoint {
    lat: 27.9478,
    lng: -82.4584,
};

pub fn add_unit(conn: &Connection, plate: &str, location: Option<GeoPoint>) -> AmbulanceUnit {
    let unit = AmbulanceUnit::from_new(
        NewAmbulance {
            plate_number: plate.into(),
            driver_name: Some(format!("Driver {plate}")),
            location,
            unit_type: Some(AmbulanceType::Advance),
            equipped_for: vec!["Trauma".into()],
            hospital_id: None,
        },
        Utc::now(),
    );
    insert_ambulance(conn, &unit).unwrap();
    unit
}

pub fn add_hospital(conn: &Connection, name: &str) -> Hospital {
    let h = Hospital {
        id: uuid::Uuid::new_v4(),
        name: name.into(),
        location: PATIENT.offset_m(-2_000.0, 1_000.0),
        address: Some("Tampa, FL".into()),
        capacity: HospitalCapacity::High,
        specialties: vec!["Trauma".into()],
        emergency_contact: Some("555-0100".into()),
        is_active: true,
    };
    insert_hospital(conn, &h).unwrap();
    h
}

pub fn intake(name: &str) -> NewEmergency {
    NewEmergency {
        patient_name: name.into(),
        patient_mobile: "813-555-0199".into(),
        patient_email: None,
        pickup: PATIENT,
        pickup_address: Some("401 Channelside Dr".into()),
        emergency_type: "Chest pain".into(),
        description: Some("Sudden pain, shortness of breath".into()),
        severity: None,
        destination_hospital_id: None,
    }
}
