use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EmergencyStatus, Severity};
use super::geo::GeoPoint;

/// A patient SOS request and its mission state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRequest {
    pub id: Uuid,
    pub patient_name: String,
    pub patient_mobile: String,
    pub patient_email: Option<String>,
    pub pickup: GeoPoint,
    pub pickup_address: Option<String>,
    pub emergency_type: String,
    /// Free-text "what happened" from the patient.
    pub description: Option<String>,
    pub severity: Severity,
    pub status: EmergencyStatus,
    pub ambulance_id: Option<Uuid>,
    pub destination_hospital_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Intake payload, validated before a record is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmergency {
    pub patient_name: String,
    pub patient_mobile: String,
    pub patient_email: Option<String>,
    pub pickup: GeoPoint,
    pub pickup_address: Option<String>,
    pub emergency_type: String,
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub destination_hospital_id: Option<Uuid>,
}

impl NewEmergency {
    /// Returns the first validation failure, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.patient_name.trim().is_empty() {
            return Err("Patient name is required".into());
        }
        if self.patient_mobile.trim().is_empty() {
            return Err("Patient mobile number is required".into());
        }
        if self.emergency_type.trim().is_empty() {
            return Err("Emergency type is required".into());
        }
        if !self.pickup.is_valid() {
            return Err(format!(
                "Pickup coordinates out of range: {},{}",
                self.pickup.lat, self.pickup.lng
            ));
        }
        Ok(())
    }
}

impl EmergencyRequest {
    /// Build a fresh Pending record from an intake payload.
    pub fn new_pending(intake: NewEmergency, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_name: intake.patient_name.trim().to_string(),
            patient_mobile: intake.patient_mobile.trim().to_string(),
            patient_email: intake.patient_email.filter(|e| !e.trim().is_empty()),
            pickup: intake.pickup,
            pickup_address: intake.pickup_address,
            emergency_type: intake.emergency_type.trim().to_string(),
            description: intake.description.filter(|d| !d.trim().is_empty()),
            severity: intake.severity.unwrap_or_default(),
            status: EmergencyStatus::Pending,
            ambulance_id: None,
            destination_hospital_id: intake.destination_hospital_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake() -> NewEmergency {
        NewEmergency {
            patient_name: "  Maria Lopez ".into(),
            patient_mobile: "813-555-0100".into(),
            patient_email: Some("".into()),
            pickup: GeoPoint::new(27.95, -82.46),
            pickup_address: None,
            emergency_type: "Chest pain".into(),
            description: Some("Collapsed at home".into()),
            severity: None,
            destination_hospital_id: None,
        }
    }

    #[test]
    fn new_pending_applies_defaults() {
        let req = EmergencyRequest::new_pending(intake(), Utc::now());
        assert_eq!(req.status, EmergencyStatus::Pending);
        assert_eq!(req.severity, Severity::High);
        assert_eq!(req.patient_name, "Maria Lopez");
        assert!(req.patient_email.is_none());
        assert!(req.ambulance_id.is_none());
        assert_eq!(req.created_at, req.updated_at);
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let mut bad = intake();
        bad.patient_name = " ".into();
        assert!(bad.validate().is_err());

        let mut bad = intake();
        bad.patient_mobile = "  ".into();
        assert_eq!(bad.validate().unwrap_err(), "Patient mobile number is required");

        let mut bad = intake();
        bad.emergency_type = String::new();
        assert!(bad.validate().is_err());

        let mut bad = intake();
        bad.pickup = GeoPoint::new(120.0, 0.0);
        assert!(bad.validate().unwrap_err().contains("out of range"));

        assert!(intake().validate().is_ok());
    }
}
