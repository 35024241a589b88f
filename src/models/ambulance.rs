use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AmbulanceType;
use super::geo::GeoPoint;

/// An ambulance in the fleet.
///
/// `version` increases on every availability change. The assignment path
/// claims a unit only if the version it read is still current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbulanceUnit {
    pub id: Uuid,
    pub plate_number: String,
    pub driver_name: Option<String>,
    /// `None` until the crew reports a first position.
    pub location: Option<GeoPoint>,
    pub is_available: bool,
    #[serde(rename = "type")]
    pub unit_type: AmbulanceType,
    /// Capability tags, e.g. "Trauma", "Cardiac".
    pub equipped_for: Vec<String>,
    pub hospital_id: Option<Uuid>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAmbulance {
    pub plate_number: String,
    pub driver_name: Option<String>,
    pub location: Option<GeoPoint>,
    #[serde(rename = "type", default)]
    pub unit_type: Option<AmbulanceType>,
    #[serde(default)]
    pub equipped_for: Vec<String>,
    pub hospital_id: Option<Uuid>,
}

impl AmbulanceUnit {
    pub fn from_new(new: NewAmbulance, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate_number: new.plate_number.trim().to_string(),
            driver_name: new.driver_name,
            location: new.location,
            is_available: true,
            unit_type: new.unit_type.unwrap_or(AmbulanceType::Basic),
            equipped_for: new
                .equipped_for
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            hospital_id: new.hospital_id,
            version: 0,
            updated_at: now,
        }
    }

    /// Case-insensitive capability check.
    pub fn is_equipped_for(&self, capability: &str) -> bool {
        self.equipped_for
            .iter()
            .any(|t| t.eq_ignore_ascii_case(capability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_new_starts_available_at_version_zero() {
        let unit = AmbulanceUnit::from_new(
            NewAmbulance {
                plate_number: " AMB-101 ".into(),
                driver_name: None,
                location: None,
                unit_type: None,
                equipped_for: vec!["Trauma".into(), " ".into(), "Cardiac".into()],
                hospital_id: None,
            },
            Utc::now(),
        );
        assert!(unit.is_available);
        assert_eq!(unit.version, 0);
        assert_eq!(unit.plate_number, "AMB-101");
        assert_eq!(unit.unit_type, AmbulanceType::Basic);
        assert_eq!(unit.equipped_for, vec!["Trauma", "Cardiac"]);
        assert!(unit.is_equipped_for("cardiac"));
        assert!(!unit.is_equipped_for("Burn"));
    }
}
