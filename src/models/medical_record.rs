use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RecordStatus;

/// Systolic/diastolic reading such as `120/80`.
static BLOOD_PRESSURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,3}/\d{2,3}$").expect("valid regex"));

/// Placeholder shown for vitals not yet taken on incoming records.
pub const PENDING_BLOOD_PRESSURE: &str = "--/--";

/// Patient-care record. Stored rows are Arrived records written at
/// handover; En Route rows are derived from active missions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub emergency_id: Uuid,
    pub patient_name: String,
    pub emergency_type: String,
    pub recorded_at: DateTime<Utc>,
    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(rename = "bp")]
    pub blood_pressure: String,
    pub pulse: u32,
    pub ambulance_id: Option<Uuid>,
    pub hospital_id: Option<Uuid>,
    pub status: RecordStatus,
}

/// Vitals captured by the crew at handover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(alias = "bp")]
    pub blood_pressure: String,
    pub pulse: u32,
}

impl Vitals {
    pub fn validate(&self) -> Result<(), String> {
        if !BLOOD_PRESSURE.is_match(self.blood_pressure.trim()) {
            return Err(format!(
                "Blood pressure must look like 120/80, got '{}'",
                self.blood_pressure
            ));
        }
        if !(1..=300).contains(&self.pulse) {
            return Err(format!("Pulse out of range: {}", self.pulse));
        }
        Ok(())
    }
}
