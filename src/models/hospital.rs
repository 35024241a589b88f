use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::HospitalCapacity;
use super::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub capacity: HospitalCapacity,
    pub specialties: Vec<String>,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
}

impl Hospital {
    /// A facility can take new patients unless it is inactive or full.
    pub fn accepts_patients(&self) -> bool {
        self.is_active && self.capacity != HospitalCapacity::Full
    }
}
