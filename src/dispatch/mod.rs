//! Dispatch core: nearest-unit selection, the assignment transition and
//! the mission lifecycle that follows it.

pub mod assignment;
pub mod handover;
pub mod lifecycle;
pub mod selector;
pub mod service;

pub use assignment::*;
pub use handover::*;
pub use lifecycle::*;
pub use selector::*;
pub use service::*;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Emergency not found: {0}")]
    EmergencyNotFound(Uuid),

    #[error("Ambulance not found: {0}")]
    AmbulanceNotFound(Uuid),

    #[error("Hospital not found: {0}")]
    HospitalNotFound(Uuid),

    #[error("Ambulance {0} is not available")]
    UnitUnavailable(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Plate number already registered: {0}")]
    DuplicatePlate(String),

    #[error("Handover already recorded for emergency {0}")]
    AlreadyHandedOver(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for DispatchError {
    fn from(e: rusqlite::Error) -> Self {
        DispatchError::Database(DatabaseError::from(e))
    }
}
