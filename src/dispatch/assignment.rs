//! The Pending → Assigned transition and the status moves after it.
//!
//! Every write runs in an immediate-mode transaction so the read of the
//! current state and the guarded update cannot interleave with another
//! writer. The unit claim is a compare-and-swap on its version.

use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use super::lifecycle::{transition, TransitionError};
use super::DispatchError;
use crate::db::{
    claim_ambulance, get_ambulance, get_emergency, get_hospital, mark_emergency_assigned,
    release_ambulance, transition_emergency_status,
};
use crate::models::{AmbulanceUnit, EmergencyRequest, EmergencyStatus};

/// Linear backoff step between transient-failure retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Result of a successful claim: both records as committed.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub emergency: EmergencyRequest,
    pub unit: AmbulanceUnit,
}

/// Assign `ambulance_id` to a Pending emergency, provided the unit is
/// still available at `expected_version`.
///
/// Fails with `InvalidTransition` when the emergency is not Pending and
/// `UnitUnavailable` when the claim loses. Nothing is written on failure.
pub fn assign(
    conn: &mut Connection,
    emergency_id: &Uuid,
    ambulance_id: &Uuid,
    expected_version: i64,
) -> Result<Assignment, DispatchError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let now = Utc::now();

    let emergency = get_emergency(&tx, emergency_id)?
        .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;
    transition(emergency.status, EmergencyStatus::Assigned)?;

    if !claim_ambulance(&tx, ambulance_id, expected_version, &now)? {
        return Err(match get_ambulance(&tx, ambulance_id)? {
            None => DispatchError::AmbulanceNotFound(*ambulance_id),
            Some(_) => DispatchError::UnitUnavailable(*ambulance_id),
        });
    }
    let unit = get_ambulance(&tx, ambulance_id)?
        .ok_or(DispatchError::AmbulanceNotFound(*ambulance_id))?;

    if !mark_emergency_assigned(&tx, emergency_id, ambulance_id, unit.hospital_id, &now)? {
        return Err(TransitionError {
            from: emergency.status,
            to: EmergencyStatus::Assigned,
        }
        .into());
    }
    let emergency = get_emergency(&tx, emergency_id)?
        .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;

    tx.commit()?;
    tracing::info!(
        emergency_id = %emergency_id,
        ambulance_id = %ambulance_id,
        version = unit.version,
        "Ambulance assigned"
    );
    Ok(Assignment { emergency, unit })
}

/// Manual assignment: claim against whatever version is current.
pub fn assign_unit(
    conn: &mut Connection,
    emergency_id: &Uuid,
    ambulance_id: &Uuid,
) -> Result<Assignment, DispatchError> {
    let unit = get_ambulance(conn, ambulance_id)?
        .ok_or(DispatchError::AmbulanceNotFound(*ambulance_id))?;
    if !unit.is_available {
        return Err(DispatchError::UnitUnavailable(*ambulance_id));
    }
    assign(conn, emergency_id, ambulance_id, unit.version)
}

/// Move a mission along the lifecycle. Reaching Cancelled returns the unit
/// to the pool. Assignment goes through `assign` and delivery through
/// `complete_handover`, which writes the medical record.
pub fn advance_status(
    conn: &mut Connection,
    emergency_id: &Uuid,
    to: EmergencyStatus,
    destination: Option<Uuid>,
) -> Result<EmergencyRequest, DispatchError> {
    if to == EmergencyStatus::Assigned {
        return Err(DispatchError::Validation(
            "assignment must go through dispatch or a named unit".into(),
        ));
    }
    if to == EmergencyStatus::Delivered {
        return Err(DispatchError::Validation(
            "delivery goes through handover".into(),
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let now = Utc::now();

    let emergency = get_emergency(&tx, emergency_id)?
        .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;
    transition(emergency.status, to)?;

    if let Some(hospital_id) = destination {
        if get_hospital(&tx, &hospital_id)?.is_none() {
            return Err(DispatchError::HospitalNotFound(hospital_id));
        }
    }

    if !transition_emergency_status(&tx, emergency_id, emergency.status, to, destination, &now)? {
        return Err(TransitionError { from: emergency.status, to }.into());
    }
    if to.is_terminal() {
        if let Some(unit_id) = emergency.ambulance_id {
            if release_ambulance(&tx, &unit_id, &now)? {
                tracing::info!(ambulance_id = %unit_id, "Ambulance released");
            }
        }
    }

    let updated = get_emergency(&tx, emergency_id)?
        .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;
    tx.commit()?;

    tracing::info!(
        emergency_id = %emergency_id,
        from = %emergency.status,
        to = %to,
        "Emergency status changed"
    );
    Ok(updated)
}

pub fn cancel(conn: &mut Connection, emergency_id: &Uuid) -> Result<EmergencyRequest, DispatchError> {
    advance_status(conn, emergency_id, EmergencyStatus::Cancelled, None)
}

/// Re-run `op` while it fails with a busy or locked database, up to
/// `attempts` tries in total. Guards are re-evaluated on every attempt.
pub fn with_transient_retry<T, F>(attempts: u32, mut op: F) -> Result<T, DispatchError>
where
    F: FnMut() -> Result<T, DispatchError>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(DispatchError::Database(e)) if e.is_transient() && attempt < attempts => {
                tracing::warn!(attempt, error = %e, "Transient database error, retrying");
                std::thread::sleep(RETRY_BACKOFF * attempt);
                attempt += 1;
            }
            other => return other,
        }
    }
}
