//! Hospital handover: the crew submits vitals, the mission is delivered
//! and an Arrived medical record is appended.

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use super::assignment::with_transient_retry;
use super::lifecycle::{transition, TransitionError};
use super::DispatchError;
use crate::db::{
    get_emergency, get_hospital, get_record_for_emergency, insert_medical_record,
    list_incoming_for_hospital, release_ambulance, transition_emergency_status, DatabaseError,
};
use crate::events::{DispatchEvent, EventHub};
use crate::models::{
    EmergencyRequest, EmergencyStatus, MedicalRecord, RecordStatus, Vitals, PENDING_BLOOD_PRESSURE,
};

/// Deliver a PickedUp mission and archive its vitals. A second handover
/// for the same emergency fails with `AlreadyHandedOver`.
pub fn complete_handover(
    conn: &mut Connection,
    hub: &EventHub,
    emergency_id: &Uuid,
    vitals: &Vitals,
    attempts: u32,
) -> Result<MedicalRecord, DispatchError> {
    vitals.validate().map_err(DispatchError::Validation)?;

    let (emergency, record) =
        with_transient_retry(attempts, || write_handover(conn, emergency_id, vitals))?;

    tracing::info!(
        emergency_id = %emergency_id,
        record_id = %record.id,
        hospital_id = ?record.hospital_id,
        "Handover complete"
    );
    hub.publish(DispatchEvent::EmergencyStatus {
        emergency_id: emergency.id,
        status: emergency.status,
        ambulance_id: emergency.ambulance_id,
        hospital_id: emergency.destination_hospital_id,
    });
    hub.publish(DispatchEvent::HandoverComplete {
        emergency_id: emergency.id,
        record: record.clone(),
    });
    Ok(record)
}

fn write_handover(
    conn: &mut Connection,
    emergency_id: &Uuid,
    vitals: &Vitals,
) -> Result<(EmergencyRequest, MedicalRecord), DispatchError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let now = Utc::now();

    let emergency = get_emergency(&tx, emergency_id)?
        .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;
    if get_record_for_emergency(&tx, emergency_id)?.is_some() {
        return Err(DispatchError::AlreadyHandedOver(*emergency_id));
    }
    transition(emergency.status, EmergencyStatus::Delivered)?;

    if !transition_emergency_status(
        &tx,
        emergency_id,
        emergency.status,
        EmergencyStatus::Delivered,
        None,
        &now,
    )? {
        return Err(TransitionError {
            from: emergency.status,
            to: EmergencyStatus::Delivered,
        }
        .into());
    }
    if let Some(unit_id) = emergency.ambulance_id {
        release_ambulance(&tx, &unit_id, &now)?;
    }

    let record = MedicalRecord {
        id: Uuid::new_v4(),
        emergency_id: emergency.id,
        patient_name: emergency.patient_name.clone(),
        emergency_type: emergency.emergency_type.clone(),
        recorded_at: now,
        arrival_time: Some(now),
        blood_pressure: vitals.blood_pressure.trim().to_string(),
        pulse: vitals.pulse,
        ambulance_id: emergency.ambulance_id,
        hospital_id: emergency.destination_hospital_id,
        status: RecordStatus::Arrived,
    };
    match insert_medical_record(&tx, &record) {
        Ok(()) => {}
        Err(DatabaseError::ConstraintViolation(_)) => {
            return Err(DispatchError::AlreadyHandedOver(*emergency_id));
        }
        Err(e) => return Err(e.into()),
    }

    let delivered = get_emergency(&tx, emergency_id)?
        .ok_or(DispatchError::EmergencyNotFound(*emergency_id))?;
    tx.commit()?;
    Ok((delivered, record))
}

/// En Route view for a hospital: one derived record per active mission
/// headed there. Vitals are placeholders until handover.
pub fn incoming_records(
    conn: &Connection,
    hospital_id: &Uuid,
) -> Result<Vec<MedicalRecord>, DispatchError> {
    if get_hospital(conn, hospital_id)?.is_none() {
        return Err(DispatchError::HospitalNotFound(*hospital_id));
    }
    let missions = list_incoming_for_hospital(conn, hospital_id)?;
    Ok(missions
        .into_iter()
        .map(|e| MedicalRecord {
            id: e.id,
            emergency_id: e.id,
            patient_name: e.patient_name,
            emergency_type: e.emergency_type,
            recorded_at: e.updated_at,
            arrival_time: None,
            blood_pressure: PENDING_BLOOD_PRESSURE.to_string(),
            pulse: 0,
            ambulance_id: e.ambulance_id,
            hospital_id: Some(*hospital_id),
            status: RecordStatus::EnRoute,
        })
        .collect())
}
