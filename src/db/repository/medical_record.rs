use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_at, map_constraint, opt_ts_at, opt_uuid_at, ts_at, ts_to_sql, uuid_at};
use crate::db::DatabaseError;
use crate::models::MedicalRecord;

const RECORD_COLUMNS: &str = "id, emergency_id, patient_name, emergency_type, recorded_at, arrival_time, \
     blood_pressure, pulse, ambulance_id, hospital_id, status";

/// Append a record. A second record for the same emergency is a
/// `ConstraintViolation`.
pub fn insert_medical_record(conn: &Connection, r: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (id, emergency_id, patient_name, emergency_type, recorded_at,
            arrival_time, blood_pressure, pulse, ambulance_id, hospital_id, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            r.id.to_string(),
            r.emergency_id.to_string(),
            r.patient_name,
            r.emergency_type,
            ts_to_sql(&r.recorded_at),
            r.arrival_time.as_ref().map(ts_to_sql),
            r.blood_pressure,
            r.pulse,
            r.ambulance_id.map(|id| id.to_string()),
            r.hospital_id.map(|id| id.to_string()),
            r.status.as_str(),
        ],
    )
    .map_err(|e| map_constraint(e, "medical record already exists for emergency"))?;
    Ok(())
}

pub fn get_record_for_emergency(
    conn: &Connection,
    emergency_id: &Uuid,
) -> Result<Option<MedicalRecord>, DatabaseError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM medical_records WHERE emergency_id = ?1");
    conn.query_row(&sql, params![emergency_id.to_string()], row_to_record)
        .optional()
        .map_err(DatabaseError::from)
}

/// Archived records, newest first. `patient` matches the name case-insensitively.
pub fn list_medical_records(
    conn: &Connection,
    patient: Option<&str>,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records
         WHERE (?1 IS NULL OR patient_name = ?1 COLLATE NOCASE)
         ORDER BY recorded_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient], row_to_record)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_record(row: &rusqlite::Row) -> Result<MedicalRecord, rusqlite::Error> {
    Ok(MedicalRecord {
        id: uuid_at(row, 0)?,
        emergency_id: uuid_at(row, 1)?,
        patient_name: row.get(2)?,
        emergency_type: row.get(3)?,
        recorded_at: ts_at(row, 4)?,
        arrival_time: opt_ts_at(row, 5)?,
        blood_pressure: row.get(6)?,
        pulse: row.get(7)?,
        ambulance_id: opt_uuid_at(row, 8)?,
        hospital_id: opt_uuid_at(row, 9)?,
        status: enum_at(row, 10)?,
    })
}
