use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_at, opt_uuid_at, ts_at, ts_to_sql, uuid_at};
use crate::db::DatabaseError;
use crate::models::{EmergencyRequest, EmergencyStatus, GeoPoint};

const EMERGENCY_COLUMNS: &str = "id, patient_name, patient_mobile, patient_email, pickup_lat, pickup_lng, \
     pickup_address, emergency_type, description, severity, status, ambulance_id, \
     destination_hospital_id, created_at, updated_at";

pub fn insert_emergency(conn: &Connection, e: &EmergencyRequest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO emergencies (id, patient_name, patient_mobile, patient_email, pickup_lat, pickup_lng,
            pickup_address, emergency_type, description, severity, status, ambulance_id,
            destination_hospital_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            e.id.to_string(),
            e.patient_name,
            e.patient_mobile,
            e.patient_email,
            e.pickup.lat,
            e.pickup.lng,
            e.pickup_address,
            e.emergency_type,
            e.description,
            e.severity.as_str(),
            e.status.as_str(),
            e.ambulance_id.map(|id| id.to_string()),
            e.destination_hospital_id.map(|id| id.to_string()),
            ts_to_sql(&e.created_at),
            ts_to_sql(&e.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_emergency(conn: &Connection, id: &Uuid) -> Result<Option<EmergencyRequest>, DatabaseError> {
    let sql = format!("SELECT {EMERGENCY_COLUMNS} FROM emergencies WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_emergency)
        .optional()
        .map_err(DatabaseError::from)
}

/// Newest first, optionally restricted to one status.
pub fn list_emergencies(
    conn: &Connection,
    status: Option<EmergencyStatus>,
) -> Result<Vec<EmergencyRequest>, DatabaseError> {
    let sql = format!(
        "SELECT {EMERGENCY_COLUMNS} FROM emergencies
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status.map(|s| s.as_str())], row_to_emergency)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Pending → Assigned, guarded on the current status. A request without a
/// destination inherits the unit's home hospital. Returns false when the
/// guard did not match.
pub fn mark_emergency_assigned(
    conn: &Connection,
    id: &Uuid,
    ambulance_id: &Uuid,
    home_hospital: Option<Uuid>,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE emergencies
         SET status = 'assigned', ambulance_id = ?2,
             destination_hospital_id = COALESCE(destination_hospital_id, ?3),
             updated_at = ?4
         WHERE id = ?1 AND status = 'pending'",
        params![
            id.to_string(),
            ambulance_id.to_string(),
            home_hospital.map(|h| h.to_string()),
            ts_to_sql(now),
        ],
    )?;
    Ok(affected == 1)
}

/// Conditional status change `from → to`. A `destination` overrides the
/// stored one. Returns false when the record is no longer in `from`.
pub fn transition_emergency_status(
    conn: &Connection,
    id: &Uuid,
    from: EmergencyStatus,
    to: EmergencyStatus,
    destination: Option<Uuid>,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE emergencies
         SET status = ?3,
             destination_hospital_id = COALESCE(?4, destination_hospital_id),
             updated_at = ?5
         WHERE id = ?1 AND status = ?2",
        params![
            id.to_string(),
            from.as_str(),
            to.as_str(),
            destination.map(|d| d.to_string()),
            ts_to_sql(now),
        ],
    )?;
    Ok(affected == 1)
}

/// `IN (...)` body matching the statuses that hold a unit.
fn holding_unit_sql() -> String {
    EmergencyStatus::HOLDING_UNIT
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The mission currently holding a unit, if any.
pub fn find_active_emergency_for_ambulance(
    conn: &Connection,
    ambulance_id: &Uuid,
) -> Result<Option<EmergencyRequest>, DatabaseError> {
    let sql = format!(
        "SELECT {EMERGENCY_COLUMNS} FROM emergencies
         WHERE ambulance_id = ?1 AND status IN ({})",
        holding_unit_sql()
    );
    conn.query_row(&sql, params![ambulance_id.to_string()], row_to_emergency)
        .optional()
        .map_err(DatabaseError::from)
}

/// Active missions headed to a hospital, oldest first.
pub fn list_incoming_for_hospital(
    conn: &Connection,
    hospital_id: &Uuid,
) -> Result<Vec<EmergencyRequest>, DatabaseError> {
    let sql = format!(
        "SELECT {EMERGENCY_COLUMNS} FROM emergencies
         WHERE destination_hospital_id = ?1 AND status IN ({})
         ORDER BY created_at ASC",
        holding_unit_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![hospital_id.to_string()], row_to_emergency)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_emergency(row: &rusqlite::Row) -> Result<EmergencyRequest, rusqlite::Error> {
    Ok(EmergencyRequest {
        id: uuid_at(row, 0)?,
        patient_name: row.get(1)?,
        patient_mobile: row.get(2)?,
        patient_email: row.get(3)?,
        pickup: GeoPoint::new(row.get(4)?, row.get(5)?),
        pickup_address: row.get(6)?,
        emergency_type: row.get(7)?,
        description: row.get(8)?,
        severity: enum_at(row, 9)?,
        status: enum_at(row, 10)?,
        ambulance_id: opt_uuid_at(row, 11)?,
        destination_hospital_id: opt_uuid_at(row, 12)?,
        created_at: ts_at(row, 13)?,
        updated_at: ts_at(row, 14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{claim_ambulance, insert_ambulance};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{AmbulanceUnit, NewAmbulance, NewEmergency, Severity};

    fn make_emergency(name: &str) -> EmergencyRequest {
        EmergencyRequest::new_pending(
            NewEmergency {
                patient_name: name.into(),
                patient_mobile: "813-555-0101".into(),
                patient_email: None,
                pickup: GeoPoint::new(27.95, -82.46),
                pickup_address: Some("100 Main St".into()),
                emergency_type: "Fall".into(),
                description: None,
                severity: Some(Severity::Medium),
                destination_hospital_id: None,
            },
            Utc::now(),
        )
    }

    fn make_unit(conn: &Connection, plate: &str) -> AmbulanceUnit {
        let unit = AmbulanceUnit::from_new(
            NewAmbulance {
                plate_number: plate.into(),
                driver_name: None,
                location: Some(GeoPoint::new(27.96, -82.47)),
                unit_type: None,
                equipped_for: vec![],
                hospital_id: None,
            },
            Utc::now(),
        );
        insert_ambulance(conn, &unit).unwrap();
        unit
    }

    #[test]
    fn insert_and_get_emergency() {
        let conn = open_memory_database().unwrap();
        let e = make_emergency("Ana");
        insert_emergency(&conn, &e).unwrap();

        let loaded = get_emergency(&conn, &e.id).unwrap().unwrap();
        assert_eq!(loaded.patient_name, "Ana");
        assert_eq!(loaded.status, EmergencyStatus::Pending);
        assert_eq!(loaded.severity, Severity::Medium);
        assert_eq!(loaded.pickup_address.as_deref(), Some("100 Main St"));
        assert_eq!(loaded.created_at, e.created_at);
    }

    #[test]
    fn mark_assigned_is_guarded_on_pending() {
        let conn = open_memory_database().unwrap();
        let e = make_emergency("Ana");
        insert_emergency(&conn, &e).unwrap();
        let unit = make_unit(&conn, "AMB-100");
        let now = Utc::now();

        assert!(mark_emergency_assigned(&conn, &e.id, &unit.id, None, &now).unwrap());
        assert!(!mark_emergency_assigned(&conn, &e.id, &unit.id, None, &now).unwrap());

        let loaded = get_emergency(&conn, &e.id).unwrap().unwrap();
        assert_eq!(loaded.status, EmergencyStatus::Assigned);
        assert_eq!(loaded.ambulance_id, Some(unit.id));
    }

    #[test]
    fn transition_requires_matching_from_state() {
        let conn = open_memory_database().unwrap();
        let e = make_emergency("Ana");
        insert_emergency(&conn, &e).unwrap();
        let now = Utc::now();

        assert!(!transition_emergency_status(
            &conn, &e.id, EmergencyStatus::Assigned, EmergencyStatus::EnRoute, None, &now
        ).unwrap());
        assert!(transition_emergency_status(
            &conn, &e.id, EmergencyStatus::Pending, EmergencyStatus::Cancelled, None, &now
        ).unwrap());
        assert_eq!(
            get_emergency(&conn, &e.id).unwrap().unwrap().status,
            EmergencyStatus::Cancelled
        );
    }

    #[test]
    fn one_active_mission_per_unit() {
        let conn = open_memory_database().unwrap();
        let first = make_emergency("Ana");
        let second = make_emergency("Ben");
        insert_emergency(&conn, &first).unwrap();
        insert_emergency(&conn, &second).unwrap();
        let unit = make_unit(&conn, "AMB-100");
        let now = Utc::now();

        assert!(mark_emergency_assigned(&conn, &first.id, &unit.id, None, &now).unwrap());
        // Bypassing the availability claim still cannot double-book the unit.
        let err = mark_emergency_assigned(&conn, &second.id, &unit.id, None, &now).unwrap_err();
        assert!(matches!(err, DatabaseError::Sqlite(_)));

        let active = find_active_emergency_for_ambulance(&conn, &unit.id).unwrap().unwrap();
        assert_eq!(active.id, first.id);
    }

    #[test]
    fn finished_mission_no_longer_holds_unit() {
        let conn = open_memory_database().unwrap();
        let e = make_emergency("Ana");
        insert_emergency(&conn, &e).unwrap();
        let unit = make_unit(&conn, "AMB-100");
        let now = Utc::now();

        mark_emergency_assigned(&conn, &e.id, &unit.id, None, &now).unwrap();
        for (from, to) in [
            (EmergencyStatus::Assigned, EmergencyStatus::EnRoute),
            (EmergencyStatus::EnRoute, EmergencyStatus::PickedUp),
        ] {
            assert!(transition_emergency_status(&conn, &e.id, from, to, None, &now).unwrap());
            assert!(find_active_emergency_for_ambulance(&conn, &unit.id).unwrap().is_some());
        }
        assert!(transition_emergency_status(
            &conn,
            &e.id,
            EmergencyStatus::PickedUp,
            EmergencyStatus::Delivered,
            None,
            &now
        )
        .unwrap());
        assert!(find_active_emergency_for_ambulance(&conn, &unit.id).unwrap().is_none());
    }

    #[test]
    fn list_filters_by_status_newest_first() {
        let conn = open_memory_database().unwrap();
        let mut older = make_emergency("Old");
        older.created_at -= chrono::Duration::minutes(5);
        let newer = make_emergency("New");
        insert_emergency(&conn, &older).unwrap();
        insert_emergency(&conn, &newer).unwrap();
        let unit = make_unit(&conn, "AMB-100");
        claim_ambulance(&conn, &unit.id, 0, &Utc::now()).unwrap();
        mark_emergency_assigned(&conn, &older.id, &unit.id, None, &Utc::now()).unwrap();

        let all = list_emergencies(&conn, None).unwrap();
        assert_eq!(all[0].patient_name, "New");
        let pending = list_emergencies(&conn, Some(EmergencyStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, newer.id);
    }

    #[test]
    fn incoming_lists_active_missions_for_hospital() {
        let conn = open_memory_database().unwrap();
        let hospital_id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO hospitals (id, name, lat, lng) VALUES (?1, 'General', 27.9, -82.4)",
            params![hospital_id.to_string()],
        )
        .unwrap();
        let e = make_emergency("Ana");
        insert_emergency(&conn, &e).unwrap();
        let unit = make_unit(&conn, "AMB-100");
        let now = Utc::now();

        assert!(list_incoming_for_hospital(&conn, &hospital_id).unwrap().is_empty());
        mark_emergency_assigned(&conn, &e.id, &unit.id, Some(hospital_id), &now).unwrap();
        let incoming = list_incoming_for_hospital(&conn, &hospital_id).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].destination_hospital_id, Some(hospital_id));
    }
}
