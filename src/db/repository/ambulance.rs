use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_at, map_constraint, opt_uuid_at, tags_at, tags_to_sql, ts_at, ts_to_sql, uuid_at};
use crate::db::DatabaseError;
use crate::models::{AmbulanceUnit, GeoPoint};

const AMBULANCE_COLUMNS: &str = "id, plate_number, driver_name, lat, lng, is_available, unit_type, \
     equipped_for, hospital_id, version, updated_at";

/// Insert a unit. A duplicate plate number is a `ConstraintViolation`.
pub fn insert_ambulance(conn: &Connection, unit: &AmbulanceUnit) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO ambulances (id, plate_number, driver_name, lat, lng, is_available, unit_type, equipped_for, hospital_id, version, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            unit.id.to_string(),
            unit.plate_number,
            unit.driver_name,
            unit.location.map(|p| p.lat),
            unit.location.map(|p| p.lng),
            unit.is_available as i32,
            unit.unit_type.as_str(),
            tags_to_sql(&unit.equipped_for),
            unit.hospital_id.map(|id| id.to_string()),
            unit.version,
            ts_to_sql(&unit.updated_at),
        ],
    )
    .map_err(|e| map_constraint(e, "ambulance plate number already registered"))?;
    Ok(())
}

pub fn get_ambulance(conn: &Connection, id: &Uuid) -> Result<Option<AmbulanceUnit>, DatabaseError> {
    let sql = format!("SELECT {AMBULANCE_COLUMNS} FROM ambulances WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_ambulance)
        .optional()
        .map_err(DatabaseError::from)
}

/// Fleet listing ordered by plate number, optionally filtered by availability.
pub fn list_ambulances(
    conn: &Connection,
    available: Option<bool>,
) -> Result<Vec<AmbulanceUnit>, DatabaseError> {
    let sql = format!(
        "SELECT {AMBULANCE_COLUMNS} FROM ambulances
         WHERE (?1 IS NULL OR is_available = ?1)
         ORDER BY plate_number"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![available.map(|a| a as i32)], row_to_ambulance)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// The dispatch candidate pool.
pub fn list_available_ambulances(conn: &Connection) -> Result<Vec<AmbulanceUnit>, DatabaseError> {
    list_ambulances(conn, Some(true))
}

/// Record a position fix. Location is not an availability change, so the
/// version is left alone. Returns false for an unknown unit.
pub fn update_ambulance_location(
    conn: &Connection,
    id: &Uuid,
    location: GeoPoint,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE ambulances SET lat = ?2, lng = ?3, updated_at = ?4 WHERE id = ?1",
        params![id.to_string(), location.lat, location.lng, ts_to_sql(now)],
    )?;
    Ok(affected == 1)
}

/// Compare-and-swap claim: flips `is_available` to false only if the unit
/// is still available at `expected_version`. Returns whether it won.
pub fn claim_ambulance(
    conn: &Connection,
    id: &Uuid,
    expected_version: i64,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE ambulances
         SET is_available = 0, version = version + 1, updated_at = ?3
         WHERE id = ?1 AND is_available = 1 AND version = ?2",
        params![id.to_string(), expected_version, ts_to_sql(now)],
    )?;
    Ok(affected == 1)
}

/// Return a unit to the pool. Returns false if it was already available.
pub fn release_ambulance(
    conn: &Connection,
    id: &Uuid,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE ambulances
         SET is_available = 1, version = version + 1, updated_at = ?2
         WHERE id = ?1 AND is_available = 0",
        params![id.to_string(), ts_to_sql(now)],
    )?;
    Ok(affected == 1)
}

pub fn count_ambulances(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM ambulances", [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_ambulance(row: &rusqlite::Row) -> Result<AmbulanceUnit, rusqlite::Error> {
    let lat: Option<f64> = row.get(3)?;
    let lng: Option<f64> = row.get(4)?;

    Ok(AmbulanceUnit {
        id: uuid_at(row, 0)?,
        plate_number: row.get(1)?,
        driver_name: row.get(2)?,
        location: lat.zip(lng).map(|(lat, lng)| GeoPoint::new(lat, lng)),
        is_available: row.get::<_, i32>(5)? != 0,
        unit_type: enum_at(row, 6)?,
        equipped_for: tags_at(row, 7)?,
        hospital_id: opt_uuid_at(row, 8)?,
        version: row.get(9)?,
        updated_at: ts_at(row, 10)?,
    })
}
