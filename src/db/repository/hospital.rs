use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_at, tags_at, tags_to_sql, uuid_at};
use crate::db::DatabaseError;
use crate::models::{GeoPoint, Hospital};

const HOSPITAL_COLUMNS: &str =
    "id, name, lat, lng, address, capacity, specialties, emergency_contact, is_active";

pub fn insert_hospital(conn: &Connection, h: &Hospital) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO hospitals (id, name, lat, lng, address, capacity, specialties, emergency_contact, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            h.id.to_string(),
            h.name,
            h.location.lat,
            h.location.lng,
            h.address,
            h.capacity.as_str(),
            tags_to_sql(&h.specialties),
            h.emergency_contact,
            h.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_hospital(conn: &Connection, id: &Uuid) -> Result<Option<Hospital>, DatabaseError> {
    let sql = format!("SELECT {HOSPITAL_COLUMNS} FROM hospitals WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_hospital)
        .optional()
        .map_err(DatabaseError::from)
}

/// Hospitals ordered by name. `active_only` hides deactivated facilities.
pub fn list_hospitals(conn: &Connection, active_only: bool) -> Result<Vec<Hospital>, DatabaseError> {
    let sql = format!(
        "SELECT {HOSPITAL_COLUMNS} FROM hospitals WHERE (?1 = 0 OR is_active = 1) ORDER BY name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![active_only as i32], row_to_hospital)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn count_hospitals(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM hospitals", [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_hospital(row: &rusqlite::Row) -> Result<Hospital, rusqlite::Error> {
    Ok(Hospital {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        location: GeoPoint::new(row.get(2)?, row.get(3)?),
        address: row.get(4)?,
        capacity: enum_at(row, 5)?,
        specialties: tags_at(row, 6)?,
        emergency_contact: row.get(7)?,
        is_active: row.get::<_, i32>(8)? != 0,
    })
}
