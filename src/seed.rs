//! Demo fleet and hospitals around a city centre.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{count_ambulances, count_hospitals, insert_ambulance, insert_hospital, DatabaseError};
use crate::models::{AmbulanceType, AmbulanceUnit, GeoPoint, Hospital, HospitalCapacity, NewAmbulance};

const HOSPITAL_RADIUS_M: f64 = 5_000.0;
const AMBULANCE_RADIUS_M: f64 = 8_000.0;
const AMBULANCE_COUNT: usize = 10;

const HOSPITALS: &[(&str, &[&str])] = &[
    ("Tampa General Hospital", &["Trauma", "Cardiac", "Burn"]),
    ("St. Joseph's Hospital", &["Pediatric", "General"]),
    ("Memorial Hospital of Tampa", &["Emergency", "Orthopedic"]),
    ("HCA Florida South Tampa", &["Surgical", "General"]),
    ("AdventHealth Tampa", &["Cardiac", "Neurology"]),
];

const UNIT_TYPES: [AmbulanceType; 3] = [AmbulanceType::Basic, AmbulanceType::Advance, AmbulanceType::Icu];
const CAPABILITIES: [&str; 4] = ["Trauma", "Cardiac", "Pediatric", "Burn"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub hospitals: usize,
    pub ambulances: usize,
}

/// Uniform random point inside a disc of `radius_m` around `center`.
fn random_point<R: Rng>(rng: &mut R, center: GeoPoint, radius_m: f64) -> GeoPoint {
    let r = radius_m * rng.gen::<f64>().sqrt();
    let theta = rng.gen_range(0.0..std::f64::consts::TAU);
    center.offset_m(r * theta.sin(), r * theta.cos())
}

/// Insert demo data into an empty database. A database that already has
/// hospitals or ambulances is left alone.
pub fn seed_demo_data<R: Rng>(
    conn: &mut Connection,
    center: GeoPoint,
    rng: &mut R,
) -> Result<SeedSummary, DatabaseError> {
    if count_hospitals(conn)? > 0 || count_ambulances(conn)? > 0 {
        tracing::debug!("Database already populated, skipping demo seed");
        return Ok(SeedSummary::default());
    }

    let tx = conn.transaction()?;
    let now = Utc::now();

    let mut hospital_ids = Vec::with_capacity(HOSPITALS.len());
    for (name, specialties) in HOSPITALS {
        let capacity = match rng.gen::<f64>() {
            x if x > 0.8 => HospitalCapacity::High,
            x if x > 0.4 => HospitalCapacity::Medium,
            _ => HospitalCapacity::Low,
        };
        let hospital = Hospital {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: random_point(rng, center, HOSPITAL_RADIUS_M),
            address: Some("Tampa, FL".into()),
            capacity,
            specialties: specialties.iter().map(|s| s.to_string()).collect(),
            emergency_contact: Some(format!("813-555-{}", rng.gen_range(1000..10000))),
            is_active: true,
        };
        insert_hospital(&tx, &hospital)?;
        hospital_ids.push(hospital.id);
    }

    for i in 0..AMBULANCE_COUNT {
        let extra = rng.gen_range(1..=2);
        let mut equipped_for = vec!["Basic".to_string()];
        equipped_for.extend(CAPABILITIES.choose_multiple(rng, extra).map(|s| s.to_string()));
        let unit = AmbulanceUnit::from_new(
            NewAmbulance {
                plate_number: format!("AMB-{}", 100 + i),
                driver_name: Some(format!("Driver {}", i + 1)),
                location: Some(random_point(rng, center, AMBULANCE_RADIUS_M)),
                unit_type: UNIT_TYPES.choose(rng).copied(),
                equipped_for,
                hospital_id: hospital_ids.choose(rng).copied(),
            },
            now,
        );
        insert_ambulance(&tx, &unit)?;
    }

    tx.commit()?;
    let summary = SeedSummary {
        hospitals: hospital_ids.len(),
        ambulances: AMBULANCE_COUNT,
    };
    tracing::info!(hospitals = summary.hospitals, ambulances = summary.ambulances, "Seeded demo data");
    Ok(summary)
}
