//! Endpoint handlers. Each module maps to one route group under `/api/`.

pub mod ambulance;
pub mod emergency;
pub mod guidance;
pub mod health;
pub mod hospital;
pub mod records;
