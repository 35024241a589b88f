pub mod ambulance;
pub mod emergency;
pub mod enums;
pub mod geo;
pub mod hospital;
pub mod medical_record;

pub use ambulance::*;
pub use emergency::*;
pub use enums::*;
pub use geo::*;
pub use hospital::*;
pub use medical_record::*;
