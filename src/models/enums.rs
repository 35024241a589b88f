use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// `as_str` is the storage form; the serde form is the variant name
/// unless overridden per variant.
macro_rules! str_enum {
    ($name:ident { $($(#[$meta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$meta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(EmergencyStatus {
    Pending => "pending",
    Assigned => "assigned",
    EnRoute => "en_route",
    PickedUp => "picked_up",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

str_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

str_enum!(AmbulanceType {
    Basic => "basic",
    Advance => "advance",
    #[serde(rename = "ICU")]
    Icu => "icu",
});

str_enum!(HospitalCapacity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Full => "full",
});

str_enum!(RecordStatus {
    #[serde(rename = "En Route")]
    EnRoute => "en_route",
    Arrived => "arrived",
});

impl EmergencyStatus {
    /// Statuses in which the mission holds its ambulance.
    pub const HOLDING_UNIT: [EmergencyStatus; 3] = [
        EmergencyStatus::Assigned,
        EmergencyStatus::EnRoute,
        EmergencyStatus::PickedUp,
    ];

    pub fn holds_unit(&self) -> bool {
        Self::HOLDING_UNIT.contains(self)
    }
}

impl Default for Severity {
    /// Intake without an explicit severity is treated as high priority.
    fn default() -> Self {
        Severity::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn emergency_status_round_trip() {
        for (variant, s) in [
            (EmergencyStatus::Pending, "pending"),
            (EmergencyStatus::Assigned, "assigned"),
            (EmergencyStatus::EnRoute, "en_route"),
            (EmergencyStatus::PickedUp, "picked_up"),
            (EmergencyStatus::Delivered, "delivered"),
            (EmergencyStatus::Cancelled, "cancelled"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(EmergencyStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&EmergencyStatus::EnRoute).unwrap(), "\"EnRoute\"");
        assert_eq!(serde_json::to_string(&AmbulanceType::Icu).unwrap(), "\"ICU\"");
        assert_eq!(serde_json::to_string(&RecordStatus::EnRoute).unwrap(), "\"En Route\"");
        let parsed: Severity = serde_json::from_str("\"Critical\"").unwrap();
        assert_eq!(parsed, Severity::Critical);
    }

    #[test]
    fn severity_defaults_to_high() {
        assert_eq!(Severity::default(), Severity::High);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(EmergencyStatus::from_str("EnRoute").is_err());
        assert!(AmbulanceType::from_str("ICU").is_err());
        assert!(HospitalCapacity::from_str("").is_err());
    }
}
