use thiserror::Error;

use crate::models::EmergencyStatus;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Cannot move emergency from {from} to {to}")]
pub struct TransitionError {
    pub from: EmergencyStatus,
    pub to: EmergencyStatus,
}

impl EmergencyStatus {
    pub fn allowed_transitions(&self) -> &'static [EmergencyStatus] {
        use EmergencyStatus::*;
        match self {
            Pending => &[Assigned, Cancelled],
            Assigned => &[EnRoute, Cancelled],
            EnRoute => &[PickedUp],
            PickedUp => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, to: EmergencyStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Validate `from → to` against the transition table.
pub fn transition(from: EmergencyStatus, to: EmergencyStatus) -> Result<EmergencyStatus, TransitionError> {
    if from.can_transition_to(to) {
        Ok(to)
    } else {
        Err(TransitionError { from, to })
    }
}
