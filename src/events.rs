//! In-process notification fan-out.
//!
//! Every state change publishes one `DispatchEvent` on a broadcast channel.
//! Each event names the rooms it targets; a `Subscription` only yields
//! events whose rooms intersect the ones it joined. Delivery is
//! best-effort: a receiver that falls behind loses the oldest events.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{EmergencyRequest, EmergencyStatus, GeoPoint, MedicalRecord};
use crate::routing::EstimateSource;

const DISPATCH_CENTER_ROOM: &str = "dispatch_center";

/// A routing key for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    DispatchCenter,
    Ambulance(Uuid),
    Hospital(Uuid),
    Emergency(Uuid),
}

impl Topic {
    /// Parse a room name: `dispatch_center`, `ambulance:<id>`,
    /// `hospital:<id>` or `emergency:<id>`.
    pub fn parse(room: &str) -> Option<Topic> {
        let room = room.trim();
        if room == DISPATCH_CENTER_ROOM {
            return Some(Topic::DispatchCenter);
        }
        let (kind, id) = room.split_once(':')?;
        let id = Uuid::parse_str(id.trim()).ok()?;
        match kind {
            "ambulance" => Some(Topic::Ambulance(id)),
            "hospital" => Some(Topic::Hospital(id)),
            "emergency" => Some(Topic::Emergency(id)),
            _ => None,
        }
    }

    pub fn as_room(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::DispatchCenter => f.write_str(DISPATCH_CENTER_ROOM),
            Topic::Ambulance(id) => write!(f, "ambulance:{id}"),
            Topic::Hospital(id) => write!(f, "hospital:{id}"),
            Topic::Emergency(id) => write!(f, "emergency:{id}"),
        }
    }
}

/// State-change notifications. Each carries absolute state, never a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    NewEmergency {
        emergency: EmergencyRequest,
    },
    AmbulanceAssigned {
        emergency_id: Uuid,
        ambulance_id: Uuid,
        plate_number: String,
        pickup: GeoPoint,
        /// Absent for a manual assignment of a unit with no position fix.
        eta_secs: Option<u32>,
        source: Option<EstimateSource>,
        hospital_id: Option<Uuid>,
    },
    EmergencyStatus {
        emergency_id: Uuid,
        status: EmergencyStatus,
        ambulance_id: Option<Uuid>,
        hospital_id: Option<Uuid>,
    },
    AmbulanceLocationUpdate {
        ambulance_id: Uuid,
        lat: f64,
        lng: f64,
        /// Mission the unit is serving, so the patient can follow it.
        emergency_id: Option<Uuid>,
    },
    HandoverComplete {
        emergency_id: Uuid,
        record: MedicalRecord,
    },
}

impl DispatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchEvent::NewEmergency { .. } => "new_emergency",
            DispatchEvent::AmbulanceAssigned { .. } => "ambulance_assigned",
            DispatchEvent::EmergencyStatus { .. } => "emergency_status",
            DispatchEvent::AmbulanceLocationUpdate { .. } => "ambulance_location_update",
            DispatchEvent::HandoverComplete { .. } => "handover_complete",
        }
    }

    /// Rooms this event is delivered to. The dispatch center sees everything.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics = vec![Topic::DispatchCenter];
        match self {
            DispatchEvent::NewEmergency { emergency } => {
                topics.push(Topic::Emergency(emergency.id));
            }
            DispatchEvent::AmbulanceAssigned {
                emergency_id,
                ambulance_id,
                hospital_id,
                ..
            } => {
                topics.push(Topic::Ambulance(*ambulance_id));
                topics.push(Topic::Emergency(*emergency_id));
                topics.extend(hospital_id.map(Topic::Hospital));
            }
            DispatchEvent::EmergencyStatus {
                emergency_id,
                ambulance_id,
                hospital_id,
                ..
            } => {
                topics.push(Topic::Emergency(*emergency_id));
                topics.extend(ambulance_id.map(Topic::Ambulance));
                topics.extend(hospital_id.map(Topic::Hospital));
            }
            DispatchEvent::AmbulanceLocationUpdate {
                ambulance_id,
                emergency_id,
                ..
            } => {
                topics.push(Topic::Ambulance(*ambulance_id));
                topics.extend(emergency_id.map(Topic::Emergency));
            }
            DispatchEvent::HandoverComplete {
                emergency_id,
                record,
            } => {
                topics.push(Topic::Emergency(*emergency_id));
                topics.extend(record.ambulance_id.map(Topic::Ambulance));
                topics.extend(record.hospital_id.map(Topic::Hospital));
            }
        }
        topics
    }
}

/// Broadcast hub shared by the dispatch core and every socket.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Arc<DispatchEvent>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire and forget. Returns how many subscribers were live.
    pub fn publish(&self, event: DispatchEvent) -> usize {
        let name = event.name();
        match self.tx.send(Arc::new(event)) {
            Ok(n) => {
                tracing::debug!(event = name, receivers = n, "Event published");
                n
            }
            Err(_) => {
                tracing::debug!(event = name, "Event dropped, no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            rooms: HashSet::new(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One client's view of the hub. Starts with no rooms.
pub struct Subscription {
    rx: broadcast::Receiver<Arc<DispatchEvent>>,
    rooms: HashSet<Topic>,
}

impl Subscription {
    /// Returns false if already joined.
    pub fn join(&mut self, topic: Topic) -> bool {
        self.rooms.insert(topic)
    }

    /// Returns false if not joined.
    pub fn leave(&mut self, topic: &Topic) -> bool {
        self.rooms.remove(topic)
    }

    pub fn wants(&self, event: &DispatchEvent) -> bool {
        event.topics().iter().any(|t| self.rooms.contains(t))
    }

    /// Next event for the joined rooms. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<DispatchEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
