use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the live check-in feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, name: String },

    /// A pass was scanned and the attendee admitted
    CheckIn {
        event_id: Uuid,
        registration_id: Uuid,
        user_id: Uuid,
        attendee_name: String,
        checked_in_at: DateTime<Utc>,
    },

    /// An event was deleted by its organizer; subscribers should drop it
    EventRemoved { event_id: Uuid },
}

impl GatewayEvent {
    /// Returns the event_id if this message is scoped to a single event.
    /// `None` means every connection receives it.
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            Self::CheckIn { event_id, .. } => Some(*event_id),
            Self::EventRemoved { event_id } => Some(*event_id),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Replace the set of events this connection wants check-ins for.
    Subscribe { event_ids: Vec<Uuid> },
}
