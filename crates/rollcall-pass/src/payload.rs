use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

const SEPARATOR: char = ':';

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PassError {
    #[error("malformed pass payload")]
    Malformed,

    #[error("pass payload contains an invalid {0} id")]
    InvalidId(&'static str),

    #[error("invalid QR renderer: {0}")]
    InvalidRenderer(String),
}

/// Identifies one student's registration for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdmissionPass {
    pub event_id: Uuid,
    pub user_id: Uuid,
}

impl AdmissionPass {
    pub fn new(event_id: Uuid, user_id: Uuid) -> Self {
        Self { event_id, user_id }
    }

    /// The exact text stored in `registrations.qr_payload` and encoded into the QR image.
    pub fn payload(&self) -> String {
        self.to_string()
    }

    /// Parse scanner output. Surrounding whitespace (trailing newlines from
    /// keyboard-wedge scanners, mostly) is ignored.
    pub fn parse(raw: &str) -> Result<Self, PassError> {
        let (event, user) = raw.trim().split_once(SEPARATOR).ok_or(PassError::Malformed)?;
        if event.is_empty() || user.is_empty() || user.contains(SEPARATOR) {
            return Err(PassError::Malformed);
        }

        let event_id = Uuid::parse_str(event).map_err(|_| PassError::InvalidId("event"))?;
        let user_id = Uuid::parse_str(user).map_err(|_| PassError::InvalidId("user"))?;

        Ok(Self { event_id, user_id })
    }
}

impl fmt::Display for AdmissionPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.event_id.hyphenated(),
            SEPARATOR,
            self.user_id.hyphenated()
        )
    }
}

impl FromStr for AdmissionPass {
    type Err = PassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
