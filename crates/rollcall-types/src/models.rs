use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored status/role string doesn't name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Organizer,
    Admin,
}

string_enum!(Role, "role", {
    Student => "student",
    Organizer => "organizer",
    Admin => "admin",
});

impl Role {
    /// Staff accounts go through admin approval before they can sign in.
    pub fn initial_status(&self) -> AccountStatus {
        match self {
            Self::Student | Self::Admin => AccountStatus::Approved,
            Self::Organizer => AccountStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(AccountStatus, "account status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(EventStatus, "event status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Two-state registration lifecycle: `registered -> checked-in`, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationStatus {
    Registered,
    CheckedIn,
}

string_enum!(RegistrationStatus, "registration status", {
    Registered => "registered",
    CheckedIn => "checked-in",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub organizer_name: String,
    pub title: String,
    pub description: String,
    pub department: String,
    pub venue: String,
    pub starts_at: NaiveDateTime,
    pub capacity: Option<u32>,
    pub status: EventStatus,
    pub registered_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub qr_payload: String,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// Audit row for a completed check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub attendee_name: String,
    pub attendee_email: String,
    pub checked_in_by: Uuid,
    pub checked_in_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_status_uses_hyphenated_wire_name() {
        assert_eq!(RegistrationStatus::CheckedIn.as_str(), "checked-in");
        let json = serde_json::to_string(&RegistrationStatus::CheckedIn).unwrap();
        assert_eq!(json, "\"checked-in\"");
        assert_eq!(
            "checked-in".parse::<RegistrationStatus>().unwrap(),
            RegistrationStatus::CheckedIn
        );
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role 'superuser'");
    }

    #[test]
    fn only_organizers_start_pending() {
        assert_eq!(Role::Student.initial_status(), AccountStatus::Approved);
        assert_eq!(Role::Organizer.initial_status(), AccountStatus::Pending);
        assert_eq!(Role::Admin.initial_status(), AccountStatus::Approved);
    }
}
