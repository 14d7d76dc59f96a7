use ulid::Ulid;

use crate::clock::InvalidTime;

/// Which collection a lookup ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Client,
    TeamMember,
    Category,
    Service,
    Package,
    Appointment,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Client => "client",
            EntityKind::TeamMember => "team member",
            EntityKind::Category => "category",
            EntityKind::Service => "service",
            EntityKind::Package => "package",
            EntityKind::Appointment => "appointment",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum BookingError {
    /// A required request field is absent.
    MissingField(&'static str),
    /// A present field fails validation.
    Invalid(&'static str),
    InvalidTime(String),
    /// Referenced entity absent, soft-deleted, or inactive.
    NotFound(EntityKind, Ulid),
    /// Entity exists but is owned by a different business.
    TenantMismatch(EntityKind, Ulid),
    /// Requested services resolved neither directly nor through the
    /// category fallback.
    ServicesUnresolved { missing: Vec<Ulid> },
    /// The requested window collides with an existing booking.
    Conflict { with: Ulid, same_client: bool },
    AlreadyExists(EntityKind, Ulid),
    AlreadyCancelled(Ulid),
    LimitExceeded(&'static str),
    /// WAL/storage failure; the operation was not applied and may be
    /// retried by the caller.
    Storage(String),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::MissingField(field) => write!(f, "missing required field: {field}"),
            BookingError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            BookingError::InvalidTime(s) => write!(f, "invalid time of day: {s:?}"),
            BookingError::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            BookingError::TenantMismatch(kind, id) => {
                write!(f, "{kind} {id} belongs to a different business")
            }
            BookingError::ServicesUnresolved { missing } => {
                write!(f, "services could not be resolved: {missing:?}")
            }
            BookingError::Conflict { with, same_client } => {
                if *same_client {
                    write!(f, "client already has appointment {with} in this slot")
                } else {
                    write!(f, "slot conflicts with appointment {with}")
                }
            }
            BookingError::AlreadyExists(kind, id) => write!(f, "{kind} already exists: {id}"),
            BookingError::AlreadyCancelled(id) => {
                write!(f, "appointment already cancelled: {id}")
            }
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<InvalidTime> for BookingError {
    fn from(e: InvalidTime) -> Self {
        BookingError::InvalidTime(e.0)
    }
}
