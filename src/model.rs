use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock::TimeOfDay;

/// Unix milliseconds — audit timestamps only. Scheduling math runs on
/// calendar days and minute offsets, never on wall-clock instants.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Inclusive calendar-day range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DaySpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DaySpan start must not be after end");
        Self { start, end }
    }

    /// True when the ranges share at least one day (endpoints count).
    pub fn overlaps(&self, other: &DaySpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Half-open minute window `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteWindow {
    pub start: u32,
    pub end: u32,
}

impl MinuteWindow {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self {
            start: start.minutes(),
            end: end.minutes(),
        }
    }

    /// Half-open overlap against raw stored minute values: adjacent windows
    /// (`self.end == other_start`) do not collide.
    pub fn overlaps_raw(&self, other_start: u32, other_end: u32) -> bool {
        self.start < other_end && other_start < self.end
    }
}

// ── Reference entities ───────────────────────────────────────────
//
// Owned by a business (tenant), read-mostly: the scheduling core fetches
// them fresh per request and validates the active/deleted flags before use.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Ulid,
    pub business_id: Ulid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Ulid,
    pub business_id: Ulid,
    pub name: String,
    pub is_active: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub business_id: Ulid,
    pub category_id: Option<Ulid>,
    pub name: String,
    pub duration_minutes: u32,
    pub price: Decimal,
    pub is_active: bool,
    pub is_deleted: bool,
}

/// Categories carry their own "global" service entries; the resolver falls
/// back to these when an ID is absent from the direct service collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Ulid,
    pub business_id: Ulid,
    pub name: String,
    pub services: Vec<Service>,
    pub is_active: bool,
    pub is_deleted: bool,
}

/// A bundled offering with fixed duration and price. When booked, its
/// values override anything derived from explicit services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: Ulid,
    pub business_id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
    pub price: Decimal,
    pub services: Vec<ServiceSnapshot>,
    pub is_active: bool,
    pub is_deleted: bool,
}

// ── Appointments ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that occupy calendar time for conflict detection.
    pub fn blocks_slot(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
        };
        f.write_str(s)
    }
}

/// Copied into the appointment at booking time; later edits to the source
/// service never alter past appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub service_id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
    pub price: Decimal,
}

impl From<&Service> for ServiceSnapshot {
    fn from(s: &Service) -> Self {
        Self {
            service_id: s.id,
            name: s.name.clone(),
            duration_minutes: s.duration_minutes,
            price: s.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    pub package_id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
    pub price: Decimal,
    pub services: Vec<ServiceSnapshot>,
}

impl From<&Package> for PackageSnapshot {
    fn from(p: &Package) -> Self {
        Self {
            package_id: p.id,
            name: p.name.clone(),
            duration_minutes: p.duration_minutes,
            price: p.price,
            services: p.services.clone(),
        }
    }
}

/// The central record. Appointments are never hard-deleted: cancellation is
/// a status transition and `is_deleted` is a soft flag, so the calendar
/// keeps its full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub business_id: Ulid,
    pub client_id: Ulid,
    pub team_member_id: Ulid,
    pub category_id: Option<Ulid>,
    pub date: NaiveDate,
    /// Normally equal to `date`; later when the booking spans days.
    pub end_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    /// Authoritative for billing; equals the start/end difference for
    /// normal same-day bookings.
    pub duration_minutes: u32,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub team_member_name: String,
    pub category_name: Option<String>,
    pub services: Vec<ServiceSnapshot>,
    pub package: Option<PackageSnapshot>,
    pub total_price: Decimal,
    pub discount: Decimal,
    pub final_price: Decimal,
    pub currency: String,
    pub status: AppointmentStatus,
    pub is_deleted: bool,
    pub created_by: Ulid,
    pub updated_by: Option<Ulid>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Appointment {
    /// Occupies calendar time: pending/confirmed and not soft-deleted.
    pub fn blocks_slot(&self) -> bool {
        self.status.blocks_slot() && !self.is_deleted
    }

    pub fn days(&self) -> DaySpan {
        DaySpan::new(self.date, self.end_date)
    }
}

/// The event types — flat, no nesting. This is the WAL record format;
/// created events embed the full record so a replayed store matches the
/// live one field for field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ClientCreated { client: Client },
    ClientRemoved { id: Ulid },
    TeamMemberCreated { team_member: TeamMember },
    TeamMemberDeactivated { id: Ulid },
    TeamMemberRemoved { id: Ulid },
    CategoryCreated { category: Category },
    CategoryDeactivated { id: Ulid },
    ServiceCreated { service: Service },
    ServiceDeactivated { id: Ulid },
    ServiceRemoved { id: Ulid },
    PackageCreated { package: Package },
    PackageDeactivated { id: Ulid },
    AppointmentBooked { appointment: Appointment },
    AppointmentUpdated { appointment: Appointment },
    AppointmentCancelled {
        id: Ulid,
        team_member_id: Ulid,
        updated_by: Ulid,
        at: Ms,
    },
}
