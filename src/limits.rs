//! Operational bounds, enforced at operation entry.

/// Maximum length of any entity display name.
pub const MAX_NAME_LEN: usize = 256;

/// Maximum explicit services on a single appointment.
pub const MAX_SERVICES_PER_APPOINTMENT: usize = 32;

/// Widest inclusive day span a single appointment may cover.
pub const MAX_APPOINTMENT_DAYS: i64 = 31;

/// Widest inclusive day span a list query may cover.
pub const MAX_QUERY_DAYS: i64 = 366;

/// Maximum appointments retained on one team member's calendar.
pub const MAX_APPOINTMENTS_PER_CALENDAR: usize = 100_000;
