use ulid::Ulid;

use crate::model::{Appointment, DaySpan, MinuteWindow};
use crate::store::Calendar;

/// First booking found to collide with a candidate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConflictHit {
    pub appointment_id: Ulid,
    /// The colliding booking belongs to the requesting client — callers
    /// surface "you already booked this slot" instead of a generic message.
    pub same_client: bool,
}

/// Scan one calendar for a collision with `days × [window)`.
///
/// Candidates are the pending/confirmed, non-deleted appointments whose
/// `[date, end_date]` range intersects `days`, minus `exclude` (the record's
/// own ID on reschedule). A candidate stored on exactly the requested start
/// day gets a minute-precise half-open check; a candidate on any other day
/// inside the matched range conflicts outright, whatever its times. The
/// scan covers the whole range — day-spanning bookings must be flagged even
/// without minute overlap.
pub(crate) fn find_conflict(
    calendar: &Calendar,
    days: DaySpan,
    window: MinuteWindow,
    client_id: Ulid,
    exclude: Option<Ulid>,
) -> Option<ConflictHit> {
    for appt in calendar.in_range(&days) {
        if exclude == Some(appt.id) || !appt.blocks_slot() {
            continue;
        }
        if appt.date != days.start {
            // Day-spanning booking anchored to a different day: whole-day
            // block, minute precision does not apply.
            return Some(hit(appt, client_id));
        }
        if window.overlaps_raw(appt.start_time.minutes(), appt.end_time.minutes()) {
            return Some(hit(appt, client_id));
        }
    }
    None
}

fn hit(appt: &Appointment, client_id: Ulid) -> ConflictHit {
    ConflictHit {
        appointment_id: appt.id,
        same_client: appt.client_id == client_id,
    }
}
