use ulid::Ulid;

use crate::clock::inclusive_day_span;
use crate::limits::MAX_QUERY_DAYS;
use crate::model::{Appointment, DaySpan};

use super::{BookingError, Engine};

impl Engine {
    /// Fetch one appointment scoped to a business. A record owned by a
    /// different business reads as absent.
    pub async fn get_appointment(&self, business_id: Ulid, id: Ulid) -> Option<Appointment> {
        let owner = self.store.team_member_for_appointment(&id)?;
        let cal = self.store.calendar(owner);
        let guard = cal.read().await;
        guard
            .get(&id)
            .filter(|a| a.business_id == business_id && !a.is_deleted)
            .cloned()
    }

    /// A team member's appointments intersecting the day range. Cancelled
    /// entries are included; callers filter by status.
    pub async fn team_member_appointments(
        &self,
        business_id: Ulid,
        team_member_id: Ulid,
        days: DaySpan,
    ) -> Result<Vec<Appointment>, BookingError> {
        if inclusive_day_span(days.start, days.end) > MAX_QUERY_DAYS {
            return Err(BookingError::LimitExceeded("query window too wide"));
        }
        let cal = self.store.calendar(team_member_id);
        let guard = cal.read().await;
        Ok(guard
            .in_range(&days)
            .filter(|a| a.business_id == business_id && !a.is_deleted)
            .cloned()
            .collect())
    }

    /// A client's appointments across every team member of the business,
    /// ordered by `(date, start)`.
    pub async fn client_appointments(
        &self,
        business_id: Ulid,
        client_id: Ulid,
        days: DaySpan,
    ) -> Result<Vec<Appointment>, BookingError> {
        if inclusive_day_span(days.start, days.end) > MAX_QUERY_DAYS {
            return Err(BookingError::LimitExceeded("query window too wide"));
        }
        let mut out = Vec::new();
        for cal in self.store.all_calendars() {
            let guard = cal.read().await;
            out.extend(
                guard
                    .in_range(&days)
                    .filter(|a| {
                        a.business_id == business_id
                            && a.client_id == client_id
                            && !a.is_deleted
                    })
                    .cloned(),
            );
        }
        out.sort_by_key(|a| (a.date, a.start_time.minutes()));
        Ok(out)
    }
}
