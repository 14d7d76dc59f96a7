use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use tracing::info;
use ulid::Ulid;

use crate::clock::{inclusive_day_span, TimeOfDay};
use crate::limits::{MAX_APPOINTMENT_DAYS, MAX_APPOINTMENTS_PER_CALENDAR};
use crate::model::{
    now_ms, Appointment, AppointmentStatus, DaySpan, Event, MinuteWindow, PackageSnapshot,
    ServiceSnapshot,
};
use crate::observability;

use super::assemble::{assemble, final_price, Window};
use super::conflict::find_conflict;
use super::{BookingError, Engine, EntityKind, Txn};

/// A new-appointment request, already authorized for `business_id`.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub business_id: Ulid,
    pub client_id: Ulid,
    pub team_member_id: Ulid,
    pub category_id: Option<Ulid>,
    pub service_ids: Vec<Ulid>,
    pub package_id: Option<Ulid>,
    pub date: NaiveDate,
    /// Defaults to `date`; advanced automatically when the duration rolls
    /// past midnight.
    pub end_date: Option<NaiveDate>,
    pub start_time: TimeOfDay,
    /// Overrides the service/package-derived duration. Whichever applies is
    /// authoritative for billing.
    pub duration_minutes: Option<u32>,
    pub discount: Option<Decimal>,
}

/// Partial update; `None` fields keep their stored values.
#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub team_member_id: Option<Ulid>,
    pub category_id: Option<Ulid>,
    pub service_ids: Option<Vec<Ulid>>,
    pub package_id: Option<Ulid>,
    pub date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<TimeOfDay>,
    pub duration_minutes: Option<u32>,
    pub discount: Option<Decimal>,
    /// Status transitions other than cancellation — cancelling goes through
    /// `cancel_appointment`.
    pub status: Option<AppointmentStatus>,
}

/// Derive the end time and end date from start + duration, validating the
/// window invariants.
fn compute_window(
    date: NaiveDate,
    start: TimeOfDay,
    duration_minutes: u32,
    requested_end_date: Option<NaiveDate>,
) -> Result<Window, BookingError> {
    if duration_minutes == 0 {
        return Err(BookingError::Invalid("duration must be positive"));
    }
    if let Some(d) = requested_end_date
        && d < date
    {
        return Err(BookingError::Invalid("end date precedes start date"));
    }

    let (end, day_carry) = start.add_minutes(duration_minutes);
    let rolled = date
        .checked_add_days(Days::new(u64::from(day_carry)))
        .ok_or(BookingError::Invalid("date out of range"))?;
    let end_date = match requested_end_date {
        Some(d) => d.max(rolled),
        None => rolled,
    };

    if inclusive_day_span(date, end_date) > MAX_APPOINTMENT_DAYS {
        return Err(BookingError::LimitExceeded("appointment spans too many days"));
    }
    // Same-day bookings need a forward minute window; multi-day entries
    // carry day-level precision instead.
    if end_date == date && end.minutes() <= start.minutes() {
        return Err(BookingError::Invalid("end time must be after start time"));
    }

    Ok(Window {
        date,
        end_date,
        start,
        end,
        duration_minutes,
    })
}

fn record_op<T>(
    op: &'static str,
    started: std::time::Instant,
    result: &Result<T, BookingError>,
) {
    let status = match result {
        Ok(_) => "ok",
        Err(BookingError::Conflict { .. }) => "conflict",
        Err(_) => "rejected",
    };
    metrics::counter!(observability::BOOKINGS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(observability::BOOKING_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}

impl Engine {
    /// Create: validate → resolve → derive window → conflict check →
    /// assemble → commit, with the team member's calendar locked from the
    /// conflict check through the write.
    pub async fn create_appointment(
        &self,
        req: BookingRequest,
        actor: Ulid,
    ) -> Result<Appointment, BookingError> {
        let started = std::time::Instant::now();
        let result = self.create_inner(req, actor).await;
        record_op("create", started, &result);
        result
    }

    async fn create_inner(
        &self,
        req: BookingRequest,
        actor: Ulid,
    ) -> Result<Appointment, BookingError> {
        if req.service_ids.is_empty() && req.category_id.is_none() {
            return Err(BookingError::MissingField("category or services"));
        }

        let resolved = self.resolve_entities(
            req.client_id,
            req.team_member_id,
            req.category_id,
            &req.service_ids,
            req.package_id,
            Some(req.business_id),
        )?;

        let duration = req.duration_minutes.unwrap_or(resolved.total_duration);
        let window = compute_window(req.date, req.start_time, duration, req.end_date)?;
        let discount = req.discount.unwrap_or(Decimal::ZERO);

        let mut txn = Txn::begin(self, &[req.team_member_id]).await;
        {
            let calendar = txn.calendar(req.team_member_id);
            if calendar.len() >= MAX_APPOINTMENTS_PER_CALENDAR {
                return Err(BookingError::LimitExceeded("too many appointments on calendar"));
            }
            if let Some(found) = find_conflict(
                calendar,
                DaySpan::new(window.date, window.end_date),
                MinuteWindow::new(window.start, window.end),
                req.client_id,
                None,
            ) {
                metrics::counter!(observability::CONFLICTS_DETECTED_TOTAL).increment(1);
                return Err(BookingError::Conflict {
                    with: found.appointment_id,
                    same_client: found.same_client,
                });
            }
        }

        let appointment = assemble(
            Ulid::new(),
            req.business_id,
            &resolved,
            &window,
            discount,
            &self.currency,
            actor,
        );
        let event = Event::AppointmentBooked {
            appointment: appointment.clone(),
        };
        self.commit(&mut txn, event).await?;
        info!(
            appointment = %appointment.id,
            team_member = %appointment.team_member_id,
            date = %appointment.date,
            start = %appointment.start_time,
            "appointment booked"
        );
        Ok(appointment)
    }

    /// Update/reschedule: merge the patch over the stored record. Entities
    /// are re-resolved only when their ID changed, so untouched snapshots
    /// stay historical; the conflict check re-runs when the team member or
    /// the time window moved, excluding the record's own ID.
    pub async fn update_appointment(
        &self,
        business_id: Ulid,
        id: Ulid,
        patch: AppointmentPatch,
        actor: Ulid,
    ) -> Result<Appointment, BookingError> {
        let started = std::time::Instant::now();
        let result = self.update_inner(business_id, id, patch, actor).await;
        record_op("update", started, &result);
        result
    }

    async fn update_inner(
        &self,
        business_id: Ulid,
        id: Ulid,
        patch: AppointmentPatch,
        actor: Ulid,
    ) -> Result<Appointment, BookingError> {
        let current_owner = self
            .store
            .team_member_for_appointment(&id)
            .ok_or(BookingError::NotFound(EntityKind::Appointment, id))?;
        let target_owner = patch.team_member_id.unwrap_or(current_owner);

        let mut txn = Txn::begin(self, &[current_owner, target_owner]).await;

        let existing = txn
            .calendar(current_owner)
            .get(&id)
            .filter(|a| a.business_id == business_id && !a.is_deleted)
            .cloned()
            .ok_or(BookingError::NotFound(EntityKind::Appointment, id))?;

        if existing.status == AppointmentStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(id));
        }
        if patch.status == Some(AppointmentStatus::Cancelled) {
            return Err(BookingError::Invalid(
                "cancellation goes through cancel_appointment",
            ));
        }

        let mut merged = existing.clone();

        if let Some(tm_id) = patch.team_member_id
            && tm_id != existing.team_member_id
        {
            let tm = self.resolve_team_member(tm_id, Some(business_id))?;
            merged.team_member_id = tm.id;
            merged.team_member_name = tm.name;
        }
        if let Some(category_id) = patch.category_id
            && Some(category_id) != existing.category_id
        {
            let category = self.resolve_category(category_id, Some(business_id))?;
            merged.category_id = Some(category.id);
            merged.category_name = Some(category.name);
        }

        let mut totals_changed = false;
        if let Some(ref service_ids) = patch.service_ids {
            let services = self.resolve_services(service_ids, Some(business_id), business_id)?;
            merged.services = services.iter().map(ServiceSnapshot::from).collect();
            totals_changed = true;
        }
        if let Some(package_id) = patch.package_id
            && existing.package.as_ref().map(|p| p.package_id) != Some(package_id)
        {
            let package = self.resolve_package(package_id, Some(business_id))?;
            merged.package = Some(PackageSnapshot::from(&package));
            totals_changed = true;
        }
        if totals_changed {
            // Package values stay authoritative over summed services.
            let (duration, price) = match &merged.package {
                Some(p) => (p.duration_minutes, p.price),
                None => merged
                    .services
                    .iter()
                    .fold((0u32, Decimal::ZERO), |(d, p), s| {
                        (d + s.duration_minutes, p + s.price)
                    }),
            };
            merged.duration_minutes = duration;
            merged.total_price = price;
        }
        if let Some(d) = patch.duration_minutes {
            merged.duration_minutes = d;
        }
        if let Some(d) = patch.discount {
            merged.discount = d;
        }
        if let Some(s) = patch.status {
            merged.status = s;
        }

        let window_touched = patch.date.is_some()
            || patch.start_time.is_some()
            || patch.end_date.is_some()
            || patch.duration_minutes.is_some()
            || totals_changed;
        if window_touched {
            let date = patch.date.unwrap_or(existing.date);
            let start = patch.start_time.unwrap_or(existing.start_time);
            // A stored multi-day end survives the merge unless the start
            // date itself moved.
            let inherited_end = (patch.date.is_none() && existing.end_date > existing.date)
                .then_some(existing.end_date);
            let window = compute_window(
                date,
                start,
                merged.duration_minutes,
                patch.end_date.or(inherited_end),
            )?;
            merged.date = window.date;
            merged.end_date = window.end_date;
            merged.start_time = window.start;
            merged.end_time = window.end;
        }

        merged.final_price = final_price(id, merged.total_price, merged.discount);
        merged.updated_by = Some(actor);
        merged.updated_at = now_ms();

        let moved = merged.team_member_id != existing.team_member_id;
        // A status change back to pending/confirmed re-occupies the slot, so
        // it needs the same availability check as a moved window.
        let reactivated = merged.status.blocks_slot() && !existing.status.blocks_slot();
        if moved || window_touched || reactivated {
            if let Some(found) = find_conflict(
                txn.calendar(merged.team_member_id),
                merged.days(),
                MinuteWindow::new(merged.start_time, merged.end_time),
                merged.client_id,
                Some(id),
            ) {
                metrics::counter!(observability::CONFLICTS_DETECTED_TOTAL).increment(1);
                return Err(BookingError::Conflict {
                    with: found.appointment_id,
                    same_client: found.same_client,
                });
            }
        }

        let event = Event::AppointmentUpdated {
            appointment: merged.clone(),
        };
        self.commit(&mut txn, event).await?;
        info!(appointment = %id, moved, "appointment updated");
        Ok(merged)
    }

    /// Cancel: a status transition that frees the slot as soon as the
    /// commit lands. A second cancel is rejected, not a no-op.
    pub async fn cancel_appointment(
        &self,
        business_id: Ulid,
        id: Ulid,
        actor: Ulid,
    ) -> Result<Ulid, BookingError> {
        let started = std::time::Instant::now();
        let result = self.cancel_inner(business_id, id, actor).await;
        record_op("cancel", started, &result);
        result
    }

    async fn cancel_inner(
        &self,
        business_id: Ulid,
        id: Ulid,
        actor: Ulid,
    ) -> Result<Ulid, BookingError> {
        let owner = self
            .store
            .team_member_for_appointment(&id)
            .ok_or(BookingError::NotFound(EntityKind::Appointment, id))?;

        let mut txn = Txn::begin(self, &[owner]).await;
        let existing = txn
            .calendar(owner)
            .get(&id)
            .filter(|a| a.business_id == business_id && !a.is_deleted)
            .cloned()
            .ok_or(BookingError::NotFound(EntityKind::Appointment, id))?;
        if existing.status == AppointmentStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(id));
        }

        let event = Event::AppointmentCancelled {
            id,
            team_member_id: owner,
            updated_by: actor,
            at: now_ms(),
        };
        self.commit(&mut txn, event).await?;
        info!(appointment = %id, "appointment cancelled");
        Ok(id)
    }
}
