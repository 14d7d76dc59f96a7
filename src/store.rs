use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{Appointment, AppointmentStatus, DaySpan, Event, Ms};

pub type SharedCalendar = Arc<RwLock<Calendar>>;

/// Every appointment ever booked for one team member, ordered by
/// `(date, start minutes)`. Cancelled and soft-deleted entries stay in
/// place — conflict checks skip them, the history keeps them.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub team_member_id: Ulid,
    pub appointments: Vec<Appointment>,
}

impl Calendar {
    pub fn new(team_member_id: Ulid) -> Self {
        Self {
            team_member_id,
            appointments: Vec::new(),
        }
    }

    fn sort_key(appt: &Appointment) -> (NaiveDate, u32) {
        (appt.date, appt.start_time.minutes())
    }

    /// Insert maintaining `(date, start)` order.
    pub fn insert(&mut self, appt: Appointment) {
        let key = Self::sort_key(&appt);
        let pos = self.appointments.partition_point(|a| Self::sort_key(a) <= key);
        self.appointments.insert(pos, appt);
    }

    pub fn get(&self, id: &Ulid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == *id)
    }

    pub fn remove(&mut self, id: &Ulid) -> Option<Appointment> {
        let pos = self.appointments.iter().position(|a| a.id == *id)?;
        Some(self.appointments.remove(pos))
    }

    /// Replace (or insert) by id, repositioning for a possibly-changed key.
    pub fn upsert(&mut self, appt: Appointment) {
        self.remove(&appt.id);
        self.insert(appt);
    }

    pub fn cancel(&mut self, id: &Ulid, updated_by: Ulid, at: Ms) -> bool {
        match self.appointments.iter_mut().find(|a| a.id == *id) {
            Some(a) => {
                a.status = AppointmentStatus::Cancelled;
                a.updated_by = Some(updated_by);
                a.updated_at = at;
                true
            }
            None => false,
        }
    }

    /// Appointments whose `[date, end_date]` range intersects `days`.
    /// Entries are ordered by start date, so everything starting after the
    /// query's last day is skipped wholesale.
    pub fn in_range<'a>(&'a self, days: &'a DaySpan) -> impl Iterator<Item = &'a Appointment> {
        let right = self.appointments.partition_point(|a| a.date <= days.end);
        self.appointments[..right]
            .iter()
            .filter(move |a| a.end_date >= days.start)
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }
}

/// In-memory state. Reference entities are plain concurrent maps — they are
/// read-only within a booking operation. Appointments live in per-team-member
/// calendars, each behind its own lock, so a booking holds one calendar
/// across conflict check and write.
pub struct Store {
    pub clients: DashMap<Ulid, crate::model::Client>,
    pub team_members: DashMap<Ulid, crate::model::TeamMember>,
    pub categories: DashMap<Ulid, crate::model::Category>,
    pub services: DashMap<Ulid, crate::model::Service>,
    pub packages: DashMap<Ulid, crate::model::Package>,
    calendars: DashMap<Ulid, SharedCalendar>,
    /// Reverse lookup: appointment id → owning team member id.
    appointment_owner: DashMap<Ulid, Ulid>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            team_members: DashMap::new(),
            categories: DashMap::new(),
            services: DashMap::new(),
            packages: DashMap::new(),
            calendars: DashMap::new(),
            appointment_owner: DashMap::new(),
        }
    }

    /// Calendar for a team member, created on first touch.
    pub fn calendar(&self, team_member_id: Ulid) -> SharedCalendar {
        self.calendars
            .entry(team_member_id)
            .or_insert_with(|| Arc::new(RwLock::new(Calendar::new(team_member_id))))
            .value()
            .clone()
    }

    pub fn calendar_count(&self) -> usize {
        self.calendars.len()
    }

    pub fn all_calendars(&self) -> Vec<SharedCalendar> {
        self.calendars.iter().map(|e| e.value().clone()).collect()
    }

    pub fn team_member_for_appointment(&self, id: &Ulid) -> Option<Ulid> {
        self.appointment_owner.get(id).map(|e| *e.value())
    }

    pub(crate) fn map_appointment(&self, id: Ulid, team_member_id: Ulid) {
        self.appointment_owner.insert(id, team_member_id);
    }

    /// Apply an event during replay or a directory write. Calendars are
    /// uncontended on these paths, so `try_write` always succeeds; live
    /// booking commits apply through the guards held by the transaction
    /// instead.
    pub fn apply(&self, event: &Event) {
        match event {
            Event::ClientCreated { client } => {
                self.clients.insert(client.id, client.clone());
            }
            Event::ClientRemoved { id } => {
                if let Some(mut c) = self.clients.get_mut(id) {
                    c.is_deleted = true;
                }
            }
            Event::TeamMemberCreated { team_member } => {
                self.team_members.insert(team_member.id, team_member.clone());
            }
            Event::TeamMemberDeactivated { id } => {
                if let Some(mut t) = self.team_members.get_mut(id) {
                    t.is_active = false;
                }
            }
            Event::TeamMemberRemoved { id } => {
                if let Some(mut t) = self.team_members.get_mut(id) {
                    t.is_deleted = true;
                }
            }
            Event::CategoryCreated { category } => {
                self.categories.insert(category.id, category.clone());
            }
            Event::CategoryDeactivated { id } => {
                if let Some(mut c) = self.categories.get_mut(id) {
                    c.is_active = false;
                }
            }
            Event::ServiceCreated { service } => {
                self.services.insert(service.id, service.clone());
            }
            Event::ServiceDeactivated { id } => {
                if let Some(mut s) = self.services.get_mut(id) {
                    s.is_active = false;
                }
            }
            Event::ServiceRemoved { id } => {
                if let Some(mut s) = self.services.get_mut(id) {
                    s.is_deleted = true;
                }
            }
            Event::PackageCreated { package } => {
                self.packages.insert(package.id, package.clone());
            }
            Event::PackageDeactivated { id } => {
                if let Some(mut p) = self.packages.get_mut(id) {
                    p.is_active = false;
                }
            }
            Event::AppointmentBooked { appointment } => {
                let cal = self.calendar(appointment.team_member_id);
                cal.try_write()
                    .expect("replay: uncontended write")
                    .insert(appointment.clone());
                self.map_appointment(appointment.id, appointment.team_member_id);
            }
            Event::AppointmentUpdated { appointment } => {
                if let Some(prev) = self.team_member_for_appointment(&appointment.id)
                    && prev != appointment.team_member_id
                {
                    let old = self.calendar(prev);
                    old.try_write()
                        .expect("replay: uncontended write")
                        .remove(&appointment.id);
                }
                let cal = self.calendar(appointment.team_member_id);
                cal.try_write()
                    .expect("replay: uncontended write")
                    .upsert(appointment.clone());
                self.map_appointment(appointment.id, appointment.team_member_id);
            }
            Event::AppointmentCancelled {
                id,
                team_member_id,
                updated_by,
                at,
            } => {
                let cal = self.calendar(*team_member_id);
                cal.try_write()
                    .expect("replay: uncontended write")
                    .cancel(id, *updated_by, *at);
            }
        }
    }

    /// Events that recreate the current state, for WAL compaction. Created
    /// events embed the full record, so soft-deleted flags and cancelled
    /// statuses survive the rewrite.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for e in self.clients.iter() {
            events.push(Event::ClientCreated { client: e.value().clone() });
        }
        for e in self.team_members.iter() {
            events.push(Event::TeamMemberCreated { team_member: e.value().clone() });
        }
        for e in self.categories.iter() {
            events.push(Event::CategoryCreated { category: e.value().clone() });
        }
        for e in self.services.iter() {
            events.push(Event::ServiceCreated { service: e.value().clone() });
        }
        for e in self.packages.iter() {
            events.push(Event::PackageCreated { package: e.value().clone() });
        }
        for entry in self.calendars.iter() {
            let cal = entry.value().clone();
            let guard = cal.try_read().expect("compact: uncontended read");
            for appt in &guard.appointments {
                events.push(Event::AppointmentBooked { appointment: appt.clone() });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeOfDay;
    use crate::model::{AppointmentStatus, ServiceSnapshot};
    use rust_decimal::Decimal;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::from_hhmm(s).unwrap()
    }

    fn appt(day: &str, start: &str, end: &str) -> Appointment {
        let tm = Ulid::new();
        Appointment {
            id: Ulid::new(),
            business_id: Ulid::new(),
            client_id: Ulid::new(),
            team_member_id: tm,
            category_id: None,
            date: date(day),
            end_date: date(day),
            start_time: t(start),
            end_time: t(end),
            duration_minutes: t(end).minutes() - t(start).minutes(),
            client_name: "Robin".into(),
            client_email: None,
            client_phone: None,
            team_member_name: "Sam".into(),
            category_name: None,
            services: Vec::<ServiceSnapshot>::new(),
            package: None,
            total_price: Decimal::ZERO,
            discount: Decimal::ZERO,
            final_price: Decimal::ZERO,
            currency: "USD".into(),
            status: AppointmentStatus::Pending,
            is_deleted: false,
            created_by: Ulid::new(),
            updated_by: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn calendar_keeps_date_start_order() {
        let mut cal = Calendar::new(Ulid::new());
        cal.insert(appt("2024-05-02", "09:00", "10:00"));
        cal.insert(appt("2024-05-01", "14:00", "15:00"));
        cal.insert(appt("2024-05-01", "09:00", "09:30"));

        let starts: Vec<_> = cal
            .appointments
            .iter()
            .map(|a| (a.date, a.start_time.minutes()))
            .collect();
        assert_eq!(
            starts,
            vec![
                (date("2024-05-01"), 540),
                (date("2024-05-01"), 840),
                (date("2024-05-02"), 540),
            ]
        );
    }

    #[test]
    fn calendar_in_range_trims_later_days() {
        let mut cal = Calendar::new(Ulid::new());
        cal.insert(appt("2024-05-01", "09:00", "10:00"));
        cal.insert(appt("2024-05-05", "09:00", "10:00"));
        let mut spanning = appt("2024-04-28", "09:00", "10:00");
        spanning.end_date = date("2024-05-02");
        cal.insert(spanning);

        let days = DaySpan::new(date("2024-05-01"), date("2024-05-02"));
        let hits: Vec<_> = cal.in_range(&days).map(|a| a.date).collect();
        assert_eq!(hits, vec![date("2024-04-28"), date("2024-05-01")]);
    }

    #[test]
    fn calendar_cancel_marks_in_place() {
        let mut cal = Calendar::new(Ulid::new());
        let a = appt("2024-05-01", "09:00", "10:00");
        let id = a.id;
        cal.insert(a);

        let actor = Ulid::new();
        assert!(cal.cancel(&id, actor, 42));
        let stored = cal.get(&id).unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
        assert_eq!(stored.updated_by, Some(actor));
        assert_eq!(stored.updated_at, 42);
        assert_eq!(cal.len(), 1); // never removed

        assert!(!cal.cancel(&Ulid::new(), actor, 43));
    }

    #[test]
    fn calendar_upsert_repositions() {
        let mut cal = Calendar::new(Ulid::new());
        let a = appt("2024-05-02", "09:00", "10:00");
        let id = a.id;
        cal.insert(appt("2024-05-01", "09:00", "10:00"));
        cal.insert(a.clone());

        let mut moved = a;
        moved.date = date("2024-04-30");
        moved.end_date = date("2024-04-30");
        cal.upsert(moved);

        assert_eq!(cal.len(), 2);
        assert_eq!(cal.appointments[0].id, id);
        assert_eq!(cal.appointments[0].date, date("2024-04-30"));
    }

    #[test]
    fn store_snapshot_roundtrips_through_apply() {
        let store = Store::new();
        let a = appt("2024-05-01", "09:00", "10:00");
        store.apply(&Event::AppointmentBooked { appointment: a.clone() });
        store.apply(&Event::AppointmentCancelled {
            id: a.id,
            team_member_id: a.team_member_id,
            updated_by: a.created_by,
            at: 99,
        });

        let rebuilt = Store::new();
        for event in store.snapshot_events() {
            rebuilt.apply(&event);
        }
        let cal = rebuilt.calendar(a.team_member_id);
        let guard = cal.try_read().unwrap();
        assert_eq!(guard.get(&a.id).unwrap().status, AppointmentStatus::Cancelled);
    }
}
