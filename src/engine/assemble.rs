use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::warn;
use ulid::Ulid;

use crate::clock::TimeOfDay;
use crate::model::{
    now_ms, Appointment, AppointmentStatus, PackageSnapshot, ServiceSnapshot,
};

use super::resolve::ResolvedEntities;

/// Validated time window for a booking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub date: NaiveDate,
    pub end_date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub duration_minutes: u32,
}

/// `total - discount`. The discount is deliberately unclamped: a discount
/// larger than the total produces a negative final price, which is allowed
/// and logged.
pub(crate) fn final_price(id: Ulid, total: Decimal, discount: Decimal) -> Decimal {
    let final_price = total - discount;
    if final_price < Decimal::ZERO {
        warn!(appointment = %id, %total, %discount, "discount exceeds total price");
    }
    final_price
}

/// Build the persisted record. Denormalized name/contact fields are copied
/// here, at booking time, and never refreshed from the source entities —
/// past appointments display what was true when they were booked.
pub(crate) fn assemble(
    id: Ulid,
    business_id: Ulid,
    resolved: &ResolvedEntities,
    window: &Window,
    discount: Decimal,
    currency: &str,
    actor: Ulid,
) -> Appointment {
    let total_price = resolved.total_price;
    let now = now_ms();
    Appointment {
        id,
        business_id,
        client_id: resolved.client.id,
        team_member_id: resolved.team_member.id,
        category_id: resolved.category.as_ref().map(|c| c.id),
        date: window.date,
        end_date: window.end_date,
        start_time: window.start,
        end_time: window.end,
        duration_minutes: window.duration_minutes,
        client_name: resolved.client.name.clone(),
        client_email: resolved.client.email.clone(),
        client_phone: resolved.client.phone.clone(),
        team_member_name: resolved.team_member.name.clone(),
        category_name: resolved.category.as_ref().map(|c| c.name.clone()),
        // Service snapshots are recorded for display even when a package's
        // duration/price take precedence.
        services: resolved.services.iter().map(ServiceSnapshot::from).collect(),
        package: resolved.package.as_ref().map(PackageSnapshot::from),
        total_price,
        discount,
        final_price: final_price(id, total_price, discount),
        currency: currency.to_string(),
        status: AppointmentStatus::Pending,
        is_deleted: false,
        created_by: actor,
        updated_by: None,
        created_at: now,
        updated_at: now,
    }
}
