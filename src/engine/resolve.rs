use rust_decimal::Decimal;
use tracing::debug;
use ulid::Ulid;

use crate::limits::MAX_SERVICES_PER_APPOINTMENT;
use crate::model::{Category, Client, Package, Service, TeamMember};

use super::{BookingError, Engine, EntityKind};

/// Everything a booking references, fetched fresh and validated: entities
/// are active, non-deleted, and (when a business scope is given) owned by
/// that business.
#[derive(Debug, Clone)]
pub struct ResolvedEntities {
    pub client: Client,
    pub team_member: TeamMember,
    pub category: Option<Category>,
    pub services: Vec<Service>,
    pub package: Option<Package>,
    /// Sum of service durations, or the package's duration when present.
    pub total_duration: u32,
    /// Sum of service prices, or the package's price when present.
    pub total_price: Decimal,
}

fn check_tenant(
    kind: EntityKind,
    id: Ulid,
    owner: Ulid,
    business_id: Option<Ulid>,
) -> Result<(), BookingError> {
    match business_id {
        Some(b) if b != owner => Err(BookingError::TenantMismatch(kind, id)),
        _ => Ok(()),
    }
}

impl Engine {
    pub(crate) fn resolve_client(
        &self,
        id: Ulid,
        business_id: Option<Ulid>,
    ) -> Result<Client, BookingError> {
        let client = self
            .store
            .clients
            .get(&id)
            .map(|e| e.value().clone())
            .filter(|c| !c.is_deleted)
            .ok_or(BookingError::NotFound(EntityKind::Client, id))?;
        check_tenant(EntityKind::Client, id, client.business_id, business_id)?;
        Ok(client)
    }

    pub(crate) fn resolve_team_member(
        &self,
        id: Ulid,
        business_id: Option<Ulid>,
    ) -> Result<TeamMember, BookingError> {
        let team_member = self
            .store
            .team_members
            .get(&id)
            .map(|e| e.value().clone())
            .filter(|t| t.is_active && !t.is_deleted)
            .ok_or(BookingError::NotFound(EntityKind::TeamMember, id))?;
        check_tenant(EntityKind::TeamMember, id, team_member.business_id, business_id)?;
        Ok(team_member)
    }

    pub(crate) fn resolve_category(
        &self,
        id: Ulid,
        business_id: Option<Ulid>,
    ) -> Result<Category, BookingError> {
        let category = self
            .store
            .categories
            .get(&id)
            .map(|e| e.value().clone())
            .filter(|c| c.is_active && !c.is_deleted)
            .ok_or(BookingError::NotFound(EntityKind::Category, id))?;
        check_tenant(EntityKind::Category, id, category.business_id, business_id)?;
        Ok(category)
    }

    pub(crate) fn resolve_package(
        &self,
        id: Ulid,
        business_id: Option<Ulid>,
    ) -> Result<Package, BookingError> {
        let package = self
            .store
            .packages
            .get(&id)
            .map(|e| e.value().clone())
            .filter(|p| p.is_active && !p.is_deleted)
            .ok_or(BookingError::NotFound(EntityKind::Package, id))?;
        check_tenant(EntityKind::Package, id, package.business_id, business_id)?;
        Ok(package)
    }

    /// Direct lookups first; IDs absent from the service collection fall
    /// back to one pass over the business's category service entries.
    /// Anything still missing is a resolution failure, never a silent skip.
    pub(crate) fn resolve_services(
        &self,
        ids: &[Ulid],
        business_id: Option<Ulid>,
        fallback_business: Ulid,
    ) -> Result<Vec<Service>, BookingError> {
        if ids.len() > MAX_SERVICES_PER_APPOINTMENT {
            return Err(BookingError::LimitExceeded("too many services on one appointment"));
        }
        let mut resolved = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for &id in ids {
            match self.store.services.get(&id).map(|e| e.value().clone()) {
                Some(s) if s.is_active && !s.is_deleted => {
                    check_tenant(EntityKind::Service, id, s.business_id, business_id)?;
                    resolved.push(s);
                }
                _ => missing.push(id),
            }
        }
        if !missing.is_empty() {
            let scope = business_id.unwrap_or(fallback_business);
            self.resolve_from_category_tree(scope, &mut resolved, &mut missing);
        }
        if !missing.is_empty() {
            return Err(BookingError::ServicesUnresolved { missing });
        }
        Ok(resolved)
    }

    /// Secondary strategy: scan the business's categories once for global
    /// service entries matching the still-missing IDs.
    fn resolve_from_category_tree(
        &self,
        business_id: Ulid,
        resolved: &mut Vec<Service>,
        missing: &mut Vec<Ulid>,
    ) {
        for entry in self.store.categories.iter() {
            let category = entry.value();
            if category.business_id != business_id || category.is_deleted {
                continue;
            }
            missing.retain(|id| {
                let found = category
                    .services
                    .iter()
                    .find(|s| s.id == *id && s.is_active && !s.is_deleted);
                match found {
                    Some(s) => {
                        debug!(service = %id, category = %category.id, "service resolved via category tree");
                        resolved.push(s.clone());
                        false
                    }
                    None => true,
                }
            });
            if missing.is_empty() {
                break;
            }
        }
    }

    /// Fetch and validate every entity a booking references, and aggregate
    /// the derived duration/price totals.
    pub fn resolve_entities(
        &self,
        client_id: Ulid,
        team_member_id: Ulid,
        category_id: Option<Ulid>,
        service_ids: &[Ulid],
        package_id: Option<Ulid>,
        business_id: Option<Ulid>,
    ) -> Result<ResolvedEntities, BookingError> {
        let client = self.resolve_client(client_id, business_id)?;
        let team_member = self.resolve_team_member(team_member_id, business_id)?;
        let category = category_id
            .map(|id| self.resolve_category(id, business_id))
            .transpose()?;
        let services = self.resolve_services(service_ids, business_id, team_member.business_id)?;
        let package = package_id
            .map(|id| self.resolve_package(id, business_id))
            .transpose()?;

        // Tenant isolation holds even without an explicit scope: the client
        // and the team member must share a business.
        if client.business_id != team_member.business_id {
            return Err(BookingError::TenantMismatch(EntityKind::Client, client_id));
        }

        let (total_duration, total_price) = match &package {
            // Package values are authoritative when one is booked.
            Some(p) => (p.duration_minutes, p.price),
            None => services.iter().fold((0u32, Decimal::ZERO), |(d, p), s| {
                (d + s.duration_minutes, p + s.price)
            }),
        };

        Ok(ResolvedEntities {
            client,
            team_member,
            category,
            services,
            package,
            total_duration,
            total_price,
        })
    }
}
