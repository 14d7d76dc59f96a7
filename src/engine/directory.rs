use ulid::Ulid;

use crate::limits::MAX_NAME_LEN;
use crate::model::{Category, Client, Event, Package, Service, TeamMember};

use super::{BookingError, Engine, EntityKind};

fn check_name(name: &str) -> Result<(), BookingError> {
    if name.len() > MAX_NAME_LEN {
        return Err(BookingError::LimitExceeded("name too long"));
    }
    Ok(())
}

/// Reference-data writes: enough persistence for the scheduling core to own
/// its inputs (and for replay to reconstruct them). Rich profile management
/// stays with the calling layer.
impl Engine {
    pub async fn create_client(&self, client: Client) -> Result<(), BookingError> {
        check_name(&client.name)?;
        if self.store.clients.contains_key(&client.id) {
            return Err(BookingError::AlreadyExists(EntityKind::Client, client.id));
        }
        self.append_and_apply(Event::ClientCreated { client }).await
    }

    /// Soft delete; past appointments keep their snapshots.
    pub async fn remove_client(&self, id: Ulid) -> Result<(), BookingError> {
        if !self.store.clients.contains_key(&id) {
            return Err(BookingError::NotFound(EntityKind::Client, id));
        }
        self.append_and_apply(Event::ClientRemoved { id }).await
    }

    pub async fn create_team_member(&self, team_member: TeamMember) -> Result<(), BookingError> {
        check_name(&team_member.name)?;
        if self.store.team_members.contains_key(&team_member.id) {
            return Err(BookingError::AlreadyExists(EntityKind::TeamMember, team_member.id));
        }
        self.append_and_apply(Event::TeamMemberCreated { team_member }).await
    }

    /// Inactive team members keep their calendar but accept no bookings.
    pub async fn deactivate_team_member(&self, id: Ulid) -> Result<(), BookingError> {
        if !self.store.team_members.contains_key(&id) {
            return Err(BookingError::NotFound(EntityKind::TeamMember, id));
        }
        self.append_and_apply(Event::TeamMemberDeactivated { id }).await
    }

    pub async fn remove_team_member(&self, id: Ulid) -> Result<(), BookingError> {
        if !self.store.team_members.contains_key(&id) {
            return Err(BookingError::NotFound(EntityKind::TeamMember, id));
        }
        self.append_and_apply(Event::TeamMemberRemoved { id }).await
    }

    pub async fn create_category(&self, category: Category) -> Result<(), BookingError> {
        check_name(&category.name)?;
        if self.store.categories.contains_key(&category.id) {
            return Err(BookingError::AlreadyExists(EntityKind::Category, category.id));
        }
        self.append_and_apply(Event::CategoryCreated { category }).await
    }

    pub async fn deactivate_category(&self, id: Ulid) -> Result<(), BookingError> {
        if !self.store.categories.contains_key(&id) {
            return Err(BookingError::NotFound(EntityKind::Category, id));
        }
        self.append_and_apply(Event::CategoryDeactivated { id }).await
    }

    pub async fn create_service(&self, service: Service) -> Result<(), BookingError> {
        check_name(&service.name)?;
        if self.store.services.contains_key(&service.id) {
            return Err(BookingError::AlreadyExists(EntityKind::Service, service.id));
        }
        self.append_and_apply(Event::ServiceCreated { service }).await
    }

    pub async fn deactivate_service(&self, id: Ulid) -> Result<(), BookingError> {
        if !self.store.services.contains_key(&id) {
            return Err(BookingError::NotFound(EntityKind::Service, id));
        }
        self.append_and_apply(Event::ServiceDeactivated { id }).await
    }

    pub async fn remove_service(&self, id: Ulid) -> Result<(), BookingError> {
        if !self.store.services.contains_key(&id) {
            return Err(BookingError::NotFound(EntityKind::Service, id));
        }
        self.append_and_apply(Event::ServiceRemoved { id }).await
    }

    pub async fn create_package(&self, package: Package) -> Result<(), BookingError> {
        check_name(&package.name)?;
        if self.store.packages.contains_key(&package.id) {
            return Err(BookingError::AlreadyExists(EntityKind::Package, package.id));
        }
        self.append_and_apply(Event::PackageCreated { package }).await
    }

    pub async fn deactivate_package(&self, id: Ulid) -> Result<(), BookingError> {
        if !self.store.packages.contains_key(&id) {
            return Err(BookingError::NotFound(EntityKind::Package, id));
        }
        self.append_and_apply(Event::PackageDeactivated { id }).await
    }
}
