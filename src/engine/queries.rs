use ulid::Ulid;

use crate::auth::AdminContext;
use crate::model::*;

use super::availability::slot_free;
use super::conflict::validate_interval;
use super::{Engine, EngineError};

fn info_of(rs: &ResourceState) -> ResourceInfo {
    ResourceInfo {
        id: rs.id,
        name: rs.name.clone(),
        specs: rs.specs.clone(),
        active: rs.active,
    }
}

fn reservation_of(resource_id: Ulid, r: &BookingRecord) -> ReservationInfo {
    ReservationInfo {
        id: r.id,
        resource_id,
        reservee_id: r.reservee_id,
        span: r.span,
        created_at: r.created_at,
    }
}

impl Engine {
    /// Availability probe for one resource. True iff no existing reservation
    /// overlaps `[start, end)` under the strict half-open rule; a resource
    /// with zero reservations is free. The answer is advisory — the creation
    /// path re-checks under the write lock.
    pub async fn is_available(
        &self,
        resource_id: Ulid,
        start: VenueTime,
        end: VenueTime,
    ) -> Result<bool, EngineError> {
        let span = validate_interval(start, end)?;
        let rs = self
            .ledger
            .get_resource(&resource_id)
            .ok_or(EngineError::UnknownResource(resource_id))?;
        let guard = rs.read().await;
        if !guard.active {
            return Err(EngineError::UnknownResource(resource_id));
        }
        Ok(slot_free(&guard, &span))
    }

    /// Every active resource free for the interval, in creation order.
    pub async fn available_resources(
        &self,
        start: VenueTime,
        end: VenueTime,
    ) -> Result<Vec<ResourceInfo>, EngineError> {
        let span = validate_interval(start, end)?;
        let mut hits = Vec::new();
        for rs in self.ledger.resources() {
            let guard = rs.read().await;
            if guard.active && slot_free(&guard, &span) {
                hits.push((guard.seq, info_of(&guard)));
            }
        }
        hits.sort_by_key(|(seq, _)| *seq);
        Ok(hits.into_iter().map(|(_, info)| info).collect())
    }

    /// Active resources in creation order — the public listing.
    pub async fn list_resources(&self) -> Vec<ResourceInfo> {
        self.collect_resources(false).await
    }

    /// All resources including deactivated ones — the admin panel listing.
    pub async fn list_all_resources(&self, _admin: &AdminContext) -> Vec<ResourceInfo> {
        self.collect_resources(true).await
    }

    async fn collect_resources(&self, include_inactive: bool) -> Vec<ResourceInfo> {
        let mut out = Vec::new();
        for rs in self.ledger.resources() {
            let guard = rs.read().await;
            if include_inactive || guard.active {
                out.push((guard.seq, info_of(&guard)));
            }
        }
        out.sort_by_key(|(seq, _)| *seq);
        out.into_iter().map(|(_, info)| info).collect()
    }

    /// A resource's reservations, ascending by start. Works on inactive
    /// resources too — history outlives deactivation.
    pub async fn reservations_for_resource(
        &self,
        resource_id: Ulid,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let rs = self
            .ledger
            .get_resource(&resource_id)
            .ok_or(EngineError::UnknownResource(resource_id))?;
        let guard = rs.read().await;
        Ok(guard
            .reservations
            .iter()
            .map(|r| reservation_of(resource_id, r))
            .collect())
    }

    /// A reservee's bookings across all resources, ascending by start.
    /// Unknown contacts simply have no bookings.
    pub async fn reservations_for_contact(&self, contact: &Contact) -> Vec<ReservationInfo> {
        let reservee_id = {
            let table = self.ledger.reservees().read().await;
            match table.find_by_contact(contact) {
                Some(r) => r.id,
                None => return Vec::new(),
            }
        };
        let mut out = Vec::new();
        for rs in self.ledger.resources() {
            let guard = rs.read().await;
            for r in &guard.reservations {
                if r.reservee_id == reservee_id {
                    out.push(reservation_of(guard.id, r));
                }
            }
        }
        out.sort_by_key(|r| r.span.start);
        out
    }

    /// Every reservation at the venue, newest start first — the admin panel.
    pub async fn all_reservations(&self, _admin: &AdminContext) -> Vec<ReservationInfo> {
        let mut out = Vec::new();
        for rs in self.ledger.resources() {
            let guard = rs.read().await;
            for r in &guard.reservations {
                out.push(reservation_of(guard.id, r));
            }
        }
        out.sort_by(|a, b| b.span.start.cmp(&a.span.start));
        out
    }

    /// Verify that `contact` belongs to an administrator and mint the
    /// capability that administrative operations require.
    pub async fn authorize_admin(&self, contact: &Contact) -> Result<AdminContext, EngineError> {
        let table = self.ledger.reservees().read().await;
        match table.find_by_contact(contact) {
            Some(r) if r.is_admin => Ok(AdminContext::new(r.id)),
            _ => Err(EngineError::NotAdmin),
        }
    }

    pub async fn find_reservee(&self, contact: &Contact) -> Option<Reservee> {
        self.ledger
            .reservees()
            .read()
            .await
            .find_by_contact(contact)
            .cloned()
    }

    pub async fn get_reservee(&self, id: &Ulid) -> Option<Reservee> {
        self.ledger.reservees().read().await.get(id).cloned()
    }
}
