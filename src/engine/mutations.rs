use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{RwLock, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::auth::AdminContext;
use crate::limits::*;
use crate::model::*;

use super::conflict::{check_not_past, check_slot_free, validate_interval};
use super::{Engine, EngineError, WalCommand};

fn validate_reservee_input(name: &str, contact: &Contact) -> Result<(), EngineError> {
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("reservee name too long"));
    }
    if contact.value().is_empty() {
        return Err(EngineError::LimitExceeded("contact required"));
    }
    if contact.value().len() > MAX_CONTACT_LEN {
        return Err(EngineError::LimitExceeded("contact too long"));
    }
    Ok(())
}

impl Engine {
    /// Register a new computer. Administrative; the generated id is returned.
    pub async fn add_resource(
        &self,
        admin: &AdminContext,
        name: String,
        specs: Option<String>,
    ) -> Result<Ulid, EngineError> {
        if self.ledger.resource_count() >= MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        if name.is_empty() {
            return Err(EngineError::LimitExceeded("resource name required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("resource name too long"));
        }
        if let Some(ref s) = specs {
            if s.len() > MAX_SPECS_LEN {
                return Err(EngineError::LimitExceeded("resource specs too long"));
            }
        }

        let id = Ulid::new();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let event = Event::ResourceAdded {
            id,
            seq,
            name: name.clone(),
            specs: specs.clone(),
        };
        self.wal_append(&event).await?;
        let rs = ResourceState::new(id, seq, name.clone(), specs);
        self.ledger.insert_resource(id, Arc::new(RwLock::new(rs)));
        self.notify.send(id, &event);

        metrics::gauge!(crate::observability::RESOURCES_ACTIVE).increment(1.0);
        info!(admin = %admin.reservee_id(), resource = %id, name = %name, "resource added");
        Ok(id)
    }

    /// Soft-delete or reactivate a computer. Inactive resources are hidden
    /// from booking but keep their reservation history. Setting the current
    /// state again is a no-op.
    pub async fn set_resource_active(
        &self,
        admin: &AdminContext,
        id: Ulid,
        active: bool,
    ) -> Result<(), EngineError> {
        let rs = self
            .ledger
            .get_resource(&id)
            .ok_or(EngineError::UnknownResource(id))?;
        let mut guard = rs.write().await;
        if guard.active == active {
            return Ok(());
        }

        let event = Event::ResourceActiveSet { id, active };
        self.persist_and_apply(id, &mut guard, &event).await?;

        let gauge = metrics::gauge!(crate::observability::RESOURCES_ACTIVE);
        if active {
            gauge.increment(1.0);
        } else {
            gauge.decrement(1.0);
        }
        info!(admin = %admin.reservee_id(), resource = %id, active, "resource active flag set");
        Ok(())
    }

    /// Seed (or fetch) the administrator account for `contact`. Bootstrap
    /// path used at install time, before any `AdminContext` can exist.
    pub async fn ensure_admin(
        &self,
        name: String,
        contact: Contact,
    ) -> Result<Reservee, EngineError> {
        validate_reservee_input(&name, &contact)?;
        let mut table = self.ledger.reservees().write().await;
        if let Some(existing) = table.find_by_contact(&contact) {
            return Ok(existing.clone());
        }
        let reservee = Reservee {
            id: Ulid::new(),
            name,
            contact,
            is_admin: true,
        };
        let event = Event::ReserveeCreated {
            id: reservee.id,
            name: reservee.name.clone(),
            contact: reservee.contact.clone(),
            is_admin: true,
        };
        self.wal_append(&event).await?;
        table.insert(reservee.clone());
        info!(reservee = %reservee.id, "administrator seeded");
        Ok(reservee)
    }

    /// The guarded creation path. Everything is re-validated here, at commit
    /// time, under the resource's write lock: interval shape, the past check
    /// against the caller's `now`, and the overlap scan. An earlier
    /// `is_available` answer is worthless by the time this runs — other
    /// bookings may have landed in between.
    pub async fn create_reservation(
        &self,
        name: &str,
        contact: &Contact,
        resource_id: Ulid,
        start: VenueTime,
        end: VenueTime,
        now: VenueTime,
    ) -> Result<ReservationInfo, EngineError> {
        let span = validate_interval(start, end)?;
        check_not_past(&span, now)?;
        validate_reservee_input(name, contact)?;

        let rs = self
            .ledger
            .get_resource(&resource_id)
            .ok_or(EngineError::UnknownResource(resource_id))?;
        let mut guard = rs.write().await;
        if !guard.active {
            return Err(EngineError::UnknownResource(resource_id));
        }
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many reservations on resource"));
        }
        if let Err(e) = check_slot_free(&guard, &span) {
            metrics::counter!(crate::observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        // Find-or-create stays inside the guarded section. Lock order is
        // always resource → reservee table.
        let reservee = self.upsert_reservee(name, contact).await?;

        let id = Ulid::new();
        let event = Event::ReservationBooked {
            id,
            resource_id,
            reservee_id: reservee.id,
            span,
            created_at: now,
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::RESERVATIONS_CREATED_TOTAL).increment(1);
        info!(
            reservation = %id,
            resource = %resource_id,
            reservee = %reservee.id,
            start = %span.start,
            end = %span.end,
            "reservation created"
        );
        Ok(ReservationInfo {
            id,
            resource_id,
            reservee_id: reservee.id,
            span,
            created_at: now,
        })
    }

    /// Find a reservee by contact or create one. The table's write lock is
    /// held across the WAL append, so two concurrent first-time bookers with
    /// the same contact end up sharing one row.
    async fn upsert_reservee(
        &self,
        name: &str,
        contact: &Contact,
    ) -> Result<Reservee, EngineError> {
        let mut table = self.ledger.reservees().write().await;
        if let Some(existing) = table.find_by_contact(contact) {
            return Ok(existing.clone());
        }
        let reservee = Reservee {
            id: Ulid::new(),
            name: name.to_string(),
            contact: contact.clone(),
            is_admin: false,
        };
        let event = Event::ReserveeCreated {
            id: reservee.id,
            name: reservee.name.clone(),
            contact: reservee.contact.clone(),
            is_admin: false,
        };
        self.wal_append(&event).await?;
        table.insert(reservee.clone());
        Ok(reservee)
    }

    /// Administrative cancellation — the only way out of `Confirmed`.
    /// Returns the resource the reservation was on.
    pub async fn delete_reservation(
        &self,
        admin: &AdminContext,
        id: Ulid,
    ) -> Result<Ulid, EngineError> {
        let (resource_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let event = Event::ReservationDeleted { id, resource_id };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::RESERVATIONS_DELETED_TOTAL).increment(1);
        info!(admin = %admin.reservee_id(), reservation = %id, resource = %resource_id, "reservation deleted");
        Ok(resource_id)
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        {
            let table = self.ledger.reservees().read().await;
            for r in table.iter() {
                events.push(Event::ReserveeCreated {
                    id: r.id,
                    name: r.name.clone(),
                    contact: r.contact.clone(),
                    is_admin: r.is_admin,
                });
            }
        }

        let mut snapshots = Vec::new();
        for rs in self.ledger.resources() {
            let guard = rs.read().await;
            snapshots.push(guard.clone());
        }
        snapshots.sort_by_key(|s| s.seq);

        for s in &snapshots {
            events.push(Event::ResourceAdded {
                id: s.id,
                seq: s.seq,
                name: s.name.clone(),
                specs: s.specs.clone(),
            });
            if !s.active {
                events.push(Event::ResourceActiveSet { id: s.id, active: false });
            }
            for r in &s.reservations {
                events.push(Event::ReservationBooked {
                    id: r.id,
                    resource_id: s.id,
                    reservee_id: r.reservee_id,
                    span: r.span,
                    created_at: r.created_at,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
