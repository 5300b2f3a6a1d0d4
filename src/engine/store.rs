use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::SharedResourceState;

/// In-memory half of the booking ledger. Exclusively owns every persisted
/// entity; the engine is a decision layer over it and durability comes from
/// replaying the WAL. Resources live behind per-resource locks, reservees
/// behind one table lock so find-or-create stays atomic.
pub struct Ledger {
    resources: DashMap<Ulid, SharedResourceState>,
    /// Reverse lookup: reservation id → resource id, for administrative deletes.
    reservation_index: DashMap<Ulid, Ulid>,
    reservees: RwLock<ReserveeTable>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            reservation_index: DashMap::new(),
            reservees: RwLock::new(ReserveeTable::default()),
        }
    }

    // ── Resources ────────────────────────────────────────────

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    pub fn insert_resource(&self, id: Ulid, state: SharedResourceState) {
        self.resources.insert(id, state);
    }

    /// Snapshot of every resource handle. Unordered — callers sort by the
    /// creation sequence they read under the lock.
    pub fn resources(&self) -> Vec<SharedResourceState> {
        self.resources.iter().map(|e| e.value().clone()).collect()
    }

    // ── Reservation index ────────────────────────────────────

    pub fn resource_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_index.get(reservation_id).map(|e| *e.value())
    }

    pub fn index_reservation(&self, reservation_id: Ulid, resource_id: Ulid) {
        self.reservation_index.insert(reservation_id, resource_id);
    }

    pub fn unindex_reservation(&self, reservation_id: &Ulid) {
        self.reservation_index.remove(reservation_id);
    }

    // ── Reservees ────────────────────────────────────────────

    pub fn reservees(&self) -> &RwLock<ReserveeTable> {
        &self.reservees
    }
}

/// Reservee rows indexed both ways. Guarded as a whole by the `Ledger`'s
/// async lock: the upsert path holds the write half across its WAL append.
#[derive(Default)]
pub struct ReserveeTable {
    by_id: HashMap<Ulid, Reservee>,
    by_contact: HashMap<Contact, Ulid>,
}

impl ReserveeTable {
    pub fn get(&self, id: &Ulid) -> Option<&Reservee> {
        self.by_id.get(id)
    }

    pub fn find_by_contact(&self, contact: &Contact) -> Option<&Reservee> {
        self.by_contact.get(contact).and_then(|id| self.by_id.get(id))
    }

    pub fn insert(&mut self, reservee: Reservee) {
        self.by_contact.insert(reservee.contact.clone(), reservee.id);
        self.by_id.insert(reservee.id, reservee);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservee> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
