use std::fmt;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Venue-local wall-clock time — the only time type. The club has no
/// timezone concept: every timestamp is naive and read on the venue clock.
pub type VenueTime = chrono::NaiveDateTime;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: VenueTime,
    pub end: VenueTime,
}

impl Span {
    pub fn new(start: VenueTime, end: VenueTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[allow(dead_code)]
    pub fn contains_instant(&self, t: VenueTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// How a reservee can be reached. Exactly one channel — a walk-in customer
/// books by phone number, a chat user by their chat identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contact {
    Phone(String),
    Chat(String),
}

impl Contact {
    pub fn value(&self) -> &str {
        match self {
            Contact::Phone(v) | Contact::Chat(v) => v,
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contact::Phone(v) => write!(f, "phone:{v}"),
            Contact::Chat(v) => write!(f, "chat:{v}"),
        }
    }
}

/// A person who books computers. Created on first booking or pre-seeded as
/// an administrator; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservee {
    pub id: Ulid,
    pub name: String,
    pub contact: Contact,
    pub is_admin: bool,
}

/// A confirmed reservation as stored on its resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRecord {
    pub id: Ulid,
    pub reservee_id: Ulid,
    pub span: Span,
    pub created_at: VenueTime,
}

/// One bookable computer plus its confirmed reservations.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: Ulid,
    /// Creation sequence number — listing order is creation order.
    pub seq: u64,
    pub name: String,
    /// Free-text hardware description shown to customers.
    pub specs: Option<String>,
    /// Inactive resources are hidden from booking but keep their history.
    pub active: bool,
    /// Reservations sorted by `span.start`.
    pub reservations: Vec<BookingRecord>,
}

impl ResourceState {
    pub fn new(id: Ulid, seq: u64, name: String, specs: Option<String>) -> Self {
        Self {
            id,
            seq,
            name,
            specs,
            active: true,
            reservations: Vec::new(),
        }
    }

    /// Insert a record maintaining sort order by span.start.
    pub fn insert_record(&mut self, record: BookingRecord) {
        let pos = self
            .reservations
            .binary_search_by_key(&record.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, record);
    }

    /// Remove a record by reservation id.
    pub fn remove_record(&mut self, id: Ulid) -> Option<BookingRecord> {
        if let Some(pos) = self.reservations.iter().position(|r| r.id == id) {
            Some(self.reservations.remove(pos))
        } else {
            None
        }
    }

    /// Return only records whose span overlaps the query window.
    /// Binary search skips records starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &BookingRecord> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceAdded {
        id: Ulid,
        seq: u64,
        name: String,
        specs: Option<String>,
    },
    ResourceActiveSet {
        id: Ulid,
        active: bool,
    },
    ReserveeCreated {
        id: Ulid,
        name: String,
        contact: Contact,
        is_admin: bool,
    },
    ReservationBooked {
        id: Ulid,
        resource_id: Ulid,
        reservee_id: Ulid,
        span: Span,
        created_at: VenueTime,
    },
    ReservationDeleted {
        id: Ulid,
        resource_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: Ulid,
    pub name: String,
    pub specs: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationInfo {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub reservee_id: Ulid,
    pub span: Span,
    pub created_at: VenueTime,
}
