use ulid::Ulid;

use crate::model::*;

// ── Availability core ─────────────────────────────────────────────

/// First existing reservation on `rs` whose span overlaps `candidate`.
///
/// Overlap is strict half-open: `r.start < candidate.end && r.end >
/// candidate.start`. A reservation ending exactly when the candidate starts
/// (or vice versa) is NOT a conflict — back-to-back bookings are the point
/// of the half-open convention.
pub fn first_conflict(rs: &ResourceState, candidate: &Span) -> Option<Ulid> {
    rs.overlapping(candidate).map(|r| r.id).next()
}

/// True iff `candidate` collides with no existing reservation on `rs`.
/// A resource with zero reservations is always free.
pub fn slot_free(rs: &ResourceState, candidate: &Span) -> bool {
    first_conflict(rs, candidate).is_none()
}
