use chrono::TimeDelta;

use crate::limits::*;
use crate::model::*;

use super::EngineError;
use super::availability::first_conflict;

/// Turn a raw `[start, end)` pair from an adapter into a validated `Span`.
/// The engine never trusts the adapter's own validation.
pub(crate) fn validate_interval(
    start: VenueTime,
    end: VenueTime,
) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidInterval { start, end });
    }
    let span = Span::new(start, end);
    if span.duration() > TimeDelta::hours(MAX_RESERVATION_HOURS) {
        return Err(EngineError::LimitExceeded("reservation too long"));
    }
    Ok(span)
}

/// No bookings in the past. `now` is supplied by the caller, never read
/// ambiently, so tests can pin the clock.
pub(crate) fn check_not_past(span: &Span, now: VenueTime) -> Result<(), EngineError> {
    if span.start < now {
        return Err(EngineError::PastStartTime(span.start));
    }
    Ok(())
}

/// Commit-time overlap re-check. Must run under the resource's write lock —
/// the gap between an earlier availability check and the insert is exactly
/// where concurrent bookings double-book.
pub(crate) fn check_slot_free(rs: &ResourceState, span: &Span) -> Result<(), EngineError> {
    match first_conflict(rs, span) {
        Some(id) => Err(EngineError::SlotUnavailable(id)),
        None => Ok(()),
    }
}
