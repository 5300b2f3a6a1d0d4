//! Hard caps on user-supplied input. Oversized input is rejected with
//! `EngineError::LimitExceeded` before it reaches the WAL.

/// Max bytes for a resource or reservee display name.
pub const MAX_NAME_LEN: usize = 50;

/// Max bytes for a resource's free-text hardware description.
pub const MAX_SPECS_LEN: usize = 200;

/// Max bytes for a contact channel value (phone number or chat id).
pub const MAX_CONTACT_LEN: usize = 50;

/// Max bookable computers at one venue.
pub const MAX_RESOURCES: usize = 4096;

/// Max reservation records held on a single resource.
pub const MAX_RESERVATIONS_PER_RESOURCE: usize = 100_000;

/// Max length of a single reservation. A session longer than a full day is
/// operator error, not a booking.
pub const MAX_RESERVATION_HOURS: i64 = 24;
