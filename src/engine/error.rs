use ulid::Ulid;

use crate::model::VenueTime;

/// Every way a booking operation can be refused. The first five are
/// recoverable, user-facing conditions that adapters map to distinct
/// messages; `WalError` is an infrastructure failure and is propagated
/// unchanged.
#[derive(Debug)]
pub enum EngineError {
    /// End is not after start.
    InvalidInterval { start: VenueTime, end: VenueTime },
    /// Start is before the caller-supplied current time.
    PastStartTime(VenueTime),
    /// Overlaps the reservation with this id.
    SlotUnavailable(Ulid),
    /// Resource id does not exist, or the resource is inactive.
    UnknownResource(Ulid),
    /// No reservation with this id.
    UnknownReservation(Ulid),
    /// Caller's contact does not belong to an administrator.
    NotAdmin,
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: end {end} is not after start {start}")
            }
            EngineError::PastStartTime(start) => {
                write!(f, "start time {start} is in the past")
            }
            EngineError::SlotUnavailable(id) => {
                write!(f, "slot unavailable: overlaps reservation {id}")
            }
            EngineError::UnknownResource(id) => {
                write!(f, "unknown or inactive resource: {id}")
            }
            EngineError::UnknownReservation(id) => write!(f, "unknown reservation: {id}"),
            EngineError::NotAdmin => write!(f, "caller is not an administrator"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
