//! lanbook — time-slot reservation engine for a club of shared computers.
//!
//! Customers book a half-open interval `[start, end)` on one machine; the
//! engine guarantees no two reservations on the same machine overlap, with
//! back-to-back bookings explicitly allowed. State lives in memory behind
//! per-resource locks and is made durable by an append-only, group-committed
//! WAL. Presentation adapters (web form, chat bot) are external: they parse
//! raw input, then call the typed API here — which re-validates everything
//! at commit time anyway.

pub mod auth;
pub mod compactor;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;
