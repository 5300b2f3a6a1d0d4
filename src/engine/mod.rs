mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod slots;
mod store;

pub use availability::{first_conflict, slot_free};
pub use error::EngineError;
pub use slots::{ClubHours, SameDayRounding};
pub use store::{Ledger, ReserveeTable};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The availability engine: a decision layer over the in-memory ledger, plus
/// the guarded write paths. All state lives in `ledger`; durability comes
/// from the WAL behind `wal_tx`.
pub struct Engine {
    pub(super) ledger: Ledger,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Next resource creation sequence number.
    pub(super) next_seq: AtomicU64,
}

/// Apply an event directly to a ResourceState (no locking — caller holds the lock).
fn apply_to_resource(rs: &mut ResourceState, event: &Event, ledger: &Ledger) {
    match event {
        Event::ResourceActiveSet { active, .. } => {
            rs.active = *active;
        }
        Event::ReservationBooked {
            id,
            resource_id,
            reservee_id,
            span,
            created_at,
        } => {
            rs.insert_record(BookingRecord {
                id: *id,
                reservee_id: *reservee_id,
                span: *span,
                created_at: *created_at,
            });
            ledger.index_reservation(*id, *resource_id);
        }
        Event::ReservationDeleted { id, .. } => {
            rs.remove_record(*id);
            ledger.unindex_reservation(id);
        }
        // ResourceAdded/ReserveeCreated are handled at the ledger level, not here
        Event::ResourceAdded { .. } | Event::ReserveeCreated { .. } => {}
    }
}

impl Engine {
    /// Open the engine at `wal_path`, replaying any existing log into memory,
    /// and spawn the group-commit writer.
    pub fn open(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            ledger: Ledger::new(),
            wal_tx,
            notify,
            next_seq: AtomicU64::new(0),
        };

        // Replay events — we're the sole owner of these Arcs and of the
        // reservee table, so try_read/try_write always succeed instantly.
        // Never use blocking_read/blocking_write here because open() may run
        // inside an async context.
        let mut max_seq: Option<u64> = None;
        for event in &events {
            match event {
                Event::ResourceAdded { id, seq, name, specs } => {
                    let rs = ResourceState::new(*id, *seq, name.clone(), specs.clone());
                    engine.ledger.insert_resource(*id, Arc::new(RwLock::new(rs)));
                    max_seq = Some(max_seq.map_or(*seq, |m| m.max(*seq)));
                }
                Event::ReserveeCreated { id, name, contact, is_admin } => {
                    let mut table = engine
                        .ledger
                        .reservees()
                        .try_write()
                        .expect("replay: uncontended write");
                    table.insert(Reservee {
                        id: *id,
                        name: name.clone(),
                        contact: contact.clone(),
                        is_admin: *is_admin,
                    });
                }
                other => {
                    if let Some(resource_id) = event_resource_id(other) {
                        if let Some(rs_arc) = engine.ledger.get_resource(&resource_id) {
                            let mut guard =
                                rs_arc.try_write().expect("replay: uncontended write");
                            apply_to_resource(&mut guard, other, &engine.ledger);
                        }
                    }
                }
            }
        }
        if let Some(m) = max_seq {
            engine.next_seq.store(m + 1, Ordering::Relaxed);
        }

        let active = engine
            .ledger
            .resources()
            .iter()
            .filter(|rs| rs.try_read().map(|g| g.active).unwrap_or(false))
            .count();
        metrics::gauge!(crate::observability::RESOURCES_ACTIVE).set(active as f64);

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append + apply + notify in one call. Eliminates the repeated 3-line pattern.
    pub(super) async fn persist_and_apply(
        &self,
        resource_id: Ulid,
        rs: &mut ResourceState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_resource(rs, event, &self.ledger);
        self.notify.send(resource_id, event);
        Ok(())
    }

    /// Lookup reservation → resource, get resource, acquire write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<ResourceState>), EngineError> {
        let resource_id = self
            .ledger
            .resource_for_reservation(reservation_id)
            .ok_or(EngineError::UnknownReservation(*reservation_id))?;
        let rs = self
            .ledger
            .get_resource(&resource_id)
            .ok_or(EngineError::UnknownResource(resource_id))?;
        let guard = rs.write_owned().await;
        Ok((resource_id, guard))
    }
}

/// Extract the resource_id from a resource-scoped event.
fn event_resource_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ResourceActiveSet { id, .. } => Some(*id),
        Event::ReservationBooked { resource_id, .. }
        | Event::ReservationDeleted { resource_id, .. } => Some(*resource_id),
        Event::ResourceAdded { .. } | Event::ReserveeCreated { .. } => None,
    }
}
