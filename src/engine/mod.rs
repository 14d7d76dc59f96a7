mod assemble;
mod booking;
mod conflict;
mod directory;
mod error;
mod queries;
mod resolve;

pub use booking::{AppointmentPatch, BookingRequest};
pub use error::{BookingError, EntityKind};
pub use resolve::ResolvedEntities;

use std::io;

use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::Event;
use crate::store::{Calendar, Store};
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────────────

pub(crate) enum WalCommand {
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

/// Background task that owns the WAL and batches appends for group commit:
/// block on the first append, drain everything already queued, flush and
/// fsync once for the whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel drained
                    }
                }
                flush_batch(&mut wal, batch);
                if let Some(cmd) = deferred {
                    handle_maintenance(&mut wal, cmd);
                }
            }
            other => handle_maintenance(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut result: io::Result<()> = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    // Flush even after an append error so partially buffered bytes don't
    // leak into the next batch (these callers are told the batch failed).
    let flush = wal.flush_sync();
    if result.is_ok() {
        result = flush;
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_maintenance(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are handled in the main loop"),
    }
}

// ── Transaction scope ────────────────────────────────────────────

/// One booking operation's atomic scope. Holds the write locks for every
/// touched calendar from validation through commit, so a conflict check and
/// its write can never interleave with a competing request for the same
/// team member. Dropping the scope without committing aborts: no writes.
pub(crate) struct Txn {
    guards: Vec<(Ulid, OwnedRwLockWriteGuard<Calendar>)>,
}

impl Txn {
    /// Acquire calendar locks in sorted ID order — deadlock-free when a
    /// reschedule touches two team members.
    pub(crate) async fn begin(engine: &Engine, team_member_ids: &[Ulid]) -> Txn {
        let mut ids = team_member_ids.to_vec();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let cal = engine.store.calendar(id);
            guards.push((id, cal.write_owned().await));
        }
        Txn { guards }
    }

    pub(crate) fn calendar(&self, team_member_id: Ulid) -> &Calendar {
        let (_, guard) = self
            .guards
            .iter()
            .find(|(id, _)| *id == team_member_id)
            .expect("calendar not locked by this transaction");
        guard
    }

    pub(crate) fn calendar_mut(&mut self, team_member_id: Ulid) -> &mut Calendar {
        let (_, guard) = self
            .guards
            .iter_mut()
            .find(|(id, _)| *id == team_member_id)
            .expect("calendar not locked by this transaction");
        guard
    }
}

// ── Engine ───────────────────────────────────────────────────────

/// The scheduling core: in-memory state plus a write-ahead log. One
/// instance serves every business; tenancy is enforced per request.
pub struct Engine {
    pub(crate) store: Store,
    wal_tx: mpsc::Sender<WalCommand>,
    pub(crate) currency: String,
}

impl Engine {
    /// Replay the WAL into memory and start the group-commit writer.
    pub fn new(config: EngineConfig) -> io::Result<Self> {
        let events = Wal::replay(&config.wal_path)?;
        let wal = Wal::open(&config.wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Store::new();
        for event in &events {
            store.apply(event);
        }
        metrics::gauge!(crate::observability::CALENDARS_ACTIVE)
            .set(store.calendar_count() as f64);

        Ok(Self {
            store,
            wal_tx,
            currency: config.currency,
        })
    }

    /// Write one event to the WAL via the background group-commit writer.
    pub(crate) async fn wal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Storage(e.to_string()))
    }

    /// WAL-append + apply for reference-data writes (no calendar locks).
    pub(crate) async fn append_and_apply(&self, event: Event) -> Result<(), BookingError> {
        self.wal_append(&event).await?;
        self.store.apply(&event);
        Ok(())
    }

    /// Commit a booking transaction: the staged event either reaches the
    /// WAL and is applied through the held guards, or nothing happens.
    pub(crate) async fn commit(&self, txn: &mut Txn, event: Event) -> Result<(), BookingError> {
        self.wal_append(&event).await?;
        match &event {
            Event::AppointmentBooked { appointment } => {
                txn.calendar_mut(appointment.team_member_id)
                    .insert(appointment.clone());
                self.store
                    .map_appointment(appointment.id, appointment.team_member_id);
            }
            Event::AppointmentUpdated { appointment } => {
                if let Some(prev) = self.store.team_member_for_appointment(&appointment.id)
                    && prev != appointment.team_member_id
                {
                    txn.calendar_mut(prev).remove(&appointment.id);
                }
                txn.calendar_mut(appointment.team_member_id)
                    .upsert(appointment.clone());
                self.store
                    .map_appointment(appointment.id, appointment.team_member_id);
            }
            Event::AppointmentCancelled {
                id,
                team_member_id,
                updated_by,
                at,
            } => {
                txn.calendar_mut(*team_member_id).cancel(id, *updated_by, *at);
            }
            _ => unreachable!("only appointment events flow through booking transactions"),
        }
        metrics::gauge!(crate::observability::CALENDARS_ACTIVE)
            .set(self.store.calendar_count() as f64);
        Ok(())
    }

    /// Rewrite the WAL with the minimal events recreating current state.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let events = self.store.snapshot_events();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Storage(e.to_string()))
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
