mod ledger;

pub use ledger::Ledger;

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard, RwLock};
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("booking not found: {0}")]
    NotFound(Ulid),
    #[error("booking {0} is not active")]
    NotActive(Ulid),
    #[error("arrival must be strictly before departure")]
    BadRange,
    #[error("overlaps active booking {0}")]
    Conflict(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable booking collection with atomic conditional writes.
///
/// `insert_if_no_overlap` and `update_if_no_overlap` evaluate the overlap guard
/// and commit in one step: no other writer can commit between the check and the
/// write, and no reader can observe a state where the guard was bypassed.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get(&self, id: Ulid) -> Result<Booking, StoreError>;

    /// All bookings, any status, ordered by arrival then id.
    async fn list_all(&self) -> Result<Vec<Booking>, StoreError>;

    async fn list_by_guest_email(&self, email: &str) -> Result<Vec<Booking>, StoreError>;

    /// Active bookings overlapping `period`, ascending by arrival.
    async fn find_overlapping(
        &self,
        period: Stay,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Active stays intersecting `period`, ascending by arrival, from one snapshot.
    async fn active_stays(&self, period: Stay) -> Result<Vec<Stay>, StoreError>;

    async fn insert_if_no_overlap(&self, new: NewBooking) -> Result<Booking, StoreError>;

    /// Merge `patch` over the stored booking and commit it unless the merged stay
    /// overlaps another active booking. Only active bookings can be updated.
    async fn update_if_no_overlap(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, StoreError>;

    /// Flip status to cancelled. Cancelling a cancelled booking writes nothing.
    /// The flag is `true` only for the call that flipped the status.
    async fn cancel(&self, id: Ulid) -> Result<(Booking, bool), StoreError>;
}

// ── WAL writer task ──────────────────────────────────────

enum WalCommand {
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

/// Owns the WAL so blocking file I/O stays off the request tasks.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let flush_start = std::time::Instant::now();
                let result = wal.append(&event);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                let _ = response.send(result);
            }
            WalCommand::Compact { events, response } => {
                let result = Wal::write_compact_file(wal.path(), &events)
                    .and_then(|()| wal.swap_compact_file());
                let _ = response.send(result);
            }
            WalCommand::AppendsSinceCompact { response } => {
                let _ = response.send(wal.appends_since_compact());
            }
        }
    }
}

/// The durable store: a `Ledger` behind an `RwLock`, persisted through a WAL.
///
/// Writers serialize on `writer` and hold it from guard evaluation through
/// fsync and apply, so that mutex is the store's serializable transaction.
/// The ledger write lock is taken only to apply an already durable event, so
/// readers are never blocked behind an fsync and see committed state only.
/// One process per WAL file.
pub struct WalStore {
    ledger: RwLock<Ledger>,
    writer: Mutex<()>,
    wal_tx: mpsc::Sender<WalCommand>,
    path: PathBuf,
}

impl WalStore {
    /// Replay the WAL at `path` and start the background writer.
    /// Must be called inside a tokio runtime.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let replay = Wal::replay(&path)?;
        if replay.discarded > 0 {
            warn!(
                "discarding {} trailing bytes of {}",
                replay.discarded,
                path.display()
            );
        }
        let wal = Wal::open(&path, replay.valid_len)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut ledger = Ledger::new();
        for event in &replay.events {
            ledger.apply(event);
        }
        info!(
            "opened {}: {} bookings ({} active) from {} events",
            path.display(),
            ledger.len(),
            ledger.active_count(),
            replay.events.len()
        );

        Ok(Self {
            ledger: RwLock::new(ledger),
            writer: Mutex::new(()),
            wal_tx,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// WAL first, then ledger. A failed append leaves the ledger untouched.
    /// Taking the writer guard keeps every commit inside a writer's critical section.
    async fn commit(
        &self,
        _writer: &MutexGuard<'_, ()>,
        event: &Event,
    ) -> Result<(), StoreError> {
        self.wal_append(event).await?;
        self.ledger.write().await.apply(event);
        Ok(())
    }

    /// The recorded calendar range `[first, last)`, if any.
    pub async fn calendar_seed(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.ledger.read().await.calendar()
    }

    /// Record `[first, last)` as the calendar universe unless one is already
    /// recorded. Returns whichever range is in effect.
    pub async fn seed_calendar_if_empty(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<(NaiveDate, NaiveDate), StoreError> {
        let writer = self.writer.lock().await;
        if let Some(existing) = self.ledger.read().await.calendar() {
            return Ok(existing);
        }
        let event = Event::CalendarSeeded { first, last };
        self.commit(&writer, &event).await?;
        info!("seeded calendar {first}..{last}");
        Ok((first, last))
    }

    /// Rewrite the WAL as the minimal event list for the current state.
    /// Holds `writer` throughout so no append interleaves with the swap.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let events = self.ledger.read().await.snapshot_events();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
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

fn check_shape(guest_email: &str, guest_name: &str, stay: &Stay) -> Result<(), StoreError> {
    use crate::limits::*;
    if guest_email.len() as u64 > MAX_EMAIL_LEN {
        return Err(StoreError::LimitExceeded("guest email too long"));
    }
    if guest_name.len() as u64 > MAX_NAME_LEN {
        return Err(StoreError::LimitExceeded("guest name too long"));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(StoreError::LimitExceeded("stay too long"));
    }
    Ok(())
}

#[async_trait]
impl BookingStore for WalStore {
    async fn get(&self, id: Ulid) -> Result<Booking, StoreError> {
        self.ledger
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.ledger.read().await.sorted())
    }

    async fn list_by_guest_email(&self, email: &str) -> Result<Vec<Booking>, StoreError> {
        let mut all = self.ledger.read().await.sorted();
        all.retain(|b| b.guest_email == email);
        Ok(all)
    }

    async fn find_overlapping(
        &self,
        period: Stay,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError> {
        let guard = self.ledger.read().await;
        Ok(guard
            .overlapping(&period, exclude)
            .filter_map(|id| guard.get(&id).cloned())
            .collect())
    }

    async fn active_stays(&self, period: Stay) -> Result<Vec<Stay>, StoreError> {
        Ok(self.ledger.read().await.active_stays(&period))
    }

    async fn insert_if_no_overlap(&self, new: NewBooking) -> Result<Booking, StoreError> {
        check_shape(&new.guest_email, &new.guest_name, &new.stay)?;
        let writer = self.writer.lock().await;
        if let Some(holder) = self.ledger.read().await.overlapping(&new.stay, None).next() {
            return Err(StoreError::Conflict(holder));
        }

        let now = Utc::now();
        let booking = Booking {
            id: Ulid::new(),
            guest_email: new.guest_email,
            guest_name: new.guest_name,
            stay: new.stay,
            status: BookingStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let event = Event::BookingCreated { booking: booking.clone() };
        self.commit(&writer, &event).await?;
        Ok(booking)
    }

    async fn update_if_no_overlap(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, StoreError> {
        let writer = self.writer.lock().await;
        let event = {
            let ledger = self.ledger.read().await;
            let current = ledger.get(&id).ok_or(StoreError::NotFound(id))?;
            if !current.is_active() {
                return Err(StoreError::NotActive(id));
            }
            let (arrival, departure) = patch.merged_range(&current.stay);
            let stay = Stay::new(arrival, departure).ok_or(StoreError::BadRange)?;
            let guest_email = patch.guest_email.unwrap_or_else(|| current.guest_email.clone());
            let guest_name = patch.guest_name.unwrap_or_else(|| current.guest_name.clone());
            check_shape(&guest_email, &guest_name, &stay)?;

            if let Some(holder) = ledger.overlapping(&stay, Some(id)).next() {
                return Err(StoreError::Conflict(holder));
            }
            Event::BookingUpdated {
                id,
                guest_email,
                guest_name,
                stay,
                updated_at: Utc::now(),
            }
        };
        self.commit(&writer, &event).await?;
        self.get(id).await
    }

    async fn cancel(&self, id: Ulid) -> Result<(Booking, bool), StoreError> {
        let writer = self.writer.lock().await;
        let current = self.get(id).await?;
        if !current.is_active() {
            return Ok((current, false));
        }
        let event = Event::BookingCancelled {
            id,
            updated_at: Utc::now(),
        };
        self.commit(&writer, &event).await?;
        Ok((self.get(id).await?, true))
    }
}
