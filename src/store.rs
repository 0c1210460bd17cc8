use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    /// The insert lost to an existing blocking reservation.
    Overlap { existing: Ulid },
    NotFound(Ulid),
    LimitExceeded(&'static str),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Overlap { existing } => {
                write!(f, "window overlaps reservation {existing}")
            }
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Backend(e) => write!(f, "store backend: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Internal reservation store. `insert` MUST re-validate instructor-window
/// overlap in the same critical section that performs the write — that is
/// the single serialization point preventing double-booking. A backend that
/// checks and inserts in two round trips without such a constraint is a
/// correctness defect, not an acceptable implementation.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert(&self, reservation: Reservation) -> Result<Ulid, StoreError>;

    /// Non-excluded reservations whose window overlaps `window`.
    async fn list_overlapping(
        &self,
        instructor_id: Ulid,
        window: TimeWindow,
        exclude: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn update_status(
        &self,
        id: Ulid,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError>;

    async fn get(&self, id: Ulid) -> Result<Reservation, StoreError>;

    async fn list_for_instructor(&self, instructor_id: Ulid) -> Result<Vec<Reservation>, StoreError>;
}

/// Secondary slot-lock collaborator. Best-effort only.
#[async_trait]
pub trait SlotLockStore: Send + Sync {
    async fn record(&self, lock: SlotLock) -> Result<(), StoreError>;
}

// ── In-memory reservation store ──────────────────────────────────

/// One instructor's reservations, sorted by `window.start`.
#[derive(Debug, Default)]
struct InstructorBook {
    reservations: Vec<Reservation>,
}

impl InstructorBook {
    fn insert_sorted(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.window.start, |r| r.window.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Reservations whose window overlaps the query window.
    /// Binary search skips everything starting at or after `query.end`.
    fn overlapping(&self, query: &TimeWindow) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.window.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.window.end > query.start)
    }
}

type SharedBook = Arc<RwLock<InstructorBook>>;

/// Reference store used by tests and single-process deployments. The write
/// lock held across the overlap re-check and the insert is the exclusion
/// constraint the trait contract requires.
pub struct InMemoryReservationStore {
    books: DashMap<Ulid, SharedBook>,
    /// Reverse lookup: reservation id → instructor id.
    index: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            index: DashMap::new(),
        }
    }

    fn book_for(&self, instructor_id: Ulid) -> SharedBook {
        self.books
            .entry(instructor_id)
            .or_insert_with(|| Arc::new(RwLock::new(InstructorBook::default())))
            .value()
            .clone()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn insert(&self, reservation: Reservation) -> Result<Ulid, StoreError> {
        if reservation.window.duration_ms() > MAX_SESSION_DURATION_MS {
            return Err(StoreError::LimitExceeded("reservation window too wide"));
        }
        let book = self.book_for(reservation.instructor_id);
        let mut guard = book.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_INSTRUCTOR {
            return Err(StoreError::LimitExceeded("too many reservations for instructor"));
        }
        if let Some(existing) = guard
            .overlapping(&reservation.window)
            .find(|r| r.blocks())
        {
            return Err(StoreError::Overlap { existing: existing.id });
        }
        let id = reservation.id;
        let instructor_id = reservation.instructor_id;
        guard.insert_sorted(reservation);
        self.index.insert(id, instructor_id);
        Ok(id)
    }

    async fn list_overlapping(
        &self,
        instructor_id: Ulid,
        window: TimeWindow,
        exclude: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, StoreError> {
        if window.duration_ms() > MAX_QUERY_WINDOW_MS {
            return Err(StoreError::LimitExceeded("query window too wide"));
        }
        let Some(book) = self.books.get(&instructor_id).map(|e| e.value().clone()) else {
            return Ok(Vec::new());
        };
        let guard = book.read().await;
        Ok(guard
            .overlapping(&window)
            .filter(|r| !exclude.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: Ulid,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let instructor_id = self
            .index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(id))?;
        let book = self.book_for(instructor_id);
        let mut guard = book.write().await;
        let reservation = guard
            .reservations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        reservation.status = status;
        Ok(reservation.clone())
    }

    async fn get(&self, id: Ulid) -> Result<Reservation, StoreError> {
        let instructor_id = self
            .index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(id))?;
        let book = self.book_for(instructor_id);
        let guard = book.read().await;
        guard
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_for_instructor(&self, instructor_id: Ulid) -> Result<Vec<Reservation>, StoreError> {
        let Some(book) = self.books.get(&instructor_id).map(|e| e.value().clone()) else {
            return Ok(Vec::new());
        };
        let guard = book.read().await;
        Ok(guard.reservations.clone())
    }
}

/// In-memory slot-lock record. Append-only.
pub struct InMemorySlotLockStore {
    locks: Mutex<Vec<SlotLock>>,
}

impl Default for InMemorySlotLockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySlotLockStore {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(Vec::new()),
        }
    }

    pub async fn snapshot(&self) -> Vec<SlotLock> {
        self.locks.lock().await.clone()
    }
}

#[async_trait]
impl SlotLockStore for InMemorySlotLockStore {
    async fn record(&self, lock: SlotLock) -> Result<(), StoreError> {
        self.locks.lock().await.push(lock);
        Ok(())
    }
}
