mod booking;
mod conflict;
mod error;
mod queries;
mod slots;

pub use conflict::{ConflictProbe, ExternalProbe};
pub use error::{BookingError, ConflictSource};
pub use slots::generate_slots;

use std::collections::HashMap;
use std::sync::Arc;

use crate::calendar::ExternalCalendarProvider;
use crate::config::EngineConfig;
use crate::ledger::{CreditStore, InMemoryCreditStore};
use crate::model::LessonPlan;
use crate::notify::Notifier;
use crate::store::{
    InMemoryReservationStore, InMemorySlotLockStore, ReservationStore, SlotLockStore,
};

/// One school's availability & booking engine. Stateless between requests —
/// every decision is re-derived from the injected collaborators, so any
/// number of request-scoped callers may share one instance.
pub struct Engine {
    pub(super) reservations: Arc<dyn ReservationStore>,
    pub(super) credits: Arc<dyn CreditStore>,
    pub(super) locks: Arc<dyn SlotLockStore>,
    pub(super) calendar: Arc<dyn ExternalCalendarProvider>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) plans: HashMap<String, LessonPlan>,
    pub(super) config: EngineConfig,
}

impl Engine {
    pub fn new(
        reservations: Arc<dyn ReservationStore>,
        credits: Arc<dyn CreditStore>,
        locks: Arc<dyn SlotLockStore>,
        calendar: Arc<dyn ExternalCalendarProvider>,
        notifier: Arc<dyn Notifier>,
        plans: Vec<LessonPlan>,
        config: EngineConfig,
    ) -> Self {
        let plans = plans.into_iter().map(|p| (p.key.clone(), p)).collect();
        Self {
            reservations,
            credits,
            locks,
            calendar,
            notifier,
            plans,
            config,
        }
    }

    /// Engine wired to the in-memory reference stores. The calendar provider
    /// and notifier stay injected — they are the deployment-specific edges.
    pub fn in_memory(
        calendar: Arc<dyn ExternalCalendarProvider>,
        notifier: Arc<dyn Notifier>,
        plans: Vec<LessonPlan>,
        config: EngineConfig,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryReservationStore::new()),
            Arc::new(InMemoryCreditStore::new()),
            Arc::new(InMemorySlotLockStore::new()),
            calendar,
            notifier,
            plans,
            config,
        )
    }

    pub fn plan(&self, key: &str) -> Option<&LessonPlan> {
        self.plans.get(key)
    }

    pub fn credits(&self) -> &Arc<dyn CreditStore> {
        &self.credits
    }

    pub fn reservations(&self) -> &Arc<dyn ReservationStore> {
        &self.reservations
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
