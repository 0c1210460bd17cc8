use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{CreditBalance, Ms};
use crate::store::StoreError;

/// Credit ledger collaborator. Every mutation is a conditional update
/// against the stored value — never compute-then-overwrite — so concurrent
/// bookings for the same student cannot drive a balance negative.
#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn balance(&self, student_id: Ulid) -> Result<Option<CreditBalance>, StoreError>;

    /// Whether the student could afford `sessions` + `minutes` right now.
    /// Advisory only; the authoritative gate is `decrement_if_positive`.
    async fn has_credit(
        &self,
        student_id: Ulid,
        sessions: i64,
        minutes: i64,
    ) -> Result<bool, StoreError>;

    /// Atomically deduct, but only if both balances stay non-negative.
    /// Returns `false` without mutating when the student cannot afford it.
    async fn decrement_if_positive(
        &self,
        student_id: Ulid,
        sessions: i64,
        minutes: i64,
    ) -> Result<bool, StoreError>;

    async fn cooldown_until(&self, student_id: Ulid) -> Result<Option<Ms>, StoreError>;

    async fn set_cooldown(&self, student_id: Ulid, until: Ms) -> Result<(), StoreError>;

    /// Top up a balance (plan purchase, admin adjustment).
    async fn grant(&self, student_id: Ulid, sessions: i64, minutes: i64)
        -> Result<(), StoreError>;
}

type SharedBalance = Arc<RwLock<CreditBalance>>;

/// Reference ledger. The per-student write lock makes the decrement's
/// check-and-subtract a single critical section.
pub struct InMemoryCreditStore {
    balances: DashMap<Ulid, SharedBalance>,
}

impl Default for InMemoryCreditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }

    fn balance_for(&self, student_id: Ulid) -> SharedBalance {
        self.balances
            .entry(student_id)
            .or_insert_with(|| Arc::new(RwLock::new(CreditBalance::new(0, 0))))
            .value()
            .clone()
    }
}

#[async_trait]
impl CreditStore for InMemoryCreditStore {
    async fn balance(&self, student_id: Ulid) -> Result<Option<CreditBalance>, StoreError> {
        let Some(balance) = self.balances.get(&student_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        Ok(Some(*balance.read().await))
    }

    async fn has_credit(
        &self,
        student_id: Ulid,
        sessions: i64,
        minutes: i64,
    ) -> Result<bool, StoreError> {
        let Some(balance) = self.balances.get(&student_id).map(|e| e.value().clone()) else {
            return Ok(false);
        };
        let guard = balance.read().await;
        Ok(guard.sessions_remaining >= sessions && guard.minutes_remaining >= minutes)
    }

    async fn decrement_if_positive(
        &self,
        student_id: Ulid,
        sessions: i64,
        minutes: i64,
    ) -> Result<bool, StoreError> {
        let Some(balance) = self.balances.get(&student_id).map(|e| e.value().clone()) else {
            return Ok(false);
        };
        let mut guard = balance.write().await;
        if guard.sessions_remaining < sessions || guard.minutes_remaining < minutes {
            return Ok(false);
        }
        guard.sessions_remaining -= sessions;
        guard.minutes_remaining -= minutes;
        Ok(true)
    }

    async fn cooldown_until(&self, student_id: Ulid) -> Result<Option<Ms>, StoreError> {
        let Some(balance) = self.balances.get(&student_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        Ok(balance.read().await.cooldown_until)
    }

    async fn set_cooldown(&self, student_id: Ulid, until: Ms) -> Result<(), StoreError> {
        let balance = self.balance_for(student_id);
        let mut guard = balance.write().await;
        // Cooldowns only ever extend; a stale writer must not shorten one.
        if guard.cooldown_until.is_none_or(|current| until > current) {
            guard.cooldown_until = Some(until);
        }
        Ok(())
    }

    async fn grant(
        &self,
        student_id: Ulid,
        sessions: i64,
        minutes: i64,
    ) -> Result<(), StoreError> {
        let balance = self.balance_for(student_id);
        let mut guard = balance.write().await;
        guard.sessions_remaining += sessions;
        guard.minutes_remaining += minutes;
        Ok(())
    }
}
