//! In-memory table of in-flight login attempts, keyed by phone number.
//!
//! Each phone number owns one slot: an `Arc<Mutex<Option<PendingLogin>>>`.
//! Callers hold the slot lock for the whole remote round-trip, which gives
//! strict ordering per phone number while distinct numbers proceed
//! independently. The outer map lock is only ever held for a lookup or
//! insert, never across an await.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use telegram_auth::AuthClient;

use super::errors::LoginError;

/// One in-flight login attempt. Owns the connected client handle; the handle
/// must be disconnected on every removal path.
pub struct PendingLogin {
    pub phone_number: String,
    pub client: Box<dyn AuthClient>,
    pub verification_token: String,
    pub created_at: DateTime<Utc>,
}

impl PendingLogin {
    pub fn new(phone_number: String, client: Box<dyn AuthClient>, verification_token: String) -> Self {
        Self {
            phone_number,
            client,
            verification_token,
            created_at: Utc::now(),
        }
    }

    /// Time since the entry was created. Negative clock drift reads as zero.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Release the underlying client. Consumes the entry so a disconnected
    /// handle can never be reused.
    pub async fn disconnect(mut self) {
        self.client.disconnect().await;
    }
}

type Slot = Arc<Mutex<Option<PendingLogin>>>;

/// A locked slot: the caller has exclusive access to this phone number's
/// attempt until the guard drops.
pub type SlotGuard = OwnedMutexGuard<Option<PendingLogin>>;

pub struct PendingLoginRegistry {
    slots: StdMutex<HashMap<String, Slot>>,
    resend_interval: Duration,
    expiry: Duration,
}

impl PendingLoginRegistry {
    pub fn new(resend_interval: Duration, expiry: Duration) -> Self {
        Self {
            slots: StdMutex::new(HashMap::new()),
            resend_interval,
            expiry,
        }
    }

    fn slot(&self, phone_number: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(phone_number.to_string())
            .or_default()
            .clone()
    }

    fn existing_slot(&self, phone_number: &str) -> Option<Slot> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(phone_number).cloned()
    }

    /// Lock the slot for a phone number, creating it if absent.
    ///
    /// Between the map lookup and the lock registering, `release` can prune
    /// the slot (its `try_lock` sees no queued waiter yet). A guard over such
    /// an orphan must never be handed out: an entry installed through it
    /// would be unreachable from the map and its client never disconnected.
    /// Retry until the locked slot is the one the map holds.
    async fn lock_slot(&self, phone_number: &str) -> (Slot, SlotGuard) {
        loop {
            let slot = self.slot(phone_number);
            let guard = Arc::clone(&slot).lock_owned().await;
            match self.existing_slot(phone_number) {
                Some(current) if Arc::ptr_eq(&current, &slot) => return (slot, guard),
                _ => continue,
            }
        }
    }

    /// Same revalidation as [`Self::lock_slot`], but never creates a slot.
    async fn lock_existing_slot(&self, phone_number: &str) -> Option<(Slot, SlotGuard)> {
        loop {
            let slot = self.existing_slot(phone_number)?;
            let guard = Arc::clone(&slot).lock_owned().await;
            match self.existing_slot(phone_number) {
                Some(current) if Arc::ptr_eq(&current, &slot) => return Some((slot, guard)),
                _ => continue,
            }
        }
    }

    /// Remove the map entry for a slot whose guard the caller holds.
    fn prune(&self, phone_number: &str, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = slots.get(phone_number) {
            if Arc::ptr_eq(current, slot) {
                slots.remove(phone_number);
            }
        }
    }

    /// Take the slot for a new attempt.
    ///
    /// Fails `TooSoon` while a fresh entry is alive; a stale entry is evicted
    /// (client disconnected) and its key reused. The returned guard is empty;
    /// the caller installs the new entry once the remote side has issued a
    /// code, so a failed request leaves no entry behind.
    pub async fn reserve(&self, phone_number: &str) -> Result<SlotGuard, LoginError> {
        let (_slot, mut guard) = self.lock_slot(phone_number).await;

        if let Some(age) = guard.as_ref().map(PendingLogin::age) {
            if age < self.resend_interval {
                let remaining = self.resend_interval - age;
                return Err(LoginError::TooSoon {
                    retry_after_seconds: remaining.as_secs().max(1),
                });
            }
            if let Some(stale) = guard.take() {
                tracing::debug!(phone_number, "evicting stale pending login");
                stale.disconnect().await;
            }
        }

        Ok(guard)
    }

    /// Take the slot of an existing attempt for the next step of the flow.
    ///
    /// Fails `NotFoundOrExpired` if no entry exists; an entry past the expiry
    /// window is removed on access (lazy expiry) and reported the same way.
    pub async fn claim(&self, phone_number: &str) -> Result<SlotGuard, LoginError> {
        let Some((slot, mut guard)) = self.lock_existing_slot(phone_number).await else {
            return Err(LoginError::NotFoundOrExpired);
        };

        let age = match guard.as_ref() {
            None => {
                self.prune(phone_number, &slot);
                return Err(LoginError::NotFoundOrExpired);
            }
            Some(entry) => entry.age(),
        };
        if age >= self.expiry {
            if let Some(expired) = guard.take() {
                tracing::info!(phone_number, "pending login expired");
                expired.disconnect().await;
            }
            self.prune(phone_number, &slot);
            return Err(LoginError::NotFoundOrExpired);
        }

        Ok(guard)
    }

    /// Drop the slot for a phone number if no entry remains in it. Purely a
    /// map-hygiene call; an empty slot already lets the key be reattempted.
    pub fn release(&self, phone_number: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // try_lock: never block the map on a slot another flow holds.
        let can_remove = slots
            .get(phone_number)
            .is_some_and(|slot| matches!(slot.try_lock().as_deref(), Ok(None)));
        if can_remove {
            slots.remove(phone_number);
        }
    }

    /// Whether a live entry exists for this phone number.
    pub async fn contains(&self, phone_number: &str) -> bool {
        match self.existing_slot(phone_number) {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Number of slots currently in the map, live or empty.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::MockAuthConnector;
    use telegram_auth::AuthConnector;

    async fn connected_client(connector: &MockAuthConnector) -> Box<dyn AuthClient> {
        connector.connect("+15551234567", None).await.unwrap()
    }

    fn registry() -> PendingLoginRegistry {
        PendingLoginRegistry::new(Duration::from_secs(120), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn reserve_then_claim_round_trip() {
        let connector = MockAuthConnector::new();
        let registry = registry();

        let mut slot = registry.reserve("+15551234567").await.unwrap();
        *slot = Some(PendingLogin::new(
            "+15551234567".to_string(),
            connected_client(&connector).await,
            "hash-1".to_string(),
        ));
        drop(slot);

        assert!(registry.contains("+15551234567").await);
        let slot = registry.claim("+15551234567").await.unwrap();
        assert_eq!(slot.as_ref().unwrap().verification_token, "hash-1");
    }

    #[tokio::test]
    async fn fresh_entry_rejects_a_second_reserve() {
        let connector = MockAuthConnector::new();
        let registry = registry();

        let mut slot = registry.reserve("+15551234567").await.unwrap();
        *slot = Some(PendingLogin::new(
            "+15551234567".to_string(),
            connected_client(&connector).await,
            "hash-1".to_string(),
        ));
        drop(slot);

        match registry.reserve("+15551234567").await {
            Err(LoginError::TooSoon {
                retry_after_seconds,
            }) => assert!(retry_after_seconds > 0 && retry_after_seconds <= 120),
            other => panic!("expected TooSoon, got {:?}", other.map(|_| ())),
        }
        // Unrelated numbers are unaffected.
        assert!(registry.reserve("+15559990000").await.is_ok());
    }

    #[tokio::test]
    async fn stale_entry_is_evicted_and_its_client_disconnected() {
        let connector = MockAuthConnector::new();
        let registry = PendingLoginRegistry::new(Duration::from_millis(10), Duration::from_secs(600));

        let mut slot = registry.reserve("+15551234567").await.unwrap();
        *slot = Some(PendingLogin::new(
            "+15551234567".to_string(),
            connected_client(&connector).await,
            "hash-1".to_string(),
        ));
        drop(slot);
        assert_eq!(connector.live_clients(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let slot = registry.reserve("+15551234567").await.unwrap();
        assert!(slot.is_none(), "stale entry should have been evicted");
        assert_eq!(connector.live_clients(), 0);
    }

    #[tokio::test]
    async fn claim_expires_aged_entries_lazily() {
        let connector = MockAuthConnector::new();
        let registry = PendingLoginRegistry::new(Duration::from_secs(120), Duration::from_millis(10));

        let mut slot = registry.reserve("+15551234567").await.unwrap();
        *slot = Some(PendingLogin::new(
            "+15551234567".to_string(),
            connected_client(&connector).await,
            "hash-1".to_string(),
        ));
        drop(slot);

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            registry.claim("+15551234567").await,
            Err(LoginError::NotFoundOrExpired)
        ));
        assert_eq!(connector.live_clients(), 0);
        assert!(!registry.contains("+15551234567").await);
    }

    #[tokio::test]
    async fn claim_on_unknown_number_is_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.claim("+15551234567").await,
            Err(LoginError::NotFoundOrExpired)
        ));
    }

    #[tokio::test]
    async fn release_prunes_only_empty_slots() {
        let connector = MockAuthConnector::new();
        let registry = registry();

        let mut slot = registry.reserve("+15551234567").await.unwrap();
        *slot = Some(PendingLogin::new(
            "+15551234567".to_string(),
            connected_client(&connector).await,
            "hash-1".to_string(),
        ));
        drop(slot);

        registry.release("+15551234567");
        assert!(registry.contains("+15551234567").await, "live entry survives release");

        let mut slot = registry.claim("+15551234567").await.unwrap();
        if let Some(entry) = slot.take() {
            entry.disconnect().await;
        }
        drop(slot);
        registry.release("+15551234567");
        assert!(!registry.contains("+15551234567").await);
        assert_eq!(registry.slot_count(), 0);
    }

    #[tokio::test]
    async fn reserve_never_returns_a_guard_over_a_pruned_slot() {
        let registry = registry();

        // Interleaving under test: one task clones the slot and is parked
        // before its lock registers, release prunes the now-empty slot, and
        // the parked task then locks the orphan.
        let stale = registry.slot("+15551234567");
        registry.release("+15551234567");
        assert_eq!(registry.slot_count(), 0);
        let _orphan_guard = Arc::clone(&stale).lock_owned().await;

        // Locking for a new attempt must not be satisfied by the orphan: the
        // guard it yields covers the slot the map actually holds, so an entry
        // installed through it stays reachable.
        let (slot, guard) = registry.lock_slot("+15551234567").await;
        assert!(!Arc::ptr_eq(&slot, &stale));
        let current = registry.existing_slot("+15551234567").unwrap();
        assert!(Arc::ptr_eq(&slot, &current));
        drop(guard);
    }

    #[tokio::test]
    async fn expired_claim_prunes_the_slot_and_frees_the_key() {
        let connector = MockAuthConnector::new();
        let registry = PendingLoginRegistry::new(Duration::from_millis(1), Duration::from_millis(10));

        let mut slot = registry.reserve("+15551234567").await.unwrap();
        *slot = Some(PendingLogin::new(
            "+15551234567".to_string(),
            connected_client(&connector).await,
            "hash-1".to_string(),
        ));
        drop(slot);

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            registry.claim("+15551234567").await,
            Err(LoginError::NotFoundOrExpired)
        ));
        assert_eq!(registry.slot_count(), 0);

        // The key is immediately reusable for a fresh attempt.
        assert!(registry.reserve("+15551234567").await.is_ok());
    }
}
