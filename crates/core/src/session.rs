//! In-Process Interview Session Store
//!
//! One live session exists per `(phone_number, application_type)` key at any
//! time. The telephony gateway mostly serializes callbacks for a single call,
//! but the call-status channel is independent of the speech channel, so each
//! session sits behind its own async mutex: every webhook path locks the slot
//! for its whole mutate-then-maybe-finalize sequence, which is what makes
//! finalization exactly-once (see `finalize`).
//!
//! There is no expiry task. Staleness is checked lazily in [`SessionStore::begin`]
//! by comparing `created_at` against the configured cooldown.

use crate::catalog::ApplicationType;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Source of "now", injected so cooldown behavior is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. For tests and local development.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

/// Identifies one interview: a normalized phone number plus what is being
/// applied for. The same number may hold a loan and a credit-card interview
/// concurrently; they are fully independent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub phone_number: String,
    pub application_type: ApplicationType,
}

impl SessionKey {
    pub fn new(phone_number: impl Into<String>, application_type: ApplicationType) -> Self {
        Self {
            phone_number: phone_number.into(),
            application_type,
        }
    }
}

/// Mutable state of one in-progress interview.
#[derive(Debug, Clone)]
pub struct InterviewSession {
    /// Gateway handle for the outbound call. Empty until placement succeeds.
    pub call_sid: String,
    pub customer_name: String,
    /// Answered question index (into the active catalog list) to the caller's
    /// raw utterance. Sparse: a question with no captured speech has no entry.
    pub responses: BTreeMap<usize, String>,
    /// Monotonic false-to-true; guards against double finalization.
    pub verdict_delivered: bool,
    pub created_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn new(customer_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            call_sid: String::new(),
            customer_name: customer_name.into(),
            responses: BTreeMap::new(),
            verdict_delivered: false,
            created_at,
        }
    }
}

/// A session's slot in the store. `None` means the session was cleared while
/// someone still held the slot handle; treat it the same as absent.
pub type SessionSlot = Arc<Mutex<Option<InterviewSession>>>;

/// Why a new interview could not be started for a key.
#[derive(Debug, thiserror::Error)]
pub enum BeginError {
    /// A live, recent session already exists. Carries the existing call
    /// handle when it can be read without blocking.
    #[error("a call for this number is already in progress")]
    ActiveCall { call_sid: Option<String> },
}

/// Process-wide map of live interviews, keyed by [`SessionKey`].
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, SessionSlot>>,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(cooldown_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            cooldown: Duration::seconds(cooldown_secs),
            clock,
        }
    }

    /// Creates a fresh session for `key`, returning its slot so the caller
    /// can fill in the call sid once the gateway accepts the call.
    ///
    /// Rejects if a live session younger than the cooldown exists; a stale
    /// session is silently replaced. A slot whose mutex is currently held
    /// (a callback mid-flight) is always treated as live.
    pub async fn begin(
        &self,
        key: &SessionKey,
        customer_name: &str,
    ) -> Result<SessionSlot, BeginError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(key) {
            match existing.try_lock() {
                Ok(guard) => {
                    if let Some(session) = guard.as_ref() {
                        let age = self.clock.now() - session.created_at;
                        if age < self.cooldown {
                            return Err(BeginError::ActiveCall {
                                call_sid: (!session.call_sid.is_empty())
                                    .then(|| session.call_sid.clone()),
                            });
                        }
                        tracing::info!(
                            phone_number = %key.phone_number,
                            application_type = %key.application_type,
                            "Replacing stale session"
                        );
                    }
                }
                Err(_) => {
                    return Err(BeginError::ActiveCall { call_sid: None });
                }
            }
        }

        let session = InterviewSession::new(customer_name, self.clock.now());
        let slot: SessionSlot = Arc::new(Mutex::new(Some(session)));
        sessions.insert(key.clone(), slot.clone());
        Ok(slot)
    }

    /// The slot for `key`, if a session was ever begun and not yet removed.
    pub async fn slot(&self, key: &SessionKey) -> Option<SessionSlot> {
        self.sessions.lock().await.get(key).cloned()
    }

    /// Removes `key` from the map, but only if it still points at `slot`.
    /// A stale handle from a replaced session must not evict its successor.
    pub async fn remove(&self, key: &SessionKey, slot: &SessionSlot) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(key).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            sessions.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_clock(cooldown_secs: i64) -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(Utc::now()));
        let store = SessionStore::new(cooldown_secs, clock.clone());
        (store, clock)
    }

    fn key() -> SessionKey {
        SessionKey::new("+919999999999", ApplicationType::Loan)
    }

    #[tokio::test]
    async fn begin_then_conflict_within_cooldown() {
        let (store, _clock) = store_with_clock(120);

        let slot = store.begin(&key(), "Asha").await.unwrap();
        slot.lock().await.as_mut().unwrap().call_sid = "CA123".to_string();

        let err = store.begin(&key(), "Asha").await.unwrap_err();
        match err {
            BeginError::ActiveCall { call_sid } => {
                assert_eq!(call_sid.as_deref(), Some("CA123"));
            }
        }
    }

    #[tokio::test]
    async fn stale_session_is_replaced() {
        let (store, clock) = store_with_clock(120);

        let old_slot = store.begin(&key(), "Asha").await.unwrap();
        clock.advance(Duration::seconds(121));

        let new_slot = store.begin(&key(), "Asha").await.unwrap();
        assert!(!Arc::ptr_eq(&old_slot, &new_slot));
        assert!(store.slot(&key()).await.is_some());
    }

    #[tokio::test]
    async fn locked_slot_counts_as_live_even_when_stale() {
        let (store, clock) = store_with_clock(60);

        let slot = store.begin(&key(), "Asha").await.unwrap();
        clock.advance(Duration::seconds(3600));

        let _guard = slot.lock().await;
        let err = store.begin(&key(), "Asha").await.unwrap_err();
        match err {
            BeginError::ActiveCall { call_sid } => assert!(call_sid.is_none()),
        }
    }

    #[tokio::test]
    async fn remove_ignores_stale_slot_handles() {
        let (store, clock) = store_with_clock(60);

        let old_slot = store.begin(&key(), "Asha").await.unwrap();
        clock.advance(Duration::seconds(61));
        let new_slot = store.begin(&key(), "Asha").await.unwrap();

        // A straggler holding the replaced slot cannot evict the new session.
        store.remove(&key(), &old_slot).await;
        assert!(store.slot(&key()).await.is_some());

        store.remove(&key(), &new_slot).await;
        assert!(store.slot(&key()).await.is_none());
    }

    #[tokio::test]
    async fn sessions_for_different_types_are_independent() {
        let (store, _clock) = store_with_clock(120);

        store.begin(&key(), "Asha").await.unwrap();
        let cc_key = SessionKey::new("+919999999999", ApplicationType::CreditCard);
        assert!(store.begin(&cc_key, "Asha").await.is_ok());
    }
}
