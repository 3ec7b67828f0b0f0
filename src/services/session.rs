use crate::models::{Outcome, SessionState, TradeRequest, TradeSession};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use uuid::Uuid;

/// Single source of truth for live and resolved trade sessions. Every
/// presentational surface reads snapshots or subscribes through here instead
/// of keeping its own copy of the lifecycle.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, watch::Sender<TradeSession>>>,
    /// Placement-in-progress guard, keyed by session id.
    in_flight: Mutex<HashSet<String>>,
}

/// A view's handle on one session. Dropping it releases only the
/// subscription; the session and its countdown keep running.
pub struct ViewSubscription {
    rx: watch::Receiver<TradeSession>,
}

impl ViewSubscription {
    pub fn snapshot(&self) -> TradeSession {
        self.rx.borrow().clone()
    }

    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Creates a Pending session under a local placeholder id. The gateway
    /// rekeys it to the remote trade id on acceptance.
    pub async fn create(&self, request: TradeRequest) -> String {
        let id = Uuid::new_v4().to_string();
        let session = TradeSession::new(id.clone(), request, Utc::now());
        let (tx, _) = watch::channel(session);
        self.sessions.write().await.insert(id.clone(), tx);
        id
    }

    pub async fn snapshot(&self, id: &str) -> Option<TradeSession> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|tx| tx.borrow().clone())
    }

    pub async fn subscribe(&self, id: &str) -> Option<ViewSubscription> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|tx| ViewSubscription { rx: tx.subscribe() })
    }

    /// Applies a mutation and notifies subscribers. Returns false for an
    /// unknown id.
    pub async fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut TradeSession),
    {
        let sessions = self.sessions.read().await;
        let Some(tx) = sessions.get(id) else {
            return false;
        };
        tx.send_modify(f);
        true
    }

    /// Moves a session from its placeholder id to the id the settlement
    /// service assigned, so later recovery by remote trade id works.
    pub async fn rekey(&self, old_id: &str, new_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(tx) = sessions.remove(old_id) else {
            return false;
        };
        tx.send_modify(|s| s.id = new_id.to_string());
        sessions.insert(new_id.to_string(), tx);
        true
    }

    pub async fn update_price(&self, id: &str, price: Decimal) -> bool {
        self.update(id, |s| {
            if s.state == SessionState::Active {
                s.current_price = price;
            }
        })
        .await
    }

    /// Marks the session Resolved with the given outcome. Returns the
    /// outcome only on the first call; later calls are no-ops, so resolution
    /// can never run twice for one session.
    pub async fn resolve_once(&self, id: &str, outcome: Outcome) -> Option<Outcome> {
        let sessions = self.sessions.read().await;
        let tx = sessions.get(id)?;
        let mut first = None;
        tx.send_modify(|s| {
            if s.state != SessionState::Resolved {
                s.state = SessionState::Resolved;
                s.remaining_secs = 0;
                s.outcome = Some(outcome.clone());
                first = Some(outcome);
            }
        });
        first
    }

    /// Flips the presented flag. True only for the first caller.
    pub async fn mark_presented(&self, id: &str) -> bool {
        let sessions = self.sessions.read().await;
        let Some(tx) = sessions.get(id) else {
            return false;
        };
        let mut first = false;
        tx.send_modify(|s| {
            if s.is_resolved() && !s.presented {
                s.presented = true;
                first = true;
            }
        });
        first
    }

    /// Discards a session the owner no longer wants tracked (failed
    /// placement, or a resolved result the user dismissed).
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn begin_placement(&self, id: &str) -> bool {
        self.in_flight.lock().await.insert(id.to_string())
    }

    pub async fn end_placement(&self, id: &str) {
        self.in_flight.lock().await.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutcomeKind, TradeDirection};
    use rust_decimal_macros::dec;

    fn request() -> TradeRequest {
        TradeRequest {
            symbol: "BTCUSDT".to_string(),
            amount: dec!(25),
            direction: TradeDirection::Call,
            duration_secs: 60,
            entry_price: dec!(100),
        }
    }

    #[tokio::test]
    async fn create_and_snapshot() {
        let store = SessionStore::new();
        let id = store.create(request()).await;
        let session = store.snapshot(&id).await.unwrap();
        assert_eq!(session.state, SessionState::Pending);
        assert_eq!(session.remaining_secs, 60);
        assert_eq!(session.current_price, dec!(100));
    }

    #[tokio::test]
    async fn rapid_creates_yield_independent_sessions() {
        let store = SessionStore::new();
        let a = store.create(request()).await;
        let b = store.create(request()).await;
        assert_ne!(a, b);
        store.update(&a, |s| s.state = SessionState::Active).await;
        let sb = store.snapshot(&b).await.unwrap();
        assert_eq!(sb.state, SessionState::Pending);
    }

    #[tokio::test]
    async fn rekey_makes_session_recoverable_by_remote_id() {
        let store = SessionStore::new();
        let local = store.create(request()).await;
        assert!(store.rekey(&local, "srv-42").await);
        assert!(store.snapshot(&local).await.is_none());
        let session = store.snapshot("srv-42").await.unwrap();
        assert_eq!(session.id, "srv-42");
    }

    #[tokio::test]
    async fn resolve_once_is_exactly_once() {
        let store = SessionStore::new();
        let id = store.create(request()).await;
        store.update(&id, |s| s.state = SessionState::Active).await;
        let outcome = Outcome {
            kind: OutcomeKind::Profit,
            amount: dec!(120),
        };
        assert!(store.resolve_once(&id, outcome.clone()).await.is_some());
        assert!(store.resolve_once(&id, outcome).await.is_none());
        let session = store.snapshot(&id).await.unwrap();
        assert_eq!(session.outcome.unwrap().amount, dec!(120));
    }

    #[tokio::test]
    async fn placement_guard_admits_one_caller() {
        let store = SessionStore::new();
        let id = store.create(request()).await;
        assert!(store.begin_placement(&id).await);
        assert!(!store.begin_placement(&id).await);
        store.end_placement(&id).await;
        assert!(store.begin_placement(&id).await);
    }

    #[tokio::test]
    async fn dropping_subscription_keeps_session_alive() {
        let store = SessionStore::new();
        let id = store.create(request()).await;
        {
            let sub = store.subscribe(&id).await.unwrap();
            assert_eq!(sub.snapshot().state, SessionState::Pending);
        }
        assert!(store.snapshot(&id).await.is_some());
    }

    #[tokio::test]
    async fn price_updates_apply_only_while_active() {
        let store = SessionStore::new();
        let id = store.create(request()).await;
        store.update_price(&id, dec!(105)).await;
        assert_eq!(store.snapshot(&id).await.unwrap().current_price, dec!(100));
        store.update(&id, |s| s.state = SessionState::Active).await;
        store.update_price(&id, dec!(105)).await;
        assert_eq!(store.snapshot(&id).await.unwrap().current_price, dec!(105));
    }
}
