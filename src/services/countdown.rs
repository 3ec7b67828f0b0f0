use crate::adapters::settlement::SettlementGateway;
use crate::domain::resolution;
use crate::services::presenter::OutcomePresenter;
use crate::services::session::SessionStore;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};

/// Remaining whole seconds until the expiry anchor. Recomputed from wall
/// clock on every tick, so a remounted view always sees true elapsed time.
pub fn remaining_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    (expires_at - now).num_seconds().max(0) as u32
}

/// One detached timer task per active session. The task outlives any view:
/// closing the countdown dialog drops the view's subscription only, and the
/// session still resolves on schedule, recoverable later by trade id.
pub struct CountdownEngine {
    store: Arc<SessionStore>,
    gateway: Arc<dyn SettlementGateway>,
    presenter: Arc<OutcomePresenter>,
    poll_interval: Duration,
    /// Extra time past expiry to wait for the server settlement before
    /// falling back to the local price delta.
    grace: Duration,
    demo_mode: bool,
}

impl CountdownEngine {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn SettlementGateway>,
        presenter: Arc<OutcomePresenter>,
        poll_interval: Duration,
        grace: Duration,
        demo_mode: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            presenter,
            poll_interval,
            grace,
            demo_mode,
        }
    }

    /// Starts the countdown for an Active session. Fire-and-forget: the
    /// handle may be dropped without cancelling the task.
    pub fn spawn(&self, session_id: String) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);
        let presenter = Arc::clone(&self.presenter);
        let poll_interval = self.poll_interval;
        let grace = self.grace;
        let demo_mode = self.demo_mode;

        tokio::spawn(async move {
            run_session(
                store,
                gateway,
                presenter,
                session_id,
                poll_interval,
                grace,
                demo_mode,
            )
            .await;
        })
    }
}

async fn run_session(
    store: Arc<SessionStore>,
    gateway: Arc<dyn SettlementGateway>,
    presenter: Arc<OutcomePresenter>,
    session_id: String,
    poll_interval: Duration,
    grace: Duration,
    demo_mode: bool,
) {
    let mut ticker = interval(Duration::from_secs(1));
    let mut last_poll = tokio::time::Instant::now();

    loop {
        ticker.tick().await;
        let Some(session) = store.snapshot(&session_id).await else {
            // Owner discarded the session; nothing left to resolve.
            return;
        };
        if session.is_resolved() {
            return;
        }

        let remaining = remaining_secs(session.expires_at, Utc::now());
        store
            .update(&session_id, |s| s.remaining_secs = remaining)
            .await;

        if !demo_mode
            && session.settlement.is_none()
            && last_poll.elapsed() >= poll_interval
        {
            last_poll = tokio::time::Instant::now();
            poll_settlement(&store, gateway.as_ref(), &session_id).await;
        }

        if remaining == 0 {
            break;
        }
    }

    // Expired. Give the server a grace window to settle before degrading.
    if !demo_mode {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let Some(session) = store.snapshot(&session_id).await else {
                return;
            };
            if session.settlement.is_some() || tokio::time::Instant::now() >= deadline {
                break;
            }
            poll_settlement(&store, gateway.as_ref(), &session_id).await;
            sleep(poll_interval.min(deadline - tokio::time::Instant::now())).await;
        }
    }

    let Some(session) = store.snapshot(&session_id).await else {
        return;
    };
    let outcome = resolution::resolve(
        &session_id,
        session.request.direction,
        session.request.entry_price,
        session.current_price,
        session.settlement.as_ref(),
    );
    if store.resolve_once(&session_id, outcome).await.is_some() {
        presenter.announce_resolved(&session_id).await;
    }
}

async fn poll_settlement(store: &SessionStore, gateway: &dyn SettlementGateway, id: &str) {
    match gateway.fetch_resolution(id).await {
        Ok(Some(result)) => {
            debug!("trade {}: settlement arrived ({})", id, result.status);
            store
                .update(id, |s| {
                    if s.settlement.is_none() {
                        s.settlement = Some(result);
                    }
                })
                .await;
        }
        Ok(None) => {}
        Err(e) => {
            // Transient; the fallback path covers a poller that never succeeds.
            warn!("trade {}: settlement poll failed: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profile::ProfileHandle;
    use crate::models::{
        OutcomeKind, PlaceTradeRequest, PlaceTradeResponse, SessionState, SettlementResult,
        TradeDirection, TradeRequest,
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    struct StubGateway {
        settlement: Option<SettlementResult>,
    }

    #[async_trait]
    impl SettlementGateway for StubGateway {
        async fn place_trade(&self, _: &PlaceTradeRequest) -> Result<PlaceTradeResponse> {
            unreachable!("countdown never places trades")
        }

        async fn fetch_resolution(&self, _: &str) -> Result<Option<SettlementResult>> {
            Ok(self.settlement.clone())
        }
    }

    fn request(duration_secs: u32) -> TradeRequest {
        TradeRequest {
            symbol: "BTCUSDT".to_string(),
            amount: dec!(25),
            direction: TradeDirection::Call,
            duration_secs,
            entry_price: dec!(100),
        }
    }

    fn engine(
        store: &Arc<SessionStore>,
        gateway: Arc<dyn SettlementGateway>,
        demo_mode: bool,
    ) -> CountdownEngine {
        let profile = Arc::new(ProfileHandle::new(Duration::ZERO));
        let presenter = Arc::new(OutcomePresenter::new(store.clone(), profile));
        CountdownEngine::new(
            store.clone(),
            gateway,
            presenter,
            Duration::from_millis(100),
            Duration::from_millis(300),
            demo_mode,
        )
    }

    #[test]
    fn remaining_reflects_elapsed_wall_clock() {
        let now = Utc::now();
        // 60s trade with 40s already elapsed: a remount must see ~20, not 60.
        let expires_at = now + ChronoDuration::seconds(20);
        assert_eq!(remaining_secs(expires_at, now), 20);
    }

    #[test]
    fn remaining_clamps_at_zero_past_expiry() {
        let now = Utc::now();
        let expires_at = now - ChronoDuration::seconds(5);
        assert_eq!(remaining_secs(expires_at, now), 0);
    }

    async fn activate(store: &SessionStore, id: &str) {
        store.update(id, |s| s.state = SessionState::Active).await;
    }

    #[tokio::test]
    async fn resolves_from_settlement_when_available() {
        let store = SessionStore::new();
        let gateway = Arc::new(StubGateway {
            settlement: Some(SettlementResult {
                status: "win".to_string(),
                profit: Some(dec!(120)),
                lost_amount: None,
                new_balance: None,
            }),
        });
        let engine = engine(&store, gateway, false);

        let id = store.create(request(1)).await;
        activate(&store, &id).await;
        engine.spawn(id.clone()).await.unwrap();

        let session = store.snapshot(&id).await.unwrap();
        assert!(session.is_resolved());
        let outcome = session.outcome.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Profit);
        assert_eq!(outcome.amount, dec!(120));
        // Announced by the engine already.
        assert!(session.presented);
    }

    #[tokio::test]
    async fn falls_back_to_price_delta_without_settlement() {
        let store = SessionStore::new();
        let gateway = Arc::new(StubGateway { settlement: None });
        let engine = engine(&store, gateway, false);

        let id = store.create(request(1)).await;
        activate(&store, &id).await;
        store.update_price(&id, dec!(105)).await;
        engine.spawn(id.clone()).await.unwrap();

        let session = store.snapshot(&id).await.unwrap();
        let outcome = session.outcome.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Profit);
        assert_eq!(outcome.amount, dec!(500));
    }

    #[tokio::test]
    async fn outcome_survives_dropped_view_subscription() {
        let store = SessionStore::new();
        let gateway = Arc::new(StubGateway { settlement: None });
        let engine = engine(&store, gateway, true);

        let id = store.create(request(1)).await;
        activate(&store, &id).await;
        let handle = engine.spawn(id.clone());
        // The view closes its dialog mid-countdown.
        drop(store.subscribe(&id).await.unwrap());
        handle.await.unwrap();

        // Reopening by id recovers the final outcome.
        let session = store.snapshot(&id).await.unwrap();
        assert!(session.is_resolved());
        assert!(session.outcome.is_some());
    }

    #[tokio::test]
    async fn discarded_session_stops_the_timer() {
        let store = SessionStore::new();
        let gateway = Arc::new(StubGateway { settlement: None });
        let engine = engine(&store, gateway, true);

        let id = store.create(request(300)).await;
        activate(&store, &id).await;
        let handle = engine.spawn(id.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.remove(&id).await;
        // The task notices the missing session on its next tick and exits.
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("timer task should exit")
            .unwrap();
    }
}
