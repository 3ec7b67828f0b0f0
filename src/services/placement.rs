use crate::adapters::settlement::SettlementGateway;
use crate::models::{PlaceTradeRequest, SessionState};
use crate::services::session::SessionStore;
use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("settlement service unreachable or returned a malformed response")]
    Network,
    #[error("placement rejected: {0}")]
    Rejected(String),
    #[error("a placement call for this session is already in flight")]
    AlreadyInFlight,
    #[error("unknown session")]
    UnknownSession,
}

/// Submits each confirmed request to the settlement service exactly once.
/// Re-entry for a session whose call is still in flight is refused; retries
/// are always a new request and a new session, never a resend of this one.
pub struct PlacementService {
    store: Arc<SessionStore>,
    gateway: Arc<dyn SettlementGateway>,
    token: Option<String>,
    demo_mode: bool,
}

impl PlacementService {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn SettlementGateway>,
        token: Option<String>,
        demo_mode: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            token,
            demo_mode,
        }
    }

    /// Places the session's trade. On success the session is rekeyed to the
    /// remote trade id and becomes Active; the new id is returned.
    pub async fn place(&self, session_id: &str) -> Result<String, PlacementError> {
        let session = self
            .store
            .snapshot(session_id)
            .await
            .ok_or(PlacementError::UnknownSession)?;

        if !self.store.begin_placement(session_id).await {
            warn!("trade {}: duplicate placement attempt ignored", session_id);
            return Err(PlacementError::AlreadyInFlight);
        }
        let result = self.place_guarded(session_id, &session.request).await;
        self.store.end_placement(session_id).await;
        result
    }

    async fn place_guarded(
        &self,
        session_id: &str,
        request: &crate::models::TradeRequest,
    ) -> Result<String, PlacementError> {
        self.store
            .update(session_id, |s| s.state = SessionState::Placing)
            .await;

        if self.demo_mode {
            let trade_id = format!("demo-{}", Uuid::new_v4());
            self.store.rekey(session_id, &trade_id).await;
            self.activate(&trade_id).await;
            info!(
                "[DEMO] {} {} {} for {}s accepted locally as {}",
                request.direction, request.symbol, request.amount, request.duration_secs, trade_id
            );
            return Ok(trade_id);
        }

        let wire = PlaceTradeRequest {
            token: self.token.clone().unwrap_or_default(),
            amount: request.amount,
            symbol: request.symbol.clone(),
            direction: request.direction,
            opening_price: request.entry_price,
            duration_seconds: request.duration_secs,
        };

        match self.gateway.place_trade(&wire).await {
            Ok(response) if response.success => {
                let Some(data) = response.data else {
                    error!("trade {}: success response without trade id", session_id);
                    self.fail(session_id).await;
                    return Err(PlacementError::Network);
                };
                self.store.rekey(session_id, &data.trade_id).await;
                self.activate(&data.trade_id).await;
                info!(
                    "{} {} {} for {}s placed as trade {}",
                    request.direction,
                    request.symbol,
                    request.amount,
                    request.duration_secs,
                    data.trade_id
                );
                Ok(data.trade_id)
            }
            Ok(response) => {
                let reason = response
                    .message
                    .unwrap_or_else(|| "rejected by settlement service".to_string());
                warn!("trade {}: placement rejected: {}", session_id, reason);
                self.fail(session_id).await;
                Err(PlacementError::Rejected(reason))
            }
            Err(e) => {
                error!("trade {}: placement transport error: {}", session_id, e);
                self.fail(session_id).await;
                Err(PlacementError::Network)
            }
        }
    }

    async fn activate(&self, id: &str) {
        self.store
            .update(id, |s| {
                let now = chrono::Utc::now();
                s.state = SessionState::Active;
                // Re-anchor to acceptance time so the countdown matches the
                // server-side clock as closely as we can observe it.
                s.placed_at = now;
                s.expires_at = now + chrono::Duration::seconds(s.request.duration_secs as i64);
            })
            .await;
    }

    async fn fail(&self, id: &str) {
        self.store
            .update(id, |s| s.state = SessionState::Failed)
            .await;
    }
}
