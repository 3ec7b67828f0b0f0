use crate::adapters::profile::ProfileHandle;
use crate::models::{OutcomeKind, TradeSession};
use crate::services::session::SessionStore;
use crate::utils::format::format_mmss;
use log::info;
use std::sync::Arc;

/// Renders session state for whatever surface hosts it and signals the
/// profile collaborator once a trade resolves. The balance itself is never
/// touched here; the external profile service stays authoritative.
pub struct OutcomePresenter {
    store: Arc<SessionStore>,
    profile: Arc<ProfileHandle>,
}

/// In-progress line: direction, time left, entry vs live price.
pub fn render_active(session: &TradeSession) -> String {
    format!(
        "{} {} | {} left | entry {} -> live {}",
        session.request.direction,
        session.request.symbol,
        format_mmss(session.remaining_secs),
        session.request.entry_price,
        session.current_price
    )
}

pub fn render_resolved(session: &TradeSession) -> Option<String> {
    let outcome = session.outcome.as_ref()?;
    let label = match outcome.kind {
        OutcomeKind::Profit => "WIN",
        OutcomeKind::Loss => "LOSS",
    };
    Some(format!(
        "{} {} | {} {}",
        session.request.direction, session.request.symbol, label, outcome.amount
    ))
}

impl OutcomePresenter {
    pub fn new(store: Arc<SessionStore>, profile: Arc<ProfileHandle>) -> Self {
        Self { store, profile }
    }

    /// Announces a resolved outcome and requests a balance refresh. Only the
    /// first call per session announces; reopened views get silence instead
    /// of a replayed toast.
    pub async fn announce_resolved(&self, session_id: &str) -> Option<String> {
        if !self.store.mark_presented(session_id).await {
            return None;
        }
        let session = self.store.snapshot(session_id).await?;
        let line = render_resolved(&session)?;
        info!("trade {} resolved: {}", session_id, line);
        self.profile.refresh_balance().await;
        Some(line)
    }
}
