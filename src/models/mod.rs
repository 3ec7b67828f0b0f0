use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    /// Price will be above the entry price at expiry.
    Call,
    /// Price will be below the entry price at expiry.
    Put,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Call => write!(f, "CALL"),
            TradeDirection::Put => write!(f, "PUT"),
        }
    }
}

/// Validated, immutable trade parameters. Built once per user confirmation;
/// a re-submission always goes through a fresh build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub amount: Decimal,
    pub direction: TradeDirection,
    pub duration_secs: u32,
    /// Price snapshot at build time, the resolution baseline.
    pub entry_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Pending,
    Placing,
    Active,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Profit,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub amount: Decimal,
}

/// One live or resolved trade attempt. Owned by the session store; UI
/// surfaces only ever see snapshots of it.
#[derive(Debug, Clone)]
pub struct TradeSession {
    /// Remote trade id once the gateway accepts, local UUID placeholder before.
    pub id: String,
    pub request: TradeRequest,
    pub state: SessionState,
    pub placed_at: DateTime<Utc>,
    /// Absolute countdown anchor: `placed_at + duration`. Remaining time is
    /// always recomputed against this, never counted down in place.
    pub expires_at: DateTime<Utc>,
    pub remaining_secs: u32,
    pub current_price: Decimal,
    pub outcome: Option<Outcome>,
    /// Filled by the gateway/poller when the server settles the trade.
    pub settlement: Option<SettlementResult>,
    /// Set by the presenter the first time the resolved outcome is announced.
    pub presented: bool,
}

impl TradeSession {
    pub fn new(id: String, request: TradeRequest, now: DateTime<Utc>) -> Self {
        let expires_at = now + chrono::Duration::seconds(request.duration_secs as i64);
        Self {
            remaining_secs: request.duration_secs,
            current_price: request.entry_price,
            id,
            request,
            state: SessionState::Pending,
            placed_at: now,
            expires_at,
            outcome: None,
            settlement: None,
            presented: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == SessionState::Resolved
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceTradeRequest {
    pub token: String,
    pub amount: Decimal,
    pub symbol: String,
    pub direction: TradeDirection,
    pub opening_price: Decimal,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceTradeResponse {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<PlaceTradeData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceTradeData {
    pub trade_id: String,
}

/// Server-side settlement for a trade id. `status` is "win" or "loss";
/// payout fields are each present only for the matching status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub status: String,
    pub profit: Option<Decimal>,
    pub lost_amount: Option<Decimal>,
    pub new_balance: Option<Decimal>,
}

impl SettlementResult {
    pub fn is_win(&self) -> bool {
        self.status.eq_ignore_ascii_case("win")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceTick {
    pub price: Decimal,
}
