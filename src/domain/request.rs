use crate::models::{TradeDirection, TradeRequest};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("stake must be a positive amount of at least {minimum}")]
    InvalidAmount { minimum: Decimal },
    #[error("duration {given}s is not offered; allowed: {allowed:?}")]
    InvalidDuration { given: u32, allowed: Vec<u32> },
}

/// Validates user input against the client-side trading limits and snapshots
/// the entry price. Pure: no placement happens here, and a rejected build
/// never reaches the gateway.
pub fn build(
    amount: Decimal,
    symbol: &str,
    direction: TradeDirection,
    duration_secs: u32,
    entry_price: Decimal,
    min_trade_amount: Decimal,
    allowed_durations: &[u32],
) -> Result<TradeRequest, ValidationError> {
    if amount <= Decimal::ZERO || amount < min_trade_amount {
        return Err(ValidationError::InvalidAmount {
            minimum: min_trade_amount,
        });
    }
    if !allowed_durations.contains(&duration_secs) {
        return Err(ValidationError::InvalidDuration {
            given: duration_secs,
            allowed: allowed_durations.to_vec(),
        });
    }
    Ok(TradeRequest {
        symbol: symbol.to_string(),
        amount,
        direction,
        duration_secs,
        entry_price,
    })
}
