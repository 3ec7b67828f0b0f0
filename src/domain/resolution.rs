use crate::models::{Outcome, OutcomeKind, SettlementResult, TradeDirection};
use log::warn;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Offline payout magnitude applied to the absolute price delta. A
/// placeholder, not a real payout rate; the settlement payload is the
/// authority whenever it exists.
const FALLBACK_DELTA_SCALE: Decimal = dec!(100);

/// Computes the outcome for an expired trade. The server settlement wins
/// when present; otherwise the entry-vs-current price delta decides the
/// direction bet locally (degraded mode).
pub fn resolve(
    trade_id: &str,
    direction: TradeDirection,
    entry_price: Decimal,
    current_price: Decimal,
    settlement: Option<&SettlementResult>,
) -> Outcome {
    if let Some(result) = settlement {
        return from_settlement(result);
    }
    warn!(
        "trade {}: no settlement by expiry, resolving from local price delta",
        trade_id
    );
    from_price_delta(direction, entry_price, current_price)
}

fn from_settlement(result: &SettlementResult) -> Outcome {
    if result.is_win() {
        Outcome {
            kind: OutcomeKind::Profit,
            amount: result.profit.unwrap_or(Decimal::ZERO),
        }
    } else {
        Outcome {
            kind: OutcomeKind::Loss,
            amount: result.lost_amount.unwrap_or(Decimal::ZERO),
        }
    }
}

fn from_price_delta(
    direction: TradeDirection,
    entry_price: Decimal,
    current_price: Decimal,
) -> Outcome {
    let delta = current_price - entry_price;
    let won = match direction {
        TradeDirection::Call => delta > Decimal::ZERO,
        TradeDirection::Put => delta < Decimal::ZERO,
    };
    Outcome {
        kind: if won {
            OutcomeKind::Profit
        } else {
            OutcomeKind::Loss
        },
        amount: delta.abs() * FALLBACK_DELTA_SCALE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win_settlement(profit: Decimal) -> SettlementResult {
        SettlementResult {
            status: "win".to_string(),
            profit: Some(profit),
            lost_amount: None,
            new_balance: None,
        }
    }

    #[test]
    fn settlement_win_takes_priority_over_losing_delta() {
        // Price moved against the bet, but the server says win.
        let outcome = resolve(
            "t1",
            TradeDirection::Call,
            dec!(100),
            dec!(95),
            Some(&win_settlement(dec!(120))),
        );
        assert_eq!(outcome.kind, OutcomeKind::Profit);
        assert_eq!(outcome.amount, dec!(120));
    }

    #[test]
    fn settlement_loss_uses_lost_amount() {
        let settlement = SettlementResult {
            status: "loss".to_string(),
            profit: None,
            lost_amount: Some(dec!(50)),
            new_balance: Some(dec!(950)),
        };
        let outcome = resolve(
            "t1",
            TradeDirection::Put,
            dec!(100),
            dec!(90),
            Some(&settlement),
        );
        assert_eq!(outcome.kind, OutcomeKind::Loss);
        assert_eq!(outcome.amount, dec!(50));
    }

    #[test]
    fn fallback_call_profits_when_price_rose() {
        let outcome = resolve("t1", TradeDirection::Call, dec!(100), dec!(105), None);
        assert_eq!(outcome.kind, OutcomeKind::Profit);
        assert_eq!(outcome.amount, dec!(500));
    }

    #[test]
    fn fallback_put_loses_when_price_rose() {
        let outcome = resolve("t1", TradeDirection::Put, dec!(100), dec!(105), None);
        assert_eq!(outcome.kind, OutcomeKind::Loss);
        assert_eq!(outcome.amount, dec!(500));
    }

    #[test]
    fn fallback_flat_price_is_a_loss() {
        for direction in [TradeDirection::Call, TradeDirection::Put] {
            let outcome = resolve("t1", direction, dec!(100), dec!(100), None);
            assert_eq!(outcome.kind, OutcomeKind::Loss);
            assert_eq!(outcome.amount, Decimal::ZERO);
        }
    }
}
