use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One rung of a symbol's buy ladder.
///
/// `id` is the durable key handed out by the ledger mirror when the order is
/// inserted; removal by a completed sell is keyed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Fill price reported by the exchange.
    pub price: Decimal,
    /// Base-asset amount actually executed.
    pub executed_qty: Decimal,
    /// Quote currency spent (`cummulativeQuoteQty`).
    pub cost: Decimal,
    /// `cost * (1 + TAKER + MAKER)` frozen at fill time.
    pub cost_with_fee: Decimal,
    /// Exchange transact timestamp.
    pub open_time: DateTime<Utc>,
}

/// Last observed trade for a symbol: server milliseconds and price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTick {
    pub ts: i64,
    pub price: Decimal,
}

/// One entry of the `a.B` balance batch on the private stream.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceUpdate {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "wb")]
    pub wallet_balance: Decimal,
}

/// Derived view over a symbol's open orders at a given price, as shown to
/// the operator. Never stored; recomputed from the ledger on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitSnapshot {
    pub price: Decimal,
    pub summary_executed_qty: Decimal,
    pub total_cost_with_fee: Decimal,
    /// Break-even price including fees.
    pub be_level_with_fee: Decimal,
    /// Cost inflated by the full-sell target profit.
    pub total_cost_with_fee_tp: Decimal,
    pub be_level_with_fee_tp: Decimal,
    pub current_profit: Decimal,
    pub profit_to_target: Decimal,
}

/// Number of fractional digits in a step size, e.g. `0.001` -> 3.
/// Quantities sent to the exchange are truncated to this many places.
pub fn decimal_places(step_size: Decimal) -> u32 {
    step_size.normalize().scale()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_places_of_common_steps() {
        assert_eq!(decimal_places(dec!(1)), 0);
        assert_eq!(decimal_places(dec!(0.1)), 1);
        assert_eq!(decimal_places(dec!(0.001)), 3);
        // Trailing zeros carried by the wire format must not widen the scale.
        assert_eq!(decimal_places(dec!(0.0100)), 2);
        assert_eq!(decimal_places(dec!(10)), 0);
    }
}
