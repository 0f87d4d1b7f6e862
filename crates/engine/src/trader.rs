use crate::Engine;
use api_client::{ApiResponse, OrderData};
use chrono::{TimeZone, Utc};
use core_types::{decimal_places, Order, OrderSide, SymbolState, Trigger, UsdtGate};
use database::NewOrder;
use rust_decimal::{Decimal, RoundingStrategy};
use std::time::Duration;

const CYCLE: Duration = Duration::from_secs(1);
const INIT_POLL: Duration = Duration::from_millis(300);
const PAUSE_AFTER_SELL: Duration = Duration::from_secs(5);

/// Grid level below which the next buy fires.
fn next_buy_level(last_price: Decimal, grid_size: Decimal) -> Decimal {
    last_price * (Decimal::ONE - grid_size)
}

/// Quantities sent to the exchange are truncated to the step-size scale;
/// rounding up could exceed the balance.
fn round_qty_down(quantity: Decimal, step_size: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(decimal_places(step_size), RoundingStrategy::ToZero)
}

/// The slice of the ladder a partial sell would consume.
#[derive(Debug, PartialEq)]
struct PartialSlice {
    qty: Decimal,
    cost_with_fee: Decimal,
    ids: Vec<i64>,
}

/// Scans the ladder newest to oldest, accumulating orders whose running
/// proceeds clear the running fee-inflated cost. An order that would sink
/// the slice below target is rolled back and the scan continues: an older,
/// cheaper order may still qualify on its own.
fn partial_sell_slice(
    orders: &[Order],
    price: Decimal,
    partly_target_profit: Decimal,
) -> Option<PartialSlice> {
    let threshold_factor = Decimal::ONE + partly_target_profit;

    let mut partly_profit = Decimal::ZERO;
    let mut partly_threshold = Decimal::ZERO;
    let mut slice = PartialSlice {
        qty: Decimal::ZERO,
        cost_with_fee: Decimal::ZERO,
        ids: Vec::new(),
    };

    for order in orders.iter().rev() {
        let gain = order.executed_qty * price;
        let threshold = order.cost_with_fee * threshold_factor;

        partly_profit += gain;
        partly_threshold += threshold;

        if partly_profit >= partly_threshold {
            slice.qty += order.executed_qty;
            slice.cost_with_fee += order.cost_with_fee;
            slice.ids.push(order.id);
        } else {
            partly_profit -= gain;
            partly_threshold -= threshold;
        }
    }

    (slice.qty > Decimal::ZERO).then_some(slice)
}

/// Places a MARKET buy of one lot at the current price. Returns the
/// operator-facing report; the ledger and mirror are only touched after
/// the exchange acknowledged the fill.
pub async fn place_buy_order(engine: &Engine, symbol: &str, price: Decimal) -> String {
    let lot = engine.config.lot(symbol).await;
    if lot.is_zero() {
        let report = format!("no lot derived for {} yet", symbol);
        tracing::warn!(symbol, "buy refused: lot is zero");
        return report;
    }

    if let Some(report) = engine.account.usdt_gate_report(lot).await {
        return report;
    }

    let Some(step_size) = engine.ledger.step_size(symbol).await else {
        return format!("unknown symbol {}", symbol);
    };

    let execute_qty = round_qty_down(lot / price, step_size);

    // Optional mode: when the base-asset balance cannot cover future
    // sell-side fees, buy a reserve on top of the lot.
    let (quantity, fee_reserved) = if engine.policy.fee_reserve_enabled {
        let base_balance = engine.account.balance(symbol).await;
        let fee_reserve = execute_qty * engine.policy.fee_reserve;
        if base_balance > fee_reserve {
            (execute_qty, false)
        } else {
            (round_qty_down(lot / price + fee_reserve, step_size), true)
        }
    } else {
        (execute_qty, false)
    };

    if quantity.is_zero() {
        return format!("lot {} too small for step size {} of {}", lot, step_size, symbol);
    }

    let response = match engine.api.place_order(symbol, OrderSide::Buy, quantity).await {
        Ok(response) => response,
        Err(e) => {
            let report = format!("order NOT opened {}: {}", symbol, e);
            tracing::error!(symbol, error = %e, "buy dispatch failed");
            return report;
        }
    };

    let Some(data) = response.data else {
        if response.code == ApiResponse::<OrderData>::INSUFFICIENT_FUNDS {
            engine.account.set_usdt_gate(UsdtGate::Block).await;
        }
        let report = format!(
            "order NOT opened {}: code {} {}",
            symbol,
            response.code,
            response.msg.unwrap_or_default()
        );
        tracing::error!(symbol, %report, "buy rejected by exchange");
        return report;
    };

    // With a fee reserve the executed quantity intentionally exceeds the
    // lot; the ledger then carries the lot-sized figures so the sell side
    // never tries to sell the reserve.
    let (executed_qty, cost) = if fee_reserved {
        (execute_qty, price * execute_qty)
    } else {
        (data.executed_qty, data.cummulative_quote_qty)
    };
    let cost_with_fee = cost * (Decimal::ONE + engine.policy.taker_maker());
    let open_time = Utc
        .timestamp_millis_opt(data.transact_time)
        .single()
        .unwrap_or_else(Utc::now);

    let new_order = NewOrder {
        price: data.price,
        executed_qty,
        cost,
        cost_with_fee,
        open_time,
    };

    let id = match engine.mirror.add_order(symbol, &new_order).await {
        Ok(id) => id,
        Err(e) => {
            // The fill is real but unrecorded; surface it loudly instead of
            // inventing a ledger entry the mirror does not know about.
            let report = format!("order filled for {} but mirror insert failed: {}", symbol, e);
            tracing::error!(symbol, error = %e, "mirror insert failed after fill");
            return report;
        }
    };

    engine
        .ledger
        .push_order(
            symbol,
            Order {
                id,
                price: data.price,
                executed_qty,
                cost,
                cost_with_fee,
                open_time,
            },
        )
        .await;

    let report = format!(
        "order opened {}: qty {} at {} cost_with_fee {}",
        symbol, executed_qty, data.price, cost_with_fee
    );
    tracing::info!(symbol, %report, "buy filled");
    report
}

/// Sells `summary_executed` of the base asset at market and settles the
/// ledger: realized profit is `cummulativeQuoteQty` minus the removed
/// orders' cost-with-fee. Mirror profit update and order deletion commit
/// in one transaction; `ids = None` clears the whole ladder.
pub async fn place_sell_order(
    engine: &Engine,
    symbol: &str,
    summary_executed: Decimal,
    total_cost_with_fee: Decimal,
    ids: Option<Vec<i64>>,
) -> String {
    let Some(step_size) = engine.ledger.step_size(symbol).await else {
        return format!("unknown symbol {}", symbol);
    };

    let quantity = round_qty_down(summary_executed, step_size);
    if quantity.is_zero() {
        return format!("nothing to sell for {}", symbol);
    }

    let response = match engine.api.place_order(symbol, OrderSide::Sell, quantity).await {
        Ok(response) => response,
        Err(e) => {
            let report = format!("sell failed {}: {}", symbol, e);
            tracing::error!(symbol, error = %e, "sell dispatch failed");
            return report;
        }
    };

    let Some(data) = response.data else {
        let report = format!(
            "sell failed {}: code {} {}",
            symbol,
            response.code,
            response.msg.unwrap_or_default()
        );
        tracing::error!(symbol, %report, "sell rejected by exchange, ledger untouched");
        return report;
    };

    let real_profit = data.cummulative_quote_qty - total_cost_with_fee;

    engine.ledger.set_pause_after_sell(symbol, true).await;

    if let Err(e) = engine.mirror.commit_sell(symbol, real_profit, ids.as_deref()).await {
        // The exchange sale happened; memory must follow it even if the
        // mirror write failed, otherwise the loop would sell again.
        tracing::error!(symbol, error = %e, "mirror commit failed after sell, mirror out of sync");
    }

    engine.ledger.add_profit(symbol, real_profit).await;
    engine.ledger.del_orders(symbol, ids.as_deref()).await;

    let report = format!(
        "orders closed {}: sold {} at proceeds {} against cost {} -> profit {}",
        symbol, quantity, data.cummulative_quote_qty, total_cost_with_fee, real_profit
    );
    tracing::info!(symbol, %report, "sell filled");
    report
}

/// One decision cycle. Split from the loop so the sequencing reads top to
/// bottom: full sell, partial sell, then the buy ladder.
async fn tick_cycle(engine: &Engine, symbol: &str) {
    let Some(tick) = engine.prices.get(symbol).await else {
        return;
    };
    let price = tick.price;

    if engine.ledger.state(symbol).await != Some(SymbolState::Track) {
        return;
    }

    let summary_executed = engine.ledger.summary_executed_qty(symbol).await;
    if summary_executed > Decimal::ZERO {
        let total_cost_with_fee = engine.ledger.total_cost_with_fee(symbol).await;
        let profit_to_target = price * summary_executed
            - total_cost_with_fee * (Decimal::ONE + engine.policy.target_profit);

        if profit_to_target > Decimal::ZERO {
            place_sell_order(engine, symbol, summary_executed, total_cost_with_fee, None).await;
            return;
        }

        if engine.ledger.trigger(symbol).await == Trigger::Sell {
            if let Some(last) = engine.ledger.last_order(symbol).await {
                if price > last.price {
                    let orders = engine.ledger.orders(symbol).await;
                    if let Some(slice) =
                        partial_sell_slice(&orders, price, engine.policy.partly_target_profit)
                    {
                        place_sell_order(
                            engine,
                            symbol,
                            slice.qty,
                            slice.cost_with_fee,
                            Some(slice.ids),
                        )
                        .await;
                        return;
                    }
                }
            }
        }
    }

    if engine.ledger.trigger(symbol).await == Trigger::Buy {
        if engine.ledger.pause_after_sell(symbol).await {
            // Cool-off after a sell; the next cycle may buy again.
            tokio::time::sleep(PAUSE_AFTER_SELL).await;
            engine.ledger.set_pause_after_sell(symbol, false).await;
            return;
        }

        match engine.ledger.last_order(symbol).await {
            None => {
                place_buy_order(engine, symbol, price).await;
            }
            Some(last) => {
                let grid_size = engine
                    .config
                    .grid_size(symbol)
                    .await
                    .unwrap_or(engine.policy.grid_step);
                if price < next_buy_level(last.price, grid_size) {
                    place_buy_order(engine, symbol, price).await;
                }
            }
        }
    }
}

/// Per-symbol trading loop. Armed by the indicator's first RSI verdict,
/// then decides once a second against the live price and ledger state.
pub async fn trading_task(engine: Engine, symbol: String) {
    while !engine.config.init_rsi(&symbol).await {
        tokio::time::sleep(INIT_POLL).await;
    }

    tracing::info!(symbol, "trading loop started");

    loop {
        tick_cycle(&engine, &symbol).await;
        tokio::time::sleep(CYCLE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(id: i64, price: Decimal, qty: Decimal, cost_with_fee: Decimal) -> Order {
        Order {
            id,
            price,
            executed_qty: qty,
            cost: cost_with_fee / dec!(1.004),
            cost_with_fee,
            open_time: Utc::now(),
        }
    }

    #[test]
    fn buy_fires_below_the_grid_level() {
        let level = next_buy_level(dec!(1.00), dec!(0.01));
        assert_eq!(level, dec!(0.99));
        assert!(dec!(0.989) < level);
        assert!(!(dec!(0.995) < level));
    }

    #[test]
    fn quantities_truncate_to_step_scale() {
        assert_eq!(round_qty_down(dec!(10.059), dec!(0.1)), dec!(10.0));
        assert_eq!(round_qty_down(dec!(10.999), dec!(1)), dec!(10));
        assert_eq!(round_qty_down(dec!(0.00123456), dec!(0.0001)), dec!(0.0012));
    }

    #[test]
    fn partial_sell_takes_the_whole_profitable_ladder() {
        // Three rungs bought on the way down, price back at the top.
        let orders = vec![
            order(1, dec!(1.00), dec!(10), dec!(10.04)),
            order(2, dec!(0.99), dec!(10), dec!(9.94)),
            order(3, dec!(0.98), dec!(10), dec!(9.84)),
        ];

        let slice = partial_sell_slice(&orders, dec!(1.00), dec!(0.006)).unwrap();
        assert_eq!(slice.qty, dec!(30));
        assert_eq!(slice.cost_with_fee, dec!(29.82));
        // Newest first, the scan order.
        assert_eq!(slice.ids, vec![3, 2, 1]);
    }

    #[test]
    fn single_order_sells_only_past_the_threshold() {
        let orders = vec![order(1, dec!(1.00), dec!(10), dec!(10.04))];

        // 10.05 proceeds < 10.04 * 1.006: keep holding.
        assert!(partial_sell_slice(&orders, dec!(1.005), dec!(0.006)).is_none());

        // 10.2 proceeds clear the threshold: sell it.
        let slice = partial_sell_slice(&orders, dec!(1.02), dec!(0.006)).unwrap();
        assert_eq!(slice.qty, dec!(10));
        assert_eq!(slice.ids, vec![1]);
    }

    #[test]
    fn rejected_order_is_rolled_back_and_scan_continues() {
        // The newest rung was bought above the current price and would sink
        // the slice; the old cheap rung still qualifies alone.
        let orders = vec![
            order(1, dec!(0.90), dec!(10), dec!(9.036)),
            order(2, dec!(1.05), dec!(10), dec!(10.54)),
        ];

        let slice = partial_sell_slice(&orders, dec!(1.00), dec!(0.006)).unwrap();
        assert_eq!(slice.ids, vec![1]);
        assert_eq!(slice.qty, dec!(10));
        assert_eq!(slice.cost_with_fee, dec!(9.036));
    }

    #[test]
    fn empty_ladder_never_sells() {
        assert!(partial_sell_slice(&[], dec!(1.00), dec!(0.006)).is_none());
    }
}
