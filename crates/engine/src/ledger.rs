use core_types::{Order, ProfitSnapshot, SymbolState, Trigger};
use database::RestoredSymbol;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct SymbolEntry {
    step_size: Decimal,
    state: SymbolState,
    profit: Decimal,
    orders: Vec<Order>,
    pause_after_sell: bool,
    trigger: Trigger,
}

/// The in-memory order ledger: one entry per registered symbol, all access
/// serialized by a single mutex. Orders keep insertion order; the partial
/// sell scan walks them newest to oldest and removes by id.
#[derive(Default)]
pub struct OrderLedger {
    inner: Mutex<HashMap<String, SymbolEntry>>,
}

impl OrderLedger {
    /// Rebuilds the ledger from the mirror at startup.
    pub async fn restore(&self, symbols: Vec<RestoredSymbol>) {
        let mut inner = self.inner.lock().await;
        for restored in symbols {
            inner.insert(
                restored.name,
                SymbolEntry {
                    step_size: restored.step_size,
                    state: restored.state,
                    profit: restored.profit,
                    orders: restored.orders,
                    pause_after_sell: false,
                    trigger: Trigger::New,
                },
            );
        }
    }

    pub async fn add_symbol(&self, symbol: &str, step_size: Decimal) {
        self.inner.lock().await.insert(
            symbol.to_string(),
            SymbolEntry {
                step_size,
                ..SymbolEntry::default()
            },
        );
    }

    pub async fn delete_symbol(&self, symbol: &str) {
        self.inner.lock().await.remove(symbol);
    }

    pub async fn contains(&self, symbol: &str) -> bool {
        self.inner.lock().await.contains_key(symbol)
    }

    pub async fn symbols(&self) -> Vec<String> {
        self.inner.lock().await.keys().cloned().collect()
    }

    pub async fn step_size(&self, symbol: &str) -> Option<Decimal> {
        self.inner.lock().await.get(symbol).map(|e| e.step_size)
    }

    pub async fn state(&self, symbol: &str) -> Option<SymbolState> {
        self.inner.lock().await.get(symbol).map(|e| e.state)
    }

    pub async fn set_state(&self, symbol: &str, state: SymbolState) {
        if let Some(entry) = self.inner.lock().await.get_mut(symbol) {
            entry.state = state;
        }
    }

    pub async fn trigger(&self, symbol: &str) -> Trigger {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|e| e.trigger)
            .unwrap_or(Trigger::New)
    }

    pub async fn set_trigger(&self, symbol: &str, trigger: Trigger) {
        if let Some(entry) = self.inner.lock().await.get_mut(symbol) {
            entry.trigger = trigger;
        }
    }

    pub async fn pause_after_sell(&self, symbol: &str) -> bool {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|e| e.pause_after_sell)
            .unwrap_or(false)
    }

    pub async fn set_pause_after_sell(&self, symbol: &str, pause: bool) {
        if let Some(entry) = self.inner.lock().await.get_mut(symbol) {
            entry.pause_after_sell = pause;
        }
    }

    pub async fn push_order(&self, symbol: &str, order: Order) {
        if let Some(entry) = self.inner.lock().await.get_mut(symbol) {
            entry.orders.push(order);
        }
    }

    pub async fn last_order(&self, symbol: &str) -> Option<Order> {
        self.inner
            .lock()
            .await
            .get(symbol)
            .and_then(|e| e.orders.last().cloned())
    }

    /// Snapshot copy for iteration outside the lock.
    pub async fn orders(&self, symbol: &str) -> Vec<Order> {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|e| e.orders.clone())
            .unwrap_or_default()
    }

    /// Removes the orders whose ids are in `ids`; `None` clears the whole
    /// ladder. Unknown ids are ignored.
    pub async fn del_orders(&self, symbol: &str, ids: Option<&[i64]>) {
        if let Some(entry) = self.inner.lock().await.get_mut(symbol) {
            match ids {
                Some(ids) => entry.orders.retain(|o| !ids.contains(&o.id)),
                None => entry.orders.clear(),
            }
        }
    }

    pub async fn summary_executed_qty(&self, symbol: &str) -> Decimal {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|e| e.orders.iter().map(|o| o.executed_qty).sum())
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn total_cost_with_fee(&self, symbol: &str) -> Decimal {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|e| e.orders.iter().map(|o| o.cost_with_fee).sum())
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn add_profit(&self, symbol: &str, delta: Decimal) {
        if let Some(entry) = self.inner.lock().await.get_mut(symbol) {
            entry.profit += delta;
        }
    }

    pub async fn profit(&self, symbol: &str) -> Decimal {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|e| e.profit)
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn summary_profit(&self) -> Decimal {
        self.inner.lock().await.values().map(|e| e.profit).sum()
    }

    /// Derived view of the ladder at `price`. `None` while the ladder is
    /// empty, where the break-even levels are undefined.
    pub async fn profit_snapshot(
        &self,
        symbol: &str,
        price: Decimal,
        target_profit: Decimal,
    ) -> Option<ProfitSnapshot> {
        let inner = self.inner.lock().await;
        let entry = inner.get(symbol)?;
        if entry.orders.is_empty() {
            return None;
        }

        let summary_executed_qty: Decimal = entry.orders.iter().map(|o| o.executed_qty).sum();
        let total_cost_with_fee: Decimal = entry.orders.iter().map(|o| o.cost_with_fee).sum();
        let total_cost_with_fee_tp = total_cost_with_fee * (Decimal::ONE + target_profit);

        Some(ProfitSnapshot {
            price,
            summary_executed_qty,
            total_cost_with_fee,
            be_level_with_fee: total_cost_with_fee / summary_executed_qty,
            total_cost_with_fee_tp,
            be_level_with_fee_tp: total_cost_with_fee_tp / summary_executed_qty,
            current_profit: price * summary_executed_qty - total_cost_with_fee,
            profit_to_target: price * summary_executed_qty - total_cost_with_fee_tp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
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

    async fn ladder() -> OrderLedger {
        let ledger = OrderLedger::default();
        ledger.add_symbol("ADA", dec!(0.1)).await;
        ledger.push_order("ADA", order(1, dec!(1.00), dec!(10), dec!(10.04))).await;
        ledger.push_order("ADA", order(2, dec!(0.99), dec!(10), dec!(9.94))).await;
        ledger.push_order("ADA", order(3, dec!(0.98), dec!(10), dec!(9.84))).await;
        ledger
    }

    #[tokio::test]
    async fn empty_ledger_aggregates_are_zero() {
        let ledger = OrderLedger::default();
        ledger.add_symbol("ADA", dec!(0.1)).await;

        assert_eq!(ledger.summary_executed_qty("ADA").await, Decimal::ZERO);
        assert_eq!(ledger.total_cost_with_fee("ADA").await, Decimal::ZERO);
        assert!(ledger.last_order("ADA").await.is_none());
        assert!(ledger
            .profit_snapshot("ADA", dec!(1.0), dec!(0.01))
            .await
            .is_none());

        // Same for a symbol that was never registered.
        assert_eq!(ledger.summary_executed_qty("BTC").await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn aggregates_track_every_push_and_delete() {
        let ledger = ladder().await;

        assert_eq!(ledger.summary_executed_qty("ADA").await, dec!(30));
        assert_eq!(ledger.total_cost_with_fee("ADA").await, dec!(29.82));

        ledger.del_orders("ADA", Some(&[2, 3])).await;
        assert_eq!(ledger.summary_executed_qty("ADA").await, dec!(10));
        assert_eq!(ledger.total_cost_with_fee("ADA").await, dec!(10.04));

        ledger.del_orders("ADA", None).await;
        assert_eq!(ledger.summary_executed_qty("ADA").await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn del_orders_removes_the_trailing_slice_only() {
        let ledger = ladder().await;

        ledger.del_orders("ADA", Some(&[3])).await;
        let ids: Vec<i64> = ledger.orders("ADA").await.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(ledger.last_order("ADA").await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn profit_snapshot_matches_hand_computation() {
        let ledger = ladder().await;
        let snapshot = ledger
            .profit_snapshot("ADA", dec!(1.00), dec!(0.01))
            .await
            .unwrap();

        assert_eq!(snapshot.summary_executed_qty, dec!(30));
        assert_eq!(snapshot.total_cost_with_fee, dec!(29.82));
        assert_eq!(snapshot.be_level_with_fee, dec!(0.994));
        assert_eq!(snapshot.current_profit, dec!(0.18));
        // 30 - 29.82 * 1.01 = -0.1182: the full-sell target is not met.
        assert_eq!(snapshot.profit_to_target, dec!(-0.1182));
    }

    #[tokio::test]
    async fn profit_accumulates() {
        let ledger = ladder().await;
        ledger.add_profit("ADA", dec!(0.18)).await;
        ledger.add_profit("ADA", dec!(-0.03)).await;
        assert_eq!(ledger.profit("ADA").await, dec!(0.15));
        assert_eq!(ledger.summary_profit().await, dec!(0.15));
    }

    #[tokio::test]
    async fn trigger_and_pause_default_sanely() {
        let ledger = ladder().await;
        assert_eq!(ledger.trigger("ADA").await, Trigger::New);
        assert!(!ledger.pause_after_sell("ADA").await);

        ledger.set_trigger("ADA", Trigger::Sell).await;
        ledger.set_pause_after_sell("ADA", true).await;
        assert_eq!(ledger.trigger("ADA").await, Trigger::Sell);
        assert!(ledger.pause_after_sell("ADA").await);
    }
}
