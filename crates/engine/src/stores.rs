use core_types::{BalanceUpdate, PriceTick, UsdtGate};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Quote asset every pair trades against.
pub const QUOTE_ASSET: &str = "USDT";

/// Last tick per symbol as fed by the price streams.
#[derive(Default)]
pub struct PriceStore {
    inner: Mutex<HashMap<String, PriceTick>>,
}

impl PriceStore {
    pub async fn update(&self, symbol: &str, tick: PriceTick) {
        self.inner.lock().await.insert(symbol.to_string(), tick);
    }

    /// `None` until the first tick for the symbol has arrived.
    pub async fn get(&self, symbol: &str) -> Option<PriceTick> {
        self.inner.lock().await.get(symbol).copied()
    }
}

#[derive(Default)]
struct AccountInner {
    balances: HashMap<String, Decimal>,
    listen_key: Option<String>,
    usdt_gate: UsdtGate,
}

/// Account-wide state: wallet balances, the private-stream session key and
/// the insufficient-funds latch, behind one lock.
#[derive(Default)]
pub struct AccountStore {
    inner: Mutex<AccountInner>,
}

impl AccountStore {
    /// Applies one `a.B` batch from the private stream (also used for the
    /// REST bootstrap snapshot).
    pub async fn update_balance_batch(&self, batch: Vec<BalanceUpdate>) {
        let mut inner = self.inner.lock().await;
        for update in batch {
            inner.balances.insert(update.asset, update.wallet_balance);
        }
    }

    /// Free balance of an asset; zero when the account never held it.
    pub async fn balance(&self, asset: &str) -> Decimal {
        self.inner
            .lock()
            .await
            .balances
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn set_listen_key(&self, key: String) {
        self.inner.lock().await.listen_key = Some(key);
    }

    pub async fn listen_key(&self) -> Option<String> {
        self.inner.lock().await.listen_key.clone()
    }

    pub async fn usdt_gate(&self) -> UsdtGate {
        self.inner.lock().await.usdt_gate
    }

    pub async fn set_usdt_gate(&self, gate: UsdtGate) {
        self.inner.lock().await.usdt_gate = gate;
    }

    /// The USDT latch, evaluated before each buy.
    ///
    /// Returns `None` when buying may proceed, otherwise the refusal report.
    /// A blocked latch reports loudly once (`Block` -> `ContinueBlock`) and
    /// quietly afterwards; observing a balance above the lot releases it.
    pub async fn usdt_gate_report(&self, lot: Decimal) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let usdt_balance = inner
            .balances
            .get(QUOTE_ASSET)
            .copied()
            .unwrap_or(Decimal::ZERO);

        if usdt_balance > lot
            && matches!(inner.usdt_gate, UsdtGate::Block | UsdtGate::ContinueBlock)
        {
            tracing::warn!(%usdt_balance, "USDT balance replenished, unblocking buys");
            inner.usdt_gate = UsdtGate::Unblock;
        }

        let report = format!("balance too low: {}", usdt_balance);
        match inner.usdt_gate {
            UsdtGate::Block => {
                inner.usdt_gate = UsdtGate::ContinueBlock;
                tracing::warn!(%usdt_balance, "buying blocked on insufficient USDT");
                Some(report)
            }
            UsdtGate::ContinueBlock => Some(report),
            UsdtGate::Unblock => None,
        }
    }
}

/// Per-symbol dynamic parameters derived by the indicator engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolConfig {
    pub lot: Decimal,
    pub grid_size: Decimal,
    /// One-shot latch: the first RSI verdict arms the trading loop.
    pub init_rsi: bool,
}

#[derive(Default)]
pub struct ConfigStore {
    inner: Mutex<HashMap<String, SymbolConfig>>,
}

impl ConfigStore {
    pub async fn get(&self, symbol: &str) -> Option<SymbolConfig> {
        self.inner.lock().await.get(symbol).copied()
    }

    /// Current lot; zero until the indicator has produced one.
    pub async fn lot(&self, symbol: &str) -> Decimal {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|c| c.lot)
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn grid_size(&self, symbol: &str) -> Option<Decimal> {
        self.inner.lock().await.get(symbol).map(|c| c.grid_size)
    }

    pub async fn set_lot_and_grid(&self, symbol: &str, lot: Decimal, grid_size: Decimal) {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(symbol.to_string()).or_default();
        entry.lot = lot;
        entry.grid_size = grid_size;
    }

    pub async fn set_init_rsi(&self, symbol: &str) {
        self.inner
            .lock()
            .await
            .entry(symbol.to_string())
            .or_default()
            .init_rsi = true;
    }

    pub async fn init_rsi(&self, symbol: &str) -> bool {
        self.inner
            .lock()
            .await
            .get(symbol)
            .map(|c| c.init_rsi)
            .unwrap_or(false)
    }

    pub async fn remove(&self, symbol: &str) {
        self.inner.lock().await.remove(symbol);
    }
}

/// Background tasks per symbol, so operator commands can stop a symbol
/// deterministically.
#[derive(Default)]
pub struct TaskRegistry {
    inner: Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
}

impl TaskRegistry {
    pub async fn add(&self, symbol: &str, handle: JoinHandle<()>) {
        self.inner
            .lock()
            .await
            .entry(symbol.to_string())
            .or_default()
            .push(handle);
    }

    pub async fn is_running(&self, symbol: &str) -> bool {
        self.inner
            .lock()
            .await
            .get(symbol)
            .is_some_and(|handles| handles.iter().any(|h| !h.is_finished()))
    }

    /// Aborts and awaits every task of the symbol. Cancellation is the
    /// expected outcome and is swallowed; anything else is logged. Calling
    /// this for a symbol with no tasks is a no-op, which makes `stop`
    /// idempotent.
    pub async fn cancel(&self, symbol: &str) {
        let handles = self.inner.lock().await.remove(symbol).unwrap_or_default();

        for handle in handles {
            handle.abort();
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!(symbol, error = %e, "symbol task ended abnormally"),
            }
        }
    }

    /// Cancels everything; used on shutdown.
    pub async fn cancel_all(&self) {
        let symbols: Vec<String> = self.inner.lock().await.keys().cloned().collect();
        for symbol in symbols {
            self.cancel(&symbol).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn batch(asset: &str, amount: Decimal) -> Vec<BalanceUpdate> {
        vec![BalanceUpdate {
            asset: asset.to_string(),
            wallet_balance: amount,
        }]
    }

    #[tokio::test]
    async fn price_store_returns_none_until_populated() {
        let store = PriceStore::default();
        assert!(store.get("ADA").await.is_none());

        store
            .update(
                "ADA",
                PriceTick {
                    ts: 1,
                    price: dec!(1.0),
                },
            )
            .await;
        assert_eq!(store.get("ADA").await.unwrap().price, dec!(1.0));
    }

    #[tokio::test]
    async fn unknown_asset_balance_is_zero() {
        let store = AccountStore::default();
        assert_eq!(store.balance("ADA").await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn usdt_gate_hysteresis() {
        let store = AccountStore::default();
        store.update_balance_batch(batch(QUOTE_ASSET, dec!(1.5))).await;

        // Open latch: buying allowed.
        assert!(store.usdt_gate_report(dec!(10)).await.is_none());

        // Exchange rejected a buy: the engine latches.
        store.set_usdt_gate(UsdtGate::Block).await;

        // First refusal reports and advances to the quiet state.
        assert!(store.usdt_gate_report(dec!(10)).await.is_some());
        assert_eq!(store.usdt_gate().await, UsdtGate::ContinueBlock);

        // Still blocked while the balance stays below the lot.
        assert!(store.usdt_gate_report(dec!(10)).await.is_some());

        // Balance recovers above the lot: latch releases on the next check.
        store.update_balance_batch(batch(QUOTE_ASSET, dec!(50))).await;
        assert!(store.usdt_gate_report(dec!(10)).await.is_none());
        assert_eq!(store.usdt_gate().await, UsdtGate::Unblock);
    }

    #[tokio::test]
    async fn init_rsi_is_a_one_shot_latch() {
        let store = ConfigStore::default();
        assert!(!store.init_rsi("ADA").await);

        store.set_lot_and_grid("ADA", dec!(10), dec!(0.01)).await;
        assert!(!store.init_rsi("ADA").await);

        store.set_init_rsi("ADA").await;
        assert!(store.init_rsi("ADA").await);

        // Re-scaling lot and grid must not clear the latch.
        store.set_lot_and_grid("ADA", dec!(20), dec!(0.02)).await;
        assert!(store.init_rsi("ADA").await);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_awaits_tasks() {
        let registry = TaskRegistry::default();

        let handle = tokio::spawn(async {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            }
        });
        registry.add("ADA", handle).await;
        assert!(registry.is_running("ADA").await);

        registry.cancel("ADA").await;
        assert!(!registry.is_running("ADA").await);

        // Second stop finds nothing to do.
        registry.cancel("ADA").await;
        assert!(!registry.is_running("ADA").await);
    }
}
