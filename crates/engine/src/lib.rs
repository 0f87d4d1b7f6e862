//! The per-instrument trading engine and its shared in-memory state.
//!
//! One `Engine` value owns every store; tasks receive cheap clones (the
//! stores sit behind `Arc`, the API client and mirror behind their own
//! internal pools). The per-symbol tasks (price stream, indicator, trading
//! loop) are tracked in the task registry so operator commands can stop a
//! symbol deterministically; the listen-key refresher and the account
//! stream live for the whole process.

use api_client::BingxClient;
use configuration::settings::{Policy, Settings};
use core_types::{BalanceUpdate, SymbolState};
use database::MirrorRepository;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod commands;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod listen_key;
pub mod stores;
pub mod streams;
pub mod trader;

pub use commands::Command;
pub use error::EngineError;
pub use ledger::OrderLedger;
pub use stores::{AccountStore, ConfigStore, PriceStore, TaskRegistry, QUOTE_ASSET};

#[derive(Clone)]
pub struct Engine {
    pub settings: Arc<Settings>,
    pub policy: Arc<Policy>,
    pub api: BingxClient,
    pub mirror: MirrorRepository,
    pub prices: Arc<PriceStore>,
    pub account: Arc<AccountStore>,
    pub ledger: Arc<OrderLedger>,
    pub config: Arc<ConfigStore>,
    pub tasks: Arc<TaskRegistry>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        policy: Policy,
        api: BingxClient,
        mirror: MirrorRepository,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            policy: Arc::new(policy),
            api,
            mirror,
            prices: Arc::new(PriceStore::default()),
            account: Arc::new(AccountStore::default()),
            ledger: Arc::new(OrderLedger::default()),
            config: Arc::new(ConfigStore::default()),
            tasks: Arc::new(TaskRegistry::default()),
        }
    }

    /// Rebuilds the in-memory ledger and config store from the mirror.
    pub async fn restore_from_mirror(&self) -> Result<(), EngineError> {
        let restored = self.mirror.load_state().await?;

        for symbol in &restored {
            if let (Some(lot), Some(grid_size)) = (symbol.lot, symbol.grid_size) {
                self.config
                    .set_lot_and_grid(&symbol.name, lot, grid_size)
                    .await;
            }
        }

        tracing::info!(symbols = restored.len(), "ledger restored from mirror");
        self.ledger.restore(restored).await;
        Ok(())
    }

    /// Seeds the account store over REST once; from then on the private
    /// stream is authoritative. A failure here only delays balance data
    /// until the stream connects.
    pub async fn bootstrap_balances(&self) {
        match self.api.account_balances().await {
            Ok(response) => {
                let batch: Vec<BalanceUpdate> = response
                    .data
                    .map(|d| d.balances)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| BalanceUpdate {
                        asset: b.asset,
                        wallet_balance: b.free,
                    })
                    .collect();
                self.account.update_balance_batch(batch).await;
            }
            Err(e) => tracing::warn!(error = %e, "balance bootstrap failed, waiting for stream"),
        }
    }

    /// Spawns the process-wide tasks. Their handles are returned rather
    /// than registered: symbol commands must never cancel them.
    pub fn spawn_global_tasks(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(listen_key::listen_key_task(self.clone())),
            tokio::spawn(streams::account_stream(self.clone())),
        ]
    }

    /// Spawns the three per-symbol tasks and registers them. `stagger`
    /// delays the price subscription so a fleet of symbols does not hit
    /// the exchange rate limiter at once.
    pub async fn spawn_symbol_tasks(&self, symbol: &str, stagger_index: u64) {
        let stagger = std::time::Duration::from_secs(stagger_index * 3);

        let price = tokio::spawn(streams::price_stream(
            self.clone(),
            symbol.to_string(),
            stagger,
        ));
        let indicator = tokio::spawn(indicator::indicator_task(self.clone(), symbol.to_string()));
        let trading = tokio::spawn(trader::trading_task(self.clone(), symbol.to_string()));

        self.tasks.add(symbol, price).await;
        self.tasks.add(symbol, indicator).await;
        self.tasks.add(symbol, trading).await;
    }

    /// Starts tasks for every restored symbol whose state is not `stop`.
    pub async fn start_active_symbols(&self) {
        let mut stagger_index = 0u64;
        for symbol in self.ledger.symbols().await {
            let state = self.ledger.state(&symbol).await;
            if state.is_some_and(|s| s != SymbolState::Stop) {
                self.spawn_symbol_tasks(&symbol, stagger_index).await;
                stagger_index += 1;
            }
        }
    }
}
