use crate::{trader, Engine};
use core_types::SymbolState;
use rust_decimal::Decimal;

/// An operator command, parsed from the console's text patterns
/// (`track_ADA`, `s_all_BTC`, ...). The console itself lives outside this
/// crate; it parses, authorizes and relays the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Track(String),
    Pause(String),
    Stop(String),
    Add(String),
    Del(String),
    Buy(String),
    Sell(String),
    SellAll(String),
    Profit(String),
    DelAll(String),
}

impl Command {
    /// Longest prefixes first where they overlap (`s_all_` before `s_`).
    const PATTERNS: [(&'static str, fn(String) -> Command); 10] = [
        ("track_", Command::Track),
        ("pause_", Command::Pause),
        ("stop_", Command::Stop),
        ("add_", Command::Add),
        ("del_", Command::Del),
        ("d_all_", Command::DelAll),
        ("s_all_", Command::SellAll),
        ("profit_", Command::Profit),
        ("b_", Command::Buy),
        ("s_", Command::Sell),
    ];

    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        for (prefix, build) in Self::PATTERNS {
            if let Some(symbol) = text.strip_prefix(prefix) {
                if !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Some(build(symbol.to_uppercase()));
                }
            }
        }
        None
    }
}

impl Engine {
    /// Commands are authorized by a numeric operator id match.
    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.settings.admin
    }

    /// Executes one operator command and returns the textual reply.
    pub async fn execute(&self, command: Command) -> String {
        match command {
            Command::Track(s) => self.track(&s).await,
            Command::Pause(s) => self.pause(&s).await,
            Command::Stop(s) => self.stop(&s).await,
            Command::Add(s) => self.add(&s).await,
            Command::Del(s) => self.del(&s).await,
            Command::Buy(s) => self.buy(&s).await,
            Command::Sell(s) => self.sell_last(&s).await,
            Command::SellAll(s) => self.sell_all(&s).await,
            Command::Profit(s) => self.profit_report(&s).await,
            Command::DelAll(s) => self.del_all_orders(&s).await,
        }
    }

    /// Starts tracking: state goes to `track` and the symbol tasks are
    /// spawned unless they are already running.
    pub async fn track(&self, symbol: &str) -> String {
        if !self.ledger.contains(symbol).await {
            return format!("unknown symbol {}, run add_{} first", symbol, symbol);
        }
        if let Err(e) = self.mirror.set_state(symbol, SymbolState::Track).await {
            return format!("failed to persist state for {}: {}", symbol, e);
        }
        self.ledger.set_state(symbol, SymbolState::Track).await;

        if !self.tasks.is_running(symbol).await {
            self.spawn_symbol_tasks(symbol, 0).await;
        }
        format!("{} is tracking", symbol)
    }

    /// Pauses trading decisions; streams and indicators keep running so a
    /// later `track` resumes with warm state.
    pub async fn pause(&self, symbol: &str) -> String {
        if !self.ledger.contains(symbol).await {
            return format!("unknown symbol {}", symbol);
        }
        if let Err(e) = self.mirror.set_state(symbol, SymbolState::Pause).await {
            return format!("failed to persist state for {}: {}", symbol, e);
        }
        self.ledger.set_state(symbol, SymbolState::Pause).await;
        format!("{} paused", symbol)
    }

    /// Stops the symbol: state is persisted first, then every symbol task
    /// is cancelled and awaited. Stopping twice is a no-op.
    pub async fn stop(&self, symbol: &str) -> String {
        if !self.ledger.contains(symbol).await {
            return format!("unknown symbol {}", symbol);
        }
        if let Err(e) = self.mirror.set_state(symbol, SymbolState::Stop).await {
            return format!("failed to persist state for {}: {}", symbol, e);
        }
        self.ledger.set_state(symbol, SymbolState::Stop).await;
        self.tasks.cancel(symbol).await;
        format!("{} stopped", symbol)
    }

    /// Registers a symbol: fetches its step size, mirrors it and creates
    /// the ledger entry in `stop` state.
    pub async fn add(&self, symbol: &str) -> String {
        if self.ledger.contains(symbol).await {
            return format!("{} is already registered", symbol);
        }

        let response = match self.api.symbol_info(symbol).await {
            Ok(response) => response,
            Err(e) => return format!("failed to fetch symbol info for {}: {}", symbol, e),
        };
        let code = response.code;
        let Some(info) = response.data.and_then(|d| d.symbols.into_iter().next()) else {
            return format!("no symbol info for {} (code {})", symbol, code);
        };

        if let Err(e) = self.mirror.add_symbol(symbol, info.step_size).await {
            return format!("failed to mirror {}: {}", symbol, e);
        }
        self.ledger.add_symbol(symbol, info.step_size).await;
        format!("{} added, step size {}", symbol, info.step_size)
    }

    /// Deletes a symbol. Refused unless it is stopped, its ladder is empty
    /// and its profit counter is zero, so nothing is lost silently.
    pub async fn del(&self, symbol: &str) -> String {
        match self.ledger.state(symbol).await {
            None => return format!("unknown symbol {}", symbol),
            Some(state) if state != SymbolState::Stop => {
                return format!("status must be stop first, {} is {}", symbol, state);
            }
            Some(_) => {}
        }
        if !self.ledger.orders(symbol).await.is_empty() {
            return format!("{} still has open orders", symbol);
        }
        if self.ledger.profit(symbol).await != Decimal::ZERO {
            return format!("{} still carries profit, collect it first", symbol);
        }

        if let Err(e) = self.mirror.delete_symbol(symbol).await {
            return format!("failed to delete {} from mirror: {}", symbol, e);
        }
        self.ledger.delete_symbol(symbol).await;
        self.config.remove(symbol).await;
        format!("{} deleted", symbol)
    }

    /// Manual market buy at the live price.
    pub async fn buy(&self, symbol: &str) -> String {
        let Some(tick) = self.prices.get(symbol).await else {
            return format!("no live price for {} yet", symbol);
        };
        trader::place_buy_order(self, symbol, tick.price).await
    }

    /// Manual sell of the newest order only.
    pub async fn sell_last(&self, symbol: &str) -> String {
        let Some(last) = self.ledger.last_order(symbol).await else {
            return format!("no open orders for {}", symbol);
        };
        trader::place_sell_order(
            self,
            symbol,
            last.executed_qty,
            last.cost_with_fee,
            Some(vec![last.id]),
        )
        .await
    }

    /// Sells the whole ladder at market.
    pub async fn sell_all(&self, symbol: &str) -> String {
        let summary_executed = self.ledger.summary_executed_qty(symbol).await;
        if summary_executed == Decimal::ZERO {
            return format!("no open orders for {}", symbol);
        }
        let total_cost_with_fee = self.ledger.total_cost_with_fee(symbol).await;
        trader::place_sell_order(self, symbol, summary_executed, total_cost_with_fee, None).await
    }

    /// Current ladder figures at the live price plus the realized profit.
    pub async fn profit_report(&self, symbol: &str) -> String {
        if !self.ledger.contains(symbol).await {
            return format!("unknown symbol {}", symbol);
        }
        let profit = self.ledger.profit(symbol).await;

        let Some(tick) = self.prices.get(symbol).await else {
            return format!("{}: realized profit {}, no live price yet", symbol, profit);
        };

        match self
            .ledger
            .profit_snapshot(symbol, tick.price, self.policy.target_profit)
            .await
        {
            Some(s) => format!(
                "{}: price {}\n\
                 qty {} cost_with_fee {}\n\
                 break-even {} (with target {})\n\
                 current profit {} to target {}\n\
                 realized profit {}",
                symbol,
                s.price,
                s.summary_executed_qty,
                s.total_cost_with_fee,
                s.be_level_with_fee,
                s.be_level_with_fee_tp,
                s.current_profit,
                s.profit_to_target,
                profit
            ),
            None => format!("{}: realized profit {}, no open orders", symbol, profit),
        }
    }

    /// Wipes the ladder from memory and mirror without selling.
    pub async fn del_all_orders(&self, symbol: &str) -> String {
        if !self.ledger.contains(symbol).await {
            return format!("unknown symbol {}", symbol);
        }
        if let Err(e) = self.mirror.del_orders(symbol, None).await {
            return format!("failed to wipe mirror orders for {}: {}", symbol, e);
        }
        self.ledger.del_orders(symbol, None).await;
        format!("orders wiped for {}", symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_uppercased_symbol() {
        assert_eq!(Command::parse("track_ada"), Some(Command::Track("ADA".into())));
        assert_eq!(Command::parse("pause_BTC"), Some(Command::Pause("BTC".into())));
        assert_eq!(Command::parse("stop_ADA"), Some(Command::Stop("ADA".into())));
        assert_eq!(Command::parse("add_sol"), Some(Command::Add("SOL".into())));
        assert_eq!(Command::parse("del_sol"), Some(Command::Del("SOL".into())));
        assert_eq!(Command::parse("profit_ada"), Some(Command::Profit("ADA".into())));
        assert_eq!(Command::parse("d_all_ada"), Some(Command::DelAll("ADA".into())));
    }

    #[test]
    fn sell_all_wins_over_sell() {
        assert_eq!(Command::parse("s_all_ada"), Some(Command::SellAll("ADA".into())));
        assert_eq!(Command::parse("s_ada"), Some(Command::Sell("ADA".into())));
        assert_eq!(Command::parse("b_ada"), Some(Command::Buy("ADA".into())));
    }

    #[test]
    fn junk_is_rejected() {
        assert_eq!(Command::parse("track_"), None);
        assert_eq!(Command::parse("hold_ada"), None);
        assert_eq!(Command::parse("s_all_"), None);
        assert_eq!(Command::parse("b_ad a"), None);
        assert_eq!(Command::parse(""), None);
    }
}
