use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// The root configuration structure for the entire application.
///
/// All fields come from the process environment (or the `.env` file), so the
/// same build runs against the demo and production endpoints unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Exchange REST origin, e.g. `https://open-api.bingx.com`.
    pub base_url: String,
    /// Exchange WebSocket origin, e.g. `wss://open-api-ws.bingx.com/market`.
    pub url_ws: String,
    pub api_key: String,
    pub secret_key: String,
    /// Postgres connection string for the ledger mirror.
    pub db_url: String,
    /// Operator console bot token. Consumed by the console binary, carried
    /// here so one environment covers the whole deployment.
    pub token: String,
    /// Numeric operator id allowed to issue commands.
    pub admin: i64,
}

/// Trading policy constants. Not environment-driven; changing one is a
/// code change.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Per-side taker fee, fraction.
    pub taker: Decimal,
    /// Per-side maker fee, fraction.
    pub maker: Decimal,
    /// Surplus over cost-with-fee required for a full sell, fraction.
    pub target_profit: Decimal,
    /// Surplus required of the scanned slice in a partial sell, fraction.
    pub partly_target_profit: Decimal,
    /// Base fractional price drop between grid rungs.
    pub grid_step: Decimal,
    /// Extra base-asset fraction bought when the balance cannot cover
    /// sell-side fees. Only used when `fee_reserve_enabled` is set.
    pub fee_reserve: Decimal,
    pub fee_reserve_enabled: bool,
    /// USDT floor below which the engine refuses to run at all.
    pub account_balance_floor: Decimal,
}

impl Policy {
    /// Round-trip fee fraction applied to every buy's cost.
    pub fn taker_maker(&self) -> Decimal {
        self.taker + self.maker
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            taker: dec!(0.002),
            maker: dec!(0.002),
            target_profit: dec!(0.01),
            partly_target_profit: dec!(0.006),
            grid_step: dec!(0.01),
            fee_reserve: dec!(0.2),
            fee_reserve_enabled: false,
            account_balance_floor: dec!(2),
        }
    }
}

/// USDT balance bucket -> base lot in USDT. The indicator engine picks the
/// bucket matching the free USDT balance and scales it by the RSI band.
pub const MAIN_LOT_MAP: [(Decimal, Decimal, Decimal); 9] = [
    (dec!(0), dec!(400), dec!(10)),
    (dec!(400), dec!(900), dec!(20)),
    (dec!(900), dec!(1400), dec!(30)),
    (dec!(1400), dec!(2000), dec!(40)),
    (dec!(2000), dec!(2600), dec!(50)),
    (dec!(2600), dec!(3200), dec!(60)),
    (dec!(3200), dec!(3900), dec!(70)),
    (dec!(3900), dec!(4600), dec!(80)),
    (dec!(4600), dec!(5300), dec!(90)),
];

/// Base lot for the given free USDT balance, `(min, max]` buckets.
pub fn main_lot(usdt_balance: Decimal) -> Option<Decimal> {
    MAIN_LOT_MAP
        .iter()
        .find(|(min, max, _)| *min < usdt_balance && usdt_balance <= *max)
        .map(|(_, _, lot)| *lot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_lot_bucket_edges() {
        assert_eq!(main_lot(dec!(0)), None);
        assert_eq!(main_lot(dec!(1.5)), Some(dec!(10)));
        assert_eq!(main_lot(dec!(400)), Some(dec!(10)));
        assert_eq!(main_lot(dec!(400.01)), Some(dec!(20)));
        assert_eq!(main_lot(dec!(5300)), Some(dec!(90)));
        assert_eq!(main_lot(dec!(6000)), None);
    }

    #[test]
    fn round_trip_fee_is_sum_of_sides() {
        let policy = Policy::default();
        assert_eq!(policy.taker_maker(), dec!(0.004));
    }
}
