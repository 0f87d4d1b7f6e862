use crate::error::EngineError;
use crate::{Engine, QUOTE_ASSET};
use api_client::error::ApiError;
use configuration::main_lot;
use core_types::Trigger;
use indicators::{
    delta_ms, macd_hist_tail, next_trigger, rsi_last, scale_lot_and_grid, CandleSeries,
    IndicatorError, WINDOW_LIMIT,
};
use rust_decimal::prelude::ToPrimitive;
use std::time::Duration;

const CYCLE: Duration = Duration::from_secs(1);
const PRICE_POLL: Duration = Duration::from_millis(300);
const SEED_RETRY: Duration = Duration::from_secs(5);

/// Fetches one seeded window. The kline endpoint serves candles newest
/// first; the window wants them oldest first.
async fn seed_series(
    engine: &Engine,
    symbol: &str,
    interval: &str,
    minutes: i64,
) -> Result<CandleSeries, EngineError> {
    let response = engine.api.kline(symbol, interval, WINDOW_LIMIT as u32).await?;
    let rows = response
        .data
        .ok_or_else(|| ApiError::MissingData(format!("kline {} {}", symbol, interval)))?;

    let last_open = rows
        .first()
        .map(|row| row.open_time())
        .ok_or(IndicatorError::EmptySeed)?;
    let closes: Vec<f64> = rows
        .iter()
        .rev()
        .map(|row| row.close().to_f64().unwrap())
        .collect();

    let series = CandleSeries::from_seed(closes, WINDOW_LIMIT, last_open, delta_ms(minutes))?;
    Ok(series)
}

async fn seed_with_retry(
    engine: &Engine,
    symbol: &str,
    interval: &str,
    minutes: i64,
) -> CandleSeries {
    loop {
        match seed_series(engine, symbol, interval, minutes).await {
            Ok(series) => return series,
            Err(e) => {
                tracing::error!(symbol, interval, error = %e, "candle seed failed, retrying");
                tokio::time::sleep(SEED_RETRY).await;
            }
        }
    }
}

/// Re-derives lot and grid from the 4h RSI and the USDT balance bucket.
/// The config store is only written when the pair actually changes; the
/// `init_rsi` latch arms the trading loop on the first verdict either way.
async fn rescale(engine: &Engine, symbol: &str, window: &CandleSeries) {
    let rsi = match rsi_last(window.closes()) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(symbol, error = %e, "rsi skipped");
            return;
        }
    };

    let usdt_balance = engine.account.balance(QUOTE_ASSET).await;
    let Some(base_lot) = main_lot(usdt_balance) else {
        tracing::debug!(symbol, %usdt_balance, "no lot bucket for this balance");
        return;
    };

    let (lot, grid_size) = scale_lot_and_grid(rsi, base_lot, engine.policy.grid_step);

    let current = engine.config.get(symbol).await;
    if current.map(|c| (c.lot, c.grid_size)) != Some((lot, grid_size)) {
        tracing::info!(symbol, rsi, %lot, %grid_size, "lot and grid rescaled");
        engine.config.set_lot_and_grid(symbol, lot, grid_size).await;
        if let Err(e) = engine.mirror.upsert_config(symbol, lot, grid_size).await {
            tracing::error!(symbol, error = %e, "failed to mirror config change");
        }
    }

    engine.config.set_init_rsi(symbol).await;
}

/// Per-symbol indicator engine.
///
/// Seeds the 1m and 4h windows once a live price exists, then folds ticks
/// at ~1 Hz: the 1m rollover recomputes MACD and may flip the buy/sell
/// gate, the 4h window continuously tracks the forming candle and, while
/// buying is allowed, rescales lot and grid from RSI.
pub async fn indicator_task(engine: Engine, symbol: String) {
    while engine.prices.get(&symbol).await.is_none() {
        tokio::time::sleep(PRICE_POLL).await;
    }

    let mut one_minute = seed_with_retry(&engine, &symbol, "1m", 1).await;
    let mut four_hour = seed_with_retry(&engine, &symbol, "4h", 240).await;

    tracing::info!(symbol, "indicator engine started");

    loop {
        if let Some(tick) = engine.prices.get(&symbol).await {
            let price = tick.price.to_f64().unwrap();

            if one_minute.observe(tick.ts, price) {
                match macd_hist_tail(one_minute.closes()) {
                    Ok((hist_prev, hist_last)) => {
                        let current = engine.ledger.trigger(&symbol).await;
                        if let Some(next) = next_trigger(current, hist_prev, hist_last) {
                            tracing::info!(symbol, from = ?current, to = ?next, "trend gate flipped");
                            engine.ledger.set_trigger(&symbol, next).await;
                        }
                    }
                    Err(e) => tracing::debug!(symbol, error = %e, "macd skipped"),
                }
            }

            four_hour.touch(price);
            four_hour.observe(tick.ts, price);

            if matches!(
                engine.ledger.trigger(&symbol).await,
                Trigger::Buy | Trigger::New
            ) {
                rescale(&engine, &symbol, &four_hour).await;
            }
        }

        tokio::time::sleep(CYCLE).await;
    }
}
