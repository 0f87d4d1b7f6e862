//! Candle/indicator state for the trading engine.
//!
//! Two fixed-capacity close-price windows per symbol (1m and 4h) are seeded
//! from historical candles and then folded forward from live ticks. At each
//! 1m candle close the MACD histogram drives the buy/sell gate; while the
//! gate allows buying, the 4h RSI rescales the lot and grid parameters.

pub mod error;
pub mod scaler;
pub mod trend;
pub mod window;

pub use error::IndicatorError;
pub use scaler::{rsi_last, scale_lot_and_grid, RSI_PERIOD};
pub use trend::{macd_hist_tail, next_trigger};
pub use window::{delta_ms, CandleSeries};

/// Number of seeded candles per window.
pub const WINDOW_LIMIT: usize = 300;
