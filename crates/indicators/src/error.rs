use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("window holds {0} samples, not enough for the indicator")]
    NotEnoughData(usize),

    #[error("candle seed is empty")]
    EmptySeed,
}
