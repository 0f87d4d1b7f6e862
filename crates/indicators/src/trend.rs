use crate::error::IndicatorError;
use core_types::Trigger;
use ta::indicators::MovingAverageConvergenceDivergence as Macd;
use ta::Next;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Folds MACD(12,26,9) over the window and returns the last two histogram
/// samples `(previous, last)`.
pub fn macd_hist_tail(closes: impl Iterator<Item = f64>) -> Result<(f64, f64), IndicatorError> {
    // Fixed, non-zero periods make the constructor infallible.
    let mut macd = Macd::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL).unwrap();

    let mut prev = None;
    let mut last = None;
    let mut count = 0usize;
    for close in closes {
        prev = last;
        last = Some(macd.next(close).histogram);
        count += 1;
    }

    match (prev, last) {
        (Some(prev), Some(last)) => Ok((prev, last)),
        _ => Err(IndicatorError::NotEnoughData(count)),
    }
}

/// Gate transition at 1m candle close.
///
/// Two consecutive positive histogram samples arm buying, two consecutive
/// negative ones arm selling; a lone sample of either sign changes nothing.
/// A transition only fires from the opposite (or boot) state, so repeated
/// confirmation of the current trend is a no-op.
pub fn next_trigger(current: Trigger, hist_prev: f64, hist_last: f64) -> Option<Trigger> {
    if hist_prev > 0.0 && hist_last > 0.0 && matches!(current, Trigger::Sell | Trigger::New) {
        Some(Trigger::Buy)
    } else if hist_prev < 0.0 && hist_last < 0.0 && matches!(current, Trigger::Buy | Trigger::New) {
        Some(Trigger::Sell)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_positive_samples_arm_buying() {
        assert_eq!(next_trigger(Trigger::Sell, 0.01, 0.02), Some(Trigger::Buy));
        assert_eq!(next_trigger(Trigger::New, 0.01, 0.02), Some(Trigger::Buy));
        // Already armed: no transition.
        assert_eq!(next_trigger(Trigger::Buy, 0.01, 0.02), None);
    }

    #[test]
    fn two_negative_samples_arm_selling() {
        assert_eq!(next_trigger(Trigger::Buy, -0.01, -0.02), Some(Trigger::Sell));
        assert_eq!(next_trigger(Trigger::New, -0.01, -0.02), Some(Trigger::Sell));
        assert_eq!(next_trigger(Trigger::Sell, -0.01, -0.02), None);
    }

    #[test]
    fn a_single_sample_does_not_flip() {
        assert_eq!(next_trigger(Trigger::Sell, -0.01, 0.02), None);
        assert_eq!(next_trigger(Trigger::Buy, 0.01, -0.02), None);
        assert_eq!(next_trigger(Trigger::New, 0.0, 0.02), None);
    }

    #[test]
    fn histogram_tail_follows_the_trend() {
        // A long climb ends with a rising MACD histogram...
        let rising: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
        let (prev, last) = macd_hist_tail(rising.iter().copied()).unwrap();
        assert!(prev > 0.0 && last > 0.0);

        // ...and a long slide with a falling one.
        let falling: Vec<f64> = (0..120).map(|i| 220.0 - i as f64).collect();
        let (prev, last) = macd_hist_tail(falling.iter().copied()).unwrap();
        assert!(prev < 0.0 && last < 0.0);
    }

    #[test]
    fn histogram_needs_at_least_two_samples() {
        assert!(macd_hist_tail([1.0].into_iter()).is_err());
        assert!(macd_hist_tail(std::iter::empty()).is_err());
    }
}
