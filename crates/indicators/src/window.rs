use crate::error::IndicatorError;
use std::collections::VecDeque;

/// Millisecond span of one candle of `minutes` length.
///
/// The trailing `- 1` keeps the boundary strictly inside the candle: a tick
/// stamped exactly at the next open belongs to the new slot.
pub fn delta_ms(minutes: i64) -> i64 {
    minutes * 60 * 1000 - 1
}

/// A bounded window of close prices plus the clock that decides when the
/// current candle is finished.
///
/// The last element is always the *forming* candle; `touch` rewrites it on
/// every tick, `observe` rolls a new slot once the tick timestamp crosses
/// the boundary. Appending at capacity evicts the oldest close, so the
/// window length is stable after seeding.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    closes: VecDeque<f64>,
    capacity: usize,
    delta_ms: i64,
    next_candle_time: i64,
}

impl CandleSeries {
    /// Builds a series from seeded closes (oldest first). `last_open_ms` is
    /// the open time of the newest seeded candle.
    pub fn from_seed(
        closes: Vec<f64>,
        capacity: usize,
        last_open_ms: i64,
        delta_ms: i64,
    ) -> Result<Self, IndicatorError> {
        if closes.is_empty() {
            return Err(IndicatorError::EmptySeed);
        }

        let mut buf = VecDeque::with_capacity(capacity);
        // Oversized seeds keep only the newest `capacity` closes.
        for close in closes.into_iter() {
            if buf.len() == capacity {
                buf.pop_front();
            }
            buf.push_back(close);
        }

        Ok(Self {
            closes: buf,
            capacity,
            delta_ms,
            next_candle_time: last_open_ms + delta_ms,
        })
    }

    /// Rewrites the forming candle's close with the latest price.
    pub fn touch(&mut self, price: f64) {
        if let Some(last) = self.closes.back_mut() {
            *last = price;
        }
    }

    /// Folds one tick into the series. When `ts` has reached the candle
    /// boundary the forming candle is finalised at `price`, a new slot is
    /// opened at `price` and the boundary advances. Returns whether a
    /// rollover happened, i.e. whether indicators should recompute.
    pub fn observe(&mut self, ts: i64, price: f64) -> bool {
        if ts < self.next_candle_time {
            return false;
        }

        self.touch(price);
        if self.closes.len() == self.capacity {
            self.closes.pop_front();
        }
        self.closes.push_back(price);
        self.next_candle_time += self.delta_ms;
        true
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn next_candle_time(&self) -> i64 {
        self.next_candle_time
    }

    /// Closes oldest-first, the order streaming indicators expect.
    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.closes.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(capacity: usize) -> CandleSeries {
        // Three seeded candles, newest opened at t=120_000, 1m timeframe.
        CandleSeries::from_seed(vec![1.0, 2.0, 3.0], capacity, 120_000, delta_ms(1)).unwrap()
    }

    #[test]
    fn delta_is_one_ms_short_of_the_timeframe() {
        assert_eq!(delta_ms(1), 59_999);
        assert_eq!(delta_ms(240), 14_399_999);
    }

    #[test]
    fn empty_seed_is_rejected() {
        assert!(CandleSeries::from_seed(vec![], 10, 0, delta_ms(1)).is_err());
    }

    #[test]
    fn tick_before_boundary_does_not_roll() {
        let mut s = series(10);
        let boundary = s.next_candle_time();
        assert!(!s.observe(boundary - 1, 9.0));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn rollover_at_exact_boundary_appends_and_advances() {
        let mut s = series(10);
        let boundary = s.next_candle_time();

        assert!(s.observe(boundary, 9.0));
        // Finalised candle and the fresh slot both carry the tick price.
        let closes: Vec<f64> = s.closes().collect();
        assert_eq!(closes, vec![1.0, 2.0, 9.0, 9.0]);
        assert_eq!(s.next_candle_time(), boundary + delta_ms(1));
    }

    #[test]
    fn rollover_at_capacity_evicts_the_head() {
        let mut s = series(3);
        let boundary = s.next_candle_time();

        assert!(s.observe(boundary, 9.0));
        let closes: Vec<f64> = s.closes().collect();
        assert_eq!(closes, vec![2.0, 9.0, 9.0]);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn touch_rewrites_only_the_forming_candle() {
        let mut s = series(10);
        s.touch(5.5);
        let closes: Vec<f64> = s.closes().collect();
        assert_eq!(closes, vec![1.0, 2.0, 5.5]);
    }

    #[test]
    fn oversized_seed_keeps_newest_closes() {
        let closes: Vec<f64> = (0..400).map(|i| i as f64).collect();
        let s = CandleSeries::from_seed(closes, 300, 0, delta_ms(1)).unwrap();
        assert_eq!(s.len(), 300);
        assert_eq!(s.closes().next(), Some(100.0));
    }
}
