use crate::error::IndicatorError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ta::indicators::RelativeStrengthIndex as Rsi;
use ta::Next;

pub const RSI_PERIOD: usize = 14;

/// RSI band -> (lot multiplier, grid multiplier). The deeper the market is
/// oversold, the larger the lot and the wider the grid; overbought bands
/// shrink both toward a token presence.
const RSI_BANDS: [(f64, f64, Decimal, Decimal); 12] = [
    (f64::NEG_INFINITY, 20.0, dec!(3), dec!(3.8)),
    (20.0, 25.0, dec!(2.5), dec!(3.35)),
    (25.0, 30.0, dec!(2), dec!(2.9)),
    (30.0, 35.0, dec!(1.75), dec!(2.45)),
    (35.0, 40.0, dec!(1.5), dec!(1.95)),
    (40.0, 45.0, dec!(1.25), dec!(1.65)),
    (45.0, 50.0, dec!(1), dec!(1.55)),
    (50.0, 55.0, dec!(0.75), dec!(1.3)),
    (55.0, 60.0, dec!(0.55), dec!(1.25)),
    (60.0, 65.0, dec!(0.35), dec!(1.2)),
    (65.0, 70.0, dec!(0.2), dec!(1.1)),
    (70.0, f64::INFINITY, dec!(0.15), dec!(1)),
];

/// Folds RSI(14) over the window and returns its final value.
pub fn rsi_last(closes: impl Iterator<Item = f64>) -> Result<f64, IndicatorError> {
    let mut rsi = Rsi::new(RSI_PERIOD).unwrap();

    let mut last = None;
    let mut count = 0usize;
    for close in closes {
        last = Some(rsi.next(close));
        count += 1;
    }

    last.ok_or(IndicatorError::NotEnoughData(count))
}

/// Target `(lot, grid_size)` for the current RSI value, scaled from the
/// balance-derived base lot and the base grid step. Bands are `[min, max)`.
pub fn scale_lot_and_grid(rsi: f64, main_lot: Decimal, base_grid: Decimal) -> (Decimal, Decimal) {
    let (_, _, lot_mult, grid_mult) = RSI_BANDS
        .iter()
        .find(|(min, max, _, _)| *min <= rsi && rsi < *max)
        .copied()
        // NaN falls through the band scan; treat it as the neutral band.
        .unwrap_or((45.0, 50.0, dec!(1), dec!(1.55)));

    (main_lot * lot_mult, base_grid * grid_mult)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversold_band_triples_the_lot() {
        let (lot, grid) = scale_lot_and_grid(12.0, dec!(10), dec!(0.01));
        assert_eq!(lot, dec!(30));
        assert_eq!(grid, dec!(0.038));
    }

    #[test]
    fn overbought_band_keeps_base_grid() {
        let (lot, grid) = scale_lot_and_grid(85.0, dec!(10), dec!(0.01));
        assert_eq!(lot, dec!(1.5));
        assert_eq!(grid, dec!(0.01));
    }

    #[test]
    fn band_edges_belong_to_the_upper_band() {
        // 20 sits in [20, 25), not (-inf, 20).
        let (lot, _) = scale_lot_and_grid(20.0, dec!(10), dec!(0.01));
        assert_eq!(lot, dec!(25));

        let (lot, _) = scale_lot_and_grid(70.0, dec!(10), dec!(0.01));
        assert_eq!(lot, dec!(1.5));
    }

    #[test]
    fn lot_and_grid_shrink_as_rsi_rises() {
        let samples = [10.0, 22.0, 27.0, 33.0, 38.0, 43.0, 47.0, 52.0, 57.0, 62.0, 67.0, 75.0];
        let mut prev: Option<(Decimal, Decimal)> = None;
        for rsi in samples {
            let current = scale_lot_and_grid(rsi, dec!(10), dec!(0.01));
            if let Some((prev_lot, prev_grid)) = prev {
                assert!(current.0 < prev_lot, "lot must decrease, rsi={}", rsi);
                assert!(current.1 <= prev_grid, "grid must not grow, rsi={}", rsi);
            }
            prev = Some(current);
        }
    }

    #[test]
    fn rsi_of_a_steady_climb_saturates_high() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let rsi = rsi_last(closes.iter().copied()).unwrap();
        assert!(rsi > 70.0, "rsi={}", rsi);
    }

    #[test]
    fn rsi_requires_samples() {
        assert!(rsi_last(std::iter::empty()).is_err());
    }
}
