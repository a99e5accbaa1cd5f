//! Numeric sanitization shared by every venue adapter.
//!
//! All venue payloads arrive as strings or loosely-typed floats. Before a
//! value may reach a fixed-precision column it is parsed defensively,
//! clamped to the column's bound, and rounded half-away-from-zero to the
//! column's scale.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Bound for `NUMERIC(18,8)` price columns: 10^(18-8).
pub const MAX_PRICE: f64 = 1e10;
pub const PRICE_SCALE: u32 = 8;

/// Bound for `NUMERIC(10,2)` percent columns: 10^(10-2).
pub const MAX_PERCENT: f64 = 1e8;
pub const PERCENT_SCALE: u32 = 2;

/// Bound for `NUMERIC(20,2)` volume columns: 10^(20-2).
pub const MAX_VOLUME: f64 = 1e18;
pub const VOLUME_SCALE: u32 = 2;

/// Bound for `NUMERIC(14,10)` funding-rate percent columns: 10^(14-10).
pub const MAX_FUNDING_PERCENT: f64 = 1e4;
pub const FUNDING_SCALE: u32 = 10;

/// Parses a numeric field from a venue payload.
///
/// Empty strings are a normal "no data" signal and yield 0 silently; a
/// non-empty string that fails to parse yields 0 with a warning naming the
/// field so feed drift is visible in the logs.
pub fn parse_number(text: &str, field: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    match text.parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("failed to parse number {text:?} for {field}");
            0.0
        }
    }
}

/// Clamps `value` to `[-max_abs, +max_abs]` and rounds half-away-from-zero
/// to `scale` fractional digits. NaN becomes 0; infinities land on the
/// bound.
#[must_use]
pub fn sanitize(value: f64, max_abs: f64, scale: u32) -> Decimal {
    if value.is_nan() {
        return Decimal::ZERO;
    }
    let clamped = value.clamp(-max_abs, max_abs);
    Decimal::from_f64(clamped)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// 24h percent change from open and close, 0 when the open is missing.
#[must_use]
pub fn percent_change(open: f64, close: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    (close - open) / open * 100.0
}

/// Canonicalizes a venue symbol by removing pair separators, so
/// `BTC-USDT` and `BTC_USDT` both become `BTCUSDT`.
#[must_use]
pub fn strip_separators(symbol: &str) -> String {
    symbol.replace(['-', '_'], "")
}

/// UI display form of a pair, e.g. `BTC/USDT`.
#[must_use]
pub fn display_name(base: &str, quote: &str) -> String {
    format!("{base}/{quote}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_number_empty_is_zero() {
        assert_eq!(parse_number("", "price"), 0.0);
    }

    #[test]
    fn test_parse_number_garbage_is_zero() {
        assert_eq!(parse_number("not-a-number", "price"), 0.0);
    }

    #[test]
    fn test_parse_number_value() {
        assert_eq!(parse_number("91234.56", "price"), 91234.56);
    }

    #[test]
    fn test_sanitize_nan_is_zero() {
        assert_eq!(sanitize(f64::NAN, MAX_PRICE, PRICE_SCALE), Decimal::ZERO);
    }

    #[test]
    fn test_sanitize_infinity_clamps_to_bound() {
        assert_eq!(
            sanitize(f64::INFINITY, MAX_PRICE, PRICE_SCALE),
            dec!(10000000000)
        );
        assert_eq!(
            sanitize(f64::NEG_INFINITY, MAX_PRICE, PRICE_SCALE),
            dec!(-10000000000)
        );
    }

    #[test]
    fn test_sanitize_overflow_clamps() {
        // A price far past the DECIMAL(18,8) bound must store as the bound,
        // not reject the row.
        let result = sanitize(9.99999999e99, MAX_PRICE, PRICE_SCALE);
        assert_eq!(result, dec!(10000000000));
    }

    #[test]
    fn test_sanitize_negative_overflow_clamps() {
        let result = sanitize(-9.99999999e99, MAX_VOLUME, VOLUME_SCALE);
        assert_eq!(result, dec!(-1000000000000000000));
    }

    #[test]
    fn test_sanitize_rounds_half_away_from_zero() {
        assert_eq!(sanitize(1.005, MAX_PERCENT, PERCENT_SCALE), dec!(1.01));
        assert_eq!(sanitize(-1.005, MAX_PERCENT, PERCENT_SCALE), dec!(-1.01));
    }

    #[test]
    fn test_sanitize_scale_is_bounded() {
        let result = sanitize(0.123456789123, MAX_PRICE, PRICE_SCALE);
        assert!(result.scale() <= PRICE_SCALE);
        assert_eq!(result, dec!(0.12345679));
    }

    #[test]
    fn test_sanitize_in_range_value_passes_through() {
        assert_eq!(
            sanitize(91234.56, MAX_PRICE, PRICE_SCALE),
            dec!(91234.56000000)
        );
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(100.0, 101.0), 1.0);
        assert_eq!(percent_change(0.0, 101.0), 0.0);
        assert!((percent_change(200.0, 150.0) - -25.0).abs() < 1e-12);
    }

    #[test]
    fn test_strip_separators() {
        assert_eq!(strip_separators("BTC-USDT"), "BTCUSDT");
        assert_eq!(strip_separators("BTC_USDT"), "BTCUSDT");
        assert_eq!(strip_separators("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("BTC", "USDT"), "BTC/USDT");
    }
}
