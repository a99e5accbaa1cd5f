//! KuCoin adapter: spot pairs. `changeRate` is a fraction and converts to
//! percent; the ticker's `volValue` is recorded as the pair volume and the
//! quote side stores zero.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, sanitize, strip_separators, MAX_PERCENT, MAX_PRICE, MAX_VOLUME, PERCENT_SCALE,
    PRICE_SCALE, VOLUME_SCALE,
};
use spreadscan_data::{PairRecord, PairsRepository};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::client::fetch_json;

const EXCHANGE: &str = "KuCoin";

const SYMBOLS_URL: &str = "https://api.kucoin.com/api/v1/symbols";
const ALL_TICKERS_URL: &str = "https://api.kucoin.com/api/v1/market/allTickers";

#[derive(Debug, Deserialize)]
struct SymbolsResponse {
    #[serde(default)]
    data: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(rename = "baseCurrency")]
    base_currency: String,
    #[serde(rename = "quoteCurrency")]
    quote_currency: String,
    #[serde(rename = "enableTrading", default)]
    enable_trading: bool,
}

#[derive(Debug, Deserialize)]
struct AllTickersResponse {
    data: TickerData,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    #[serde(rename = "ticker", default)]
    tickers: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    #[serde(default)]
    last: Option<String>,
    /// Fraction, e.g. `0.0123` = 1.23%.
    #[serde(rename = "changeRate", default)]
    change_rate: Option<String>,
    #[serde(rename = "volValue", default)]
    vol_value: Option<String>,
}

/// Refreshes KuCoin spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (symbols, tickers) = tokio::try_join!(
        fetch_json::<SymbolsResponse>(SYMBOLS_URL),
        fetch_json::<AllTickersResponse>(ALL_TICKERS_URL),
    )?;

    let pairs = normalize_spot(&symbols.data, &tickers.data.tickers);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(symbols: &[SymbolInfo], tickers: &[Ticker]) -> Vec<PairRecord> {
    let symbol_map: HashMap<&str, &SymbolInfo> = symbols
        .iter()
        .filter(|s| s.enable_trading)
        .map(|s| (s.symbol.as_str(), s))
        .collect();

    let mut pairs = Vec::new();
    for ticker in tickers {
        let Some(sym) = symbol_map.get(ticker.symbol.as_str()) else {
            continue;
        };

        let price = sanitize(
            parse_number(ticker.last.as_deref().unwrap_or(""), "KuCoin ticker.last"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price <= Decimal::ZERO {
            continue;
        }

        let change_percent = parse_number(
            ticker.change_rate.as_deref().unwrap_or(""),
            "KuCoin ticker.changeRate",
        ) * 100.0;

        pairs.push(PairRecord::spot(
            EXCHANGE,
            strip_separators(&ticker.symbol),
            sym.base_currency.clone(),
            sym.quote_currency.clone(),
            price,
            sanitize(change_percent, MAX_PERCENT, PERCENT_SCALE),
            sanitize(
                parse_number(ticker.vol_value.as_deref().unwrap_or(""), "KuCoin ticker.volValue"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            Decimal::ZERO,
        ));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_dash_separator_stripped_and_change_scaled() {
        let symbols: SymbolsResponse = serde_json::from_str(
            r#"{"data": [{"symbol": "BTC-USDT", "baseCurrency": "BTC",
                "quoteCurrency": "USDT", "enableTrading": true}]}"#,
        )
        .unwrap();
        let tickers: AllTickersResponse = serde_json::from_str(
            r#"{"data": {"ticker": [{"symbol": "BTC-USDT", "last": "91000",
                "changeRate": "0.0123", "volValue": "123456.78"}]}}"#,
        )
        .unwrap();

        let pairs = normalize_spot(&symbols.data, &tickers.data.tickers);
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.symbol, "BTCUSDT");
        assert_eq!(pair.pair_key, "BTCUSDT_KuCoin_spot");
        assert_eq!(pair.price_change_percent_24h, dec!(1.23));
        assert_eq!(pair.base_volume_24h, dec!(123456.78));
        assert_eq!(pair.quote_volume_24h, Decimal::ZERO);
    }

    #[test]
    fn test_disabled_symbols_are_skipped() {
        let symbols: SymbolsResponse = serde_json::from_str(
            r#"{"data": [{"symbol": "OLD-USDT", "baseCurrency": "OLD",
                "quoteCurrency": "USDT", "enableTrading": false}]}"#,
        )
        .unwrap();
        let tickers: AllTickersResponse = serde_json::from_str(
            r#"{"data": {"ticker": [{"symbol": "OLD-USDT", "last": "1.0",
                "changeRate": "0", "volValue": "10"}]}}"#,
        )
        .unwrap();

        assert!(normalize_spot(&symbols.data, &tickers.data.tickers).is_empty());
    }

    #[test]
    fn test_null_ticker_fields_degrade_to_zero() {
        let symbols: SymbolsResponse = serde_json::from_str(
            r#"{"data": [{"symbol": "NEW-USDT", "baseCurrency": "NEW",
                "quoteCurrency": "USDT", "enableTrading": true}]}"#,
        )
        .unwrap();
        // KuCoin emits nulls for freshly listed pairs.
        let tickers: AllTickersResponse = serde_json::from_str(
            r#"{"data": {"ticker": [{"symbol": "NEW-USDT", "last": null,
                "changeRate": null, "volValue": null}]}}"#,
        )
        .unwrap();

        // Price degrades to zero, so the row is dropped.
        assert!(normalize_spot(&symbols.data, &tickers.data.tickers).is_empty());
    }
}
