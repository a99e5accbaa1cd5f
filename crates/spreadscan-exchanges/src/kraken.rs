//! Kraken adapter: spot pairs.
//!
//! Both endpoints return maps keyed by pair name rather than lists, so the
//! payloads are decoded as maps and each value re-keyed by its map key. The
//! public ticker exposes no 24h percent change or quote volume; those store
//! as zero.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, sanitize, strip_separators, MAX_PRICE, MAX_VOLUME, PRICE_SCALE, VOLUME_SCALE,
};
use spreadscan_data::{PairRecord, PairsRepository};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::client::fetch_json;

const EXCHANGE: &str = "Kraken";

const ASSET_PAIRS_URL: &str = "https://api.kraken.com/0/public/AssetPairs";
const TICKER_URL: &str = "https://api.kraken.com/0/public/Ticker";

#[derive(Debug, Deserialize)]
struct AssetPairsResponse {
    #[serde(default)]
    result: HashMap<String, AssetPair>,
}

#[derive(Debug, Deserialize)]
struct AssetPair {
    base: String,
    quote: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    result: HashMap<String, TickerEntry>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    /// `[price, lot volume]`.
    #[serde(rename = "c", default)]
    last_trade: Vec<String>,
    /// `[today, last 24 hours]`.
    #[serde(rename = "v", default)]
    volume: Vec<String>,
}

/// Refreshes Kraken spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (asset_pairs, tickers) = tokio::try_join!(
        fetch_json::<AssetPairsResponse>(ASSET_PAIRS_URL),
        fetch_json::<TickerResponse>(TICKER_URL),
    )?;

    let pairs = normalize_spot(&asset_pairs.result, &tickers.result);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(
    asset_pairs: &HashMap<String, AssetPair>,
    tickers: &HashMap<String, TickerEntry>,
) -> Vec<PairRecord> {
    let mut pairs = Vec::new();
    for (symbol, info) in asset_pairs {
        let Some(ticker) = tickers.get(symbol) else {
            continue;
        };

        let last = ticker.last_trade.first().map_or("", String::as_str);
        let volume_24h = ticker.volume.get(1).map_or("", String::as_str);

        let price = sanitize(
            parse_number(last, "Kraken ticker.c[0]"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price <= Decimal::ZERO {
            continue;
        }

        pairs.push(PairRecord::spot(
            EXCHANGE,
            strip_separators(symbol),
            info.base.clone(),
            info.quote.clone(),
            price,
            Decimal::ZERO,
            sanitize(
                parse_number(volume_24h, "Kraken ticker.v[1]"),
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
    fn test_map_payloads_are_rekeyed() {
        let asset_pairs: AssetPairsResponse = serde_json::from_str(
            r#"{"result": {"XXBTZUSD": {"base": "XXBT", "quote": "ZUSD"}}}"#,
        )
        .unwrap();
        let tickers: TickerResponse = serde_json::from_str(
            r#"{"result": {"XXBTZUSD": {
                "c": ["91234.50000", "0.00500000"],
                "v": ["120.5", "340.25"]}}}"#,
        )
        .unwrap();

        let pairs = normalize_spot(&asset_pairs.result, &tickers.result);
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.pair_key, "XXBTZUSD_Kraken_spot");
        assert_eq!(pair.price, dec!(91234.50000000));
        // The second volume entry is the 24h figure.
        assert_eq!(pair.base_volume_24h, dec!(340.25));
        assert_eq!(pair.quote_volume_24h, Decimal::ZERO);
        assert_eq!(pair.price_change_percent_24h, Decimal::ZERO);
    }

    #[test]
    fn test_pairs_without_ticker_are_skipped() {
        let asset_pairs: AssetPairsResponse = serde_json::from_str(
            r#"{"result": {"XETHZUSD": {"base": "XETH", "quote": "ZUSD"}}}"#,
        )
        .unwrap();
        let tickers = TickerResponse {
            result: HashMap::new(),
        };

        assert!(normalize_spot(&asset_pairs.result, &tickers.result).is_empty());
    }
}
