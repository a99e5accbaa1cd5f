//! OKX adapter: spot pairs from a single tickers fetch.
//!
//! There is no separate instrument catalog call; base and quote assets come
//! from splitting `instId` on its `-` separator. The 24h change is taken
//! from `change24h` when present, otherwise derived from `open24h`.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, percent_change, sanitize, strip_separators, MAX_PERCENT, MAX_PRICE, MAX_VOLUME,
    PERCENT_SCALE, PRICE_SCALE, VOLUME_SCALE,
};
use spreadscan_data::{PairRecord, PairsRepository};
use sqlx::PgPool;

use crate::client::fetch_json;

const EXCHANGE: &str = "OKX";

const TICKERS_URL: &str = "https://www.okx.com/api/v5/market/tickers?instType=SPOT";

#[derive(Debug, Deserialize)]
struct TickersResponse {
    #[serde(default)]
    data: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(default)]
    last: String,
    #[serde(rename = "vol24h", default)]
    base_volume: String,
    #[serde(rename = "volCcy24h", default)]
    quote_volume: String,
    #[serde(rename = "change24h", default)]
    change_24h: String,
    #[serde(rename = "open24h", default)]
    open_24h: String,
}

/// Refreshes OKX spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let tickers: TickersResponse = fetch_json(TICKERS_URL).await?;

    let pairs = normalize_spot(&tickers.data);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(tickers: &[Ticker]) -> Vec<PairRecord> {
    let mut pairs = Vec::new();
    for ticker in tickers {
        let parts: Vec<&str> = ticker.inst_id.split('-').collect();
        let [base, quote] = parts.as_slice() else {
            continue;
        };

        let last = parse_number(&ticker.last, "OKX ticker.last");
        let price = sanitize(last, MAX_PRICE, PRICE_SCALE);
        if price <= Decimal::ZERO {
            continue;
        }

        let change = if !ticker.change_24h.is_empty() {
            parse_number(&ticker.change_24h, "OKX ticker.change24h")
        } else if !ticker.open_24h.is_empty() {
            percent_change(parse_number(&ticker.open_24h, "OKX ticker.open24h"), last)
        } else {
            0.0
        };

        pairs.push(PairRecord::spot(
            EXCHANGE,
            strip_separators(&ticker.inst_id),
            (*base).to_string(),
            (*quote).to_string(),
            price,
            sanitize(change, MAX_PERCENT, PERCENT_SCALE),
            sanitize(
                parse_number(&ticker.base_volume, "OKX ticker.vol24h"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.quote_volume, "OKX ticker.volCcy24h"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
        ));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_inst_id_split_and_change_derived_from_open() {
        let tickers: TickersResponse = serde_json::from_str(
            r#"{"data": [{"instId": "BTC-USDT", "last": "91800",
                "vol24h": "12000", "volCcy24h": "1101600000",
                "open24h": "90000"}]}"#,
        )
        .unwrap();

        let pairs = normalize_spot(&tickers.data);
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.symbol, "BTCUSDT");
        assert_eq!(pair.base_asset, "BTC");
        assert_eq!(pair.quote_asset, "USDT");
        // (91800 - 90000) / 90000 * 100
        assert_eq!(pair.price_change_percent_24h, dec!(2.00));
    }

    #[test]
    fn test_malformed_inst_id_is_skipped() {
        let tickers: TickersResponse = serde_json::from_str(
            r#"{"data": [{"instId": "BTC-USDT-SWAP", "last": "91800",
                "vol24h": "1", "volCcy24h": "1"}]}"#,
        )
        .unwrap();

        assert!(normalize_spot(&tickers.data).is_empty());
    }

    #[test]
    fn test_zero_price_is_dropped() {
        let tickers: TickersResponse = serde_json::from_str(
            r#"{"data": [{"instId": "NEW-USDT", "last": "0",
                "vol24h": "0", "volCcy24h": "0"}]}"#,
        )
        .unwrap();

        assert!(normalize_spot(&tickers.data).is_empty());
    }
}
