//! Gate adapter: spot pairs. Symbols use `_` separators.

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

const EXCHANGE: &str = "Gate";

const CURRENCY_PAIRS_URL: &str = "https://api.gateio.ws/api/v4/spot/currency_pairs";
const TICKERS_URL: &str = "https://api.gateio.ws/api/v4/spot/tickers";

#[derive(Debug, Deserialize)]
struct CurrencyPair {
    id: String,
    base: String,
    quote: String,
    #[serde(rename = "trade_status", default)]
    trade_status: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    #[serde(rename = "currency_pair")]
    currency_pair: String,
    #[serde(rename = "last", default)]
    last: String,
    #[serde(rename = "change_percentage", default)]
    change_percentage: String,
    #[serde(rename = "base_volume", default)]
    base_volume: String,
    #[serde(rename = "quote_volume", default)]
    quote_volume: String,
}

/// Refreshes Gate spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (currency_pairs, tickers) = tokio::try_join!(
        fetch_json::<Vec<CurrencyPair>>(CURRENCY_PAIRS_URL),
        fetch_json::<Vec<Ticker>>(TICKERS_URL),
    )?;

    let pairs = normalize_spot(&currency_pairs, &tickers);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(currency_pairs: &[CurrencyPair], tickers: &[Ticker]) -> Vec<PairRecord> {
    let ticker_map: HashMap<&str, &Ticker> = tickers
        .iter()
        .map(|t| (t.currency_pair.as_str(), t))
        .collect();

    let mut pairs = Vec::new();
    for sym in currency_pairs {
        if sym.trade_status != "tradable" {
            continue;
        }
        let Some(ticker) = ticker_map.get(sym.id.as_str()) else {
            continue;
        };

        let price = sanitize(
            parse_number(&ticker.last, "Gate ticker.last"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price <= Decimal::ZERO {
            continue;
        }

        pairs.push(PairRecord::spot(
            EXCHANGE,
            strip_separators(&sym.id),
            sym.base.clone(),
            sym.quote.clone(),
            price,
            sanitize(
                parse_number(&ticker.change_percentage, "Gate ticker.change_percentage"),
                MAX_PERCENT,
                PERCENT_SCALE,
            ),
            sanitize(
                parse_number(&ticker.base_volume, "Gate ticker.base_volume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.quote_volume, "Gate ticker.quote_volume"),
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
    fn test_spot_normalization_strips_underscore() {
        let currency_pairs: Vec<CurrencyPair> = serde_json::from_str(
            r#"[{"id": "BTC_USDT", "base": "BTC", "quote": "USDT",
                 "trade_status": "tradable"},
                {"id": "DEAD_USDT", "base": "DEAD", "quote": "USDT",
                 "trade_status": "untradable"}]"#,
        )
        .unwrap();
        let tickers: Vec<Ticker> = serde_json::from_str(
            r#"[{"currency_pair": "BTC_USDT", "last": "91234.5",
                 "change_percentage": "-0.42", "base_volume": "321.5",
                 "quote_volume": "29331893.25"}]"#,
        )
        .unwrap();

        let pairs = normalize_spot(&currency_pairs, &tickers);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol, "BTCUSDT");
        assert_eq!(pairs[0].pair_key, "BTCUSDT_Gate_spot");
        assert_eq!(pairs[0].price_change_percent_24h, dec!(-0.42));
    }

    #[test]
    fn test_spot_drops_rows_without_positive_price() {
        let currency_pairs: Vec<CurrencyPair> = serde_json::from_str(
            r#"[{"id": "NEW_USDT", "base": "NEW", "quote": "USDT",
                 "trade_status": "tradable"}]"#,
        )
        .unwrap();
        let tickers: Vec<Ticker> = serde_json::from_str(
            r#"[{"currency_pair": "NEW_USDT", "last": "",
                 "change_percentage": "", "base_volume": "", "quote_volume": ""}]"#,
        )
        .unwrap();

        assert!(normalize_spot(&currency_pairs, &tickers).is_empty());
    }
}
