//! MEXC adapter: spot and perpetuals.
//!
//! The contract ticker is the one venue feed here that carries plain JSON
//! numbers instead of strings. It has no 24h percent change and no quote
//! volume; the quote volume is derived as `volume24 × fairPrice`.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, sanitize, strip_separators, MAX_FUNDING_PERCENT, FUNDING_SCALE, MAX_PERCENT,
    MAX_PRICE, MAX_VOLUME, PERCENT_SCALE, PRICE_SCALE, VOLUME_SCALE,
};
use spreadscan_data::{FuturesRepository, PairFuturesRecord, PairRecord, PairsRepository};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::client::fetch_json;

const EXCHANGE: &str = "MEXC";

const EXCHANGE_INFO_URL: &str = "https://api.mexc.com/api/v3/exchangeInfo";
const TICKER_24HR_URL: &str = "https://api.mexc.com/api/v3/ticker/24hr";
const CONTRACT_TICKER_URL: &str = "https://contract.mexc.com/api/v1/contract/ticker";

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(rename = "baseAsset")]
    base_asset: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
    #[serde(rename = "isSpotTradingAllowed", default)]
    is_spot_trading_allowed: bool,
}

#[derive(Debug, Deserialize)]
struct Ticker24hr {
    symbol: String,
    #[serde(rename = "lastPrice", default)]
    last_price: String,
    #[serde(rename = "priceChangePercent", default)]
    price_change_percent: String,
    #[serde(rename = "volume", default)]
    base_volume: String,
    #[serde(rename = "quoteVolume", default)]
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct ContractTickerResponse {
    #[serde(default)]
    data: Vec<ContractTicker>,
}

#[derive(Debug, Deserialize)]
struct ContractTicker {
    symbol: String,
    #[serde(rename = "indexPrice", default)]
    index_price: f64,
    #[serde(rename = "fairPrice", default)]
    fair_price: f64,
    /// Fraction, e.g. `0.0001`.
    #[serde(rename = "fundingRate", default)]
    funding_rate: f64,
    #[serde(rename = "volume24", default)]
    volume_24: f64,
}

/// Refreshes MEXC spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (info, tickers) = tokio::try_join!(
        fetch_json::<ExchangeInfoResponse>(EXCHANGE_INFO_URL),
        fetch_json::<Vec<Ticker24hr>>(TICKER_24HR_URL),
    )?;

    let pairs = normalize_spot(&info.symbols, &tickers);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(symbols: &[SymbolInfo], tickers: &[Ticker24hr]) -> Vec<PairRecord> {
    let symbol_map: HashMap<&str, &SymbolInfo> = symbols
        .iter()
        .filter(|s| s.is_spot_trading_allowed)
        .map(|s| (s.symbol.as_str(), s))
        .collect();

    let mut pairs = Vec::new();
    for ticker in tickers {
        let Some(sym) = symbol_map.get(ticker.symbol.as_str()) else {
            continue;
        };

        let price = sanitize(
            parse_number(&ticker.last_price, "MEXC ticker.lastPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price <= Decimal::ZERO {
            continue;
        }

        pairs.push(PairRecord::spot(
            EXCHANGE,
            ticker.symbol.clone(),
            sym.base_asset.clone(),
            sym.quote_asset.clone(),
            price,
            sanitize(
                parse_number(&ticker.price_change_percent, "MEXC ticker.priceChangePercent"),
                MAX_PERCENT,
                PERCENT_SCALE,
            ),
            sanitize(
                parse_number(&ticker.base_volume, "MEXC ticker.volume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.quote_volume, "MEXC ticker.quoteVolume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
        ));
    }
    pairs
}

/// Refreshes MEXC perpetuals.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_futures_pairs(pool: &PgPool) -> Result<()> {
    let tickers: ContractTickerResponse = fetch_json(CONTRACT_TICKER_URL).await?;

    let pairs = normalize_futures(&tickers.data);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no futures pairs");
    }
    FuturesRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_futures(tickers: &[ContractTicker]) -> Vec<PairFuturesRecord> {
    let mut pairs = Vec::new();
    for ticker in tickers {
        // Contract symbols look like "BTC_USDT".
        let parts: Vec<&str> = ticker.symbol.split('_').collect();
        let [base, quote] = parts.as_slice() else {
            tracing::warn!("MEXC: unexpected contract symbol format {}", ticker.symbol);
            continue;
        };

        let mark = sanitize(ticker.fair_price, MAX_PRICE, PRICE_SCALE);
        let index = sanitize(ticker.index_price, MAX_PRICE, PRICE_SCALE);
        if mark <= Decimal::ZERO || index <= Decimal::ZERO {
            continue;
        }

        let funding_percent = ticker.funding_rate * 100.0;
        let quote_volume = ticker.volume_24 * ticker.fair_price;

        pairs.push(PairFuturesRecord::futures(
            EXCHANGE,
            strip_separators(&ticker.symbol),
            (*base).to_string(),
            (*quote).to_string(),
            mark,
            index,
            sanitize(funding_percent, MAX_FUNDING_PERCENT, FUNDING_SCALE),
            0,
            Decimal::ZERO,
            sanitize(ticker.volume_24, MAX_VOLUME, VOLUME_SCALE),
            sanitize(quote_volume, MAX_VOLUME, VOLUME_SCALE),
        ));
    }
    pairs
}
