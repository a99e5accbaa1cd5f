//! Huobi adapter: spot pairs and the public currency/chain catalog.
//!
//! The ticker feed carries numbers (not strings) and no 24h percent, so the
//! change is derived from open/close. Symbols arrive lowercase and are
//! upper-cased for consistency with the rest of the snapshot.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    percent_change, sanitize, MAX_PERCENT, MAX_PRICE, MAX_VOLUME, PERCENT_SCALE, PRICE_SCALE,
    VOLUME_SCALE,
};
use spreadscan_data::{NetRecord, NetsRepository, PairRecord, PairsRepository};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::client::fetch_json;

const EXCHANGE: &str = "Huobi";

const SYMBOLS_URL: &str = "https://api.huobi.pro/v1/common/symbols";
const TICKERS_URL: &str = "https://api.huobi.pro/market/tickers";
const CURRENCIES_URL: &str = "https://api.huobi.pro/v2/reference/currencies";

#[derive(Debug, Deserialize)]
struct SymbolsResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(rename = "base-currency")]
    base_currency: String,
    #[serde(rename = "quote-currency")]
    quote_currency: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct TickersResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    #[serde(default)]
    open: f64,
    #[serde(default)]
    close: f64,
    /// Base-asset volume.
    #[serde(default)]
    amount: f64,
    /// Quote-asset volume.
    #[serde(default)]
    vol: f64,
}

#[derive(Debug, Deserialize)]
struct CurrenciesResponse {
    #[serde(default)]
    data: Vec<Currency>,
}

#[derive(Debug, Deserialize)]
struct Currency {
    currency: String,
    #[serde(default)]
    chains: Vec<Chain>,
}

#[derive(Debug, Deserialize)]
struct Chain {
    /// Short network identifier, e.g. `BTC`, `ERC20`.
    #[serde(rename = "fullName", default)]
    short_name: String,
    /// Human-readable chain name.
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(rename = "depositStatus", default)]
    deposit_status: String,
    #[serde(rename = "withdrawStatus", default)]
    withdraw_status: String,
}

/// Refreshes Huobi spot pairs.
///
/// # Errors
/// Any fetch or write failure, or a non-ok status in either payload.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (symbols, tickers) = tokio::try_join!(
        fetch_json::<SymbolsResponse>(SYMBOLS_URL),
        fetch_json::<TickersResponse>(TICKERS_URL),
    )?;

    if symbols.status != "ok" || tickers.status != "ok" {
        anyhow::bail!("{EXCHANGE} API returned non-ok status");
    }

    let pairs = normalize_spot(&symbols.data, &tickers.data);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(symbols: &[SymbolInfo], tickers: &[Ticker]) -> Vec<PairRecord> {
    let ticker_map: HashMap<&str, &Ticker> =
        tickers.iter().map(|t| (t.symbol.as_str(), t)).collect();

    let mut pairs = Vec::new();
    for sym in symbols {
        if sym.state != "online" {
            continue;
        }
        let Some(ticker) = ticker_map.get(sym.symbol.as_str()) else {
            continue;
        };

        let price = sanitize(ticker.close, MAX_PRICE, PRICE_SCALE);
        if price <= Decimal::ZERO {
            continue;
        }

        pairs.push(PairRecord::spot(
            EXCHANGE,
            sym.symbol.to_uppercase(),
            sym.base_currency.to_uppercase(),
            sym.quote_currency.to_uppercase(),
            price,
            sanitize(
                percent_change(ticker.open, ticker.close),
                MAX_PERCENT,
                PERCENT_SCALE,
            ),
            sanitize(ticker.amount, MAX_VOLUME, VOLUME_SCALE),
            sanitize(ticker.vol, MAX_VOLUME, VOLUME_SCALE),
        ));
    }
    pairs
}

/// Refreshes the Huobi currency/chain catalog.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_networks(pool: &PgPool) -> Result<()> {
    let currencies: CurrenciesResponse = fetch_json(CURRENCIES_URL).await?;

    let nets = normalize_networks(&currencies.data);
    if nets.is_empty() {
        tracing::info!("{EXCHANGE}: no network data to update");
        return Ok(());
    }
    NetsRepository::new(pool.clone()).upsert_batch(&nets).await
}

fn normalize_networks(currencies: &[Currency]) -> Vec<NetRecord> {
    let mut nets = Vec::new();
    for currency in currencies {
        let coin = currency.currency.to_uppercase();
        for chain in &currency.chains {
            nets.push(NetRecord::new(
                EXCHANGE,
                coin.clone(),
                chain.short_name.to_uppercase(),
                chain.display_name.clone(),
                chain.deposit_status == "allowed",
                chain.withdraw_status == "allowed",
            ));
        }
    }
    nets
}
