//! Backpack adapter: spot, perpetuals, and the Ed25519-signed capital
//! catalog. Symbols use `_` separators and perpetuals carry a `PERP`
//! suffix; both are stripped during canonicalization.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, sanitize, strip_separators, MAX_FUNDING_PERCENT, FUNDING_SCALE, MAX_PERCENT,
    MAX_PRICE, MAX_VOLUME, PERCENT_SCALE, PRICE_SCALE, VOLUME_SCALE,
};
use spreadscan_data::{
    FuturesRepository, NetRecord, NetsRepository, PairFuturesRecord, PairRecord, PairsRepository,
};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::client::{fetch_json, fetch_server_time_ms, http};
use crate::signing::ed25519_sign_base64;

const EXCHANGE: &str = "Backpack";

const MARKETS_URL: &str = "https://api.backpack.exchange/api/v1/markets";
const TICKERS_URL: &str = "https://api.backpack.exchange/api/v1/tickers";
const CAPITAL_URL: &str = "https://api.backpack.exchange/api/v1/capital";
const SERVER_TIME_URL: &str = "https://api.backpack.exchange/api/v1/time";
const MARK_PRICES_URL: &str = "https://api.backpack.exchange/api/v1/markPrices";

/// Signature window recommended by the venue, milliseconds.
const RECEIVE_WINDOW_MS: i64 = 5000;

#[derive(Debug, Deserialize)]
struct Market {
    symbol: String,
    #[serde(rename = "baseSymbol")]
    base_symbol: String,
    #[serde(rename = "quoteSymbol")]
    quote_symbol: String,
    #[serde(rename = "marketType")]
    market_type: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
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
struct MarkPrice {
    symbol: String,
    /// Fraction, e.g. `0.0001`.
    #[serde(rename = "fundingRate", default)]
    funding_rate: String,
    #[serde(rename = "indexPrice", default)]
    index_price: String,
    #[serde(rename = "markPrice", default)]
    mark_price: String,
    #[serde(rename = "nextFundingTimestamp", default)]
    next_funding_timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct AssetDetail {
    asset: String,
    #[serde(default)]
    networks: Vec<NetworkEntry>,
}

#[derive(Debug, Deserialize)]
struct NetworkEntry {
    network: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "depositEnabled", default)]
    deposit_enabled: bool,
    #[serde(rename = "withdrawalEnabled", default)]
    withdrawal_enabled: bool,
}

/// Refreshes Backpack spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (markets, tickers) = tokio::try_join!(
        fetch_json::<Vec<Market>>(MARKETS_URL),
        fetch_json::<Vec<Ticker>>(TICKERS_URL),
    )?;

    let pairs = normalize_spot(&markets, &tickers);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(markets: &[Market], tickers: &[Ticker]) -> Vec<PairRecord> {
    let ticker_map: HashMap<&str, &Ticker> =
        tickers.iter().map(|t| (t.symbol.as_str(), t)).collect();

    let mut pairs = Vec::new();
    for market in markets {
        if market.market_type != "SPOT" {
            continue;
        }
        let Some(ticker) = ticker_map.get(market.symbol.as_str()) else {
            continue;
        };

        let price = sanitize(
            parse_number(&ticker.last_price, "Backpack ticker.lastPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price <= Decimal::ZERO {
            continue;
        }

        pairs.push(PairRecord::spot(
            EXCHANGE,
            strip_separators(&market.symbol),
            market.base_symbol.clone(),
            market.quote_symbol.clone(),
            price,
            sanitize(
                parse_number(&ticker.price_change_percent, "Backpack ticker.priceChangePercent"),
                MAX_PERCENT,
                PERCENT_SCALE,
            ),
            sanitize(
                parse_number(&ticker.base_volume, "Backpack ticker.volume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.quote_volume, "Backpack ticker.quoteVolume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
        ));
    }
    pairs
}

/// Refreshes Backpack perpetuals.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_futures_pairs(pool: &PgPool) -> Result<()> {
    let (markets, tickers, mark_prices) = tokio::try_join!(
        fetch_json::<Vec<Market>>(MARKETS_URL),
        fetch_json::<Vec<Ticker>>(TICKERS_URL),
        fetch_json::<Vec<MarkPrice>>(MARK_PRICES_URL),
    )?;

    let pairs = normalize_futures(&markets, &tickers, &mark_prices);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no futures pairs");
    }
    FuturesRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_futures(
    markets: &[Market],
    tickers: &[Ticker],
    mark_prices: &[MarkPrice],
) -> Vec<PairFuturesRecord> {
    let ticker_map: HashMap<&str, &Ticker> =
        tickers.iter().map(|t| (t.symbol.as_str(), t)).collect();
    let mark_map: HashMap<&str, &MarkPrice> =
        mark_prices.iter().map(|m| (m.symbol.as_str(), m)).collect();

    let mut pairs = Vec::new();
    for market in markets {
        if market.market_type != "PERP" {
            continue;
        }
        let Some(mark_entry) = mark_map.get(market.symbol.as_str()) else {
            continue;
        };

        let mark = sanitize(
            parse_number(&mark_entry.mark_price, "Backpack markPrices.markPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        let index = sanitize(
            parse_number(&mark_entry.index_price, "Backpack markPrices.indexPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if mark <= Decimal::ZERO || index <= Decimal::ZERO {
            continue;
        }

        let (change, base_volume, quote_volume) = match ticker_map.get(market.symbol.as_str()) {
            Some(t) => (
                parse_number(&t.price_change_percent, "Backpack ticker.priceChangePercent"),
                parse_number(&t.base_volume, "Backpack ticker.volume"),
                parse_number(&t.quote_volume, "Backpack ticker.quoteVolume"),
            ),
            None => (0.0, 0.0, 0.0),
        };

        // Perp symbols look like "BTC_USDC_PERP".
        let symbol = strip_separators(&market.symbol.replace("PERP", ""));
        let funding_percent =
            parse_number(&mark_entry.funding_rate, "Backpack markPrices.fundingRate") * 100.0;

        pairs.push(PairFuturesRecord::futures(
            EXCHANGE,
            symbol,
            market.base_symbol.clone(),
            market.quote_symbol.clone(),
            mark,
            index,
            sanitize(funding_percent, MAX_FUNDING_PERCENT, FUNDING_SCALE),
            mark_entry.next_funding_timestamp,
            sanitize(change, MAX_PERCENT, PERCENT_SCALE),
            sanitize(base_volume, MAX_VOLUME, VOLUME_SCALE),
            sanitize(quote_volume, MAX_VOLUME, VOLUME_SCALE),
        ));
    }
    pairs
}

/// Refreshes the Backpack coin/network catalog via the signed capital
/// endpoint. The signature is Ed25519 over `timestamp=<ms>&window=<ms>`,
/// timestamped against the venue's clock.
///
/// # Errors
/// Fails when credentials are missing or malformed, the signed fetch is
/// rejected, or the write fails.
pub async fn update_networks(pool: &PgPool, api_key: &str, api_secret: &str) -> Result<()> {
    if api_key.is_empty() || api_secret.is_empty() {
        anyhow::bail!("{EXCHANGE} API key or secret is not configured");
    }

    let timestamp = fetch_server_time_ms(SERVER_TIME_URL).await?;
    let message = format!("timestamp={timestamp}&window={RECEIVE_WINDOW_MS}");
    let signature = ed25519_sign_base64(&message, api_secret)?;
    let url = format!("{CAPITAL_URL}?{message}");

    let response = http()
        .get(&url)
        .header("X-API-Key", api_key)
        .header("X-Signature", signature)
        .header("X-Timestamp", timestamp.to_string())
        .header("X-Window", RECEIVE_WINDOW_MS.to_string())
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("{EXCHANGE} non-OK status code {status} from capital endpoint");
    }
    let assets: Vec<AssetDetail> = response.json().await?;

    let nets = normalize_networks(&assets);
    if nets.is_empty() {
        tracing::info!("{EXCHANGE}: no network data to update");
        return Ok(());
    }
    NetsRepository::new(pool.clone()).upsert_batch(&nets).await
}

fn normalize_networks(assets: &[AssetDetail]) -> Vec<NetRecord> {
    let mut nets = Vec::new();
    for asset in assets {
        for network in &asset.networks {
            nets.push(NetRecord::new(
                EXCHANGE,
                asset.asset.clone(),
                network.network.clone(),
                network.name.clone(),
                network.deposit_enabled,
                network.withdrawal_enabled,
            ));
        }
    }
    nets
}
