//! Bybit adapter (v5 API). Both the 24h change and the funding rate arrive
//! as fractions and are converted to percent. The linear ticker has no
//! separate mark/index feed here, so `lastPrice` stands in for both.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, sanitize, MAX_FUNDING_PERCENT, FUNDING_SCALE, MAX_PERCENT, MAX_PRICE,
    MAX_VOLUME, PERCENT_SCALE, PRICE_SCALE, VOLUME_SCALE,
};
use spreadscan_data::{FuturesRepository, PairFuturesRecord, PairRecord, PairsRepository};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::client::fetch_json;

const EXCHANGE: &str = "Bybit";

const SPOT_INSTRUMENTS_URL: &str =
    "https://api.bybit.com/v5/market/instruments-info?category=spot";
const LINEAR_INSTRUMENTS_URL: &str =
    "https://api.bybit.com/v5/market/instruments-info?category=linear";
const SPOT_TICKERS_URL: &str = "https://api.bybit.com/v5/market/tickers?category=spot";
const LINEAR_TICKERS_URL: &str = "https://api.bybit.com/v5/market/tickers?category=linear";

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    result: ListResult<T>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ListResult<T> {
    #[serde(default)]
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    symbol: String,
    #[serde(rename = "baseCoin")]
    base_coin: String,
    #[serde(rename = "quoteCoin")]
    quote_coin: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    #[serde(rename = "lastPrice", default)]
    last_price: String,
    /// Fraction, e.g. `0.0123` = 1.23%.
    #[serde(rename = "price24hPcnt", default)]
    price_24h_pcnt: String,
    #[serde(rename = "volume24h", default)]
    volume_24h: String,
    #[serde(rename = "turnover24h", default)]
    turnover_24h: String,
    /// Fraction; empty on spot tickers.
    #[serde(rename = "fundingRate", default)]
    funding_rate: String,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: String,
}

/// Refreshes Bybit spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (instruments, tickers) = tokio::try_join!(
        fetch_json::<ListResponse<Instrument>>(SPOT_INSTRUMENTS_URL),
        fetch_json::<ListResponse<Ticker>>(SPOT_TICKERS_URL),
    )?;

    let pairs = normalize_spot(&instruments.result.list, &tickers.result.list);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(instruments: &[Instrument], tickers: &[Ticker]) -> Vec<PairRecord> {
    let ticker_map: HashMap<&str, &Ticker> =
        tickers.iter().map(|t| (t.symbol.as_str(), t)).collect();

    let mut pairs = Vec::new();
    for instrument in instruments {
        let Some(ticker) = ticker_map.get(instrument.symbol.as_str()) else {
            continue;
        };

        let price = sanitize(
            parse_number(&ticker.last_price, "Bybit ticker.lastPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price <= Decimal::ZERO {
            continue;
        }

        let change_percent =
            parse_number(&ticker.price_24h_pcnt, "Bybit ticker.price24hPcnt") * 100.0;

        pairs.push(PairRecord::spot(
            EXCHANGE,
            instrument.symbol.clone(),
            instrument.base_coin.clone(),
            instrument.quote_coin.clone(),
            price,
            sanitize(change_percent, MAX_PERCENT, PERCENT_SCALE),
            sanitize(
                parse_number(&ticker.volume_24h, "Bybit ticker.volume24h"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.turnover_24h, "Bybit ticker.turnover24h"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
        ));
    }
    pairs
}

/// Refreshes Bybit linear perpetuals.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_futures_pairs(pool: &PgPool) -> Result<()> {
    let (instruments, tickers) = tokio::try_join!(
        fetch_json::<ListResponse<Instrument>>(LINEAR_INSTRUMENTS_URL),
        fetch_json::<ListResponse<Ticker>>(LINEAR_TICKERS_URL),
    )?;

    let pairs = normalize_futures(&instruments.result.list, &tickers.result.list);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no futures pairs");
    }
    FuturesRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_futures(instruments: &[Instrument], tickers: &[Ticker]) -> Vec<PairFuturesRecord> {
    let instrument_map: HashMap<&str, &Instrument> =
        instruments.iter().map(|i| (i.symbol.as_str(), i)).collect();

    let mut pairs = Vec::new();
    for ticker in tickers {
        let Some(instrument) = instrument_map.get(ticker.symbol.as_str()) else {
            continue;
        };
        // Delivery contracts have no funding rate; only perpetuals belong
        // in the snapshot.
        if ticker.funding_rate.is_empty() {
            continue;
        }

        let last = sanitize(
            parse_number(&ticker.last_price, "Bybit linear ticker.lastPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if last <= Decimal::ZERO {
            continue;
        }

        let funding_percent =
            parse_number(&ticker.funding_rate, "Bybit linear ticker.fundingRate") * 100.0;
        let next_funding_ms =
            parse_number(&ticker.next_funding_time, "Bybit linear ticker.nextFundingTime") as i64;
        let change_percent =
            parse_number(&ticker.price_24h_pcnt, "Bybit linear ticker.price24hPcnt") * 100.0;

        pairs.push(PairFuturesRecord::futures(
            EXCHANGE,
            ticker.symbol.clone(),
            instrument.base_coin.clone(),
            instrument.quote_coin.clone(),
            last,
            last,
            sanitize(funding_percent, MAX_FUNDING_PERCENT, FUNDING_SCALE),
            next_funding_ms,
            sanitize(change_percent, MAX_PERCENT, PERCENT_SCALE),
            sanitize(
                parse_number(&ticker.volume_24h, "Bybit linear ticker.volume24h"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.turnover_24h, "Bybit linear ticker.turnover24h"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
        ));
    }
    pairs
}
