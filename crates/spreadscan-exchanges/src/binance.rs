//! Binance adapter: spot, linear perpetuals, and the signed coin-network
//! catalog.

use anyhow::Result;
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
use crate::signing::hmac_sha256_hex;

const EXCHANGE: &str = "Binance";

const EXCHANGE_INFO_URL: &str =
    "https://api.binance.com/api/v3/exchangeInfo?permissions=SPOT&symbolStatus=TRADING";
const TICKER_PRICE_URL: &str = "https://api.binance.com/api/v3/ticker/price";
const TICKER_24HR_URL: &str = "https://api.binance.com/api/v3/ticker/24hr";
const ASSET_DETAIL_URL: &str = "https://api.binance.com/sapi/v1/capital/config/getall";
const SERVER_TIME_URL: &str = "https://api.binance.com/api/v3/time";
const FUTURES_EXCHANGE_INFO_URL: &str = "https://fapi.binance.com/fapi/v1/exchangeInfo";
const FUTURES_TICKER_24HR_URL: &str = "https://fapi.binance.com/fapi/v1/ticker/24hr";
const FUTURES_PREMIUM_INDEX_URL: &str = "https://fapi.binance.com/fapi/v1/premiumIndex";

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
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct Ticker24hr {
    symbol: String,
    #[serde(rename = "priceChangePercent", default)]
    price_change_percent: String,
    #[serde(rename = "volume", default)]
    base_volume: String,
    #[serde(rename = "quoteVolume", default)]
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct FuturesExchangeInfoResponse {
    symbols: Vec<FuturesSymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct FuturesSymbolInfo {
    symbol: String,
    #[serde(rename = "baseAsset")]
    base_asset: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
struct PremiumIndex {
    symbol: String,
    #[serde(rename = "markPrice")]
    mark_price: String,
    #[serde(rename = "indexPrice")]
    index_price: String,
    /// Fraction, e.g. `0.00010000` = 0.01%.
    #[serde(rename = "lastFundingRate", default)]
    last_funding_rate: String,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: i64,
}

#[derive(Debug, Deserialize)]
struct AssetDetail {
    coin: String,
    #[serde(rename = "networkList", default)]
    network_list: Vec<NetworkEntry>,
}

#[derive(Debug, Deserialize)]
struct NetworkEntry {
    network: String,
    name: String,
    #[serde(rename = "depositEnable")]
    deposit_enable: bool,
    #[serde(rename = "withdrawEnable")]
    withdraw_enable: bool,
}

/// Refreshes every tradable Binance spot pair.
///
/// # Errors
/// Any fetch or write failure; nothing is written on failure and the next
/// scheduled tick retries.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (info, prices, tickers) = tokio::try_join!(
        fetch_json::<ExchangeInfoResponse>(EXCHANGE_INFO_URL),
        fetch_json::<Vec<TickerPrice>>(TICKER_PRICE_URL),
        fetch_json::<Vec<Ticker24hr>>(TICKER_24HR_URL),
    )?;

    let pairs = normalize_spot(&info, &prices, &tickers);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(
    info: &ExchangeInfoResponse,
    prices: &[TickerPrice],
    tickers: &[Ticker24hr],
) -> Vec<PairRecord> {
    let price_map: HashMap<&str, f64> = prices
        .iter()
        .map(|p| (p.symbol.as_str(), parse_number(&p.price, "Binance ticker/price")))
        .collect();
    let ticker_map: HashMap<&str, &Ticker24hr> =
        tickers.iter().map(|t| (t.symbol.as_str(), t)).collect();

    let mut pairs = Vec::with_capacity(info.symbols.len());
    for sym in &info.symbols {
        if !sym.is_spot_trading_allowed {
            continue;
        }

        let price = sanitize(
            price_map.get(sym.symbol.as_str()).copied().unwrap_or(0.0),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price.is_sign_negative() || price.is_zero() {
            continue;
        }

        let (change, base_volume, quote_volume) = match ticker_map.get(sym.symbol.as_str()) {
            Some(t) => (
                parse_number(&t.price_change_percent, "Binance ticker24hr.priceChangePercent"),
                parse_number(&t.base_volume, "Binance ticker24hr.volume"),
                parse_number(&t.quote_volume, "Binance ticker24hr.quoteVolume"),
            ),
            None => (0.0, 0.0, 0.0),
        };

        pairs.push(PairRecord::spot(
            EXCHANGE,
            strip_separators(&sym.symbol),
            sym.base_asset.clone(),
            sym.quote_asset.clone(),
            price,
            sanitize(change, MAX_PERCENT, PERCENT_SCALE),
            sanitize(base_volume, MAX_VOLUME, VOLUME_SCALE),
            sanitize(quote_volume, MAX_VOLUME, VOLUME_SCALE),
        ));
    }
    pairs
}

/// Refreshes every Binance linear perpetual.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_futures_pairs(pool: &PgPool) -> Result<()> {
    let (info, premium, tickers) = tokio::try_join!(
        fetch_json::<FuturesExchangeInfoResponse>(FUTURES_EXCHANGE_INFO_URL),
        fetch_json::<Vec<PremiumIndex>>(FUTURES_PREMIUM_INDEX_URL),
        fetch_json::<Vec<Ticker24hr>>(FUTURES_TICKER_24HR_URL),
    )?;

    let pairs = normalize_futures(&info, &premium, &tickers);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no futures pairs");
    }
    FuturesRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_futures(
    info: &FuturesExchangeInfoResponse,
    premium: &[PremiumIndex],
    tickers: &[Ticker24hr],
) -> Vec<PairFuturesRecord> {
    let info_map: HashMap<&str, &FuturesSymbolInfo> =
        info.symbols.iter().map(|s| (s.symbol.as_str(), s)).collect();
    let ticker_map: HashMap<&str, &Ticker24hr> =
        tickers.iter().map(|t| (t.symbol.as_str(), t)).collect();

    let mut pairs = Vec::with_capacity(premium.len());
    for entry in premium {
        let Some(sym) = info_map.get(entry.symbol.as_str()) else {
            continue;
        };
        let Some(ticker) = ticker_map.get(entry.symbol.as_str()) else {
            continue;
        };

        let mark = sanitize(
            parse_number(&entry.mark_price, "Binance premiumIndex.markPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        let index = sanitize(
            parse_number(&entry.index_price, "Binance premiumIndex.indexPrice"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if mark.is_sign_negative() || mark.is_zero() || index.is_sign_negative() || index.is_zero()
        {
            continue;
        }

        // lastFundingRate is a fraction; the snapshot stores percent.
        let funding_percent =
            parse_number(&entry.last_funding_rate, "Binance premiumIndex.lastFundingRate") * 100.0;

        pairs.push(PairFuturesRecord::futures(
            EXCHANGE,
            strip_separators(&entry.symbol),
            sym.base_asset.clone(),
            sym.quote_asset.clone(),
            mark,
            index,
            sanitize(funding_percent, MAX_FUNDING_PERCENT, FUNDING_SCALE),
            entry.next_funding_time,
            sanitize(
                parse_number(&ticker.price_change_percent, "Binance futures priceChangePercent"),
                MAX_PERCENT,
                PERCENT_SCALE,
            ),
            sanitize(
                parse_number(&ticker.base_volume, "Binance futures volume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.quote_volume, "Binance futures quoteVolume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
        ));
    }
    pairs
}

/// Refreshes the Binance coin/network catalog via the signed capital
/// endpoint. The request is timestamped against Binance's own clock and
/// signed with HMAC-SHA256.
///
/// # Errors
/// Fails when credentials are missing, the signed fetch is rejected, or the
/// write fails.
pub async fn update_networks(pool: &PgPool, api_key: &str, api_secret: &str) -> Result<()> {
    if api_key.is_empty() || api_secret.is_empty() {
        anyhow::bail!("{EXCHANGE} API key or secret is not configured");
    }

    let timestamp = fetch_server_time_ms(SERVER_TIME_URL).await?;
    let query = format!("timestamp={timestamp}");
    let signature = hmac_sha256_hex(&query, api_secret);
    let url = format!("{ASSET_DETAIL_URL}?{query}&signature={signature}");

    let response = http()
        .get(&url)
        .header("X-MBX-APIKEY", api_key)
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
        for network in &asset.network_list {
            nets.push(NetRecord::new(
                EXCHANGE,
                asset.coin.clone(),
                network.network.clone(),
                network.name.clone(),
                network.deposit_enable,
                network.withdraw_enable,
            ));
        }
    }
    nets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_single_symbol_spot_ingest() {
        let info: ExchangeInfoResponse = serde_json::from_str(
            r#"{"symbols": [{"symbol": "BTCUSDT", "baseAsset": "BTC",
                "quoteAsset": "USDT", "isSpotTradingAllowed": true}]}"#,
        )
        .unwrap();
        let prices: Vec<TickerPrice> =
            serde_json::from_str(r#"[{"symbol": "BTCUSDT", "price": "91234.56"}]"#).unwrap();
        let tickers: Vec<Ticker24hr> = serde_json::from_str(
            r#"[{"symbol": "BTCUSDT", "priceChangePercent": "-1.23",
                 "volume": "1.0", "quoteVolume": "91234.56"}]"#,
        )
        .unwrap();

        let pairs = normalize_spot(&info, &prices, &tickers);
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        assert_eq!(pair.pair_key, "BTCUSDT_Binance_spot");
        assert_eq!(pair.price, dec!(91234.56000000));
        assert_eq!(pair.display_name, "BTC/USDT");
        assert_eq!(pair.price_change_percent_24h, dec!(-1.23));
        assert_eq!(pair.base_volume_24h, dec!(1.00));
        assert_eq!(pair.quote_volume_24h, dec!(91234.56));
    }

    #[test]
    fn test_spot_skips_non_tradable_and_priceless_symbols() {
        let info: ExchangeInfoResponse = serde_json::from_str(
            r#"{"symbols": [
                {"symbol": "AAAUSDT", "baseAsset": "AAA", "quoteAsset": "USDT",
                 "isSpotTradingAllowed": false},
                {"symbol": "BBBUSDT", "baseAsset": "BBB", "quoteAsset": "USDT",
                 "isSpotTradingAllowed": true}]}"#,
        )
        .unwrap();
        // BBBUSDT has no ticker price at all, so its price is zero and the
        // row is dropped.
        let pairs = normalize_spot(&info, &[], &[]);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_futures_funding_rate_stored_as_percent() {
        let info: FuturesExchangeInfoResponse = serde_json::from_str(
            r#"{"symbols": [{"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT"}]}"#,
        )
        .unwrap();
        let premium: Vec<PremiumIndex> = serde_json::from_str(
            r#"[{"symbol": "BTCUSDT", "markPrice": "42750.00", "indexPrice": "42749.50",
                 "lastFundingRate": "0.00010000", "nextFundingTime": 1700000000000}]"#,
        )
        .unwrap();
        let tickers: Vec<Ticker24hr> = serde_json::from_str(
            r#"[{"symbol": "BTCUSDT", "priceChangePercent": "2.5",
                 "volume": "1000", "quoteVolume": "42000000"}]"#,
        )
        .unwrap();

        let pairs = normalize_futures(&info, &premium, &tickers);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pair_key, "BTCUSDT_Binance_futures");
        assert_eq!(pairs[0].funding_rate_percent, dec!(0.0100000000));
        assert_eq!(pairs[0].next_funding_timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_futures_drops_non_positive_mark_or_index() {
        let info: FuturesExchangeInfoResponse = serde_json::from_str(
            r#"{"symbols": [{"symbol": "XUSDT", "baseAsset": "X", "quoteAsset": "USDT"}]}"#,
        )
        .unwrap();
        let premium: Vec<PremiumIndex> = serde_json::from_str(
            r#"[{"symbol": "XUSDT", "markPrice": "0", "indexPrice": "1.0",
                 "lastFundingRate": "0.0001", "nextFundingTime": 0}]"#,
        )
        .unwrap();
        let tickers: Vec<Ticker24hr> = serde_json::from_str(
            r#"[{"symbol": "XUSDT", "priceChangePercent": "0", "volume": "1",
                 "quoteVolume": "1"}]"#,
        )
        .unwrap();

        assert!(normalize_futures(&info, &premium, &tickers).is_empty());
    }

    #[test]
    fn test_networks_one_record_per_coin_network() {
        let assets: Vec<AssetDetail> = serde_json::from_str(
            r#"[{"coin": "BTC", "networkList": [
                {"network": "BTC", "name": "Bitcoin", "depositEnable": true,
                 "withdrawEnable": true},
                {"network": "BSC", "name": "BNB Smart Chain (BEP20)",
                 "depositEnable": false, "withdrawEnable": true}]}]"#,
        )
        .unwrap();

        let nets = normalize_networks(&assets);
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[0].coin_key, "BTC_Binance_BTC");
        assert_eq!(nets[1].coin_key, "BTC_Binance_BSC");
        assert!(!nets[1].deposit_enable);
    }
}
