//! Bitget adapter: spot pairs and the public coin-network catalog.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, sanitize, MAX_PERCENT, MAX_PRICE, MAX_VOLUME, PERCENT_SCALE, PRICE_SCALE,
    VOLUME_SCALE,
};
use spreadscan_data::{NetRecord, NetsRepository, PairRecord, PairsRepository};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::client::fetch_json;

const EXCHANGE: &str = "Bitget";

const SYMBOLS_URL: &str = "https://api.bitget.com/api/v2/spot/public/symbols";
const TICKERS_URL: &str = "https://api.bitget.com/api/v2/spot/market/tickers";
const COINS_URL: &str = "https://api.bitget.com/api/v2/spot/public/coins";

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct DataResponse<T> {
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(rename = "baseCoin")]
    base_coin: String,
    #[serde(rename = "quoteCoin")]
    quote_coin: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    #[serde(rename = "lastPr", default)]
    last_price: String,
    #[serde(rename = "change24h", default)]
    change_24h: String,
    #[serde(rename = "baseVolume", default)]
    base_volume: String,
    #[serde(rename = "quoteVolume", default)]
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct CoinInfo {
    coin: String,
    #[serde(default)]
    chains: Vec<ChainInfo>,
}

#[derive(Debug, Deserialize)]
struct ChainInfo {
    chain: String,
    /// `"true"` / `"false"` strings in this payload.
    #[serde(default)]
    withdrawable: String,
    #[serde(default)]
    rechargeable: String,
}

/// Refreshes Bitget spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (symbols, tickers) = tokio::try_join!(
        fetch_json::<DataResponse<SymbolInfo>>(SYMBOLS_URL),
        fetch_json::<DataResponse<Ticker>>(TICKERS_URL),
    )?;

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
        if sym.status != "online" {
            continue;
        }
        let Some(ticker) = ticker_map.get(sym.symbol.as_str()) else {
            continue;
        };

        let price = sanitize(
            parse_number(&ticker.last_price, "Bitget ticker.lastPr"),
            MAX_PRICE,
            PRICE_SCALE,
        );
        if price <= Decimal::ZERO {
            continue;
        }

        pairs.push(PairRecord::spot(
            EXCHANGE,
            sym.symbol.clone(),
            sym.base_coin.clone(),
            sym.quote_coin.clone(),
            price,
            sanitize(
                parse_number(&ticker.change_24h, "Bitget ticker.change24h"),
                MAX_PERCENT,
                PERCENT_SCALE,
            ),
            sanitize(
                parse_number(&ticker.base_volume, "Bitget ticker.baseVolume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
            sanitize(
                parse_number(&ticker.quote_volume, "Bitget ticker.quoteVolume"),
                MAX_VOLUME,
                VOLUME_SCALE,
            ),
        ));
    }
    pairs
}

/// Refreshes the Bitget coin/network catalog (public endpoint, no
/// signature).
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_networks(pool: &PgPool) -> Result<()> {
    let coins: DataResponse<CoinInfo> = fetch_json(COINS_URL).await?;

    let nets = normalize_networks(&coins.data);
    if nets.is_empty() {
        tracing::info!("{EXCHANGE}: no network data to update");
        return Ok(());
    }
    NetsRepository::new(pool.clone()).upsert_batch(&nets).await
}

fn normalize_networks(coins: &[CoinInfo]) -> Vec<NetRecord> {
    let mut nets = Vec::new();
    for coin in coins {
        for chain in &coin.chains {
            nets.push(NetRecord::new(
                EXCHANGE,
                coin.coin.clone(),
                chain.chain.clone(),
                chain.chain.clone(),
                chain.rechargeable == "true",
                chain.withdrawable == "true",
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
    fn test_spot_keeps_only_online_symbols() {
        let symbols: DataResponse<SymbolInfo> = serde_json::from_str(
            r#"{"data": [
                {"symbol": "BTCUSDT", "baseCoin": "BTC", "quoteCoin": "USDT",
                 "status": "online"},
                {"symbol": "OLDUSDT", "baseCoin": "OLD", "quoteCoin": "USDT",
                 "status": "offline"}]}"#,
        )
        .unwrap();
        let tickers: DataResponse<Ticker> = serde_json::from_str(
            r#"{"data": [
                {"symbol": "BTCUSDT", "lastPr": "91000.1", "change24h": "1.5",
                 "baseVolume": "100", "quoteVolume": "9100000"},
                {"symbol": "OLDUSDT", "lastPr": "1.0", "change24h": "0",
                 "baseVolume": "1", "quoteVolume": "1"}]}"#,
        )
        .unwrap();

        let pairs = normalize_spot(&symbols.data, &tickers.data);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pair_key, "BTCUSDT_Bitget_spot");
        assert_eq!(pairs[0].price, dec!(91000.10000000));
    }

    #[test]
    fn test_network_flags_parse_from_strings() {
        let coins: Vec<CoinInfo> = serde_json::from_str(
            r#"[{"coin": "USDT", "chains": [
                {"chain": "TRC20", "withdrawable": "true", "rechargeable": "false"}]}]"#,
        )
        .unwrap();

        let nets = normalize_networks(&coins);
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].coin_key, "USDT_Bitget_TRC20");
        assert!(!nets[0].deposit_enable);
        assert!(nets[0].withdraw_enable);
    }
}
