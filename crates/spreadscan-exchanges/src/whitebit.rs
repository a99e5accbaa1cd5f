//! WhiteBIT adapter: spot pairs and the asset/network catalog.
//!
//! The ticker endpoint returns a map keyed by market name, re-keyed during
//! decoding. The networks job replaces the venue's whole `nets` row set per
//! run: the assets payload enumerates deposit-capable and withdraw-capable
//! network lists per coin rather than per-network flags, so stale rows
//! cannot be distinguished from disabled ones without a full replace.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use spreadscan_core::sanitize::{
    parse_number, sanitize, strip_separators, MAX_PERCENT, MAX_PRICE, MAX_VOLUME, PERCENT_SCALE,
    PRICE_SCALE, VOLUME_SCALE,
};
use spreadscan_data::{NetRecord, NetsRepository, PairRecord, PairsRepository};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};

use crate::client::fetch_json;

const EXCHANGE: &str = "WhiteBIT";

const MARKETS_URL: &str = "https://whitebit.com/api/v4/public/markets";
const TICKER_URL: &str = "https://whitebit.com/api/v4/public/ticker";
const ASSETS_URL: &str = "https://whitebit.com/api/v4/public/assets";

#[derive(Debug, Deserialize)]
struct Market {
    name: String,
    #[serde(rename = "stock")]
    base_asset: String,
    #[serde(rename = "money")]
    quote_asset: String,
    #[serde(rename = "tradesEnabled", default)]
    trades_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    #[serde(rename = "last_price", default)]
    last_price: String,
    #[serde(rename = "base_volume", default)]
    base_volume: String,
    #[serde(rename = "change", default)]
    change: String,
}

#[derive(Debug, Deserialize)]
struct AssetInfo {
    #[serde(default)]
    networks: AssetNetworks,
}

#[derive(Debug, Default, Deserialize)]
struct AssetNetworks {
    #[serde(default)]
    deposits: Vec<String>,
    #[serde(default)]
    withdraws: Vec<String>,
}

/// Refreshes WhiteBIT spot pairs.
///
/// # Errors
/// Any fetch or write failure.
pub async fn update_spot_pairs(pool: &PgPool) -> Result<()> {
    let (markets, tickers) = tokio::try_join!(
        fetch_json::<Vec<Market>>(MARKETS_URL),
        fetch_json::<HashMap<String, Ticker>>(TICKER_URL),
    )?;

    let pairs = normalize_spot(&markets, &tickers);
    if pairs.is_empty() {
        anyhow::bail!("{EXCHANGE} produced no spot pairs");
    }
    PairsRepository::new(pool.clone()).upsert_batch(&pairs).await
}

fn normalize_spot(markets: &[Market], tickers: &HashMap<String, Ticker>) -> Vec<PairRecord> {
    let mut pairs = Vec::new();
    for market in markets {
        if !market.trades_enabled {
            continue;
        }
        let Some(ticker) = tickers.get(&market.name) else {
            continue;
        };

        let last = parse_number(&ticker.last_price, "WhiteBIT ticker.last_price");
        let base_volume = parse_number(&ticker.base_volume, "WhiteBIT ticker.base_volume");

        let price = sanitize(last, MAX_PRICE, PRICE_SCALE);
        if price <= Decimal::ZERO {
            continue;
        }

        pairs.push(PairRecord::spot(
            EXCHANGE,
            strip_separators(&market.name),
            market.base_asset.clone(),
            market.quote_asset.clone(),
            price,
            sanitize(
                parse_number(&ticker.change, "WhiteBIT ticker.change"),
                MAX_PERCENT,
                PERCENT_SCALE,
            ),
            sanitize(base_volume, MAX_VOLUME, VOLUME_SCALE),
            sanitize(base_volume * last, MAX_VOLUME, VOLUME_SCALE),
        ));
    }
    pairs
}

/// Replaces the WhiteBIT network catalog: deletes the venue's rows and
/// re-inserts the current assets payload in one transaction.
///
/// # Errors
/// Any fetch or write failure, or an empty assets payload.
pub async fn update_networks(pool: &PgPool) -> Result<()> {
    let assets: HashMap<String, AssetInfo> = fetch_json(ASSETS_URL).await?;
    if assets.is_empty() {
        anyhow::bail!("{EXCHANGE} returned no asset data");
    }

    let nets = normalize_networks(&assets);
    if nets.is_empty() {
        anyhow::bail!("{EXCHANGE} returned no usable network entries");
    }
    NetsRepository::new(pool.clone())
        .replace_for_exchange(EXCHANGE, &nets)
        .await
}

fn normalize_networks(assets: &HashMap<String, AssetInfo>) -> Vec<NetRecord> {
    let mut nets = Vec::new();
    for (coin, asset) in assets {
        // Merge the deposit and withdraw lists into per-network flags.
        let mut networks: BTreeMap<&str, (bool, bool)> = BTreeMap::new();
        for network in &asset.networks.deposits {
            networks.entry(network).or_insert((false, false)).0 = true;
        }
        for network in &asset.networks.withdraws {
            networks.entry(network).or_insert((false, false)).1 = true;
        }

        for (network, (deposit, withdraw)) in networks {
            nets.push(NetRecord::new(
                EXCHANGE,
                coin.clone(),
                network.to_string(),
                network.to_string(),
                deposit,
                withdraw,
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
    fn test_spot_rekeys_ticker_map_and_derives_quote_volume() {
        let markets: Vec<Market> = serde_json::from_str(
            r#"[{"name": "BTC_USDT", "stock": "BTC", "money": "USDT",
                 "tradesEnabled": true}]"#,
        )
        .unwrap();
        let tickers: HashMap<String, Ticker> = serde_json::from_str(
            r#"{"BTC_USDT": {"last_price": "91000", "base_volume": "10",
                 "change": "1.1"}}"#,
        )
        .unwrap();

        let pairs = normalize_spot(&markets, &tickers);
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.pair_key, "BTCUSDT_WhiteBIT_spot");
        // 10 * 91000
        assert_eq!(pair.quote_volume_24h, dec!(910000.00));
        assert_eq!(pair.price_change_percent_24h, dec!(1.10));
    }

    #[test]
    fn test_networks_merge_deposit_and_withdraw_lists() {
        let assets: HashMap<String, AssetInfo> = serde_json::from_str(
            r#"{"USDT": {"networks": {
                "deposits": ["ERC20", "TRC20"],
                "withdraws": ["TRC20"],
                "default": "TRC20"}}}"#,
        )
        .unwrap();

        let nets = normalize_networks(&assets);
        assert_eq!(nets.len(), 2);

        let erc = nets.iter().find(|n| n.network == "ERC20").unwrap();
        assert!(erc.deposit_enable);
        assert!(!erc.withdraw_enable);

        let trc = nets.iter().find(|n| n.network == "TRC20").unwrap();
        assert!(trc.deposit_enable);
        assert!(trc.withdraw_enable);
        assert_eq!(trc.coin_key, "USDT_WhiteBIT_TRC20");
    }
}
