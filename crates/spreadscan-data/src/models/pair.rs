//! Normalized snapshot rows produced by the venue adapters.
//!
//! Every adapter, whatever its upstream payload looks like, reduces to one
//! of these two shapes before anything is written.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use spreadscan_core::sanitize::display_name;

/// One spot ticker observation, keyed by `symbol_exchange_spot`.
#[derive(Debug, Clone, Serialize)]
pub struct PairRecord {
    pub pair_key: String,
    pub symbol: String,
    pub exchange: String,
    pub market: String,
    pub price: Decimal,
    pub base_asset: String,
    pub quote_asset: String,
    pub display_name: String,
    pub price_change_percent_24h: Decimal,
    pub base_volume_24h: Decimal,
    pub quote_volume_24h: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl PairRecord {
    /// Builds a spot record; the symbol must already be canonicalized
    /// (separators stripped).
    #[allow(clippy::too_many_arguments)]
    pub fn spot(
        exchange: &str,
        symbol: String,
        base_asset: String,
        quote_asset: String,
        price: Decimal,
        price_change_percent_24h: Decimal,
        base_volume_24h: Decimal,
        quote_volume_24h: Decimal,
    ) -> Self {
        Self {
            pair_key: format!("{symbol}_{exchange}_spot"),
            display_name: display_name(&base_asset, &quote_asset),
            symbol,
            exchange: exchange.to_string(),
            market: "spot".to_string(),
            price,
            base_asset,
            quote_asset,
            price_change_percent_24h,
            base_volume_24h,
            quote_volume_24h,
            updated_at: Utc::now(),
        }
    }
}

/// One perpetual-futures ticker observation, keyed by
/// `symbol_exchange_futures`.
#[derive(Debug, Clone, Serialize)]
pub struct PairFuturesRecord {
    pub pair_key: String,
    pub symbol: String,
    pub exchange: String,
    pub market: String,
    pub mark_price: Decimal,
    pub index_price: Decimal,
    pub base_asset: String,
    pub quote_asset: String,
    pub display_name: String,
    /// Funding rate in percent units (a venue reporting 0.0001 as a
    /// fraction stores 0.01 here).
    pub funding_rate_percent: Decimal,
    /// Next funding settlement, unix milliseconds.
    pub next_funding_timestamp: i64,
    pub price_change_percent_24h: Decimal,
    pub base_volume_24h: Decimal,
    pub quote_volume_24h: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl PairFuturesRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn futures(
        exchange: &str,
        symbol: String,
        base_asset: String,
        quote_asset: String,
        mark_price: Decimal,
        index_price: Decimal,
        funding_rate_percent: Decimal,
        next_funding_timestamp: i64,
        price_change_percent_24h: Decimal,
        base_volume_24h: Decimal,
        quote_volume_24h: Decimal,
    ) -> Self {
        Self {
            pair_key: format!("{symbol}_{exchange}_futures"),
            display_name: display_name(&base_asset, &quote_asset),
            symbol,
            exchange: exchange.to_string(),
            market: "futures".to_string(),
            mark_price,
            index_price,
            base_asset,
            quote_asset,
            funding_rate_percent,
            next_funding_timestamp,
            price_change_percent_24h,
            base_volume_24h,
            quote_volume_24h,
            updated_at: Utc::now(),
        }
    }
}
