//! Read-side rows for the differential tables.
//!
//! These are query results only; the differential tables are written by the
//! set-oriented recomputation in `repositories::diffs_repo`, never from
//! application code row by row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// One cross-venue spot differential as served by `GET /diffs`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiffRow {
    pub pair_key: String,
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub first_pair_exchange: String,
    pub first_pair_market: String,
    pub first_pair_price: Decimal,
    pub first_pair_volume: Decimal,
    pub second_pair_exchange: String,
    pub second_pair_market: String,
    pub second_pair_price: Decimal,
    pub second_pair_volume: Decimal,
    pub difference: Decimal,
    pub difference_percentage: Decimal,
    pub first_exchange_networks: serde_json::Value,
    pub second_exchange_networks: serde_json::Value,
    /// Anchor of the current profitable stretch; null while the
    /// differential is non-positive.
    pub time_of_life: Option<DateTime<Utc>>,
    /// Accumulated profitable duration, serialized in Postgres interval
    /// text form (e.g. `00:00:10`).
    pub time_elapsed: String,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One cross-venue futures differential as served by `GET /diffsFutures`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiffFuturesRow {
    pub pair_key: String,
    pub symbol: String,
    /// Second leg's symbol; may differ from `symbol` across the stable-coin
    /// equivalence class.
    pub second_symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub first_pair_exchange: String,
    pub first_pair_market: String,
    pub first_pair_price: Decimal,
    pub first_pair_volume: Decimal,
    pub first_funding_rate_percent: Decimal,
    pub second_pair_exchange: String,
    pub second_pair_market: String,
    pub second_pair_price: Decimal,
    pub second_pair_volume: Decimal,
    pub second_funding_rate_percent: Decimal,
    pub difference_mark: Decimal,
    pub difference_index: Decimal,
    pub difference_mark_percentage: Decimal,
    pub difference_index_percentage: Decimal,
    pub difference_funding_rate_percent: Decimal,
    pub is_funding_rate_opposite: bool,
    pub first_exchange_networks: serde_json::Value,
    pub second_exchange_networks: serde_json::Value,
    pub time_of_life: Option<DateTime<Utc>>,
    pub time_elapsed: String,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
