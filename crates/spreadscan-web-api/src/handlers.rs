//! Route handlers.
//!
//! Query strings carry repeatable keys (`symbol`, `coins`), so the raw
//! key/value pairs are extracted and folded into the typed filters by hand;
//! the struct extractor cannot express repetition. Every filter value ends
//! up bound as a statement parameter in the repository layer. The UI sends
//! the literal string `undefined` for untouched controls; it is treated the
//! same as an absent parameter.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use spreadscan_data::{
    recreate_tables as run_recreate_tables, DiffFilter, DiffFuturesFilter, DiffsRepository,
    FuturesRepository, PairsRepository, TopRows,
};
use sqlx::PgPool;
use std::str::FromStr;

/// Query failure surfaced to the consumer as 500 `{error, details}`.
pub struct ApiError {
    error: &'static str,
    details: String,
}

impl ApiError {
    fn new(error: &'static str, source: anyhow::Error) -> Self {
        Self {
            error,
            details: format!("{source:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("{}: {}", self.error, self.details);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": self.error, "details": self.details})),
        )
            .into_response()
    }
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({"message": "spreadscan API is running"}))
}

pub async fn health(State(pool): State<PgPool>) -> Response {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => Json(json!({"status": "healthy", "db": "connected"})).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "db": "disconnected"})),
        )
            .into_response(),
    }
}

pub async fn diffs(
    State(pool): State<PgPool>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let filter = parse_diff_filter(&params);
    let rows = DiffsRepository::new(pool)
        .query_diffs(&filter)
        .await
        .map_err(|e| ApiError::new("Failed to fetch data", e))?;
    Ok(Json(rows).into_response())
}

pub async fn diffs_futures(
    State(pool): State<PgPool>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let filter = parse_diff_futures_filter(&params);
    let rows = DiffsRepository::new(pool)
        .query_diffs_futures(&filter)
        .await
        .map_err(|e| ApiError::new("Failed to fetch data", e))?;
    Ok(Json(rows).into_response())
}

#[derive(Debug, Serialize)]
pub struct FacetsResponse {
    symbols: Vec<String>,
    exchanges: Vec<String>,
    coins: Vec<String>,
}

pub async fn pairs(State(pool): State<PgPool>) -> Result<Json<FacetsResponse>, ApiError> {
    let repo = PairsRepository::new(pool);
    let symbols = repo
        .distinct_symbols()
        .await
        .map_err(|e| ApiError::new("Failed to fetch symbols", e))?;
    let exchanges = repo
        .distinct_exchanges()
        .await
        .map_err(|e| ApiError::new("Failed to fetch exchanges", e))?;
    let coins = repo
        .distinct_coins()
        .await
        .map_err(|e| ApiError::new("Failed to fetch coins", e))?;
    Ok(Json(FacetsResponse {
        symbols,
        exchanges,
        coins,
    }))
}

pub async fn pairs_futures(State(pool): State<PgPool>) -> Result<Json<FacetsResponse>, ApiError> {
    let repo = FuturesRepository::new(pool);
    let symbols = repo
        .distinct_symbols()
        .await
        .map_err(|e| ApiError::new("Failed to fetch symbols", e))?;
    let exchanges = repo
        .distinct_exchanges()
        .await
        .map_err(|e| ApiError::new("Failed to fetch exchanges", e))?;
    let coins = repo
        .distinct_coins()
        .await
        .map_err(|e| ApiError::new("Failed to fetch coins", e))?;
    Ok(Json(FacetsResponse {
        symbols,
        exchanges,
        coins,
    }))
}

pub async fn recreate_tables(
    State(pool): State<PgPool>,
) -> Result<Json<serde_json::Value>, ApiError> {
    run_recreate_tables(&pool)
        .await
        .map_err(|e| ApiError::new("Failed to recreate tables", e))?;
    Ok(Json(json!({"message": "Tables recreated successfully"})))
}

fn is_set(value: &str) -> bool {
    !value.is_empty() && value != "undefined"
}

fn parse_top_rows(value: Option<&str>) -> TopRows {
    match value {
        Some(v) if v.eq_ignore_ascii_case("all") => TopRows::All,
        Some(v) if is_set(v) && v != "0" => match v.parse::<i64>() {
            Ok(n) if n > 0 => TopRows::Limit(n),
            _ => TopRows::default(),
        },
        _ => TopRows::default(),
    }
}

fn parse_csv(value: Option<&str>) -> Vec<String> {
    value
        .filter(|v| is_set(v))
        .map(|v| {
            v.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn first<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn all<'a>(params: &'a [(String, String)], key: &str) -> Vec<String> {
    params
        .iter()
        .filter(|(k, _)| k == key)
        .filter(|(_, v)| is_set(v))
        .map(|(_, v)| v.clone())
        .collect()
}

fn parse_diff_filter(params: &[(String, String)]) -> DiffFilter {
    // "0" means "not set" for the percent bounds, matching the UI's
    // untouched-slider value.
    let parse_decimal = |key: &str| {
        first(params, key)
            .filter(|v| is_set(v) && *v != "0")
            .and_then(|v| Decimal::from_str(v).ok())
    };

    DiffFilter {
        top_rows: parse_top_rows(first(params, "topRows")),
        exchanges: parse_csv(first(params, "exchanges")),
        symbols: all(params, "symbol"),
        max_diff_perc: parse_decimal("maxDiffPerc"),
        min_diff_perc: parse_decimal("minDiffPerc"),
        max_life_time: first(params, "maxLifeTime")
            .filter(|v| is_set(v))
            .map(str::to_string),
        min_life_time: first(params, "minLifeTime")
            .filter(|v| is_set(v))
            .map(str::to_string),
    }
}

fn parse_diff_futures_filter(params: &[(String, String)]) -> DiffFuturesFilter {
    DiffFuturesFilter {
        top_rows: parse_top_rows(first(params, "topRows")),
        exchanges: parse_csv(first(params, "exchanges")),
        symbols: all(params, "symbol"),
        coins: all(params, "coins"),
        opposite: first(params, "opposite")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_top_rows_defaults_to_500() {
        assert_eq!(parse_top_rows(None), TopRows::Limit(500));
        assert_eq!(parse_top_rows(Some("")), TopRows::Limit(500));
        assert_eq!(parse_top_rows(Some("0")), TopRows::Limit(500));
        assert_eq!(parse_top_rows(Some("undefined")), TopRows::Limit(500));
        assert_eq!(parse_top_rows(Some("garbage")), TopRows::Limit(500));
    }

    #[test]
    fn test_top_rows_all_and_numeric() {
        assert_eq!(parse_top_rows(Some("all")), TopRows::All);
        assert_eq!(parse_top_rows(Some("ALL")), TopRows::All);
        assert_eq!(parse_top_rows(Some("25")), TopRows::Limit(25));
    }

    #[test]
    fn test_exchanges_csv_split() {
        let filter = parse_diff_filter(&params(&[("exchanges", "Binance,Bybit,OKX")]));
        assert_eq!(filter.exchanges, vec!["Binance", "Bybit", "OKX"]);
    }

    #[test]
    fn test_repeatable_symbols_collected() {
        let filter = parse_diff_filter(&params(&[
            ("symbol", "BTCUSDT"),
            ("symbol", "ETHUSDT"),
            ("topRows", "10"),
        ]));
        assert_eq!(filter.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(filter.top_rows, TopRows::Limit(10));
    }

    #[test]
    fn test_percent_bounds_skip_zero_and_undefined() {
        let filter = parse_diff_filter(&params(&[
            ("maxDiffPerc", "0"),
            ("minDiffPerc", "undefined"),
        ]));
        assert_eq!(filter.max_diff_perc, None);
        assert_eq!(filter.min_diff_perc, None);

        let filter = parse_diff_filter(&params(&[("minDiffPerc", "1.5")]));
        assert_eq!(filter.min_diff_perc, Decimal::from_str("1.5").ok());
    }

    #[test]
    fn test_lifetime_filters_pass_through_as_text() {
        let filter = parse_diff_filter(&params(&[
            ("maxLifeTime", "2 hours"),
            ("minLifeTime", "undefined"),
        ]));
        assert_eq!(filter.max_life_time.as_deref(), Some("2 hours"));
        assert_eq!(filter.min_life_time, None);
    }

    #[test]
    fn test_futures_filter_coins_and_opposite() {
        let filter = parse_diff_futures_filter(&params(&[
            ("coins", "BTC"),
            ("coins", "USDT"),
            ("opposite", "TRUE"),
        ]));
        assert_eq!(filter.coins, vec!["BTC", "USDT"]);
        assert!(filter.opposite);

        let filter = parse_diff_futures_filter(&params(&[]));
        assert!(!filter.opposite);
        assert_eq!(filter.top_rows, TopRows::Limit(500));
    }
}
