//! Differential engine scenarios against a live database.
//!
//! These tests exercise the set-oriented recomputation end to end and are
//! ignored unless a scratch Postgres is available:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -p spreadscan-data -- --ignored
//! ```
//!
//! They drop and re-create the tables, so never point them at a live
//! deployment.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use spreadscan_data::{
    connect, recreate_tables, DiffFilter, DiffsRepository, FuturesRepository, PairFuturesRecord,
    PairRecord, PairsRepository,
};
use sqlx::PgPool;
use std::time::Duration;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
    let pool = connect(&url, 5).await.expect("connect");
    recreate_tables(&pool).await.expect("recreate tables");
    pool
}

fn spot_pair(exchange: &str, symbol: &str, price: Decimal) -> PairRecord {
    PairRecord::spot(
        exchange,
        symbol.to_string(),
        "BTC".to_string(),
        "USDT".to_string(),
        price,
        dec!(0),
        dec!(1.0),
        price,
    )
}

#[tokio::test]
#[ignore = "requires a scratch DATABASE_URL"]
async fn two_venue_differential_produces_both_orderings() {
    let pool = test_pool().await;
    let pairs = PairsRepository::new(pool.clone());
    let diffs = DiffsRepository::new(pool.clone());

    pairs
        .upsert_batch(&[
            spot_pair("A", "BTCUSDT", dec!(100)),
            spot_pair("B", "BTCUSDT", dec!(101)),
        ])
        .await
        .unwrap();

    diffs.refresh_spot().await.unwrap();

    let rows = diffs.query_diffs(&DiffFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 2);

    let forward = rows
        .iter()
        .find(|r| r.pair_key == "BTCUSDT_A-B")
        .expect("A-B row");
    assert_eq!(forward.difference, dec!(1));
    assert_eq!(forward.difference_percentage, dec!(1.00));

    let reverse = rows
        .iter()
        .find(|r| r.pair_key == "BTCUSDT_B-A")
        .expect("B-A row");
    assert_eq!(reverse.difference, dec!(-1));
    assert_eq!(reverse.difference_percentage, dec!(-1.00));
}

#[tokio::test]
#[ignore = "requires a scratch DATABASE_URL"]
async fn lifetime_is_preserved_while_positive_and_reset_when_not() {
    let pool = test_pool().await;
    let pairs = PairsRepository::new(pool.clone());
    let diffs = DiffsRepository::new(pool.clone());

    pairs
        .upsert_batch(&[
            spot_pair("A", "BTCUSDT", dec!(100)),
            spot_pair("B", "BTCUSDT", dec!(101)),
        ])
        .await
        .unwrap();

    diffs.refresh_spot().await.unwrap();

    let first: Vec<_> = diffs.query_diffs(&DiffFilter::default()).await.unwrap();
    let anchor = first
        .iter()
        .find(|r| r.pair_key == "BTCUSDT_A-B")
        .and_then(|r| r.time_of_life)
        .expect("positive row must anchor a time of life");

    tokio::time::sleep(Duration::from_secs(2)).await;
    diffs.refresh_spot().await.unwrap();

    let second: Vec<_> = diffs.query_diffs(&DiffFilter::default()).await.unwrap();
    let row = second
        .iter()
        .find(|r| r.pair_key == "BTCUSDT_A-B")
        .unwrap();
    assert_eq!(row.time_of_life, Some(anchor), "anchor must not move");
    assert_ne!(row.time_elapsed, "00:00:00", "elapsed must accumulate");

    // Flip the prices: A-B goes negative and the lifetime resets.
    pairs
        .upsert_batch(&[
            spot_pair("A", "BTCUSDT", dec!(101)),
            spot_pair("B", "BTCUSDT", dec!(100)),
        ])
        .await
        .unwrap();
    diffs.refresh_spot().await.unwrap();

    let third: Vec<_> = diffs.query_diffs(&DiffFilter::default()).await.unwrap();
    let row = third
        .iter()
        .find(|r| r.pair_key == "BTCUSDT_A-B")
        .unwrap();
    assert!(row.difference_percentage < Decimal::ZERO);
    assert_eq!(row.time_of_life, None);
    assert_eq!(row.time_elapsed, "00:00:00");
}

#[tokio::test]
#[ignore = "requires a scratch DATABASE_URL"]
async fn futures_join_crosses_the_stablecoin_equivalence_class() {
    let pool = test_pool().await;
    let futures = FuturesRepository::new(pool.clone());
    let diffs = DiffsRepository::new(pool.clone());

    let usdt_leg = PairFuturesRecord::futures(
        "A",
        "BTCUSDT".to_string(),
        "BTC".to_string(),
        "USDT".to_string(),
        dec!(100),
        dec!(100),
        dec!(0.01),
        0,
        dec!(0),
        dec!(5.0),
        dec!(500),
    );
    let usdc_leg = PairFuturesRecord::futures(
        "B",
        "BTCUSDC".to_string(),
        "BTC".to_string(),
        "USDC".to_string(),
        dec!(101),
        dec!(101),
        dec!(-0.02),
        0,
        dec!(0),
        dec!(5.0),
        dec!(505),
    );

    futures.upsert_batch(&[usdt_leg, usdc_leg]).await.unwrap();
    diffs.refresh_futures().await.unwrap();

    let rows = diffs
        .query_diffs_futures(&Default::default())
        .await
        .unwrap();
    let joined = rows
        .iter()
        .find(|r| r.pair_key == "BTCUSDT_BTCUSDC_A-B")
        .expect("USDT/USDC legs must join");
    assert_eq!(joined.difference_mark, dec!(1));
    assert!(joined.is_funding_rate_opposite);
    assert_eq!(joined.difference_funding_rate_percent, dec!(-0.03));
}

#[tokio::test]
#[ignore = "requires a scratch DATABASE_URL"]
async fn reingesting_the_same_payload_changes_only_updatedat() {
    let pool = test_pool().await;
    let pairs = PairsRepository::new(pool.clone());

    let record = spot_pair("A", "BTCUSDT", dec!(91234.56));
    pairs.upsert_batch(&[record.clone()]).await.unwrap();

    let (price_before, created_before): (Decimal, chrono::DateTime<chrono::Utc>) =
        sqlx::query_as("SELECT price, createdat FROM pairs WHERE pairkey = 'BTCUSDT_A_spot'")
            .fetch_one(&pool)
            .await
            .unwrap();

    pairs.upsert_batch(&[record]).await.unwrap();

    let (price_after, created_after): (Decimal, chrono::DateTime<chrono::Utc>) =
        sqlx::query_as("SELECT price, createdat FROM pairs WHERE pairkey = 'BTCUSDT_A_spot'")
            .fetch_one(&pool)
            .await
            .unwrap();

    assert_eq!(price_before, price_after);
    assert_eq!(created_before, created_after, "createdat must never move");
}
