//! Spot snapshot repository.
//!
//! The upsert is one multi-row statement per batch: a single `VALUES` list
//! with one placeholder per scalar field per row, conflict-targeted on the
//! natural key. Only mutable columns are refreshed; `createdat` keeps the
//! first-insert timestamp.

use anyhow::Result;
use sqlx::{PgPool, QueryBuilder};

use crate::models::PairRecord;
use crate::repositories::MAX_ROWS_PER_STATEMENT;

#[derive(Debug, Clone)]
pub struct PairsRepository {
    pool: PgPool,
}

impl PairsRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of normalized spot rows in one transaction.
    ///
    /// Empty batches return success without touching the database.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; the whole batch rolls
    /// back and the next scheduled run is the retry.
    pub async fn upsert_batch(&self, records: &[PairRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO pairs (pairkey, symbol, exchange, market, price, baseasset, \
                 quoteasset, displayname, pricechangepercent24h, basevolume24h, \
                 quotevolume24h, updatedat, createdat) ",
            );
            qb.push_values(chunk, |mut row, r| {
                row.push_bind(&r.pair_key)
                    .push_bind(&r.symbol)
                    .push_bind(&r.exchange)
                    .push_bind(&r.market)
                    .push_bind(r.price)
                    .push_bind(&r.base_asset)
                    .push_bind(&r.quote_asset)
                    .push_bind(&r.display_name)
                    .push_bind(r.price_change_percent_24h)
                    .push_bind(r.base_volume_24h)
                    .push_bind(r.quote_volume_24h)
                    .push_bind(r.updated_at)
                    .push_bind(r.updated_at);
            });
            qb.push(
                " ON CONFLICT (pairkey) DO UPDATE SET \
                 price = EXCLUDED.price, \
                 pricechangepercent24h = EXCLUDED.pricechangepercent24h, \
                 basevolume24h = EXCLUDED.basevolume24h, \
                 quotevolume24h = EXCLUDED.quotevolume24h, \
                 updatedat = EXCLUDED.updatedat",
            );
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Distinct symbols for the UI facet endpoint.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn distinct_symbols(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar("SELECT DISTINCT symbol FROM pairs ORDER BY symbol")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Distinct venue names for the UI facet endpoint.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn distinct_exchanges(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar("SELECT DISTINCT exchange FROM pairs ORDER BY exchange")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Distinct `base/quote` coin pairings for the UI facet endpoint.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn distinct_coins(&self) -> Result<Vec<String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT DISTINCT baseasset, quoteasset FROM pairs")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(base, quote)| format!("{base}/{quote}"))
            .collect())
    }
}
