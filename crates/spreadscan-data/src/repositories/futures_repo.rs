//! Perpetual-futures snapshot repository.

use anyhow::Result;
use sqlx::{PgPool, QueryBuilder};

use crate::models::PairFuturesRecord;
use crate::repositories::MAX_ROWS_PER_STATEMENT;

#[derive(Debug, Clone)]
pub struct FuturesRepository {
    pool: PgPool,
}

impl FuturesRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of normalized futures rows in one transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; the batch rolls back.
    pub async fn upsert_batch(&self, records: &[PairFuturesRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO pairsfutures (pairkey, symbol, exchange, market, markprice, \
                 indexprice, baseasset, quoteasset, displayname, fundingratepercent, \
                 nextfundingtimestamp, pricechangepercent24h, basevolume24h, quotevolume24h, \
                 updatedat, createdat) ",
            );
            qb.push_values(chunk, |mut row, r| {
                row.push_bind(&r.pair_key)
                    .push_bind(&r.symbol)
                    .push_bind(&r.exchange)
                    .push_bind(&r.market)
                    .push_bind(r.mark_price)
                    .push_bind(r.index_price)
                    .push_bind(&r.base_asset)
                    .push_bind(&r.quote_asset)
                    .push_bind(&r.display_name)
                    .push_bind(r.funding_rate_percent)
                    .push_bind(r.next_funding_timestamp)
                    .push_bind(r.price_change_percent_24h)
                    .push_bind(r.base_volume_24h)
                    .push_bind(r.quote_volume_24h)
                    .push_bind(r.updated_at)
                    .push_bind(r.updated_at);
            });
            qb.push(
                " ON CONFLICT (pairkey) DO UPDATE SET \
                 markprice = EXCLUDED.markprice, \
                 indexprice = EXCLUDED.indexprice, \
                 fundingratepercent = EXCLUDED.fundingratepercent, \
                 nextfundingtimestamp = EXCLUDED.nextfundingtimestamp, \
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
        let rows = sqlx::query_scalar("SELECT DISTINCT symbol FROM pairsfutures ORDER BY symbol")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Distinct venue names for the UI facet endpoint.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn distinct_exchanges(&self) -> Result<Vec<String>> {
        let rows =
            sqlx::query_scalar("SELECT DISTINCT exchange FROM pairsfutures ORDER BY exchange")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Distinct single coins (union of base and quote assets) for the UI
    /// facet endpoint.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn distinct_coins(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar(
            "SELECT DISTINCT asset FROM ( \
                SELECT baseasset AS asset FROM pairsfutures \
                UNION \
                SELECT quoteasset AS asset FROM pairsfutures \
             ) AS combined ORDER BY asset",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
