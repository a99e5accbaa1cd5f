//! Coin network availability repository.
//!
//! Two write modes exist because venues differ: most upsert by `coinkey`,
//! while WhiteBIT replaces its whole row set per run. Both happen inside a
//! single transaction so a failed run leaves the previous catalog intact.

use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::models::NetRecord;
use crate::repositories::MAX_ROWS_PER_STATEMENT;

#[derive(Debug, Clone)]
pub struct NetsRepository {
    pool: PgPool,
}

impl NetsRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of network rows by `coinkey`.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; the batch rolls back.
    pub async fn upsert_batch(&self, records: &[NetRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        insert_chunks(&mut tx, records).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes every row owned by `exchange` and re-inserts the given
    /// catalog, all in one transaction.
    ///
    /// # Errors
    /// Returns an error if any statement fails; the delete rolls back with
    /// the inserts.
    pub async fn replace_for_exchange(&self, exchange: &str, records: &[NetRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM nets WHERE exchange = $1")
            .bind(exchange)
            .execute(&mut *tx)
            .await?;
        insert_chunks(&mut tx, records).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_chunks(tx: &mut Transaction<'_, Postgres>, records: &[NetRecord]) -> Result<()> {
    for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb = QueryBuilder::new(
            "INSERT INTO nets (coinkey, coin, exchange, network, networkname, \
             depositenable, withdrawenable, updatedat, createdat) ",
        );
        qb.push_values(chunk, |mut row, r| {
            row.push_bind(&r.coin_key)
                .push_bind(&r.coin)
                .push_bind(&r.exchange)
                .push_bind(&r.network)
                .push_bind(&r.network_name)
                .push_bind(r.deposit_enable)
                .push_bind(r.withdraw_enable)
                .push_bind(r.updated_at)
                .push_bind(r.updated_at);
        });
        qb.push(
            " ON CONFLICT (coinkey) DO UPDATE SET \
             networkname = EXCLUDED.networkname, \
             depositenable = EXCLUDED.depositenable, \
             withdrawenable = EXCLUDED.withdrawenable, \
             updatedat = EXCLUDED.updatedat",
        );
        qb.build().execute(&mut **tx).await?;
    }
    Ok(())
}
