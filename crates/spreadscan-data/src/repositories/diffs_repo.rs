//! Cross-venue differential engine and read-side queries.
//!
//! Each recomputation is one SQL statement: filter the snapshot, self-join
//! it across venues, compute absolute and percent differences, carry the
//! time-of-life of still-profitable rows forward via a left join against
//! the existing differential table, attach per-exchange network blobs, and
//! upsert on the differential key. Both orderings of every venue pairing
//! are produced, so `(A,B)` and `(B,A)` exist as distinct rows.
//!
//! The two refresh statements are the only database path with deadlock
//! retry; they are additionally serialized by the scheduler's exclusion
//! lock.

use anyhow::Result;
use rust_decimal::Decimal;
use sqlx::{PgPool, QueryBuilder};

use crate::database::execute_with_deadlock_retry;
use crate::models::{DiffFuturesRow, DiffRow};

/// `topRows` query parameter: a row cap or the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopRows {
    All,
    Limit(i64),
}

impl Default for TopRows {
    fn default() -> Self {
        Self::Limit(500)
    }
}

/// Filters accepted by `GET /diffs`.
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    pub top_rows: TopRows,
    pub exchanges: Vec<String>,
    pub symbols: Vec<String>,
    pub max_diff_perc: Option<Decimal>,
    pub min_diff_perc: Option<Decimal>,
    /// Postgres interval text, e.g. `2 hours` or `00:30:00`.
    pub max_life_time: Option<String>,
    pub min_life_time: Option<String>,
}

/// Filters accepted by `GET /diffsFutures`.
#[derive(Debug, Clone, Default)]
pub struct DiffFuturesFilter {
    pub top_rows: TopRows,
    pub exchanges: Vec<String>,
    pub symbols: Vec<String>,
    /// Matches rows whose base or quote asset equals any listed coin.
    pub coins: Vec<String>,
    pub opposite: bool,
}

const NETWORKS_OBJECT: &str = "jsonb_build_object(\
    'network', n.network, 'networkName', n.networkname, \
    'depositEnable', n.depositenable, 'withdrawEnable', n.withdrawenable)";

/// Builds the `{"baseAsset": [...], "quoteAsset": [...]}` blob for one leg.
/// Missing catalogs yield empty arrays, never absent keys.
fn networks_blob(exchange_col: &str) -> String {
    format!(
        "jsonb_build_object(\
            'baseAsset', coalesce((SELECT jsonb_agg({NETWORKS_OBJECT}) FROM nets n \
                WHERE n.exchange = j.{exchange_col} AND n.coin = j.baseasset), '[]'::jsonb), \
            'quoteAsset', coalesce((SELECT jsonb_agg({NETWORKS_OBJECT}) FROM nets n \
                WHERE n.exchange = j.{exchange_col} AND n.coin = j.quoteasset), '[]'::jsonb))"
    )
}

fn spot_refresh_sql() -> String {
    let first_networks = networks_blob("firstexchange");
    let second_networks = networks_blob("secondexchange");
    format!(
        "WITH snapshot AS ( \
            SELECT symbol, exchange, market, price, baseasset, quoteasset, basevolume24h \
            FROM pairs \
            WHERE price <> 0 \
        ), joined AS ( \
            SELECT \
                p1.symbol, p1.baseasset, p1.quoteasset, \
                p1.exchange AS firstexchange, p1.market AS firstmarket, \
                p1.price AS firstprice, p1.basevolume24h AS firstvolume, \
                p2.exchange AS secondexchange, p2.market AS secondmarket, \
                p2.price AS secondprice, p2.basevolume24h AS secondvolume, \
                p1.symbol || '_' || p1.exchange || '-' || p2.exchange AS pairkey, \
                round(p2.price - p1.price, 8) AS difference, \
                LEAST(GREATEST(trunc((p2.price - p1.price) / p1.price * 100, 2), \
                    -1000000000), 1000000000) AS differencepercentage \
            FROM snapshot p1 \
            JOIN snapshot p2 \
              ON p1.symbol = p2.symbol \
             AND p1.exchange <> p2.exchange \
        ) \
        INSERT INTO diffs ( \
            pairkey, symbol, baseasset, quoteasset, \
            firstpairexchange, firstpairmarket, firstpairprice, firstpairvolume, \
            secondpairexchange, secondpairmarket, secondpairprice, secondpairvolume, \
            difference, differencepercentage, \
            firstexchangenetworks, secondexchangenetworks, \
            timeoflife, timeelapsed, updatedat \
        ) \
        SELECT \
            j.pairkey, j.symbol, j.baseasset, j.quoteasset, \
            j.firstexchange, j.firstmarket, j.firstprice, j.firstvolume, \
            j.secondexchange, j.secondmarket, j.secondprice, j.secondvolume, \
            j.difference, j.differencepercentage, \
            {first_networks}, \
            {second_networks}, \
            CASE WHEN j.differencepercentage > 0 \
                 THEN coalesce(d.timeoflife, now()) END, \
            CASE WHEN j.differencepercentage > 0 AND d.timeoflife IS NOT NULL \
                 THEN d.timeelapsed + (now() - d.timeoflife) \
                 ELSE INTERVAL '0' END, \
            now() \
        FROM joined j \
        LEFT JOIN diffs d ON d.pairkey = j.pairkey \
        ON CONFLICT (pairkey) DO UPDATE SET \
            firstpairprice = EXCLUDED.firstpairprice, \
            firstpairvolume = EXCLUDED.firstpairvolume, \
            secondpairprice = EXCLUDED.secondpairprice, \
            secondpairvolume = EXCLUDED.secondpairvolume, \
            difference = EXCLUDED.difference, \
            differencepercentage = EXCLUDED.differencepercentage, \
            firstexchangenetworks = EXCLUDED.firstexchangenetworks, \
            secondexchangenetworks = EXCLUDED.secondexchangenetworks, \
            timeoflife = EXCLUDED.timeoflife, \
            timeelapsed = EXCLUDED.timeelapsed, \
            updatedat = EXCLUDED.updatedat"
    )
}

fn futures_refresh_sql() -> String {
    let first_networks = networks_blob("firstexchange");
    let second_networks = networks_blob("secondexchange");
    format!(
        "WITH snapshot AS ( \
            SELECT symbol, exchange, market, markprice, indexprice, fundingratepercent, \
                   baseasset, quoteasset, basevolume24h \
            FROM pairsfutures \
            WHERE markprice <> 0 AND indexprice <> 0 \
        ), joined AS ( \
            SELECT \
                p1.symbol, p2.symbol AS secondsymbol, p1.baseasset, p1.quoteasset, \
                p1.exchange AS firstexchange, p1.market AS firstmarket, \
                p1.markprice AS firstmark, p1.basevolume24h AS firstvolume, \
                p1.fundingratepercent AS firstfunding, \
                p2.exchange AS secondexchange, p2.market AS secondmarket, \
                p2.markprice AS secondmark, p2.basevolume24h AS secondvolume, \
                p2.fundingratepercent AS secondfunding, \
                p1.symbol || '_' || p2.symbol || '_' || p1.exchange || '-' || p2.exchange \
                    AS pairkey, \
                round(p2.markprice - p1.markprice, 8) AS differencemark, \
                round(p2.indexprice - p1.indexprice, 8) AS differenceindex, \
                LEAST(GREATEST(trunc((p2.markprice - p1.markprice) / p1.markprice * 100, 2), \
                    -1000000000), 1000000000) AS differencemarkpercentage, \
                LEAST(GREATEST(trunc((p2.indexprice - p1.indexprice) / p1.indexprice * 100, 2), \
                    -1000000000), 1000000000) AS differenceindexpercentage, \
                round(p2.fundingratepercent - p1.fundingratepercent, 6) \
                    AS differencefundingratepercent, \
                (sign(p1.fundingratepercent) <> sign(p2.fundingratepercent) \
                 AND p1.fundingratepercent <> 0 AND p2.fundingratepercent <> 0) \
                    AS isfundingrateopposite \
            FROM snapshot p1 \
            JOIN snapshot p2 \
              ON p1.exchange <> p2.exchange \
             AND p1.baseasset = p2.baseasset \
             AND (p1.quoteasset = p2.quoteasset \
                  OR (p1.quoteasset IN ('USDT', 'USDC') \
                      AND p2.quoteasset IN ('USDT', 'USDC'))) \
        ) \
        INSERT INTO diffsfutures ( \
            pairkey, symbol, secondsymbol, baseasset, quoteasset, \
            firstpairexchange, firstpairmarket, firstpairprice, firstpairvolume, \
            firstfundingratepercent, \
            secondpairexchange, secondpairmarket, secondpairprice, secondpairvolume, \
            secondfundingratepercent, \
            differencemark, differenceindex, \
            differencemarkpercentage, differenceindexpercentage, \
            differencefundingratepercent, isfundingrateopposite, \
            firstexchangenetworks, secondexchangenetworks, \
            timeoflife, timeelapsed, updatedat \
        ) \
        SELECT \
            j.pairkey, j.symbol, j.secondsymbol, j.baseasset, j.quoteasset, \
            j.firstexchange, j.firstmarket, j.firstmark, j.firstvolume, j.firstfunding, \
            j.secondexchange, j.secondmarket, j.secondmark, j.secondvolume, j.secondfunding, \
            j.differencemark, j.differenceindex, \
            j.differencemarkpercentage, j.differenceindexpercentage, \
            j.differencefundingratepercent, j.isfundingrateopposite, \
            {first_networks}, \
            {second_networks}, \
            CASE WHEN j.differencemarkpercentage > 0 \
                 THEN coalesce(d.timeoflife, now()) END, \
            CASE WHEN j.differencemarkpercentage > 0 AND d.timeoflife IS NOT NULL \
                 THEN d.timeelapsed + (now() - d.timeoflife) \
                 ELSE INTERVAL '0' END, \
            now() \
        FROM joined j \
        LEFT JOIN diffsfutures d ON d.pairkey = j.pairkey \
        ON CONFLICT (pairkey) DO UPDATE SET \
            firstpairprice = EXCLUDED.firstpairprice, \
            firstpairvolume = EXCLUDED.firstpairvolume, \
            firstfundingratepercent = EXCLUDED.firstfundingratepercent, \
            secondpairprice = EXCLUDED.secondpairprice, \
            secondpairvolume = EXCLUDED.secondpairvolume, \
            secondfundingratepercent = EXCLUDED.secondfundingratepercent, \
            differencemark = EXCLUDED.differencemark, \
            differenceindex = EXCLUDED.differenceindex, \
            differencemarkpercentage = EXCLUDED.differencemarkpercentage, \
            differenceindexpercentage = EXCLUDED.differenceindexpercentage, \
            differencefundingratepercent = EXCLUDED.differencefundingratepercent, \
            isfundingrateopposite = EXCLUDED.isfundingrateopposite, \
            firstexchangenetworks = EXCLUDED.firstexchangenetworks, \
            secondexchangenetworks = EXCLUDED.secondexchangenetworks, \
            timeoflife = EXCLUDED.timeoflife, \
            timeelapsed = EXCLUDED.timeelapsed, \
            updatedat = EXCLUDED.updatedat"
    )
}

const DIFF_SELECT: &str = "SELECT \
    pairkey AS pair_key, symbol, baseasset AS base_asset, quoteasset AS quote_asset, \
    firstpairexchange AS first_pair_exchange, firstpairmarket AS first_pair_market, \
    firstpairprice AS first_pair_price, firstpairvolume AS first_pair_volume, \
    secondpairexchange AS second_pair_exchange, secondpairmarket AS second_pair_market, \
    secondpairprice AS second_pair_price, secondpairvolume AS second_pair_volume, \
    difference, differencepercentage AS difference_percentage, \
    firstexchangenetworks AS first_exchange_networks, \
    secondexchangenetworks AS second_exchange_networks, \
    timeoflife AS time_of_life, timeelapsed::text AS time_elapsed, \
    updatedat AS updated_at, createdat AS created_at \
    FROM diffs";

const DIFF_FUTURES_SELECT: &str = "SELECT \
    pairkey AS pair_key, symbol, secondsymbol AS second_symbol, \
    baseasset AS base_asset, quoteasset AS quote_asset, \
    firstpairexchange AS first_pair_exchange, firstpairmarket AS first_pair_market, \
    firstpairprice AS first_pair_price, firstpairvolume AS first_pair_volume, \
    firstfundingratepercent AS first_funding_rate_percent, \
    secondpairexchange AS second_pair_exchange, secondpairmarket AS second_pair_market, \
    secondpairprice AS second_pair_price, secondpairvolume AS second_pair_volume, \
    secondfundingratepercent AS second_funding_rate_percent, \
    differencemark AS difference_mark, differenceindex AS difference_index, \
    differencemarkpercentage AS difference_mark_percentage, \
    differenceindexpercentage AS difference_index_percentage, \
    differencefundingratepercent AS difference_funding_rate_percent, \
    isfundingrateopposite AS is_funding_rate_opposite, \
    firstexchangenetworks AS first_exchange_networks, \
    secondexchangenetworks AS second_exchange_networks, \
    timeoflife AS time_of_life, timeelapsed::text AS time_elapsed, \
    updatedat AS updated_at, createdat AS created_at \
    FROM diffsfutures";

#[derive(Debug, Clone)]
pub struct DiffsRepository {
    pool: PgPool,
}

impl DiffsRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recomputes every spot differential from the current snapshot.
    ///
    /// # Errors
    /// Returns an error once the deadlock retries are exhausted or on any
    /// other database failure.
    pub async fn refresh_spot(&self) -> Result<()> {
        execute_with_deadlock_retry(&self.pool, &spot_refresh_sql()).await
    }

    /// Recomputes every futures differential from the current snapshot.
    ///
    /// # Errors
    /// Returns an error once the deadlock retries are exhausted or on any
    /// other database failure.
    pub async fn refresh_futures(&self) -> Result<()> {
        execute_with_deadlock_retry(&self.pool, &futures_refresh_sql()).await
    }

    /// Filtered spot differentials, ordered by percent difference
    /// descending. Rows with a zero volume on either side, or a percent
    /// difference at or past 100000, are never returned.
    ///
    /// Every filter value is bound as a statement parameter.
    ///
    /// # Errors
    /// Returns an error if the query fails (including malformed interval
    /// filter text).
    pub async fn query_diffs(&self, filter: &DiffFilter) -> Result<Vec<DiffRow>> {
        let mut qb = QueryBuilder::new(DIFF_SELECT);
        qb.push(
            " WHERE firstpairvolume <> 0 AND secondpairvolume <> 0 \
             AND differencepercentage < 100000",
        );

        if !filter.exchanges.is_empty() {
            qb.push(" AND firstpairexchange = ANY(")
                .push_bind(&filter.exchanges)
                .push(") AND secondpairexchange = ANY(")
                .push_bind(&filter.exchanges)
                .push(")");
        }
        if !filter.symbols.is_empty() {
            qb.push(" AND symbol = ANY(")
                .push_bind(&filter.symbols)
                .push(")");
        }
        if let Some(max) = filter.max_diff_perc {
            qb.push(" AND differencepercentage <= ").push_bind(max);
        }
        if let Some(min) = filter.min_diff_perc {
            qb.push(" AND differencepercentage >= ").push_bind(min);
        }
        if let Some(ref max_life) = filter.max_life_time {
            qb.push(" AND timeelapsed <= ")
                .push_bind(max_life)
                .push("::interval");
        }
        if let Some(ref min_life) = filter.min_life_time {
            qb.push(" AND timeelapsed >= ")
                .push_bind(min_life)
                .push("::interval");
        }

        qb.push(" ORDER BY differencepercentage DESC");
        if let TopRows::Limit(n) = filter.top_rows {
            qb.push(" LIMIT ").push_bind(n);
        }

        let rows = qb.build_query_as::<DiffRow>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Filtered futures differentials, ordered by funding-rate difference
    /// descending.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_diffs_futures(
        &self,
        filter: &DiffFuturesFilter,
    ) -> Result<Vec<DiffFuturesRow>> {
        let mut qb = QueryBuilder::new(DIFF_FUTURES_SELECT);
        qb.push(" WHERE firstpairvolume <> 0 AND secondpairvolume <> 0");

        if !filter.exchanges.is_empty() {
            qb.push(" AND firstpairexchange = ANY(")
                .push_bind(&filter.exchanges)
                .push(") AND secondpairexchange = ANY(")
                .push_bind(&filter.exchanges)
                .push(")");
        }
        if !filter.symbols.is_empty() {
            qb.push(" AND symbol = ANY(")
                .push_bind(&filter.symbols)
                .push(")");
        }
        if !filter.coins.is_empty() {
            qb.push(" AND (baseasset = ANY(")
                .push_bind(&filter.coins)
                .push(") OR quoteasset = ANY(")
                .push_bind(&filter.coins)
                .push("))");
        }
        if filter.opposite {
            qb.push(" AND isfundingrateopposite = TRUE");
        }

        qb.push(" ORDER BY differencefundingratepercent DESC");
        if let TopRows::Limit(n) = filter.top_rows {
            qb.push(" LIMIT ").push_bind(n);
        }

        let rows = qb
            .build_query_as::<DiffFuturesRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_top_rows_is_500() {
        assert_eq!(TopRows::default(), TopRows::Limit(500));
    }

    #[test]
    fn test_spot_sql_preserves_lifetime_semantics() {
        let sql = spot_refresh_sql();
        // Both orderings come out of the asymmetric self-join.
        assert!(sql.contains("p1.exchange <> p2.exchange"));
        // Lifetime carries forward only while the percentage is positive.
        assert!(sql.contains("coalesce(d.timeoflife, now())"));
        assert!(sql.contains("d.timeelapsed + (now() - d.timeoflife)"));
        // createdat is never refreshed by the upsert.
        assert!(!sql.contains("createdat = EXCLUDED"));
    }

    #[test]
    fn test_futures_sql_stablecoin_equivalence() {
        let sql = futures_refresh_sql();
        assert!(sql.contains("p1.quoteasset IN ('USDT', 'USDC')"));
        assert!(sql.contains("isfundingrateopposite"));
        assert!(sql.contains("'_' || p1.exchange || '-' || p2.exchange"));
        assert!(!sql.contains("createdat = EXCLUDED"));
    }

    #[test]
    fn test_network_blob_has_empty_list_fallback() {
        let blob = networks_blob("firstexchange");
        assert!(blob.contains("'[]'::jsonb"));
        assert!(blob.contains("'baseAsset'"));
        assert!(blob.contains("'quoteAsset'"));
    }
}
