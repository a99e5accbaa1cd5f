pub mod database;
pub mod models;
pub mod repositories;

pub use database::{connect, execute_with_deadlock_retry, recreate_tables};
pub use models::{DiffFuturesRow, DiffRow, NetRecord, PairFuturesRecord, PairRecord};
pub use repositories::{
    DiffFilter, DiffFuturesFilter, DiffsRepository, FuturesRepository, NetsRepository,
    PairsRepository, TopRows,
};
