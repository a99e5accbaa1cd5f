pub mod diffs_repo;
pub mod futures_repo;
pub mod nets_repo;
pub mod pairs_repo;

pub use diffs_repo::{DiffFilter, DiffFuturesFilter, DiffsRepository, TopRows};
pub use futures_repo::FuturesRepository;
pub use nets_repo::NetsRepository;
pub use pairs_repo::PairsRepository;

/// Upper bound on rows per upsert statement. Postgres caps bind parameters
/// at `u16::MAX`; the widest row here carries 16 parameters.
pub(crate) const MAX_ROWS_PER_STATEMENT: usize = 3500;
