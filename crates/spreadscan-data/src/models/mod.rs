pub mod diff;
pub mod net;
pub mod pair;

pub use diff::{DiffFuturesRow, DiffRow};
pub use net::NetRecord;
pub use pair::{PairFuturesRecord, PairRecord};
