pub mod scheduler;

pub use scheduler::{JobSet, UpdaterScheduler, VenueJob};
