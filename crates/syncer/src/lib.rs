pub mod driver;
pub mod error;

pub use driver::{ChunkDriver, DriveReport, DriverOptions};
pub use error::{Result, SyncerError};
