pub mod error;
pub mod schema;
pub mod sqlite;
pub mod tables;
pub mod traits;

pub use error::StorageError;
pub use sqlite::{DEFAULT_BUSY_TIMEOUT, SqliteStorage};
pub use tables::SqlTable;
pub use traits::*;
