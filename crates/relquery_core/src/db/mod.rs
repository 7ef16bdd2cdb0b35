//! Store adapter boundary and the SQLite implementation behind it.
//!
//! # Responsibility
//! - Define the `StoreAdapter` seam the engine dispatches compiled
//!   statements through.
//! - Open and configure SQLite connections for that adapter.
//!
//! # Invariants
//! - Adapters execute exactly the statement text and bindings they are
//!   given; they never rewrite or retry.
//! - Returned rows carry one value per result column, in column order.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod adapter;
mod open;

pub use adapter::{CompiledStatement, SqliteStore, StoreAdapter};
pub use open::{open_store, open_store_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedColumnType { index: usize, type_name: String },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedColumnType { index, type_name } => {
                write!(f, "result column {index} has unsupported type {type_name}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedColumnType { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
