// SPDX-License-Identifier: MPL-2.0

mod db;
mod domains;
mod history;
mod schema;

pub use db::Database;
pub use domains::{Domain, DomainStore, DomainUpdate, NewDomain};
pub use history::{HistoryEntry, HistoryFilter, HistoryPage, HistoryStore, NewHistory};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("database is closed")]
    Closed,
    #[error("database lock poisoned")]
    Poisoned,
    #[error("not found")]
    NotFound,
    #[error("invalid page {page} of size {size}")]
    InvalidPage { page: i64, size: i64 },
}
