//! Persistence boundary: storage errors, entities, store traits and backends.

pub mod memory;
pub mod models;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
pub mod round_store;
pub mod storage;
pub mod user_directory;
