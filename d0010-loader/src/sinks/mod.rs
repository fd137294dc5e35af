//! Storage interface consumed by the loader.
//!
//! The loader only needs an existence check and a transaction in which it
//! creates the file marker and bulk-inserts readings. Work done through a
//! [`StoreTransaction`] is visible to nobody until `commit`; `rollback` or
//! dropping the transaction discards all of it.

pub mod memory;
pub mod postgres;

use flow_client::domain::{FileRecord, Reading};

pub use memory::MemoryReadingStore;
pub use postgres::PgReadingStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("file record already exists: {0}")]
    DuplicateFilename(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("integrity error: {0}")]
    Integrity(String),
}

#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn file_record_exists(&self, filename: &str) -> Result<bool, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

#[async_trait::async_trait]
pub trait StoreTransaction: Send {
    /// Create the marker for `filename`. Fails with
    /// [`StoreError::DuplicateFilename`] if one already exists.
    async fn create_file_record(&mut self, filename: &str) -> Result<FileRecord, StoreError>;

    async fn bulk_insert_readings(&mut self, readings: &[Reading]) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
