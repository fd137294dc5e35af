use flow_client::{
    db,
    domain::{FileRecord, Reading},
};
use sqlx::{postgres::PgPool, Postgres, Transaction};

use super::{ReadingStore, StoreError, StoreTransaction};

/// Postgres-backed store for flow files and readings.
///
/// Tables are expected to exist (see `sql/schema/01_d0010.sql`).
#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
    batch_size: usize,
}

impl PgReadingStore {
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }
}

fn map_insert_error(filename: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateFilename(filename.to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgReadingStore {
    async fn file_record_exists(&self, filename: &str) -> Result<bool, StoreError> {
        Ok(db::file_record_exists(&self.pool, filename).await?)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction {
            tx,
            batch_size: self.batch_size,
        }))
    }
}

pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
    batch_size: usize,
}

#[async_trait::async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn create_file_record(&mut self, filename: &str) -> Result<FileRecord, StoreError> {
        db::insert_file_record(&mut *self.tx, filename)
            .await
            .map_err(|e| map_insert_error(filename, e))
    }

    async fn bulk_insert_readings(&mut self, readings: &[Reading]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for chunk in readings.chunks(self.batch_size) {
            inserted += db::insert_readings(&mut *self.tx, chunk).await?;
            tracing::debug!(rows = chunk.len(), "inserted meter_reading batch");
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
