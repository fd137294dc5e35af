use std::sync::{Arc, Mutex, MutexGuard};

use flow_client::domain::{FileRecord, Reading};
use time::OffsetDateTime;

use super::{ReadingStore, StoreError, StoreTransaction};

#[derive(Debug, Default)]
struct MemoryState {
    next_file_id: i64,
    last_ingested_at: Option<OffsetDateTime>,
    files: Vec<FileRecord>,
    readings: Vec<Reading>,
}

impl MemoryState {
    fn has_file(&self, filename: &str) -> bool {
        self.files.iter().any(|f| f.filename == filename)
    }

    /// Ingestion timestamps never go backwards, even if the wall clock does.
    fn next_ingested_at(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let ts = match self.last_ingested_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_ingested_at = Some(ts);
        ts
    }
}

/// In-process store with the same transactional guarantees as the
/// Postgres one. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryReadingStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    pub fn file_records(&self) -> Vec<FileRecord> {
        self.lock().files.clone()
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.lock().readings.clone()
    }

    pub fn readings_for(&self, filename: &str) -> Vec<Reading> {
        let state = self.lock();
        let Some(file) = state.files.iter().find(|f| f.filename == filename) else {
            return Vec::new();
        };
        state
            .readings
            .iter()
            .filter(|r| r.file_id == file.id)
            .cloned()
            .collect()
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    // Commit validates before it mutates, so a poisoned state is still whole.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn file_record_exists(&self, filename: &str) -> Result<bool, StoreError> {
        Ok(self.lock().has_file(filename))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            files: Vec::new(),
            readings: Vec::new(),
        }))
    }
}

/// Buffers writes until commit. Dropping it discards them.
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    files: Vec<FileRecord>,
    readings: Vec<Reading>,
}

#[async_trait::async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn create_file_record(&mut self, filename: &str) -> Result<FileRecord, StoreError> {
        let mut state = lock(&self.state);
        if state.has_file(filename) || self.files.iter().any(|f| f.filename == filename) {
            return Err(StoreError::DuplicateFilename(filename.to_string()));
        }

        // Ids come from a shared sequence, so a rolled-back file leaves a gap.
        state.next_file_id += 1;
        let record = FileRecord {
            id: state.next_file_id,
            filename: filename.to_string(),
            ingested_at: state.next_ingested_at(),
        };
        self.files.push(record.clone());
        Ok(record)
    }

    async fn bulk_insert_readings(&mut self, readings: &[Reading]) -> Result<u64, StoreError> {
        if let Some(orphan) = readings
            .iter()
            .find(|r| !self.files.iter().any(|f| f.id == r.file_id))
        {
            let committed = lock(&self.state).files.iter().any(|f| f.id == orphan.file_id);
            if !committed {
                return Err(StoreError::Integrity(format!(
                    "reading references unknown file record {}",
                    orphan.file_id
                )));
            }
        }
        self.readings.extend_from_slice(readings);
        Ok(readings.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut state = lock(&this.state);
        if let Some(dup) = this.files.iter().find(|f| state.has_file(&f.filename)) {
            return Err(StoreError::DuplicateFilename(dup.filename.clone()));
        }
        state.files.extend(this.files);
        state.readings.extend(this.readings);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_client::domain::{MeterSerial, Mpan, RegisterReading};
    use time::macros::datetime;

    fn reading(file_id: i64) -> Reading {
        Reading::new(
            file_id,
            Mpan::parse("1200033197420").unwrap(),
            MeterSerial::parse("L85A 28596").unwrap(),
            datetime!(2016-02-26 00:00:00),
            RegisterReading::parse("17393.0").unwrap(),
        )
    }

    #[tokio::test]
    async fn committed_writes_become_visible() {
        let store = MemoryReadingStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx.create_file_record("a.uff").await.unwrap();
        tx.bulk_insert_readings(&[reading(record.id)]).await.unwrap();

        assert!(!store.file_record_exists("a.uff").await.unwrap());
        tx.commit().await.unwrap();

        assert!(store.file_record_exists("a.uff").await.unwrap());
        assert_eq!(store.readings_for("a.uff").len(), 1);
    }

    #[tokio::test]
    async fn rollback_and_drop_discard_writes() {
        let store = MemoryReadingStore::new();

        let mut tx = store.begin().await.unwrap();
        let record = tx.create_file_record("a.uff").await.unwrap();
        tx.bulk_insert_readings(&[reading(record.id)]).await.unwrap();
        tx.rollback().await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_file_record("b.uff").await.unwrap();
        }

        assert!(store.file_records().is_empty());
        assert!(store.readings().is_empty());
    }

    #[tokio::test]
    async fn duplicate_filename_is_rejected() {
        let store = MemoryReadingStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_file_record("a.uff").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.create_file_record("a.uff").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateFilename(name) if name == "a.uff"));
    }

    #[tokio::test]
    async fn readings_must_reference_a_file_record() {
        let store = MemoryReadingStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.bulk_insert_readings(&[reading(99)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[tokio::test]
    async fn ingestion_timestamps_do_not_decrease() {
        let store = MemoryReadingStore::new();
        for name in ["a.uff", "b.uff", "c.uff"] {
            let mut tx = store.begin().await.unwrap();
            tx.create_file_record(name).await.unwrap();
            tx.commit().await.unwrap();
        }

        let files = store.file_records();
        assert!(files.windows(2).all(|w| w[0].ingested_at <= w[1].ingested_at));
        assert!(files.windows(2).all(|w| w[0].id < w[1].id));
    }
}
