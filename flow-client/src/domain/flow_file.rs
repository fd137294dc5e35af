use std::fmt;

use time::OffsetDateTime;

/// A D0010 flow file that has been ingested.
///
/// `filename` is unique across all records and is the idempotency key for
/// the loader: once a record exists, the file is never loaded again.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub ingested_at: OffsetDateTime,
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn display_is_the_filename() {
        let record = FileRecord {
            id: 1,
            filename: "test_file.uff".to_string(),
            ingested_at: datetime!(2024-03-17 23:59:59 UTC),
        };
        assert_eq!(record.to_string(), "test_file.uff");
    }
}
