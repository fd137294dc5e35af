pub mod reading_queries;

pub use reading_queries::{file_record_exists, insert_file_record, insert_readings};
