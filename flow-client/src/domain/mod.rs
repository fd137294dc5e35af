mod flow_file;
mod meter_reading;

pub use flow_file::FileRecord;
pub use meter_reading::{
    parse_reading_timestamp, DomainError, MeterSerial, Mpan, Reading, RegisterReading,
};
