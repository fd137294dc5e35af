//! Record-type state machine for D0010 meter reading flows.
//!
//! Lines are pipe-delimited; the first field is the record type. Only three
//! record types matter here:
//! - `026` opens a meter point (MPAN core in field 1)
//! - `028` opens a meter serial under the current meter point (field 1)
//! - `030` is a register reading (timestamp in field 2, value in field 3)
//!
//! Everything else (headers, footers, other groups) is ignored.

use std::{fmt, io};

use csv::StringRecord;
use flow_client::domain::{
    parse_reading_timestamp, DomainError, MeterSerial, Mpan, Reading, RegisterReading,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    MeterPoint,
    MeterSerial,
    Reading,
    Other,
}

impl RecordType {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "026" => Self::MeterPoint,
            "028" => Self::MeterSerial,
            "030" => Self::Reading,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MeterPoint => "026",
            Self::MeterSerial => "028",
            Self::Reading => "030",
            Self::Other => "unrecognised",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("{record} record is missing field {index}")]
    MissingField { record: RecordType, index: usize },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Meter identifiers in scope for the next `030` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MeterContext {
    #[default]
    NoContext,
    HaveMpan(Mpan),
    HaveMpanAndSerial(Mpan, MeterSerial),
}

impl MeterContext {
    pub fn mpan(&self) -> Option<Mpan> {
        match self {
            Self::NoContext => None,
            Self::HaveMpan(mpan) | Self::HaveMpanAndSerial(mpan, _) => Some(*mpan),
        }
    }
}

/// Turns records of one file into readings owned by `file_id`.
#[derive(Debug)]
pub struct RecordParser {
    file_id: i64,
    context: MeterContext,
}

impl RecordParser {
    pub fn new(file_id: i64) -> Self {
        Self {
            file_id,
            context: MeterContext::NoContext,
        }
    }

    pub fn context(&self) -> &MeterContext {
        &self.context
    }

    /// Feed one record.
    ///
    /// Returns `None` for records that only move the state machine (or are
    /// ignored), `Some(Ok(_))` for a reading and `Some(Err(_))` for a record
    /// that should be reported and skipped.
    pub fn parse_record(&mut self, record: &StringRecord) -> Option<Result<Reading, RecordError>> {
        let record_type = RecordType::from_code(record.get(0)?);

        match record_type {
            RecordType::MeterPoint => {
                // A new meter point always drops the serial of the previous one.
                self.context = MeterContext::NoContext;
                let raw = match field(record, record_type, 1) {
                    Ok(raw) => raw,
                    Err(e) => return Some(Err(e)),
                };
                if raw.is_empty() {
                    return None;
                }
                match Mpan::parse(raw) {
                    Ok(mpan) => {
                        self.context = MeterContext::HaveMpan(mpan);
                        None
                    }
                    Err(e) => Some(Err(e.into())),
                }
            }
            RecordType::MeterSerial => {
                // A serial without a meter point can never be used: the next
                // 026 would clear it anyway.
                let mpan = self.context.mpan()?;
                self.context = MeterContext::HaveMpan(mpan);
                let raw = match field(record, record_type, 1) {
                    Ok(raw) => raw,
                    Err(e) => return Some(Err(e)),
                };
                if raw.is_empty() {
                    return None;
                }
                match MeterSerial::parse(raw) {
                    Ok(serial) => {
                        self.context = MeterContext::HaveMpanAndSerial(mpan, serial);
                        None
                    }
                    Err(e) => Some(Err(e.into())),
                }
            }
            RecordType::Reading => match &self.context {
                MeterContext::HaveMpanAndSerial(mpan, serial) => {
                    Some(self.build_reading(*mpan, serial, record))
                }
                _ => None,
            },
            RecordType::Other => None,
        }
    }

    fn build_reading(
        &self,
        mpan: Mpan,
        serial: &MeterSerial,
        record: &StringRecord,
    ) -> Result<Reading, RecordError> {
        let reading_date = parse_reading_timestamp(field(record, RecordType::Reading, 2)?)?;
        let register_reading = RegisterReading::parse(field(record, RecordType::Reading, 3)?)?;

        Ok(Reading::new(
            self.file_id,
            mpan,
            serial.clone(),
            reading_date,
            register_reading,
        ))
    }
}

fn field(record: &StringRecord, record_type: RecordType, index: usize) -> Result<&str, RecordError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or(RecordError::MissingField {
            record: record_type,
            index,
        })
}

/// A line that was skipped, with enough context for an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub line: u64,
    pub raw: String,
    pub error: RecordError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Reading(Reading),
    Malformed(MalformedRecord),
}

/// CSV reader settings for D0010 flows: `|` delimited, no header row,
/// variable field counts and no quoting.
pub fn d0010_reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false);
    builder
}

/// Lazy, single-pass parse of one file. Blank lines are skipped by the
/// reader and never reach the parser.
pub struct Records<R> {
    records: csv::StringRecordsIntoIter<R>,
    parser: RecordParser,
}

impl<R: io::Read> Records<R> {
    pub fn new(reader: R, file_id: i64) -> Self {
        Self {
            records: d0010_reader_builder().from_reader(reader).into_records(),
            parser: RecordParser::new(file_id),
        }
    }
}

impl<R: io::Read> Iterator for Records<R> {
    type Item = Result<RecordOutcome, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };

            match self.parser.parse_record(&record) {
                None => continue,
                Some(Ok(reading)) => return Some(Ok(RecordOutcome::Reading(reading))),
                Some(Err(error)) => {
                    return Some(Ok(RecordOutcome::Malformed(MalformedRecord {
                        line: record.position().map_or(0, |p| p.line()),
                        raw: record.iter().collect::<Vec<_>>().join("|"),
                        error,
                    })))
                }
            }
        }
    }
}
