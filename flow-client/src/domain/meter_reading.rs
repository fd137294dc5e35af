use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use time::{Date, Month, PrimitiveDateTime, Time};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid MPAN '{0}': expected a non-negative integer")]
    InvalidMpan(String),
    #[error("invalid meter serial '{0}': expected 1 to {max} characters", max = MeterSerial::MAX_LEN)]
    InvalidMeterSerial(String),
    #[error("invalid reading timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },
    #[error("invalid register reading '{value}': {reason}")]
    InvalidRegisterReading { value: String, reason: String },
}

/// Meter point administration number (J0003), stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mpan(i64);

impl Mpan {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidMpan(s.to_string()));
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidMpan(s.to_string()))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Mpan {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(DomainError::InvalidMpan(value.to_string()));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Mpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Meter serial number (J0004).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeterSerial(String);

impl MeterSerial {
    /// Column width of `meter_reading.meter_serial_number`.
    pub const MAX_LEN: usize = 10;

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        let len = s.chars().count();
        if len == 0 || len > Self::MAX_LEN {
            return Err(DomainError::InvalidMeterSerial(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeterSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Register reading (J0040), held at one decimal place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegisterReading(Decimal);

impl RegisterReading {
    /// `NUMERIC(10,1)` leaves nine digits before the decimal point.
    const INTEGER_DIGITS: u32 = 9;

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        let value = Decimal::from_str(s).map_err(|e| DomainError::InvalidRegisterReading {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Self::try_from(value).map_err(|_| DomainError::InvalidRegisterReading {
            value: s.to_string(),
            reason: format!("exceeds {} integer digits", Self::INTEGER_DIGITS),
        })
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for RegisterReading {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let rounded = value.round_dp(1);
        let limit = Decimal::from(10_i64.pow(Self::INTEGER_DIGITS));
        if rounded.abs() >= limit {
            return Err(DomainError::InvalidRegisterReading {
                value: value.to_string(),
                reason: format!("exceeds {} integer digits", Self::INTEGER_DIGITS),
            });
        }
        Ok(Self(rounded))
    }
}

impl fmt::Display for RegisterReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a J0016 reading date-time in the fixed `YYYYMMDDHHMMSS` layout.
pub fn parse_reading_timestamp(s: &str) -> Result<PrimitiveDateTime, DomainError> {
    let s = s.trim();
    let invalid = |reason: String| DomainError::InvalidTimestamp {
        value: s.to_string(),
        reason,
    };

    if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected 14 digits YYYYMMDDHHMMSS".to_string()));
    }

    // All bytes are ASCII digits, so these slices and parses cannot fail.
    let field = |start: usize, end: usize| s[start..end].parse::<u16>().unwrap_or_default();

    let month = Month::try_from(field(4, 6) as u8).map_err(|e| invalid(e.to_string()))?;
    let date = Date::from_calendar_date(field(0, 4) as i32, month, field(6, 8) as u8)
        .map_err(|e| invalid(e.to_string()))?;
    let time = Time::from_hms(field(8, 10) as u8, field(10, 12) as u8, field(12, 14) as u8)
        .map_err(|e| invalid(e.to_string()))?;

    Ok(PrimitiveDateTime::new(date, time))
}

/// A single register reading attributed to a meter point and serial.
///
/// Only constructible from already-validated parts, so a reading without a
/// meter serial or owning file cannot exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub file_id: i64,
    pub mpan: Mpan,
    pub meter_serial: MeterSerial,
    pub reading_date: PrimitiveDateTime,
    pub register_reading: RegisterReading,
}

impl Reading {
    pub fn new(
        file_id: i64,
        mpan: Mpan,
        meter_serial: MeterSerial,
        reading_date: PrimitiveDateTime,
        register_reading: RegisterReading,
    ) -> Self {
        Self {
            file_id,
            mpan,
            meter_serial,
            reading_date,
            register_reading,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MPAN: {} | SERIAL: {}", self.mpan, self.meter_serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn mpan_parses_trimmed_digits() {
        let mpan = Mpan::parse(" 1200033197420 ").unwrap();
        assert_eq!(mpan.get(), 1_200_033_197_420);
    }

    #[test]
    fn mpan_rejects_non_numeric_and_signed_values() {
        assert!(Mpan::parse("").is_err());
        assert!(Mpan::parse("12AB").is_err());
        assert!(Mpan::parse("-12").is_err());
        assert!(Mpan::parse("99999999999999999999").is_err());
        assert!(Mpan::try_from(-1).is_err());
    }

    #[test]
    fn meter_serial_is_bounded() {
        assert_eq!(MeterSerial::parse(" L85A 28596 ").unwrap().as_str(), "L85A 28596");
        assert!(MeterSerial::parse("   ").is_err());
        assert!(MeterSerial::parse("ABCDEFGHIJK").is_err());
    }

    #[test]
    fn register_reading_keeps_one_decimal_place() {
        let r = RegisterReading::parse("17393.0").unwrap();
        assert_eq!(r.value(), Decimal::new(173930, 1));

        // banker's rounding at the second decimal place
        assert_eq!(RegisterReading::parse("0.25").unwrap().to_string(), "0.2");
        assert_eq!(RegisterReading::parse("0.35").unwrap().to_string(), "0.4");
    }

    #[test]
    fn register_reading_rejects_garbage_and_overflow() {
        assert!(RegisterReading::parse("abc").is_err());
        assert!(RegisterReading::parse("").is_err());
        assert!(RegisterReading::parse("1000000000.0").is_err());
        assert!(RegisterReading::parse("999999999.9").is_ok());
    }

    #[test]
    fn timestamp_parses_fixed_layout() {
        let ts = parse_reading_timestamp("20160226000000").unwrap();
        assert_eq!(ts, datetime!(2016-02-26 00:00:00));

        let ts = parse_reading_timestamp("20240317235959").unwrap();
        assert_eq!(ts, datetime!(2024-03-17 23:59:59));
    }

    #[test]
    fn timestamp_rejects_malformed_values() {
        assert!(parse_reading_timestamp("INVALID_DATE").is_err());
        assert!(parse_reading_timestamp("2016022600000").is_err());
        assert!(parse_reading_timestamp("20160230000000").is_err());
        assert!(parse_reading_timestamp("20160226250000").is_err());
    }

    #[test]
    fn reading_display_names_meter() {
        let reading = Reading::new(
            1,
            Mpan::parse("1234567890123").unwrap(),
            MeterSerial::parse("METER123").unwrap(),
            datetime!(2024-03-17 23:59:59),
            RegisterReading::parse("50.5").unwrap(),
        );
        assert_eq!(reading.to_string(), "MPAN: 1234567890123 | SERIAL: METER123");
    }
}
