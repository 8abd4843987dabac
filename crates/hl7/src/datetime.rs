//! HL7 `TS`/`DTM` timestamps.
//!
//! HL7 timestamps carry their own precision (`2024`, `202401`, `20240115`, `202401151030`, ...)
//! and an optional `±ZZZZ` offset. FHIR `date` keeps the precision as-is; FHIR `dateTime` needs
//! seconds and a zone once a time is present, so missing seconds become `00` and a missing
//! offset is filled from the caller's default.

use crate::{Hl7Error, Hl7Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::Serialize;

/// How much of the timestamp the sender supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl Precision {
    fn from_digits(len: usize) -> Option<Self> {
        match len {
            4 => Some(Self::Year),
            6 => Some(Self::Month),
            8 => Some(Self::Day),
            10 => Some(Self::Hour),
            12 => Some(Self::Minute),
            14 => Some(Self::Second),
            _ => None,
        }
    }

    fn has_time(self) -> bool {
        self >= Self::Hour
    }
}

/// A parsed HL7 timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hl7Timestamp {
    date: NaiveDate,
    time: NaiveTime,
    precision: Precision,
    /// Fractional second digits, verbatim.
    fraction: Option<String>,
    offset: Option<FixedOffset>,
}

impl Hl7Timestamp {
    /// Parses `YYYY[MM[DD[HH[MM[SS[.S[S[S[S]]]]]]]]][+/-ZZZZ]`.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::InvalidTimestamp`] for anything that is not a real calendar date and
    /// time at one of the supported precisions.
    pub fn parse(raw: &str) -> Hl7Result<Self> {
        let invalid = || Hl7Error::InvalidTimestamp(raw.to_string());
        let value = raw.trim();

        let (body, offset) = match value.find(['+', '-']) {
            Some(index) => (&value[..index], Some(parse_offset(&value[index..]).ok_or_else(invalid)?)),
            None => (value, None),
        };

        let (digits, fraction) = match body.split_once('.') {
            Some((digits, fraction)) => {
                if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                (digits, Some(fraction.to_string()))
            }
            None => (body, None),
        };

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let precision = Precision::from_digits(digits.len()).ok_or_else(invalid)?;
        if fraction.is_some() && precision != Precision::Second {
            return Err(invalid());
        }

        let number = |start: usize, len: usize, default: u32| -> u32 {
            digits
                .get(start..start + len)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let year = i32::try_from(number(0, 4, 0)).map_err(|_| invalid())?;
        let date =
            NaiveDate::from_ymd_opt(year, number(4, 2, 1), number(6, 2, 1)).ok_or_else(invalid)?;
        let time = NaiveTime::from_hms_opt(number(8, 2, 0), number(10, 2, 0), number(12, 2, 0))
            .ok_or_else(invalid)?;

        Ok(Self {
            date,
            time,
            precision,
            fraction,
            offset,
        })
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn has_time(&self) -> bool {
        self.precision.has_time()
    }

    /// The offset the sender declared, if any.
    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// FHIR `date`, truncated to the supplied precision (`2024`, `2024-01`, `2024-01-15`).
    pub fn to_fhir_date(&self) -> String {
        match self.precision {
            Precision::Year => self.date.format("%Y").to_string(),
            Precision::Month => self.date.format("%Y-%m").to_string(),
            _ => self.date.format("%Y-%m-%d").to_string(),
        }
    }

    /// FHIR `dateTime`. Date-only values stay date-only; values with a time get seconds and a
    /// zone, `default_offset` when the sender declared none.
    pub fn to_fhir_datetime(&self, default_offset: FixedOffset) -> String {
        if !self.has_time() {
            return self.to_fhir_date();
        }
        let offset = self.offset.unwrap_or(default_offset);
        let mut out = format!(
            "{}T{}",
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M:%S")
        );
        if let Some(fraction) = &self.fraction {
            out.push('.');
            out.push_str(fraction);
        }
        out.push_str(&offset.to_string());
        out
    }

    /// FHIR `instant`: always to the second, missing parts filled with their first value.
    pub fn to_fhir_instant(&self, default_offset: FixedOffset) -> String {
        self.to_datetime(default_offset)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
            .unwrap_or_else(|| self.to_fhir_datetime(default_offset))
    }

    /// The timestamp as a zoned chrono value. `None` only for local times that do not exist in
    /// the offset, which fixed offsets never produce.
    pub fn to_datetime(&self, default_offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        let offset = self.offset.unwrap_or(default_offset);
        offset
            .from_local_datetime(&NaiveDateTime::new(self.date, self.time))
            .single()
    }
}

/// FHIR `time` (`hh:mm:ss`) from an HL7 `TM` value (`HH[MM[SS[.S…]]][±ZZZZ]`).
///
/// FHIR times carry no zone, so a declared offset is dropped.
pub fn fhir_time(raw: &str) -> Hl7Result<String> {
    let invalid = || Hl7Error::InvalidTimestamp(raw.to_string());
    let value = raw.trim();
    let body = value.find(['+', '-']).map_or(value, |index| &value[..index]);
    let (digits, fraction) = match body.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (body, None),
    };

    if !matches!(digits.len(), 2 | 4 | 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let part = |start: usize| -> u32 {
        digits
            .get(start..start + 2)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };
    let time = NaiveTime::from_hms_opt(part(0), part(2), part(4)).ok_or_else(invalid)?;

    let mut out = time.format("%H:%M:%S").to_string();
    if let Some(fraction) = fraction.filter(|f| digits.len() == 6 && !f.is_empty()) {
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        out.push('.');
        out.push_str(fraction);
    }
    Ok(out)
}

/// Parses `+HHMM` / `-HHMM` (also `+HH:MM`).
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|&c| c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("utc")
    }

    #[test]
    fn keeps_date_precision() {
        assert_eq!(Hl7Timestamp::parse("1980").expect("year").to_fhir_date(), "1980");
        assert_eq!(Hl7Timestamp::parse("198003").expect("month").to_fhir_date(), "1980-03");
        assert_eq!(
            Hl7Timestamp::parse("19800315").expect("day").to_fhir_date(),
            "1980-03-15"
        );
        assert_eq!(
            Hl7Timestamp::parse("198003151230").expect("minute").to_fhir_date(),
            "1980-03-15"
        );
    }

    #[test]
    fn date_only_datetime_stays_date_only() {
        let ts = Hl7Timestamp::parse("20240115").expect("valid");
        assert!(!ts.has_time());
        assert_eq!(ts.to_fhir_datetime(utc()), "2024-01-15");
    }

    #[test]
    fn applies_declared_offset() {
        let ts = Hl7Timestamp::parse("20240115103000+0100").expect("valid");
        assert_eq!(ts.precision(), Precision::Second);
        assert_eq!(ts.to_fhir_datetime(utc()), "2024-01-15T10:30:00+01:00");
    }

    #[test]
    fn falls_back_to_default_offset_and_pads_seconds() {
        let paris = FixedOffset::east_opt(7200).expect("offset");
        let ts = Hl7Timestamp::parse("202401151030").expect("valid");
        assert_eq!(ts.to_fhir_datetime(paris), "2024-01-15T10:30:00+02:00");
        assert_eq!(ts.to_fhir_datetime(utc()), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn keeps_fractional_seconds() {
        let ts = Hl7Timestamp::parse("20240115103000.1234-0500").expect("valid");
        assert_eq!(ts.to_fhir_datetime(utc()), "2024-01-15T10:30:00.1234-05:00");
    }

    #[test]
    fn instant_is_always_complete() {
        let ts = Hl7Timestamp::parse("20240115").expect("valid");
        assert_eq!(ts.to_fhir_instant(utc()), "2024-01-15T00:00:00+00:00");
    }

    #[test]
    fn rejects_invalid_values() {
        for bad in ["", "198", "19801", "20241301", "20240230", "2024011525", "abcd", "2024.5", "20240101+99"] {
            match Hl7Timestamp::parse(bad) {
                Err(Hl7Error::InvalidTimestamp(value)) => assert_eq!(value, bad),
                other => panic!("{bad:?}: expected InvalidTimestamp, got {other:?}"),
            }
        }
    }

    #[test]
    fn converts_times() {
        assert_eq!(fhir_time("1030").expect("valid"), "10:30:00");
        assert_eq!(fhir_time("103015.5+0100").expect("valid"), "10:30:15.5");
        assert!(fhir_time("2561").is_err());
        assert!(fhir_time("1").is_err());
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_offset("+0200"), FixedOffset::east_opt(7200));
        assert_eq!(parse_offset("-05:30"), FixedOffset::west_opt(5 * 3600 + 1800));
        assert_eq!(parse_offset("0200"), None);
        assert_eq!(parse_offset("+2400"), None);
    }
}
