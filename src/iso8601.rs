/*
 *  iso8601.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Strict ISO-8601 UTC timestamp parsing for DST boundaries
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::{DateTime, NaiveDate};
use thiserror::Error;

/// `YYYY-MM-DDTHH:MM:SSZ`
const PATTERN: &[u8; 20] = b"dddd-dd-ddTdd:dd:ddZ";

/// Raised when a boundary timestamp does not match the exact UTC pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {value:?}: {reason}")]
pub struct InvalidTimestampError {
    pub value: String,
    pub reason: &'static str,
}

impl InvalidTimestampError {
    fn new(value: &str, reason: &'static str) -> Self {
        Self { value: value.to_string(), reason }
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ` into seconds since the Unix epoch.
///
/// All fields are taken as UTC. Any other designator (`+00:00`, lower-case
/// `z`, no designator), other punctuation, or non-digit fields are rejected,
/// as are calendar values that do not exist (month 13, Feb 30, hour 24).
pub fn parse_iso8601_to_epoch(value: &str) -> Result<i64, InvalidTimestampError> {
    let bytes = value.as_bytes();
    if bytes.len() != PATTERN.len() {
        return Err(InvalidTimestampError::new(value, "expected YYYY-MM-DDTHH:MM:SSZ"));
    }
    for (b, p) in bytes.iter().zip(PATTERN.iter()) {
        let ok = match p {
            b'd' => b.is_ascii_digit(),
            _ => b == p,
        };
        if !ok {
            return Err(InvalidTimestampError::new(value, "expected YYYY-MM-DDTHH:MM:SSZ"));
        }
    }

    let year = field(bytes, 0, 4) as i32;
    let month = field(bytes, 5, 2);
    let day = field(bytes, 8, 2);
    let hour = field(bytes, 11, 2);
    let minute = field(bytes, 14, 2);
    let second = field(bytes, 17, 2);

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| InvalidTimestampError::new(value, "field out of range"))?;

    Ok(naive.and_utc().timestamp())
}

/// Render an epoch the same way the boundary strings arrive, for logging.
pub fn format_epoch(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => format!("@{epoch}"),
    }
}

// digits already validated by the pattern walk
fn field(bytes: &[u8], start: usize, len: usize) -> u32 {
    bytes[start..start + len]
        .iter()
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
}
