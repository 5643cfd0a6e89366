//! Timestamp text parsing.
//!
//! Timestamp-designated columns may be stored as text. Such values are parsed
//! as partial ISO-8601 dates and floored to microseconds: `2024` is the first
//! microsecond of 2024, `2024-03-01T10` the first microsecond of that hour.

use crate::error::{Error, Result};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;
const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

/// Parse `YYYY[-MM[-DD[(T| )HH[:MM[:SS[.f{1,6}]]]]]][Z]` into epoch microseconds.
pub fn parse_floor_partial(text: &str) -> Result<i64> {
    let invalid = || Error::InvalidInput(format!("Invalid timestamp: {text}"));
    let mut p = Parser {
        bytes: text.trim().as_bytes(),
        pos: 0,
    };

    let year = p.digits(4).ok_or_else(invalid)? as i64;
    let mut month = 1;
    let mut day = 1;
    let mut micros = 0i64;

    if p.eat(b'-') {
        month = p.digits(2).ok_or_else(invalid)?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        if p.eat(b'-') {
            day = p.digits(2).ok_or_else(invalid)?;
            if day < 1 || day > days_in_month(year, month) {
                return Err(invalid());
            }
            if p.eat(b'T') || p.eat(b' ') {
                let hour = p.digits(2).ok_or_else(invalid)?;
                if hour > 23 {
                    return Err(invalid());
                }
                micros += hour as i64 * MICROS_PER_HOUR;
                if p.eat(b':') {
                    let minute = p.digits(2).ok_or_else(invalid)?;
                    if minute > 59 {
                        return Err(invalid());
                    }
                    micros += minute as i64 * MICROS_PER_MINUTE;
                    if p.eat(b':') {
                        let second = p.digits(2).ok_or_else(invalid)?;
                        if second > 59 {
                            return Err(invalid());
                        }
                        micros += second as i64 * MICROS_PER_SECOND;
                        if p.eat(b'.') {
                            micros += p.fraction().ok_or_else(invalid)?;
                        }
                    }
                }
            }
        }
    }

    p.eat(b'Z');
    if !p.done() {
        return Err(invalid());
    }

    Ok(days_from_civil(year, month as i64, day as i64) * MICROS_PER_DAY + micros)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn eat(&mut self, b: u8) -> bool {
        if self.bytes.get(self.pos) == Some(&b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn digits(&mut self, n: usize) -> Option<u32> {
        let chunk = self.bytes.get(self.pos..self.pos + n)?;
        let mut v = 0u32;
        for &c in chunk {
            if !c.is_ascii_digit() {
                return None;
            }
            v = v * 10 + (c - b'0') as u32;
        }
        self.pos += n;
        Some(v)
    }

    /// One to six fractional digits, scaled to microseconds.
    fn fraction(&mut self) -> Option<i64> {
        let start = self.pos;
        let mut v = 0i64;
        while let Some(&c) = self.bytes.get(self.pos) {
            if !c.is_ascii_digit() || self.pos - start == 6 {
                break;
            }
            v = v * 10 + (c - b'0') as i64;
            self.pos += 1;
        }
        let len = self.pos - start;
        if len == 0 {
            return None;
        }
        Some(v * 10i64.pow((6 - len) as u32))
    }

    fn done(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_and_partials() {
        assert_eq!(parse_floor_partial("1970").unwrap(), 0);
        assert_eq!(parse_floor_partial("1970-01-02").unwrap(), MICROS_PER_DAY);
        assert_eq!(
            parse_floor_partial("1970-01-01T01").unwrap(),
            MICROS_PER_HOUR
        );
        assert_eq!(
            parse_floor_partial("1970-01-01 00:01:02.5").unwrap(),
            MICROS_PER_MINUTE + 2 * MICROS_PER_SECOND + 500_000
        );
    }

    #[test]
    fn known_instant() {
        // 2022-03-04T05:06:07.000008Z
        assert_eq!(
            parse_floor_partial("2022-03-04T05:06:07.000008Z").unwrap(),
            1_646_370_367_000_008
        );
    }

    #[test]
    fn leap_day() {
        assert!(parse_floor_partial("2024-02-29").is_ok());
        assert!(parse_floor_partial("2023-02-29").is_err());
    }

    #[test]
    fn malformed_text_is_invalid_input() {
        for bad in ["", "20x4", "2024-13", "2024-01-01T24", "2024-01-01T10:61", "2024-01-01T", "2024-01-01.5", "2024-01-01T10:00:00.1234567"] {
            match parse_floor_partial(bad) {
                Err(Error::InvalidInput(msg)) => assert!(msg.starts_with("Invalid timestamp")),
                other => panic!("expected invalid input for {bad:?}, got {other:?}"),
            }
        }
    }
}
