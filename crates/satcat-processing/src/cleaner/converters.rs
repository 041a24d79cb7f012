//! Date conversion functions for data cleaning.
//!
//! GCAT writes dates as `1957 Oct  4 1928:34`, optionally truncated to the
//! month or year and sometimes suffixed with `?` for an uncertain value.
//! CelesTrak uses ISO dates. GCAT launch tables also carry Julian day
//! numbers.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::table::Cell;
use crate::utils::collapse_whitespace;

/// Julian day number of 1970-01-01T00:00:00.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y %b %d %H%M:%S",
    "%Y %b %d %H%M",
    "%Y %b %d %H:%M:%S",
    "%Y %b %d %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y %b %d", "%m/%d/%Y", "%Y/%m/%d"];

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Convert a Julian day number to a calendar date-time.
pub(crate) fn julian_to_datetime(jd: f64) -> Option<NaiveDateTime> {
    if !jd.is_finite() {
        return None;
    }
    let millis = ((jd - UNIX_EPOCH_JD) * MILLIS_PER_DAY).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    let delta = TimeDelta::try_milliseconds(millis as i64)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    midnight(epoch).checked_add_signed(delta)
}

/// Parse a date written in any of the catalog formats.
///
/// Returns `None` for anything unrecognized.
pub(crate) fn parse_flexible_date(raw: &str) -> Option<NaiveDateTime> {
    let collapsed = collapse_whitespace(raw);
    let value = collapsed.trim_end_matches('?').trim_end();
    if value.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return Some(midnight(parsed));
        }
    }

    // Truncated GCAT dates: "1957 Oct" and "1957".
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [year, month] => {
            NaiveDate::parse_from_str(&format!("{year} {month} 1"), "%Y %b %d")
                .ok()
                .map(midnight)
        }
        [year] if year.len() == 4 => year
            .parse::<i32>()
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
            .map(midnight),
        _ => None,
    }
}

/// Convert a cell of a Julian-day column.
pub(crate) fn julian_cell(cell: &Cell) -> Cell {
    let jd = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => crate::utils::parse_numeric_string(s),
        Cell::Date(d) => return Cell::Date(*d),
        Cell::Missing => None,
    };
    jd.and_then(julian_to_datetime)
        .map(Cell::Date)
        .unwrap_or_default()
}

/// Convert a cell of a calendar date column.
pub(crate) fn date_cell(cell: &Cell) -> Cell {
    match cell {
        Cell::Date(d) => Cell::Date(*d),
        Cell::Text(s) => parse_flexible_date(s).map(Cell::Date).unwrap_or_default(),
        // A bare year loads as a number.
        Cell::Number(n) if n.fract() == 0.0 && (1000.0..=9999.0).contains(n) => {
            NaiveDate::from_ymd_opt(*n as i32, 1, 1)
                .map(|d| Cell::Date(midnight(d)))
                .unwrap_or_default()
        }
        Cell::Number(_) | Cell::Missing => Cell::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_julian_epoch() {
        assert_eq!(julian_to_datetime(UNIX_EPOCH_JD), Some(dt(1970, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_julian_sputnik_launch() {
        // 1957 Oct 4 19:28:34 UTC
        let parsed = julian_to_datetime(2_436_116.311_504_6).unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(1957, 10, 4).unwrap());
        assert_eq!(parsed.format("%H:%M").to_string(), "19:28");
    }

    #[test]
    fn test_julian_rejects_non_finite() {
        assert_eq!(julian_to_datetime(f64::NAN), None);
    }

    #[test]
    fn test_parse_gcat_formats() {
        assert_eq!(
            parse_flexible_date("1957 Oct  4 1928:34"),
            Some(dt(1957, 10, 4, 19, 28, 34))
        );
        assert_eq!(
            parse_flexible_date("1958 Feb  1 0347?"),
            Some(dt(1958, 2, 1, 3, 47, 0))
        );
        assert_eq!(parse_flexible_date("1957 Oct  4"), Some(dt(1957, 10, 4, 0, 0, 0)));
        assert_eq!(parse_flexible_date("1960 Aug"), Some(dt(1960, 8, 1, 0, 0, 0)));
        assert_eq!(parse_flexible_date("1961"), Some(dt(1961, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_parse_iso_and_us_formats() {
        assert_eq!(parse_flexible_date("1998-11-20"), Some(dt(1998, 11, 20, 0, 0, 0)));
        assert_eq!(
            parse_flexible_date("2020-01-07T02:19:21"),
            Some(dt(2020, 1, 7, 2, 19, 21))
        );
        assert_eq!(parse_flexible_date("11/20/1998"), Some(dt(1998, 11, 20, 0, 0, 0)));
    }

    #[test]
    fn test_parse_garbage_is_none() {
        for raw in ["", "?", "Unknown", "1957 Foo 4", "2020-13-01", "soon"] {
            assert_eq!(parse_flexible_date(raw), None, "{raw}");
        }
    }

    #[test]
    fn test_date_cell_handles_numbers() {
        assert_eq!(date_cell(&Cell::Number(1963.0)), Cell::Date(dt(1963, 1, 1, 0, 0, 0)));
        assert_eq!(date_cell(&Cell::Number(12.5)), Cell::Missing);
        assert_eq!(date_cell(&Cell::text("n/a")), Cell::Missing);
    }

    #[test]
    fn test_julian_cell_accepts_text() {
        assert_eq!(
            julian_cell(&Cell::text("2440588.5")),
            Cell::Date(dt(1970, 1, 2, 0, 0, 0))
        );
        assert_eq!(julian_cell(&Cell::text("soon")), Cell::Missing);
    }
}
