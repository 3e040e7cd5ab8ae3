// Utility helpers for lenient number parsing and display formatting.
//
// Upstream records arrive with amounts as numbers, plain strings or
// already-formatted strings ("₹1,000.50"), and timestamps in a handful of
// ISO-8601 shapes. Everything that has to cope with that lives here so the
// assembler and renderers can work with clean values.
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.\-]+").expect("static regex"));

/// Parse a possibly formatted amount into `f64`.
///
/// - Strips anything that is not a digit, `.` or `-` (currency symbols,
///   thousands separators, spaces).
/// - Returns `None` when nothing parseable is left, so callers can decide
///   whether to keep the original text or count it as zero.
pub fn parse_amount(s: &str) -> Option<f64> {
    let cleaned = NON_NUMERIC.replace_all(s.trim(), "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Plain fixed-point rendering, no separators: `1000.5` -> `"1000.50"`.
pub fn format_fixed(n: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, n)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // Beyond u128 there is nothing sensible to group; print it plainly.
    let Ok(int_val) = int_part.parse::<u128>() else {
        return format_fixed(n, decimals);
    };
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in console messages (e.g., `1,204 entries loaded`).
    n.to_formatted_string(&Locale::en)
}

/// Parse the timestamp shapes the backend emits, as wall-clock time in
/// `tz`.
///
/// Offset-carrying values are converted into `tz`. Bare dates are UTC
/// midnight, as the dashboard's browser reads them; date-times without an
/// offset are already local.
pub fn parse_timestamp_in<Tz: TimeZone>(s: &str, tz: &Tz) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(tz).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    let midnight = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?;
    Some(tz.from_utc_datetime(&midnight).naive_local())
}

/// [`parse_timestamp_in`] for the machine's local timezone.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    parse_timestamp_in(s, &Local)
}

/// Short Indian-English date (`20/12/2023`, `5/3/2024`) in `tz`.
///
/// Unparseable input comes back unchanged.
pub fn locale_date_in<Tz: TimeZone>(s: &str, tz: &Tz) -> String {
    match parse_timestamp_in(s, tz) {
        Some(dt) => dt.format("%-d/%-m/%Y").to_string(),
        None => s.to_string(),
    }
}

pub fn locale_date(s: &str) -> String {
    locale_date_in(s, &Local)
}

/// Long US-English date, e.g. `Wednesday, December 20, 2023`.
pub fn long_date(dt: &NaiveDateTime) -> String {
    dt.format("%A, %B %-d, %Y").to_string()
}

/// Two-digit 12-hour clock, e.g. `09:15 AM`.
pub fn clock_time(dt: &NaiveDateTime) -> String {
    dt.format("%I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn parse_amount_strips_currency_and_separators() {
        assert_eq!(parse_amount("₹1,000.50"), Some(1000.5));
        assert_eq!(parse_amount(" 42 "), Some(42.0));
        assert_eq!(parse_amount("-12.25"), Some(-12.25));
    }

    #[test]
    fn parse_amount_rejects_text() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }

    #[test]
    fn fixed_formatting_is_idempotent() {
        let once = format_fixed(parse_amount("1000.5").unwrap(), 2);
        let twice = format_fixed(parse_amount(&once).unwrap(), 2);
        assert_eq!(once, "1000.50");
        assert_eq!(once, twice);
    }

    #[test]
    fn format_number_inserts_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 2), "-1,500.00");
        assert_eq!(format_number(0.0, 0), "0");
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    #[test]
    fn timestamps_in_several_shapes() {
        let a = parse_timestamp_in("2023-12-20T10:00:00.000Z", &Utc).unwrap();
        let b = parse_timestamp_in("2023-12-20T10:00:00", &Utc).unwrap();
        assert_eq!(a, b);
        let d = parse_timestamp_in("2024-03-05", &Utc).unwrap();
        assert_eq!(clock_time(&d), "12:00 AM");
        assert!(parse_timestamp("next tuesday").is_none());
    }

    #[test]
    fn locale_and_long_dates() {
        assert_eq!(locale_date_in("2024-03-05T09:15:00Z", &Utc), "5/3/2024");
        assert_eq!(locale_date("not a date"), "not a date");
        let dt = parse_timestamp_in("2023-12-20T09:15:00Z", &Utc).unwrap();
        assert_eq!(long_date(&dt), "Wednesday, December 20, 2023");
        assert_eq!(clock_time(&dt), "09:15 AM");
    }

    #[test]
    fn offsets_shift_to_the_local_day_and_time() {
        assert_eq!(locale_date_in("2023-12-20T20:00:00Z", &ist()), "21/12/2023");
        let dt = parse_timestamp_in("2023-12-20T04:00:00Z", &ist()).unwrap();
        assert_eq!(clock_time(&dt), "09:30 AM");
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(locale_date_in("2024-03-05", &west), "4/3/2024");
        assert_eq!(locale_date_in("2024-03-05T23:30:00", &ist()), "5/3/2024");
    }

    #[test]
    fn huge_amounts_keep_their_digits() {
        assert_eq!(format_number(1e19, 2), "10,000,000,000,000,000,000.00");
        assert_eq!(format_number(-9.3e18, 0), "-9,300,000,000,000,000,000");
        assert_eq!(format_number(1e300, 0), format_fixed(1e300, 0));
    }
}
