/*
 * Utility functions and helpers
 */

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Formats a timestamp the way every stored document expects: RFC 3339, UTC, seconds, `Z`.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[must_use]
pub fn utc_now_iso() -> String {
    format_timestamp(Utc::now())
}

/// Parses a stored timestamp. Offsets and a trailing `Z` are honoured;
/// timestamps without a zone are taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// A timestamp is fresh when it is no older than `ttl` at `now`.
/// Unparseable timestamps are never fresh.
#[must_use]
pub fn is_fresh(updated_at: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
    let Some(updated_at) = parse_timestamp(updated_at) else {
        return false;
    };
    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
        return false;
    };
    now.signed_duration_since(updated_at) <= ttl
}

/// Fixed-point formatting with `,` between thousands, e.g. `29,668.61`.
#[must_use]
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3 + 1);
    if value.is_sign_negative() && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.push('-');
    }
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(frac_part) = frac_part {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn formats_with_z_suffix() {
        assert_eq!(format_timestamp(now()), "2025-03-01T12:00:00Z");
    }

    #[test]
    fn parses_zulu_offset_and_naive_forms() {
        assert_eq!(parse_timestamp("2025-03-01T12:00:00Z"), Some(now()));
        assert_eq!(parse_timestamp("2025-03-01T15:00:00+03:00"), Some(now()));
        assert_eq!(parse_timestamp("2025-03-01T12:00:00.000000"), Some(now()));
        assert_eq!(parse_timestamp("2025-03-01T12:00:00"), Some(now()));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(29668.6071, 2), "29,668.61");
        assert_eq!(group_thousands(1234567.0, 0), "1,234,567");
        assert_eq!(group_thousands(999.5, 2), "999.50");
        assert_eq!(group_thousands(-1000.0, 2), "-1,000.00");
        assert_eq!(group_thousands(-0.0001, 2), "0.00");
    }

    #[test]
    fn freshness_respects_ttl_boundary() {
        let ttl = Duration::from_secs(300);

        assert!(is_fresh("2025-03-01T11:55:00Z", now(), ttl));
        assert!(!is_fresh("2025-03-01T11:53:20Z", now(), ttl));
        assert!(!is_fresh("not a timestamp", now(), ttl));
    }
}
