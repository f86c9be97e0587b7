//! Datetime ↔ integer tick conversion.

use chrono::{DateTime, NaiveDateTime};

use crate::table::parse_datetime;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Nanoseconds since the Unix epoch, if representable.
pub(crate) fn to_ticks(dt: &NaiveDateTime) -> Option<i64> {
    dt.and_utc().timestamp_nanos_opt()
}

/// Inverse of [`to_ticks`].
pub(crate) fn from_ticks(ticks: i64) -> Option<NaiveDateTime> {
    let secs = ticks.div_euclid(NANOS_PER_SECOND);
    let nanos = ticks.rem_euclid(NANOS_PER_SECOND) as u32;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

/// Greatest common divisor of the absolute tick values; 1 when there are
/// no non-zero ticks.
pub(crate) fn common_divisor(ticks: &[i64]) -> i64 {
    let divisor = ticks
        .iter()
        .fold(0u64, |acc, &t| gcd(acc, t.unsigned_abs()));
    match i64::try_from(divisor) {
        Ok(0) | Err(_) => 1,
        Ok(d) => d,
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Rebuild a datetime from an encoded value, truncated to what `format` can express.
pub(crate) fn decode_ticks(value: f64, divisor: i64, format: &str) -> Option<NaiveDateTime> {
    if !value.is_finite() {
        return None;
    }
    let units = value.round();
    if units.abs() >= i64::MAX as f64 {
        return None;
    }
    let ticks = (units as i64).checked_mul(divisor)?;
    let dt = from_ticks(ticks)?;
    parse_datetime(&dt.format(format).to_string(), format).or(Some(dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_for_daily_dates() {
        let days: Vec<i64> = ["2021-01-01", "2021-01-03", "2021-02-01"]
            .iter()
            .map(|s| to_ticks(&parse_datetime(s, "%Y-%m-%d").unwrap()).unwrap())
            .collect();
        assert_eq!(common_divisor(&days), 86_400 * NANOS_PER_SECOND);
    }

    #[test]
    fn test_divisor_edge_cases() {
        assert_eq!(common_divisor(&[]), 1);
        assert_eq!(common_divisor(&[0, 0]), 1);
        assert_eq!(common_divisor(&[-6, 4]), 2);
    }

    #[test]
    fn test_decode_truncates_to_format() {
        let dt = parse_datetime("2020-05-06 13:14:15", "%Y-%m-%d %H:%M:%S").unwrap();
        let ticks = to_ticks(&dt).unwrap();
        let decoded = decode_ticks(ticks as f64 / 1e9, NANOS_PER_SECOND, "%Y-%m-%d").unwrap();
        assert_eq!(decoded, parse_datetime("2020-05-06", "%Y-%m-%d").unwrap());
    }

    #[test]
    fn test_pre_epoch_round_trip() {
        let dt = parse_datetime("1955-11-05 06:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(from_ticks(to_ticks(&dt).unwrap()), Some(dt));
        assert_eq!(decode_ticks(f64::NAN, 1, "%Y"), None);
    }
}
