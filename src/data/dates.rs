//! Launch-date resolution for time-ranged upstream queries
//!
//! Asset launch dates are recorded as free text in one of three shapes:
//!
//! - an exact date, `"March 21, 2025"`
//! - a month and year, `"December 2024"`
//! - a vague year, `"Early 2025"`
//!
//! Each resolves to midnight UTC of the date it names (the 1st of the month,
//! or January 1st for vague years). Anything unparseable, and any date that
//! lies in the future, resolves to one year before the request time so the
//! upstream range query always covers available history.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in one UTC day
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Look-back used when a launch date cannot be resolved or lies in the future
const FALLBACK_LOOKBACK_DAYS: i64 = 365;

/// Day counts supported by the upstream `days` parameter
const DAY_BUCKETS: [i64; 7] = [1, 7, 14, 30, 90, 180, 365];

/// Bucket used when the launch date is not in the past
const DEFAULT_DAY_BUCKET: i64 = 30;

/// Formats accepted for exact dates
const EXACT_DATE_FORMATS: [&str; 4] = ["%B %d, %Y", "%B %d %Y", "%d %B %Y", "%Y-%m-%d"];

/// Inclusive epoch-second range for an upstream time-series query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Start of the range, never after the request time
    pub from: i64,
    /// End of the range, the request time in whole seconds
    pub to: i64,
}

impl DateRange {
    /// Resolves `launch_date` into a range ending at `now`
    pub fn resolve(launch_date: &str, now: DateTime<Utc>) -> Self {
        Self {
            from: resolve_launch_epoch(launch_date, now),
            to: now.timestamp(),
        }
    }

    /// Number of days covered, counting a partial day as a whole one
    pub fn days(&self) -> i64 {
        ceil_days(self.to - self.from)
    }
}

/// Resolves free-text `launch_date` to epoch seconds at midnight UTC
///
/// The result is never later than `now`.
pub fn resolve_launch_epoch(launch_date: &str, now: DateTime<Utc>) -> i64 {
    let resolved = parse_launch_date(launch_date)
        .map(midnight_utc)
        .unwrap_or_else(|| fallback_epoch(now));

    if resolved > now.timestamp() {
        tracing::debug!(launch_date, "launch date is in the future, using one-year look-back");
        return fallback_epoch(now);
    }
    resolved
}

/// Snaps the days elapsed since `epoch` to the nearest supported bucket at or above it
///
/// Returns 30 when `epoch` is not in the past and caps at 365.
pub fn bucketed_days(epoch: i64, now: DateTime<Utc>) -> i64 {
    let days = ceil_days(now.timestamp() - epoch);
    if days <= 0 {
        return DEFAULT_DAY_BUCKET;
    }

    DAY_BUCKETS
        .iter()
        .copied()
        .find(|&bucket| days <= bucket)
        .unwrap_or(FALLBACK_LOOKBACK_DAYS)
}

/// Start of the UTC day containing `epoch`
pub fn day_start(epoch: i64) -> i64 {
    epoch.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY
}

/// One year before `now`, in epoch seconds
pub fn fallback_epoch(now: DateTime<Utc>) -> i64 {
    (now - Duration::days(FALLBACK_LOOKBACK_DAYS)).timestamp()
}

fn parse_launch_date(launch_date: &str) -> Option<NaiveDate> {
    let trimmed = launch_date.trim();
    let normalized = trimmed.to_lowercase();

    if normalized.contains("early") {
        let year = first_four_digit_run(trimmed)?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    if is_month_and_year(&normalized) {
        // Pin the day so chrono has a complete date to parse
        return NaiveDate::parse_from_str(&format!("{} 1", trimmed), "%B %Y %d").ok();
    }

    EXACT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Matches `<letters> <four digits>`, e.g. `"december 2024"`
fn is_month_and_year(normalized: &str) -> bool {
    let mut parts = normalized.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(month), Some(year), None) => {
            month.chars().all(|c| c.is_ascii_alphabetic())
                && year.len() == 4
                && year.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn first_four_digit_run(text: &str) -> Option<i32> {
    text.as_bytes()
        .windows(4)
        .find(|window| window.iter().all(u8::is_ascii_digit))
        .and_then(|window| std::str::from_utf8(window).ok())
        .and_then(|digits| digits.parse().ok())
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn ceil_days(seconds: i64) -> i64 {
    seconds.div_euclid(SECONDS_PER_DAY) + i64::from(seconds.rem_euclid(SECONDS_PER_DAY) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const JAN_1_2025: i64 = 1_735_689_600;
    const DEC_1_2024: i64 = 1_733_011_200;
    const MAR_21_2025: i64 = 1_742_515_200;

    /// 2026-10-19T12:00:00Z
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_vague_year_resolves_to_january_first() {
        assert_eq!(resolve_launch_epoch("Early 2025", now()), JAN_1_2025);
        assert_eq!(resolve_launch_epoch("early 2025", now()), JAN_1_2025);
        assert_eq!(resolve_launch_epoch("  EARLY 2025 ", now()), JAN_1_2025);
    }

    #[test]
    fn test_vague_year_without_year_falls_back() {
        assert_eq!(resolve_launch_epoch("Early", now()), fallback_epoch(now()));
        assert_eq!(resolve_launch_epoch("early next year", now()), fallback_epoch(now()));
    }

    #[test]
    fn test_month_and_year_resolves_to_first_of_month() {
        assert_eq!(resolve_launch_epoch("December 2024", now()), DEC_1_2024);
        assert_eq!(resolve_launch_epoch("december 2024", now()), DEC_1_2024);
        assert_eq!(resolve_launch_epoch("Dec 2024", now()), DEC_1_2024);
    }

    #[test]
    fn test_unknown_month_name_falls_back() {
        assert_eq!(resolve_launch_epoch("Mid 2025", now()), fallback_epoch(now()));
        assert_eq!(resolve_launch_epoch("Smarch 2025", now()), fallback_epoch(now()));
    }

    #[test]
    fn test_exact_date_resolves_to_midnight_utc() {
        assert_eq!(resolve_launch_epoch("March 21, 2025", now()), MAR_21_2025);
        assert_eq!(resolve_launch_epoch("March 21 2025", now()), MAR_21_2025);
        assert_eq!(resolve_launch_epoch("2025-03-21", now()), MAR_21_2025);
        assert_eq!(resolve_launch_epoch("21 March 2025", now()), MAR_21_2025);
    }

    #[test]
    fn test_exact_date_with_single_digit_day() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap().timestamp();
        assert_eq!(resolve_launch_epoch("June 3, 2025", now()), expected);
    }

    #[test]
    fn test_unparseable_text_falls_back_to_one_year_ago() {
        let expected = now().timestamp() - 365 * SECONDS_PER_DAY;
        assert_eq!(resolve_launch_epoch("TBD", now()), expected);
        assert_eq!(resolve_launch_epoch("", now()), expected);
        assert_eq!(resolve_launch_epoch("February 30, 2025", now()), expected);
    }

    #[test]
    fn test_future_dates_are_replaced_with_one_year_ago() {
        let expected = fallback_epoch(now());
        assert_eq!(resolve_launch_epoch("November 28, 2027", now()), expected);
        assert_eq!(resolve_launch_epoch("December 2026", now()), expected);
        assert_eq!(resolve_launch_epoch("Early 2027", now()), expected);
    }

    #[test]
    fn test_launch_today_is_not_in_the_future() {
        let today_midnight = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap().timestamp();
        assert_eq!(resolve_launch_epoch("October 19, 2026", now()), today_midnight);
    }

    #[test]
    fn test_range_ends_at_request_time() {
        let range = DateRange::resolve("March 21, 2025", now());
        assert_eq!(range.from, MAR_21_2025);
        assert_eq!(range.to, now().timestamp());
        assert!(range.to >= range.from);
    }

    #[test]
    fn test_range_for_future_date_is_still_ordered() {
        let range = DateRange::resolve("January 1, 2099", now());
        assert!(range.from <= range.to);
        assert_eq!(range.days(), 365);
    }

    #[test]
    fn test_range_days_rounds_partial_days_up() {
        let range = DateRange {
            from: 0,
            to: SECONDS_PER_DAY + 1,
        };
        assert_eq!(range.days(), 2);
        assert_eq!(DateRange { from: 10, to: 10 }.days(), 0);
    }

    #[test]
    fn test_bucketed_days_snaps_up() {
        let now = now();
        let ts = now.timestamp();
        assert_eq!(bucketed_days(ts - 3600, now), 1);
        assert_eq!(bucketed_days(ts - 3 * SECONDS_PER_DAY, now), 7);
        assert_eq!(bucketed_days(ts - 10 * SECONDS_PER_DAY, now), 14);
        assert_eq!(bucketed_days(ts - 30 * SECONDS_PER_DAY, now), 30);
        assert_eq!(bucketed_days(ts - 60 * SECONDS_PER_DAY, now), 90);
        assert_eq!(bucketed_days(ts - 100 * SECONDS_PER_DAY, now), 180);
        assert_eq!(bucketed_days(ts - 200 * SECONDS_PER_DAY, now), 365);
    }

    #[test]
    fn test_bucketed_days_caps_at_one_year() {
        assert_eq!(bucketed_days(JAN_1_2025, now()), 365);
    }

    #[test]
    fn test_bucketed_days_defaults_when_not_in_past() {
        let now = now();
        assert_eq!(bucketed_days(now.timestamp(), now), 30);
        assert_eq!(bucketed_days(now.timestamp() + 5_000, now), 30);
    }

    #[test]
    fn test_day_start_rounds_down_to_midnight() {
        let midnight = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap().timestamp();
        assert_eq!(day_start(now().timestamp()), midnight);
        assert_eq!(day_start(midnight), midnight);
    }
}
