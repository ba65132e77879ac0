//! Datetime parsing and local-day arithmetic.

use chrono::{
    DateTime, Days, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};

use crate::error::{CalError, CalResult};

/// Local-time layouts tried after RFC 3339, in order.
const LOCAL_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

const DATE_LAYOUT: &str = "%Y-%m-%d";

/// Parse a user-supplied datetime string.
///
/// Accepted layouts, tried in order: RFC 3339 (its offset is honored),
/// `YYYY-MM-DDTHH:MM`, `YYYY-MM-DD HH:MM`, and bare `YYYY-MM-DD`, where
/// the last three are interpreted in the machine's local timezone and a
/// bare date means local midnight.
pub fn parse_datetime(raw: &str) -> CalResult<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CalError::EmptyDateTime);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for layout in LOCAL_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            if let Some(resolved) = local_to_utc(naive) {
                return Ok(resolved);
            }
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_LAYOUT) {
        if let Some(resolved) = date.and_hms_opt(0, 0, 0).and_then(local_to_utc) {
            return Ok(resolved);
        }
    }

    Err(CalError::UnsupportedDateTime(raw.to_string()))
}

/// Resolve a wall-clock time in a timezone to a UTC instant.
///
/// An ambiguous time (the repeated hour when clocks fall back) takes
/// the earlier instant. A time inside a spring-forward gap does not
/// exist on that day; it resolves one hour later, past the transition.
pub(crate) fn resolve_in_zone<Z: TimeZone>(tz: &Z, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(resolved) => Some(resolved.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|resolved| resolved.with_timezone(&Utc)),
    }
}

/// [`resolve_in_zone`] against the machine's local timezone.
pub(crate) fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    resolve_in_zone(&Local, naive)
}

/// Midnight of the instant's local calendar day. On days where
/// midnight falls inside a DST gap the result shifts past the
/// transition.
pub fn local_midnight(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_timezone(&Local)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(local_to_utc)
        .unwrap_or(instant)
}

/// Midnight of the local calendar day after the instant's.
pub fn next_local_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    (instant.with_timezone(&Local).date_naive() + Days::new(1))
        .and_hms_opt(0, 0, 0)
        .and_then(local_to_utc)
        .unwrap_or(instant + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Tz;

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_datetime("2024-03-20T15:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 20, 13, 0, 0).unwrap());
    }

    #[test]
    fn parses_rfc3339_utc() {
        let parsed = parse_datetime("2024-03-20T15:00:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 20, 15, 0, 0).unwrap());
    }

    #[test]
    fn parses_local_datetime_with_t_separator() {
        let parsed = parse_datetime("2024-01-02T15:04").unwrap();
        let local = parsed.with_timezone(&Local);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!((local.hour(), local.minute()), (15, 4));
    }

    #[test]
    fn parses_local_datetime_with_space_separator() {
        let parsed = parse_datetime("2024-01-02 15:04").unwrap();
        let local = parsed.with_timezone(&Local);
        assert_eq!((local.hour(), local.minute()), (15, 4));
    }

    #[test]
    fn bare_date_means_local_midnight() {
        let parsed = parse_datetime("2024-05-01").unwrap();
        let local = parsed.with_timezone(&Local);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!((local.hour(), local.minute(), local.second()), (0, 0, 0));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(parse_datetime("  2024-05-01  ").is_ok());
    }

    #[test]
    fn empty_input_is_its_own_error() {
        assert!(matches!(parse_datetime(""), Err(CalError::EmptyDateTime)));
        assert!(matches!(parse_datetime("   "), Err(CalError::EmptyDateTime)));
    }

    #[test]
    fn unsupported_layout_echoes_the_input() {
        match parse_datetime("01/02/2024") {
            Err(CalError::UnsupportedDateTime(raw)) => assert_eq!(raw, "01/02/2024"),
            other => panic!("expected UnsupportedDateTime, got {other:?}"),
        }
    }

    #[test]
    fn gap_times_resolve_past_the_transition() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // Clocks jumped from 02:00 to 03:00 on 2024-03-10.
        let wall = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert_eq!(
            resolve_in_zone(&tz, wall).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap()
        );
    }

    #[test]
    fn ambiguous_times_take_the_earlier_instant() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 01:30 happened twice on 2024-11-03; the EDT reading wins.
        let wall = NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        assert_eq!(
            resolve_in_zone(&tz, wall).unwrap(),
            Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap()
        );
    }

    #[test]
    fn local_midnight_zeroes_the_local_time() {
        let start = parse_datetime("2024-06-15T17:30").unwrap();
        let midnight = local_midnight(start).with_timezone(&Local);
        assert_eq!(midnight.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!((midnight.hour(), midnight.minute()), (0, 0));
    }

    #[test]
    fn next_local_day_advances_one_calendar_day() {
        let start = parse_datetime("2024-06-15").unwrap();
        let next = next_local_day(start).with_timezone(&Local);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());
        assert_eq!((next.hour(), next.minute()), (0, 0));
    }
}
