//! Lenient date and datetime parsing.
//!
//! User answers arrive in whatever shape people type: ISO dates, slashed
//! variants, month names, or relative phrases like "next monday". The
//! parser tries a fixed format list (month-first for slashed forms) plus a
//! small relative-keyword vocabulary, and normalizes successful parses to
//! `YYYY-MM-DD` / `YYYY-MM-DDTHH:MM:SS`.
//!
//! Every function takes the reference date explicitly so relative phrases
//! stay deterministic under test.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Date-only formats, tried in order. chrono accepts unpadded month/day
/// numbers, so `2026-1-5` parses under `%Y-%m-%d`.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
];

/// Explicit datetime formats, tried before any date/time splitting.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%B %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%B %d %Y %H:%M",
    "%B %d %Y %I:%M %p",
];

/// Time-of-day formats for the time half of a split input.
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M%p", "%I %p"];

/// Parse a date string leniently. Returns `None` when nothing matches.
pub fn parse_lenient_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = clean(input);
    if cleaned.is_empty() {
        return None;
    }

    if let Some((date, rest)) = parse_relative(&cleaned, today) {
        return rest.is_empty().then_some(date);
    }

    // Anything non-relative must carry at least one digit; pure words like
    // "asdf" are never dates.
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

/// Parse a datetime string leniently. Date-only input resolves to
/// midnight; time-only input resolves to `today` at that time.
pub fn parse_lenient_datetime(input: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    let cleaned = clean(input);
    if cleaned.is_empty() {
        return None;
    }

    if let Some((date, rest)) = parse_relative(&cleaned, today) {
        if rest.is_empty() {
            return date.and_hms_opt(0, 0, 0);
        }
        return parse_time(rest).map(|t| date.and_time(t));
    }

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt);
        }
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
    {
        return date.and_hms_opt(0, 0, 0);
    }

    parse_time(&cleaned).map(|t| today.and_time(t))
}

/// Normalize a lenient date to the stored `YYYY-MM-DD` form.
pub fn normalize_date(input: &str, today: NaiveDate) -> Option<String> {
    parse_lenient_date(input, today).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Normalize a lenient datetime to the stored `YYYY-MM-DDTHH:MM:SS` form.
pub fn normalize_datetime(input: &str, today: NaiveDate) -> Option<String> {
    parse_lenient_datetime(input, today).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Collapse whitespace and strip ordinal suffixes ("January 5th 2026").
fn clean(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_ordinals(&collapsed)
}

/// Remove `st`/`nd`/`rd`/`th` immediately following a digit run.
fn strip_ordinals(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        out.push(chars[i]);
        if chars[i].is_ascii_digit() {
            let rest: String = chars[i + 1..].iter().take(2).collect::<String>().to_lowercase();
            if matches!(rest.as_str(), "st" | "nd" | "rd" | "th") {
                let after = chars.get(i + 3);
                if after.is_none() || !after.unwrap().is_alphanumeric() {
                    i += 2;
                }
            }
        }
        i += 1;
    }
    out
}

/// Try relative-date keywords at the start of the input. Returns the
/// resolved date plus the unconsumed remainder (a possible time-of-day).
fn parse_relative<'a>(input: &'a str, today: NaiveDate) -> Option<(NaiveDate, &'a str)> {
    let lower = input.to_lowercase();

    for (keyword, offset) in [("today", 0i64), ("tomorrow", 1), ("yesterday", -1)] {
        if let Some(rest) = strip_keyword(&lower, input, keyword) {
            let date = today + chrono::Duration::days(offset);
            return Some((date, rest));
        }
    }

    if let Some(after_next) = lower.strip_prefix("next ") {
        let (weekday, consumed) = parse_weekday(after_next)?;
        // "next monday" is the first monday strictly after today
        let mut days_ahead =
            (weekday.num_days_from_monday() as i64) - (today.weekday().num_days_from_monday() as i64);
        if days_ahead <= 0 {
            days_ahead += 7;
        }
        let date = today + chrono::Duration::days(days_ahead);
        let rest = input["next ".len() + consumed..].trim_start();
        return Some((date, rest));
    }

    None
}

fn strip_keyword<'a>(lower: &str, original: &'a str, keyword: &str) -> Option<&'a str> {
    if lower == keyword {
        return Some("");
    }
    if lower.starts_with(keyword) && lower.as_bytes().get(keyword.len()) == Some(&b' ') {
        return Some(original[keyword.len()..].trim_start());
    }
    None
}

fn parse_weekday(input: &str) -> Option<(Weekday, usize)> {
    let word: String = input.chars().take_while(|c| c.is_alphabetic()).collect();
    let weekday = match word.as_str() {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some((weekday, word.len()))
}

fn parse_time(input: &str) -> Option<NaiveTime> {
    let trimmed = input.trim();
    if trimmed.chars().next().is_some_and(|c| c == ',') {
        return parse_time(trimmed.trim_start_matches(',').trim_start());
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        // A Thursday.
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn test_iso_date() {
        assert_eq!(normalize_date("2026-03-01", today()), Some("2026-03-01".to_string()));
    }

    #[test]
    fn test_unpadded_iso_date() {
        assert_eq!(normalize_date("2026-1-5", today()), Some("2026-01-05".to_string()));
    }

    #[test]
    fn test_month_name_forms() {
        assert_eq!(
            normalize_date("January 5, 2026", today()),
            Some("2026-01-05".to_string())
        );
        assert_eq!(
            normalize_date("january 5 2026", today()),
            Some("2026-01-05".to_string())
        );
        assert_eq!(normalize_date("5 Jan 2026", today()), Some("2026-01-05".to_string()));
    }

    #[test]
    fn test_ordinal_suffix_stripped() {
        assert_eq!(
            normalize_date("January 5th, 2026", today()),
            Some("2026-01-05".to_string())
        );
    }

    #[test]
    fn test_slashed_month_first() {
        assert_eq!(normalize_date("3/1/2026", today()), Some("2026-03-01".to_string()));
    }

    #[test]
    fn test_rejects_gibberish() {
        assert_eq!(parse_lenient_date("asdf", today()), None);
        assert_eq!(parse_lenient_date("sdasdsdad", today()), None);
        assert_eq!(parse_lenient_date("", today()), None);
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert_eq!(parse_lenient_date("0000-13-40", today()), None);
        assert_eq!(parse_lenient_date("2026-02-30", today()), None);
    }

    #[test]
    fn test_leap_year() {
        assert!(parse_lenient_date("2024-02-29", today()).is_some());
        assert_eq!(parse_lenient_date("2026-02-29", today()), None);
    }

    #[test]
    fn test_relative_keywords() {
        assert_eq!(
            normalize_date("today", today()),
            Some("2026-01-15".to_string())
        );
        assert_eq!(
            normalize_date("tomorrow", today()),
            Some("2026-01-16".to_string())
        );
        assert_eq!(
            normalize_date("yesterday", today()),
            Some("2026-01-14".to_string())
        );
    }

    #[test]
    fn test_next_weekday() {
        // 2026-01-15 is a Thursday; next Monday is the 19th.
        assert_eq!(
            normalize_date("next Monday", today()),
            Some("2026-01-19".to_string())
        );
        // "next thursday" skips today to the following week
        assert_eq!(
            normalize_date("next thursday", today()),
            Some("2026-01-22".to_string())
        );
    }

    #[test]
    fn test_datetime_iso() {
        assert_eq!(
            normalize_datetime("2026-03-01T10:30:00", today()),
            Some("2026-03-01T10:30:00".to_string())
        );
        assert_eq!(
            normalize_datetime("2026-03-01 10:30", today()),
            Some("2026-03-01T10:30:00".to_string())
        );
    }

    #[test]
    fn test_datetime_from_date_only_is_midnight() {
        assert_eq!(
            normalize_datetime("2026-03-01", today()),
            Some("2026-03-01T00:00:00".to_string())
        );
    }

    #[test]
    fn test_datetime_twelve_hour_clock() {
        assert_eq!(
            normalize_datetime("2026-01-15 10:30 PM", today()),
            Some("2026-01-15T22:30:00".to_string())
        );
    }

    #[test]
    fn test_datetime_relative_with_time() {
        assert_eq!(
            normalize_datetime("tomorrow 10:30", today()),
            Some("2026-01-16T10:30:00".to_string())
        );
    }

    #[test]
    fn test_datetime_time_only_uses_reference_day() {
        assert_eq!(
            normalize_datetime("10:30", today()),
            Some("2026-01-15T10:30:00".to_string())
        );
    }
}
