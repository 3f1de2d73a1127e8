//! Timestamp recovery for `ls -l` style listing dates.
//!
//! Listings carry either `Mon DD HH:MM` (recent entries, year omitted) or
//! `Mon DD YYYY`. Month abbreviations show up in English or Spanish
//! depending on the server locale, so both are recognized.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone};

/// Month number for a three-letter English or Spanish abbreviation, or 0
/// when the token is not recognized. 0 never forms a valid date, so an
/// unknown month surfaces as an unknown timestamp rather than a guess.
pub fn month_number(token: &str) -> u32 {
    match token.trim().to_lowercase().as_str() {
        "jan" | "ene" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" | "abr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" | "ago" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" | "dic" => 12,
        _ => 0,
    }
}

/// Resolves the `(month, day, year-or-time)` triple of a listing line
/// against `now`.
///
/// A token containing `:` is a time of day and the year is inferred:
/// servers omit the year for entries modified within roughly the last
/// year, so the current year is assumed unless that would place the entry
/// in the future, in which case it is from last year. A token without `:`
/// is a literal year, with the time defaulting to midnight.
///
/// Returns `None` whenever the parts do not form a real date; callers
/// treat that as "modification time unknown".
pub fn resolve_timestamp(
    month_token: &str,
    day_token: &str,
    year_or_time: &str,
    now: DateTime<Local>,
) -> Option<DateTime<Local>> {
    let month = month_number(month_token);
    let day: u32 = day_token.trim().parse().unwrap_or(0);

    let (year, time) = if year_or_time.contains(':') {
        let time = NaiveTime::parse_from_str(year_or_time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(year_or_time, "%H:%M:%S"))
            .ok()?;
        let mut year = now.year();
        if let Some(candidate) = NaiveDate::from_ymd_opt(year, month, day) {
            // The comparison is date-granular: only a day strictly in the
            // future proves the entry belongs to last year.
            if candidate.and_time(NaiveTime::MIN) > now.naive_local() {
                year -= 1;
            }
        }
        (year, time)
    } else {
        let year = year_or_time.trim().parse::<i32>().ok().filter(|y| *y > 0)?;
        (year, NaiveTime::MIN)
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Local.from_local_datetime(&date.and_time(time)).earliest()
}
