//! Human-readable message timestamps.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};

/// Short form used next to each chat line, e.g. `Tue 09:05`.
pub fn format_display_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    date.format("%a %H:%M").to_string()
}

/// Long form used in tooltips, e.g. `March 5, 2024 09:05:03`.
pub fn full_format_display_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    date.format("%B %-d, %Y %H:%M:%S").to_string()
}

/// Parse an RFC 3339 string and render it with [`format_display_time`] in
/// the local timezone.
pub fn format_display_time_str(date: &str) -> Result<String, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(date)?;
    Ok(format_display_time(&parsed.with_timezone(&Local)))
}

/// Parse an RFC 3339 string and render it with [`full_format_display_time`]
/// in the local timezone.
pub fn full_format_display_time_str(date: &str) -> Result<String, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(date)?;
    Ok(full_format_display_time(&parsed.with_timezone(&Local)))
}
