//! Publication date normalization.
//!
//! Feeds are inconsistent about date formatting, so a raw `pubDate` is tried
//! against an ordered list of layouts and the first one that parses wins.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// No layout accepted the input. Carries the last layout's failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot parse {input:?} as a publication date ({layout}: {reason})")]
pub struct DateParseError {
    pub input: String,
    pub layout: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `02 Jan 06 15:04 -0700`
    Rfc822Z,
    /// `Monday, 02-Jan-06 15:04:05 MST`
    Rfc850,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
}

const LAYOUTS: [Layout; 6] = [
    Layout::Rfc1123,
    Layout::Rfc1123Z,
    Layout::Rfc822,
    Layout::Rfc822Z,
    Layout::Rfc850,
    Layout::Rfc3339,
];

const SHORT_WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const LONG_WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

impl Layout {
    fn name(self) -> &'static str {
        match self {
            Layout::Rfc1123 => "RFC1123",
            Layout::Rfc1123Z => "RFC1123Z",
            Layout::Rfc822 => "RFC822",
            Layout::Rfc822Z => "RFC822Z",
            Layout::Rfc850 => "RFC850",
            Layout::Rfc3339 => "RFC3339",
        }
    }

    fn parse(self, s: &str) -> Result<DateTime<FixedOffset>, String> {
        match self {
            Layout::Rfc1123 => {
                parse_named_zone(strip_weekday(s, &SHORT_WEEKDAYS)?, "%d %b %Y %H:%M:%S")
            }
            Layout::Rfc1123Z => {
                parse_numeric_zone(strip_weekday(s, &SHORT_WEEKDAYS)?, "%d %b %Y %H:%M:%S %z")
            }
            Layout::Rfc822 => parse_named_zone(s, "%d %b %y %H:%M"),
            Layout::Rfc822Z => parse_numeric_zone(s, "%d %b %y %H:%M %z"),
            Layout::Rfc850 => {
                parse_named_zone(strip_weekday(s, &LONG_WEEKDAYS)?, "%d-%b-%y %H:%M:%S")
            }
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(s).map_err(|e| e.to_string()),
        }
    }
}

/// Parse a raw publication date into UTC.
///
/// Surrounding whitespace is dropped and the first `GMT` is rewritten to
/// `UTC` before any layout is tried.
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let input = raw.trim().replacen("GMT", "UTC", 1);

    let mut last_err = (Layout::Rfc3339, String::new());
    for layout in LAYOUTS {
        match layout.parse(&input) {
            Ok(parsed) => return Ok(parsed.with_timezone(&Utc)),
            Err(reason) => last_err = (layout, reason),
        }
    }

    let (layout, reason) = last_err;
    Err(DateParseError {
        input: raw.to_string(),
        layout: layout.name(),
        reason,
    })
}

/// The weekday is checked for syntax only, never against the date itself.
fn strip_weekday<'a>(s: &'a str, names: &[&str]) -> Result<&'a str, String> {
    let (day, rest) = s
        .split_once(", ")
        .ok_or_else(|| "missing weekday".to_string())?;
    if names.contains(&day) {
        Ok(rest)
    } else {
        Err(format!("invalid weekday {day:?}"))
    }
}

fn parse_numeric_zone(s: &str, format: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_str(s, format).map_err(|e| e.to_string())
}

fn parse_named_zone(s: &str, format: &str) -> Result<DateTime<FixedOffset>, String> {
    let (datetime, zone) = s
        .rsplit_once(' ')
        .ok_or_else(|| "missing time zone".to_string())?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(datetime, format).map_err(|e| e.to_string())?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| "ambiguous local time".to_string())
}

/// Resolve a zone abbreviation.
///
/// The RFC 822 North American zones carry their real offsets. Any other
/// abbreviation is accepted as UTC, since abbreviations are not unique
/// worldwide.
fn zone_offset(zone: &str) -> Result<FixedOffset, String> {
    let valid = (2..=5).contains(&zone.len()) && zone.bytes().all(|b| b.is_ascii_uppercase());
    if !valid {
        return Err(format!("invalid time zone {zone:?}"));
    }

    let hours = match zone {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| format!("invalid offset for {zone}"))
}
