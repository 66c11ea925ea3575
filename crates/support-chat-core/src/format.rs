//! Timestamp formatting for message captions

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;

/// Two-digit 12-hour clock, e.g. `09:05 AM`
pub fn bubble_time<Tz>(ts: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    ts.format("%I:%M %p").to_string()
}

/// `bubble_time` in the user's local time zone
pub fn local_bubble_time(ts: &DateTime<Utc>) -> String {
    bubble_time(&ts.with_timezone(&Local))
}
