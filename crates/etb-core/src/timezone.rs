//! The bot's local timezone: an IANA zone (`Asia/Dubai`) or a fixed offset (`+04:00`).
//!
//! Day and month boundaries, report times and the `/recent` timestamps are all
//! computed in this zone; storage stays in UTC.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    /// `Asia/Dubai`, `UTC`, `Z`, `+04:00`, `+0400`, `-5`, `UTC+4`.
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if let Ok(tz) = s.parse::<Tz>() {
            return Ok(Self::Named(tz));
        }
        parse_offset(s)
            .map(Self::Fixed)
            .ok_or_else(|| {
                Error::Config(format!(
                    "TIMEZONE must be an IANA zone like Asia/Dubai or an offset like +04:00, got {raw:?}"
                ))
            })
    }

    /// Wall-clock time in this zone.
    pub fn local(&self, t: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => t.with_timezone(tz).naive_local(),
            Self::Fixed(off) => t.with_timezone(off).naive_local(),
        }
    }

    pub fn local_date(&self, t: DateTime<Utc>) -> NaiveDate {
        self.local(t).date()
    }

    /// The instant a local wall-clock time denotes.
    ///
    /// Ambiguous times (DST fall-back) take the earlier instant; times inside a
    /// DST gap move forward to the first valid wall-clock time.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Named(tz) => resolve_local(tz, local),
            Self::Fixed(off) => resolve_local(off, local),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => write!(f, "{}", tz.name()),
            Self::Fixed(off) => write!(f, "UTC{off}"),
        }
    }
}

fn resolve_local<Z: TimeZone>(tz: &Z, local: NaiveDateTime) -> DateTime<Utc> {
    let mut probe = local;
    // No real-world gap is longer than a day.
    for _ in 0..(24 * 4) {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(t) => return t.with_timezone(&Utc),
            LocalResult::Ambiguous(early, _) => return early.with_timezone(&Utc),
            LocalResult::None => probe += Duration::minutes(15),
        }
    }
    Utc.from_utc_datetime(&local)
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("gmt")
    {
        return FixedOffset::east_opt(0);
    }

    let s = s
        .strip_prefix("UTC")
        .or_else(|| s.strip_prefix("GMT"))
        .unwrap_or(s);
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return None,
    };

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
