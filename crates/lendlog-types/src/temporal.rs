use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical format used when writing new ledger rows.
pub const LEDGER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats accepted when reading historical rows, tried in order.
///
/// The ledger has been written by several front ends over time, so the
/// reader accepts ISO-like timestamps as well as US/UK locale strings.
const ACCEPTED_FORMATS: &[&str] = &[
    LEDGER_TIME_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y, %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y, %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Timestamp of a ledger event, kept exactly as stored.
///
/// The raw text is preserved so history views echo the ledger verbatim;
/// [`EventTime::parse`] interprets it on demand. Unparseable values are not
/// an error: callers decide on a fallback (usually "now").
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTime(String);

impl EventTime {
    /// Wrap a raw timestamp string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    /// Format a local wall-clock time in the canonical ledger format.
    pub fn from_naive(at: NaiveDateTime) -> Self {
        Self(at.format(LEDGER_TIME_FORMAT).to_string())
    }

    /// The current local time in the canonical ledger format.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    /// The raw stored text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the stored text is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Interpret the stored text as a local naive date-time.
    ///
    /// RFC 3339 values are converted to local time. A bare date is taken as
    /// midnight.
    pub fn parse(&self) -> Option<NaiveDateTime> {
        let raw = self.0.as_str();
        if raw.is_empty() {
            return None;
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Local).naive_local());
        }
        for format in ACCEPTED_FORMATS {
            if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(at);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Parse, or fall back to `fallback` when the text is unusable.
    pub fn parse_or(&self, fallback: NaiveDateTime) -> NaiveDateTime {
        self.parse().unwrap_or(fallback)
    }
}

impl fmt::Debug for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventTime({:?})", self.0)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventTime {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<NaiveDateTime> for EventTime {
    fn from(at: NaiveDateTime) -> Self {
        Self::from_naive(at)
    }
}
