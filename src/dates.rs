//! Due-date normalization for scraped assignment rows.
//!
//! Gradescope exposes due dates two ways: a machine-readable `datetime`
//! attribute shaped like `"2025-07-15 23:59:00 -0400"`, and human text such
//! as `"Jul 15 at 11:59PM"`. The machine shape is not ISO-8601: the date and
//! time are space-separated and the offset has no colon, so it must be parsed
//! with an offset-aware format rather than a naive `T` substitution. The
//! free-text shapes are matched against a small fixed set of known patterns;
//! anything outside that set yields `None` instead of a force-parsed guess.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Prefix Gradescope puts in front of the second, late due date. Stripped so
/// the text patterns below can still match the remainder.
const LATE_PREFIX: &str = "Late Due Date: ";

/// Machine `datetime` attribute shape: `YYYY-MM-DD HH:mm:ss ±HHMM`.
static MACHINE_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} [+-]\d{4}$").expect("valid regex")
});

/// Parse one due-date candidate into a timezone-resolved instant.
///
/// Tries, in order:
/// 1. The machine `datetime` attribute format, offset preserved exactly.
/// 2. Free text after stripping the `"Late Due Date: "` prefix, against the
///    known patterns `"Mon D at H:MMam/pm"` (current year assumed),
///    `"Mon D, YYYY"`, and `"M/D/YYYY"` — date-only patterns resolve to
///    midnight local time.
///
/// A candidate matching nothing yields `None`, never a panic.
pub fn parse_due_date(candidate: &str) -> Option<DateTime<Utc>> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    if MACHINE_DATETIME.is_match(candidate) {
        // chrono's %z accepts the colon-less ±HHMM offset directly.
        if let Ok(parsed) = DateTime::parse_from_str(candidate, "%Y-%m-%d %H:%M:%S %z") {
            return Some(parsed.with_timezone(&Utc));
        }
        debug!(candidate, "machine datetime matched shape but failed to parse");
        return None;
    }

    parse_text_date(candidate.strip_prefix(LATE_PREFIX).unwrap_or(candidate))
}

/// Free-text fallback parsing. Only the fixed pattern set is attempted;
/// unknown shapes fail closed.
fn parse_text_date(text: &str) -> Option<DateTime<Utc>> {
    let now = Local::now();

    // "Jul 15 at 11:59PM" carries no year; the page only ever shows dates
    // for the currently displayed term, so the current year applies.
    let with_year = format!("{} {}", now.year(), text);
    if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, "%Y %b %d at %I:%M%p") {
        return resolve_local(naive);
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%b %d, %Y") {
        return resolve_local(date.and_hms_opt(0, 0, 0)?);
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%m/%d/%Y") {
        return resolve_local(date.and_hms_opt(0, 0, 0)?);
    }

    debug!(text, "due-date text matched no known pattern");
    None
}

/// Resolve a wall-clock datetime in the local timezone. A time skipped by a
/// DST transition has no local representation and yields `None`.
fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
