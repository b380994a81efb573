//! Date keys and the inclusive date-range generator
//!
//! A [`DateKey`] is a calendar date in canonical `YYYYMMDD` form. It is both
//! the unit of work handed to the fetch layer and, indirectly, the merge key:
//! the store is keyed by the *trade date* the endpoint reports back, which for
//! non-trading days differs from the requested key.

use crate::error::{Error, Result};
use chrono::{Datelike, Days, NaiveDate};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y%m%d";

/// A calendar date in canonical `YYYYMMDD` form
///
/// Ordered by calendar date. Cheap to copy; formatting round-trips through
/// [`FromStr`]/[`fmt::Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Parse a `YYYYMMDD` string into a date key
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDate`] if the input is not a well-formed
    /// calendar date in that format.
    pub fn parse(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(DateKey)
            .map_err(|_| Error::InvalidDate(s.to_string()))
    }

    /// The previous calendar day
    ///
    /// The endpoint's form body wants the day before the requested date as
    /// separate day/month/year fields; see [`crate::fetch`].
    pub fn prev_day(&self) -> DateKey {
        // NaiveDate::MIN is year -262143; unreachable from any YYYYMMDD input
        DateKey(self.0.pred_opt().unwrap_or(self.0))
    }

    /// Day-of-month component (1-31)
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Month component (1-12)
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Year component
    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DateKey::parse(s)
    }
}

/// Lazy ascending iterator over every date in an inclusive range
///
/// Restartable via `Clone`; length is exact and known up front.
#[derive(Debug, Clone)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DateRange {
    /// Build the range `[start, end]`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRange`] if `start > end`. Validation happens
    /// here, before any network activity.
    pub fn new(start: DateKey, end: DateKey) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(DateRange {
            next: Some(start.0),
            end: end.0,
        })
    }
}

impl Iterator for DateRange {
    type Item = DateKey;

    fn next(&mut self) -> Option<DateKey> {
        let current = self.next?;
        self.next = if current < self.end {
            current.checked_add_days(Days::new(1))
        } else {
            None
        };
        Some(DateKey(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(next) => (self.end - next).num_days() as usize + 1,
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DateRange {}
