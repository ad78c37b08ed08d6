/*!
 * Validity parsing for license/certificate status cells
 *
 * Status cells mix free text and dates ("действует до 01.01.2030",
 * "срок истек"). The parser reduces them to a [`ValidityState`] and an
 * optional expiry date. Comparison is made against an explicit reference
 * instant rather than the ambient clock so runs can be reproduced.
 */

use chrono::{Local, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::constants::{DATE_FORMAT, KEYWORD_EXPIRED};
use crate::data_types::{Validity, ValidityState};
use crate::text::fold;

lazy_static::lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"[0-9]{2}\.[0-9]{2}\.[0-9]{4}").expect("valid date pattern");
}

/// Interprets status/date cells relative to a fixed reference instant
#[derive(Debug, Clone)]
pub struct ValidityParser {
    reference_time: NaiveDateTime,
    /// Lower-cased marker that flags a cell as expired outright
    expired_marker: String,
}

impl ValidityParser {
    /// Create a parser evaluating dates against `reference_time`
    pub fn new(reference_time: NaiveDateTime) -> Self {
        Self {
            reference_time,
            expired_marker: KEYWORD_EXPIRED.to_string(),
        }
    }

    /// Create a parser pinned to the current local time
    pub fn now() -> Self {
        Self::new(Local::now().naive_local())
    }

    /// Override the expired marker token
    pub fn with_expired_marker(mut self, marker: &str) -> Self {
        self.expired_marker = fold(marker);
        self
    }

    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    /// Parse one status cell.
    ///
    /// - missing → `NoData`
    /// - contains the expired marker → `Expired`, no date
    /// - first `DD.MM.YYYY` in the text: after the reference instant →
    ///   `Active`, otherwise `Expired`; an impossible calendar date → `Unknown`
    /// - no date at all → `Unknown`
    pub fn parse(&self, cell_text: Option<&str>) -> Validity {
        let Some(text) = cell_text else {
            return Validity::NO_DATA;
        };

        let text = fold(text);
        if text.contains(&self.expired_marker) {
            return Validity::new(ValidityState::Expired, None);
        }

        let Some(found) = DATE_PATTERN.find(&text) else {
            return Validity::new(ValidityState::Unknown, None);
        };

        match NaiveDate::parse_from_str(found.as_str(), DATE_FORMAT) {
            Ok(date) => {
                let starts_after = date
                    .and_hms_opt(0, 0, 0)
                    .is_some_and(|midnight| midnight > self.reference_time);
                let state = if starts_after {
                    ValidityState::Active
                } else {
                    ValidityState::Expired
                };
                Validity::new(state, Some(date))
            }
            Err(_) => Validity::new(ValidityState::Unknown, None),
        }
    }
}
