use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use crate::data_source::RangeSemantics;
use crate::error::ValidationError;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const COMPACT_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]");

/// Parses a `YYYY-MM-DD` date string.
pub fn parse_date(value: &str) -> Result<Date, ValidationError> {
    Date::parse(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        value: value.to_owned(),
    })
}

/// Formats a date as `YYYYMMDD` for filenames.
pub fn format_compact(date: Date) -> String {
    date.format(COMPACT_DATE_FORMAT)
        .expect("compact date format has no runtime inputs")
}

/// Provider-facing query window derived from the user's inclusive range.
///
/// End-exclusive providers receive an end bumped forward by one calendar day
/// so the user-facing range stays inclusive on both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRange {
    query_start: Date,
    query_end: Date,
    inclusive_end: Date,
    end_was_omitted: bool,
}

impl ResolvedRange {
    /// Resolves an inclusive start/optional-end pair into the window a
    /// provider expects. An omitted end means "through latest available"
    /// and resolves to `today` inclusive.
    pub fn resolve(
        start: Date,
        end: Option<Date>,
        today: Date,
        semantics: RangeSemantics,
    ) -> Result<Self, ValidationError> {
        let inclusive_end = end.unwrap_or(today);
        if start > inclusive_end {
            return Err(ValidationError::StartAfterEnd {
                start,
                end: inclusive_end,
            });
        }
        let query_end = match semantics {
            RangeSemantics::EndExclusive => inclusive_end.next_day().unwrap_or(Date::MAX),
            RangeSemantics::EndInclusive => inclusive_end,
        };
        Ok(Self {
            query_start: start,
            query_end,
            inclusive_end,
            end_was_omitted: end.is_none(),
        })
    }

    pub const fn query_start(&self) -> Date {
        self.query_start
    }

    pub const fn query_end(&self) -> Date {
        self.query_end
    }

    pub const fn inclusive_end(&self) -> Date {
        self.inclusive_end
    }

    pub const fn end_was_omitted(&self) -> bool {
        self.end_was_omitted
    }

    /// Ascending calendar dates of the user-facing inclusive range.
    pub fn calendar_days(&self) -> Vec<Date> {
        let mut days = Vec::new();
        let mut current = self.query_start;
        while current <= self.inclusive_end {
            days.push(current);
            match current.next_day() {
                Some(next) => current = next,
                None => break,
            }
        }
        days
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn parses_iso_date() {
        let parsed = parse_date("2025-01-31").expect("must parse");
        assert_eq!(parsed, date!(2025 - 01 - 31));
    }

    #[test]
    fn rejects_malformed_date() {
        let err = parse_date("2025/01/31").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }

    #[test]
    fn end_exclusive_provider_gets_end_plus_one_day() {
        let range = ResolvedRange::resolve(
            date!(2025 - 01 - 01),
            Some(date!(2025 - 01 - 31)),
            date!(2025 - 08 - 24),
            RangeSemantics::EndExclusive,
        )
        .expect("valid range");
        assert_eq!(range.query_end(), date!(2025 - 02 - 01));
        assert_eq!(range.inclusive_end(), date!(2025 - 01 - 31));
    }

    #[test]
    fn end_inclusive_provider_gets_end_unchanged() {
        let range = ResolvedRange::resolve(
            date!(2025 - 01 - 01),
            Some(date!(2025 - 01 - 31)),
            date!(2025 - 08 - 24),
            RangeSemantics::EndInclusive,
        )
        .expect("valid range");
        assert_eq!(range.query_end(), date!(2025 - 01 - 31));
    }

    #[test]
    fn omitted_end_resolves_to_today() {
        let today = date!(2025 - 08 - 24);
        let range = ResolvedRange::resolve(
            date!(2025 - 08 - 01),
            None,
            today,
            RangeSemantics::EndExclusive,
        )
        .expect("valid range");
        assert_eq!(range.inclusive_end(), today);
        assert!(range.end_was_omitted());
        assert_eq!(range.query_end(), date!(2025 - 08 - 25));
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = ResolvedRange::resolve(
            date!(2025 - 02 - 01),
            Some(date!(2025 - 01 - 01)),
            date!(2025 - 08 - 24),
            RangeSemantics::EndExclusive,
        )
        .expect_err("must fail");
        assert!(matches!(err, ValidationError::StartAfterEnd { .. }));
    }

    #[test]
    fn single_day_range_is_valid_for_inclusive_semantics() {
        let day = date!(2025 - 03 - 03);
        let range =
            ResolvedRange::resolve(day, Some(day), day, RangeSemantics::EndInclusive)
                .expect("valid range");
        assert_eq!(range.query_start(), range.query_end());
        assert_eq!(range.calendar_days(), vec![day]);
    }

    #[test]
    fn compact_format_matches_filename_convention() {
        assert_eq!(format_compact(date!(2025 - 07 - 18)), "20250718");
    }
}
