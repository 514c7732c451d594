use time::{Date, Weekday};

use crate::domain::{DataTable, Interval};

/// Post-fetch dataset summary. Gap detection is a weekday-count heuristic:
/// it cannot tell market holidays apart from genuinely missing rows, so a
/// non-zero gap count is advisory rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub min_date: Option<Date>,
    pub max_date: Option<Date>,
    /// Weekdays inside the observed range with no row. Only computed for
    /// the daily interval; zero otherwise.
    pub gaps: usize,
    pub columns: Vec<String>,
}

impl DatasetSummary {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Summarizes a fetched table. An empty table yields a zero-row summary;
/// emptiness is reported, never treated as a failure here.
pub fn summarize(table: &DataTable, interval: Interval) -> DatasetSummary {
    let gaps = if interval.is_daily() {
        count_weekday_gaps(table)
    } else {
        0
    };
    DatasetSummary {
        rows: table.len(),
        min_date: table.min_date(),
        max_date: table.max_date(),
        gaps,
        columns: table.columns().to_vec(),
    }
}

fn count_weekday_gaps(table: &DataTable) -> usize {
    let (Some(min), Some(max)) = (table.min_date(), table.max_date()) else {
        return 0;
    };
    let mut gaps = 0;
    let mut date = min;
    while date <= max {
        let is_weekday = !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday);
        if is_weekday && table.get(date).is_none() {
            gaps += 1;
        }
        let Some(next) = date.next_day() else { break };
        date = next;
    }
    gaps
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::domain::Cell;

    fn close_only(dates: &[Date]) -> DataTable {
        let mut table = DataTable::new(vec![String::from("Close")]);
        for date in dates {
            table.insert_row(*date, vec![Cell::Float(1.0)]);
        }
        table
    }

    #[test]
    fn empty_table_summarizes_to_zero_rows() {
        let summary = summarize(&close_only(&[]), Interval::OneDay);
        assert!(summary.is_empty());
        assert_eq!(summary.min_date, None);
        assert_eq!(summary.max_date, None);
        assert_eq!(summary.gaps, 0);
    }

    #[test]
    fn weekend_dates_are_not_gaps() {
        // Fri 2025-01-03 through Mon 2025-01-06 with both present: the
        // intervening Sat/Sun must not count.
        let summary = summarize(
            &close_only(&[date!(2025 - 01 - 03), date!(2025 - 01 - 06)]),
            Interval::OneDay,
        );
        assert_eq!(summary.gaps, 0);
    }

    #[test]
    fn missing_weekdays_are_counted() {
        // Thu 2025-01-02 and Mon 2025-01-06 present; Fri 2025-01-03 missing.
        // A holiday on that Friday would look identical.
        let summary = summarize(
            &close_only(&[date!(2025 - 01 - 02), date!(2025 - 01 - 06)]),
            Interval::OneDay,
        );
        assert_eq!(summary.gaps, 1);
        assert_eq!(summary.min_date, Some(date!(2025 - 01 - 02)));
        assert_eq!(summary.max_date, Some(date!(2025 - 01 - 06)));
    }

    #[test]
    fn gap_detection_only_applies_to_the_daily_interval() {
        let summary = summarize(
            &close_only(&[date!(2025 - 01 - 02), date!(2025 - 01 - 06)]),
            Interval::OneWeek,
        );
        assert_eq!(summary.gaps, 0);
    }
}
