use tracing::warn;

use crate::data_source::{SupplementKind, SupplementSeries};
use crate::domain::{Cell, DataTable};

const VOLUME_COLUMN: &str = "Volume";
const FOREIGN_NET_COLUMN: &str = "inst_foreign_net";
const DAYTRADE_VOLUME_COLUMN: &str = "dt_daytrade_volume";

/// Per-supplement join accounting surfaced in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub source: SupplementKind,
    /// Price rows that found a supplement row for their date.
    pub matched_rows: usize,
    /// Supplement rows with no price row on their date. Dropped by the
    /// left join.
    pub dropped_rows: usize,
    /// True when the two date ranges share no dates at all.
    pub no_overlap: bool,
}

/// A price table with zero or more supplements joined in.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDataset {
    pub table: DataTable,
    pub reports: Vec<MergeReport>,
}

/// Left-joins supplement tables onto a price table by date. The price
/// table drives: every price row survives, supplement rows on other dates
/// are dropped and counted. Supplement columns are namespaced with the
/// kind's short id so `foreign_net` from the institutional report lands as
/// `inst_foreign_net`.
pub fn merge(price: &DataTable, supplements: &[SupplementSeries]) -> MergedDataset {
    let mut table = price.clone();
    let mut reports = Vec::with_capacity(supplements.len());

    for supplement in supplements {
        let report = join_supplement(&mut table, supplement);
        if report.no_overlap {
            warn!(
                source = %supplement.kind,
                "supplement dates do not overlap the price range"
            );
        }
        reports.push(report);
    }

    append_derived_ratios(&mut table);
    MergedDataset { table, reports }
}

fn join_supplement(table: &mut DataTable, supplement: &SupplementSeries) -> MergeReport {
    let mut matched_rows = 0;
    for (date, _) in supplement.table.rows() {
        if table.get(*date).is_some() {
            matched_rows += 1;
        }
    }
    let dropped_rows = supplement.table.len() - matched_rows;

    for name in supplement.table.columns() {
        let namespaced = format!("{}_{}", supplement.kind.short_id(), name);
        let source_index = supplement
            .table
            .column_index(name)
            .expect("column names come from the same table");
        let values = table
            .rows()
            .iter()
            .map(|(date, _)| {
                supplement
                    .table
                    .get(*date)
                    .map_or(Cell::Null, |cells| cells[source_index])
            })
            .collect();
        table.add_column(namespaced, values);
    }

    MergeReport {
        source: supplement.kind,
        matched_rows,
        dropped_rows,
        no_overlap: matched_rows == 0 && !supplement.table.is_empty(),
    }
}

/// Appends the two derived ratio columns when their inputs are present.
/// Rows missing either input get a null ratio.
fn append_derived_ratios(table: &mut DataTable) {
    for (numerator, derived) in [
        (FOREIGN_NET_COLUMN, "foreign_net_ratio"),
        (DAYTRADE_VOLUME_COLUMN, "daytrade_volume_ratio"),
    ] {
        let (Some(numerator_index), Some(volume_index)) =
            (table.column_index(numerator), table.column_index(VOLUME_COLUMN))
        else {
            continue;
        };
        let values = table
            .rows()
            .iter()
            .map(|(_, cells)| ratio(cells[numerator_index], cells[volume_index]))
            .collect();
        table.add_column(derived.to_owned(), values);
    }
}

fn ratio(numerator: Cell, denominator: Cell) -> Cell {
    match (numerator.as_f64(), denominator.as_f64()) {
        (Some(n), Some(d)) if d != 0.0 => Cell::Float(n / d),
        _ => Cell::Null,
    }
}

/// Full outer join of supplement tables by date for statistics-only runs,
/// where there is no price table to drive a left join. Columns are
/// namespaced the same way as in [`merge`].
pub fn combine_supplements(supplements: &[SupplementSeries]) -> DataTable {
    let mut columns = Vec::new();
    for supplement in supplements {
        for name in supplement.table.columns() {
            columns.push(format!("{}_{}", supplement.kind.short_id(), name));
        }
    }

    let mut dates = supplements
        .iter()
        .flat_map(|supplement| supplement.table.rows().iter().map(|(date, _)| *date))
        .collect::<Vec<_>>();
    dates.sort_unstable();
    dates.dedup();

    let mut combined = DataTable::new(columns);
    for date in dates {
        let mut cells = Vec::new();
        for supplement in supplements {
            match supplement.table.get(date) {
                Some(row) => cells.extend_from_slice(row),
                None => cells.extend(std::iter::repeat(Cell::Null).take(supplement.table.columns().len())),
            }
        }
        combined.insert_row(date, cells);
    }
    combined
}
