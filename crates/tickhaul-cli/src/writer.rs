use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use tickhaul_core::{format_compact, DataTable, PipelineRun, ResolvedRange, SymbolResultKind, DATE_COLUMN};

use crate::error::CliError;

/// One file written for a symbol, for the summary printout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub symbol: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Writes one CSV per fetched symbol into `output_path`, creating the
/// directory when needed. Empty and failed symbols produce no file.
pub fn write_run(run: &PipelineRun, output_path: &str) -> Result<Vec<WrittenFile>, CliError> {
    let directory = Path::new(output_path);
    let mut written = Vec::new();

    for result in &run.results {
        let SymbolResultKind::Fetched { table, .. } = &result.kind else {
            continue;
        };
        if table.is_empty() {
            warn!(symbol = %result.symbol, "skipping empty dataset");
            continue;
        }
        if written.is_empty() {
            fs::create_dir_all(directory)?;
        }
        let filename = generate_filename(result.symbol.qualified(), &run.range);
        let path = directory.join(filename);
        write_table(table, &path)?;
        info!(symbol = %result.symbol, path = %path.display(), rows = table.len(), "wrote dataset");
        written.push(WrittenFile {
            symbol: result.symbol.qualified().to_owned(),
            path,
            rows: table.len(),
        });
    }
    Ok(written)
}

/// `<SYMBOL>_<YYYYMMDD>_<YYYYMMDD>.csv`, with `latest` standing in for an
/// end date the user never gave.
pub fn generate_filename(symbol: &str, range: &ResolvedRange) -> String {
    let end = if range.end_was_omitted() {
        String::from("latest")
    } else {
        format_compact(range.inclusive_end())
    };
    format!("{symbol}_{}_{end}.csv", format_compact(range.query_start()))
}

fn write_table(table: &DataTable, path: &Path) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = Vec::with_capacity(table.columns().len() + 1);
    header.push(DATE_COLUMN.to_owned());
    header.extend(table.columns().iter().cloned());
    writer.write_record(&header)?;

    for (date, cells) in table.rows() {
        let mut record = Vec::with_capacity(cells.len() + 1);
        record.push(date.to_string());
        record.extend(cells.iter().map(ToString::to_string));
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|error| CliError::Output(error.to_string()))?;
    Ok(())
}
