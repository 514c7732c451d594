use tickhaul_core::{PipelineRun, SymbolResultKind};

use crate::writer::WrittenFile;

/// Human-readable run report printed on `--show-summary`.
pub fn print_summary(run: &PipelineRun, written: &[WrittenFile]) {
    println!("=== Summary ===");
    println!("run:      {}", run.run_id);
    println!(
        "range:    {} to {} ({})",
        run.range.query_start(),
        run.range.inclusive_end(),
        run.interval
    );
    println!(
        "symbols:  {} requested, {} fetched, {} empty, {} failed",
        run.summary.requested, run.summary.fetched, run.summary.empty, run.summary.failed
    );
    if run.summary.supplement_rows_dropped > 0 {
        println!(
            "dropped:  {} supplement rows outside the price range",
            run.summary.supplement_rows_dropped
        );
    }

    for result in &run.results {
        match &result.kind {
            SymbolResultKind::Fetched { summary, .. } => {
                let span = match (summary.min_date, summary.max_date) {
                    (Some(min), Some(max)) => format!("{min} to {max}"),
                    _ => String::from("no rows"),
                };
                let file = written
                    .iter()
                    .find(|file| file.symbol == result.symbol.qualified())
                    .map_or(String::from("not written"), |file| {
                        file.path.display().to_string()
                    });
                println!(
                    "  {}: {} rows, {span}, {} gaps -> {file}",
                    result.symbol,
                    summary.rows,
                    summary.gaps
                );
            }
            SymbolResultKind::Empty => println!("  {}: no data", result.symbol),
            SymbolResultKind::Failed(error) => {
                println!("  {}: failed ({})", result.symbol, error.code());
            }
        }
    }

    for warning in &run.summary.warnings {
        println!("warning:  {warning}");
    }
    for failure in &run.summary.failures {
        println!("failure:  {} {}: {}", failure.symbol, failure.code, failure.message);
    }
}
