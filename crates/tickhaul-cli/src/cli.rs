use clap::{Parser, ValueEnum};

use tickhaul_core::{
    parse_date, FetchOptions, FetchRequest, IntendedUse, Interval, ProviderId, SupplementKind,
    ValidationError,
};

/// Only CSV is produced today. Parquet is a plausible later addition but
/// nothing here is shaped for it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileFormat {
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "tickhaul",
    version,
    about = "Fetch, merge, and summarize market datasets"
)]
pub struct Cli {
    /// Ticker symbols; bare numeric codes are treated as TWSE listings.
    #[arg(short = 's', long = "symbols", num_args = 1.., required = true)]
    pub symbols: Vec<String>,

    /// Inclusive range start, YYYY-MM-DD.
    #[arg(long = "start-date")]
    pub start_date: String,

    /// Inclusive range end, YYYY-MM-DD. Omitted means latest available.
    #[arg(long = "end-date")]
    pub end_date: Option<String>,

    /// Bar interval (1m, 2m, 5m, 15m, 30m, 60m, 90m, 1h, 1d, 5d, 1wk, 1mo, 3mo).
    #[arg(long, default_value = "1d")]
    pub interval: String,

    /// Data provider: primary or supplementary-exchange.
    #[arg(long, default_value = "primary")]
    pub provider: String,

    /// Declared purpose, checked against licensing policy before any fetch.
    #[arg(long = "intended-use", default_value = "private_research")]
    pub intended_use: String,

    /// Also fetch institutional buy/sell flows from the exchange.
    #[arg(long = "with-institutional")]
    pub with_institutional: bool,

    /// Also fetch day-trading statistics from the exchange.
    #[arg(long = "with-daytrade")]
    pub with_daytrade: bool,

    /// Join fetched statistics onto the price table by date.
    #[arg(long)]
    pub merge: bool,

    /// Restrict output to these columns. Unknown names are ignored.
    #[arg(long, num_args = 1..)]
    pub columns: Option<Vec<String>>,

    /// Keep raw prices instead of scaling by the adjusted close.
    #[arg(long = "no-auto-adjust")]
    pub no_auto_adjust: bool,

    /// Apply the heuristic 100x unit-mixup correction.
    #[arg(long)]
    pub repair: bool,

    /// Directory the per-symbol files are written into.
    #[arg(long = "output-path", default_value = "data")]
    pub output_path: String,

    #[arg(long = "file-format", value_enum, default_value = "csv")]
    pub file_format: FileFormat,

    /// Print the per-run summary after writing output.
    #[arg(long = "show-summary")]
    pub show_summary: bool,

    /// Lower the default log level to errors only.
    #[arg(long)]
    pub quiet: bool,
}

impl Cli {
    pub fn to_request(&self) -> Result<FetchRequest, ValidationError> {
        let start = parse_date(&self.start_date)?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;
        let interval: Interval = self.interval.parse()?;
        let provider: ProviderId = self.provider.parse()?;
        let intended_use: IntendedUse = self.intended_use.parse()?;

        let mut supplements = Vec::new();
        if self.with_institutional {
            supplements.push(SupplementKind::InstitutionalFlows);
        }
        if self.with_daytrade {
            supplements.push(SupplementKind::DayTrading);
        }

        let mut request = FetchRequest::new(
            self.symbols.clone(),
            start,
            end,
            interval,
            provider,
            intended_use,
        )?
        .with_options(FetchOptions {
            auto_adjust: !self.no_auto_adjust,
            repair: self.repair,
        })
        .with_supplements(supplements)
        .with_merge(self.merge);

        if let Some(columns) = &self.columns {
            request = request.with_columns(columns.clone());
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments must parse")
    }

    #[test]
    fn minimal_invocation_uses_defaults() {
        let cli = parse(&[
            "tickhaul",
            "--symbols",
            "2330",
            "AAPL",
            "--start-date",
            "2025-01-01",
        ]);
        assert_eq!(cli.symbols, vec!["2330", "AAPL"]);
        assert_eq!(cli.interval, "1d");
        assert_eq!(cli.provider, "primary");
        assert_eq!(cli.intended_use, "private_research");
        assert_eq!(cli.output_path, "data");
        assert!(!cli.merge);

        let request = cli.to_request().expect("valid request");
        assert_eq!(request.provider(), ProviderId::Primary);
        assert_eq!(request.interval(), Interval::OneDay);
        assert!(!request.end_was_requested());
    }

    #[test]
    fn supplement_flags_map_to_kinds() {
        let cli = parse(&[
            "tickhaul",
            "-s",
            "2330",
            "--start-date",
            "2025-01-01",
            "--end-date",
            "2025-01-31",
            "--with-institutional",
            "--with-daytrade",
            "--merge",
        ]);
        assert!(cli.with_institutional);
        assert!(cli.with_daytrade);
        assert!(cli.merge);
        assert!(cli.to_request().is_ok());
    }

    #[test]
    fn malformed_date_maps_to_validation_error() {
        let cli = parse(&["tickhaul", "-s", "2330", "--start-date", "01/01/2025"]);
        let error = cli.to_request().expect_err("must fail");
        assert!(matches!(error, ValidationError::InvalidDate { .. }));
    }

    #[test]
    fn unknown_interval_maps_to_validation_error() {
        let cli = parse(&[
            "tickhaul",
            "-s",
            "2330",
            "--start-date",
            "2025-01-01",
            "--interval",
            "2h",
        ]);
        let error = cli.to_request().expect_err("must fail");
        assert!(matches!(error, ValidationError::InvalidInterval { .. }));
    }

    #[test]
    fn missing_symbols_is_a_parse_error() {
        assert!(Cli::try_parse_from(["tickhaul", "--start-date", "2025-01-01"]).is_err());
    }
}
