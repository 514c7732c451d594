mod cli;
mod error;
mod render;
mod writer;

use std::sync::Arc;

use clap::Parser;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use tickhaul_core::{
    HttpClient, LicensePolicy, Pipeline, ReqwestHttpClient, TwseAdapter, YahooChartAdapter,
};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    if let Err(error) = run(cli).await {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

/// Log filter comes from `TICKHAUL_LOG` when set; `--quiet` only lowers the
/// fallback so explicit operator filters always win.
fn init_tracing(quiet: bool) {
    let fallback = if quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_env("TICKHAUL_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let request = cli.to_request()?;

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let pipeline = Pipeline::new(
        Arc::new(YahooChartAdapter::new(http.clone())),
        Arc::new(TwseAdapter::new(http)),
        LicensePolicy::default(),
    );

    let today = OffsetDateTime::now_utc().date();
    let run = pipeline.run(&request, today).await?;

    let written = writer::write_run(&run, &cli.output_path)?;
    if cli.show_summary {
        render::print_summary(&run, &written);
    }

    if run.summary.is_total_failure() {
        return Err(CliError::Download {
            failed: run.summary.failed,
        });
    }
    Ok(())
}
