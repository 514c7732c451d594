use std::sync::Arc;

use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data_source::{
    FetchOptions, PriceSource, ProviderId, SeriesOutcome, SourceError, SupplementKind,
    SupplementOutcome, SupplementSeries, SupplementSource,
};
use crate::domain::{normalize_symbols, DataTable, Interval, NormalizedSymbol, ResolvedRange};
use crate::error::{PipelineError, ValidationError};
use crate::license::{IntendedUse, LicenseDecision, LicensePolicy};
use crate::merge::{combine_supplements, merge, MergeReport};
use crate::summary::{summarize, DatasetSummary};

/// A validated dataset request. Construction via [`FetchRequest::new`]
/// rejects the failures that need no provider knowledge; provider-dependent
/// checks happen in [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct FetchRequest {
    symbols: Vec<String>,
    start: Date,
    end: Option<Date>,
    interval: Interval,
    provider: ProviderId,
    intended_use: IntendedUse,
    options: FetchOptions,
    columns: Option<Vec<String>>,
    supplements: Vec<SupplementKind>,
    merge: bool,
}

impl FetchRequest {
    pub fn new(
        symbols: Vec<String>,
        start: Date,
        end: Option<Date>,
        interval: Interval,
        provider: ProviderId,
        intended_use: IntendedUse,
    ) -> Result<Self, ValidationError> {
        if symbols.iter().all(|symbol| symbol.trim().is_empty()) {
            return Err(ValidationError::EmptySymbolSet);
        }
        Ok(Self {
            symbols,
            start,
            end,
            interval,
            provider,
            intended_use,
            options: FetchOptions::default(),
            columns: None,
            supplements: Vec::new(),
            merge: false,
        })
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Restricts output to the named columns. Unknown names are ignored.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_supplements(mut self, supplements: Vec<SupplementKind>) -> Self {
        self.supplements = supplements;
        self
    }

    /// Joins the requested supplements onto the price table instead of
    /// reporting them separately.
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn intended_use(&self) -> IntendedUse {
        self.intended_use
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn end_was_requested(&self) -> bool {
        self.end.is_some()
    }
}

/// Terminal state of one requested symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolResultKind {
    Fetched {
        table: DataTable,
        summary: DatasetSummary,
        merge_reports: Vec<MergeReport>,
    },
    Empty,
    Failed(SourceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub symbol: NormalizedSymbol,
    pub kind: SymbolResultKind,
}

/// One per-symbol failure, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub symbol: String,
    pub code: &'static str,
    pub message: String,
}

/// Aggregate accounting for a run. `requested` counts normalized symbols,
/// so duplicates collapse before they are counted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub requested: usize,
    pub fetched: usize,
    pub empty: usize,
    pub failed: usize,
    /// Supplement rows dropped by the left join, across all symbols.
    pub supplement_rows_dropped: usize,
    pub failures: Vec<RunFailure>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    /// True when nothing was fetched and at least one symbol failed hard.
    pub fn is_total_failure(&self) -> bool {
        self.fetched == 0 && self.failed > 0
    }
}

/// Completed run: per-symbol results in input order plus the aggregate
/// summary.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub range: ResolvedRange,
    pub interval: Interval,
    pub results: Vec<SymbolResult>,
    pub summary: RunSummary,
}

/// Orchestrates a request end to end: normalization, range resolution, the
/// licensing gate, batched fetches, per-symbol merging and summarization.
/// The licensing gate runs strictly before any provider I/O.
pub struct Pipeline {
    price: Arc<dyn PriceSource>,
    supplement: Arc<dyn SupplementSource>,
    policy: LicensePolicy,
}

impl Pipeline {
    pub fn new(
        price: Arc<dyn PriceSource>,
        supplement: Arc<dyn SupplementSource>,
        policy: LicensePolicy,
    ) -> Self {
        Self {
            price,
            supplement,
            policy,
        }
    }

    pub async fn run(
        &self,
        request: &FetchRequest,
        today: Date,
    ) -> Result<PipelineRun, PipelineError> {
        let symbols = normalize_symbols(&request.symbols);
        if symbols.is_empty() {
            return Err(ValidationError::EmptySymbolSet.into());
        }

        // A statistics-only provider yields no price table to join onto.
        if request.merge && request.provider == ProviderId::SupplementaryExchange {
            return Err(ValidationError::MergeUnavailable {
                provider: request.provider,
            }
            .into());
        }

        // Resolve the range with the principal adapter's semantics before
        // the gate: an invalid request is a validation failure even when
        // the licensing policy would also deny it.
        let semantics = match request.provider {
            ProviderId::Primary => self.price.range_semantics(),
            ProviderId::SupplementaryExchange => self.supplement.range_semantics(),
        };
        let range = ResolvedRange::resolve(request.start, request.end, today, semantics)?;

        let supplements = self.effective_supplements(request);
        self.enforce_licensing(request, &supplements)?;

        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            provider = %request.provider,
            intended_use = %request.intended_use,
            symbols = symbols.len(),
            "starting fetch run"
        );

        let mut warnings = Vec::new();
        let results = match request.provider {
            ProviderId::Primary => {
                self.run_primary(request, &symbols, &supplements, range, today, &mut warnings)
                    .await?
            }
            ProviderId::SupplementaryExchange => {
                self.run_statistics_only(request, &symbols, &supplements, range, &mut warnings)
                    .await
            }
        };

        let summary = build_summary(&results, warnings);
        info!(
            run_id = %run_id,
            fetched = summary.fetched,
            empty = summary.empty,
            failed = summary.failed,
            "fetch run finished"
        );
        Ok(PipelineRun {
            run_id,
            range,
            interval: request.interval,
            results,
            summary,
        })
    }

    /// Supplement kinds this run will touch. A statistics-only run with no
    /// explicit kinds fetches both reports.
    fn effective_supplements(&self, request: &FetchRequest) -> Vec<SupplementKind> {
        if request.provider == ProviderId::SupplementaryExchange && request.supplements.is_empty()
        {
            vec![
                SupplementKind::InstitutionalFlows,
                SupplementKind::DayTrading,
            ]
        } else {
            request.supplements.clone()
        }
    }

    /// Every provider the run would contact must pass the policy check.
    fn enforce_licensing(
        &self,
        request: &FetchRequest,
        supplements: &[SupplementKind],
    ) -> Result<(), PipelineError> {
        let mut providers = vec![request.provider];
        if request.provider == ProviderId::Primary && !supplements.is_empty() {
            providers.push(ProviderId::SupplementaryExchange);
        }
        for provider in providers {
            if let LicenseDecision::Denied(denial) =
                self.policy.decide(provider, request.intended_use)
            {
                return Err(denial.into());
            }
        }
        Ok(())
    }

    async fn run_primary(
        &self,
        request: &FetchRequest,
        symbols: &[NormalizedSymbol],
        supplements: &[SupplementKind],
        range: ResolvedRange,
        today: Date,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<SymbolResult>, PipelineError> {
        let price_outcomes = self
            .price
            .fetch_history(symbols, range, request.interval, request.options)
            .await;

        // Supplements on a price run only materialize through the join;
        // requesting them without --merge is a no-op worth flagging.
        let supplement_series = if request.merge {
            self.fetch_supplements(symbols, supplements, request, today, warnings)
                .await?
        } else {
            if !supplements.is_empty() {
                warnings.push(String::from(
                    "supplement flags have no effect without merge; skipping exchange reports",
                ));
            }
            Vec::new()
        };

        let mut results = Vec::with_capacity(symbols.len());
        for (index, outcome) in price_outcomes.into_iter().enumerate() {
            let kind = match outcome.outcome {
                SeriesOutcome::Series(series) => {
                    let own_supplements = supplement_series
                        .iter()
                        .filter_map(|per_kind| per_kind.get(index).cloned().flatten())
                        .collect::<Vec<_>>();
                    let merged = merge(&series.table, &own_supplements);
                    for report in &merged.reports {
                        if report.no_overlap {
                            warnings.push(format!(
                                "{}: {} rows share no dates with the price series",
                                outcome.symbol, report.source
                            ));
                        }
                    }
                    let table = apply_column_subset(merged.table, request.columns.as_deref());
                    let summary = summarize(&table, request.interval);
                    SymbolResultKind::Fetched {
                        table,
                        summary,
                        merge_reports: merged.reports,
                    }
                }
                SeriesOutcome::Empty => SymbolResultKind::Empty,
                SeriesOutcome::Failed(error) => SymbolResultKind::Failed(error),
            };
            results.push(SymbolResult {
                symbol: outcome.symbol,
                kind,
            });
        }
        Ok(results)
    }

    async fn run_statistics_only(
        &self,
        request: &FetchRequest,
        symbols: &[NormalizedSymbol],
        supplements: &[SupplementKind],
        range: ResolvedRange,
        warnings: &mut Vec<String>,
    ) -> Vec<SymbolResult> {
        let mut per_symbol_series: Vec<Vec<SupplementSeries>> = vec![Vec::new(); symbols.len()];
        let mut per_symbol_error: Vec<Option<SourceError>> = vec![None; symbols.len()];

        for kind in supplements {
            let outcomes = self.supplement.fetch_supplement(*kind, symbols, range).await;
            for (index, outcome) in outcomes.into_iter().enumerate() {
                match outcome.outcome {
                    SupplementOutcome::Series(series) => per_symbol_series[index].push(series),
                    SupplementOutcome::Empty => {}
                    SupplementOutcome::Failed(error) => {
                        warnings.push(format!("{}: {kind} fetch failed: {error}", outcome.symbol));
                        per_symbol_error[index].get_or_insert(error);
                    }
                }
            }
        }

        symbols
            .iter()
            .cloned()
            .zip(per_symbol_series)
            .zip(per_symbol_error)
            .map(|((symbol, series), error)| {
                let kind = if !series.is_empty() {
                    let table =
                        apply_column_subset(combine_supplements(&series), request.columns.as_deref());
                    let summary = summarize(&table, request.interval);
                    SymbolResultKind::Fetched {
                        table,
                        summary,
                        merge_reports: Vec::new(),
                    }
                } else if let Some(error) = error {
                    SymbolResultKind::Failed(error)
                } else {
                    SymbolResultKind::Empty
                };
                SymbolResult { symbol, kind }
            })
            .collect()
    }

    /// Fetches each requested supplement kind once for the whole batch.
    /// Returns, per kind, a per-symbol vector aligned with `symbols`. A
    /// supplement failure on a primary run degrades to a warning.
    async fn fetch_supplements(
        &self,
        symbols: &[NormalizedSymbol],
        supplements: &[SupplementKind],
        request: &FetchRequest,
        today: Date,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<Vec<Option<SupplementSeries>>>, PipelineError> {
        if supplements.is_empty() {
            return Ok(Vec::new());
        }
        let range = ResolvedRange::resolve(
            request.start,
            request.end,
            today,
            self.supplement.range_semantics(),
        )?;

        let mut per_kind = Vec::with_capacity(supplements.len());
        for kind in supplements {
            let outcomes = self.supplement.fetch_supplement(*kind, symbols, range).await;
            let series = outcomes
                .into_iter()
                .map(|outcome| match outcome.outcome {
                    SupplementOutcome::Series(series) => Some(series),
                    SupplementOutcome::Empty => None,
                    SupplementOutcome::Failed(error) => {
                        warn!(symbol = %outcome.symbol, kind = %kind, error = %error, "supplement fetch failed");
                        warnings.push(format!(
                            "{}: {kind} fetch failed: {error}",
                            outcome.symbol
                        ));
                        None
                    }
                })
                .collect();
            per_kind.push(series);
        }
        Ok(per_kind)
    }
}

fn apply_column_subset(table: DataTable, columns: Option<&[String]>) -> DataTable {
    match columns {
        Some(keep) => table.select_columns(keep),
        None => table,
    }
}

fn build_summary(results: &[SymbolResult], warnings: Vec<String>) -> RunSummary {
    let mut summary = RunSummary {
        requested: results.len(),
        warnings,
        ..RunSummary::default()
    };
    for result in results {
        match &result.kind {
            SymbolResultKind::Fetched {
                summary: dataset,
                merge_reports,
                ..
            } => {
                summary.fetched += 1;
                summary.supplement_rows_dropped += merge_reports
                    .iter()
                    .map(|report| report.dropped_rows)
                    .sum::<usize>();
                if dataset.is_empty() {
                    summary
                        .warnings
                        .push(format!("{}: fetched dataset has zero rows", result.symbol));
                }
            }
            SymbolResultKind::Empty => summary.empty += 1,
            SymbolResultKind::Failed(error) => {
                summary.failed += 1;
                summary.failures.push(RunFailure {
                    symbol: result.symbol.qualified().to_owned(),
                    code: error.code(),
                    message: error.message().to_owned(),
                });
            }
        }
    }
    summary
}
