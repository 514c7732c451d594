use std::sync::Arc;

use time::macros::date;

use tickhaul_core::{
    FetchRequest, IntendedUse, Interval, LicensePolicy, NormalizedSymbol, Pipeline, PipelineError,
    ProviderId, SeriesOutcome, SourceError, SupplementKind, SymbolResultKind, ValidationError,
};
use tickhaul_tests::{
    price_table, supplement_table, CountingPriceSource, FailingSupplementSource,
    StaticSupplementSource,
};

const TODAY: time::Date = date!(2025 - 08 - 24);

fn request(symbols: &[&str]) -> FetchRequest {
    FetchRequest::new(
        symbols.iter().map(|s| (*s).to_owned()).collect(),
        date!(2025 - 01 - 01),
        Some(date!(2025 - 01 - 31)),
        Interval::OneDay,
        ProviderId::Primary,
        IntendedUse::PrivateResearch,
    )
    .expect("valid request")
}

fn tsmc_series() -> (String, SeriesOutcome) {
    let symbol = NormalizedSymbol::normalize("2330");
    let table = price_table(&[
        (date!(2025 - 01 - 02), 1_100.0, 20_000_000),
        (date!(2025 - 01 - 03), 1_120.0, 25_000_000),
    ]);
    CountingPriceSource::with_table(&symbol, table)
}

#[tokio::test]
async fn numeric_symbols_are_qualified_and_the_range_is_end_exclusive() {
    let price = Arc::new(CountingPriceSource::new([tsmc_series()]));
    let pipeline = Pipeline::new(
        price.clone(),
        Arc::new(StaticSupplementSource::new()),
        LicensePolicy::default(),
    );

    let run = pipeline
        .run(&request(&["2330", "AAPL"]), TODAY)
        .await
        .expect("run succeeds");

    assert_eq!(run.results[0].symbol.qualified(), "2330.TW");
    assert_eq!(run.results[1].symbol.qualified(), "AAPL");

    // The provider counts its end bound as exclusive, so the user's
    // inclusive 2025-01-31 becomes a 2025-02-01 query bound.
    let ranges = price.seen_ranges.lock().expect("lock");
    assert_eq!(ranges[0].query_start(), date!(2025 - 01 - 01));
    assert_eq!(ranges[0].query_end(), date!(2025 - 02 - 01));
    assert_eq!(ranges[0].inclusive_end(), date!(2025 - 01 - 31));
}

#[tokio::test]
async fn licensing_denial_happens_before_any_provider_call() {
    let price = Arc::new(CountingPriceSource::new([tsmc_series()]));
    let supplement = Arc::new(StaticSupplementSource::new());
    let pipeline = Pipeline::new(price.clone(), supplement.clone(), LicensePolicy::default());

    // Redistribution is allowed for the primary provider but not for the
    // exchange statistics this request also asks for.
    let request = FetchRequest::new(
        vec![String::from("2330")],
        date!(2025 - 01 - 01),
        None,
        Interval::OneDay,
        ProviderId::Primary,
        IntendedUse::Redistribute,
    )
    .expect("valid request")
    .with_supplements(vec![SupplementKind::InstitutionalFlows]);

    let error = pipeline.run(&request, TODAY).await.expect_err("denied");
    assert!(matches!(error, PipelineError::License(_)));
    assert_eq!(price.call_count(), 0);
    assert_eq!(supplement.call_count(), 0);
}

#[tokio::test]
async fn commercial_use_of_exchange_statistics_is_denied_before_any_fetch() {
    let supplement = Arc::new(StaticSupplementSource::new());
    let pipeline = Pipeline::new(
        Arc::new(CountingPriceSource::new([])),
        supplement.clone(),
        LicensePolicy::default(),
    );

    let request = FetchRequest::new(
        vec![String::from("2330")],
        date!(2025 - 01 - 01),
        None,
        Interval::OneDay,
        ProviderId::SupplementaryExchange,
        IntendedUse::Commercial,
    )
    .expect("valid request");

    let error = pipeline.run(&request, TODAY).await.expect_err("denied");
    let PipelineError::License(denial) = error else {
        panic!("expected a licensing denial");
    };
    assert_eq!(denial.provider, ProviderId::SupplementaryExchange);
    assert_eq!(denial.intended_use, IntendedUse::Commercial);
    assert_eq!(supplement.call_count(), 0);
}

#[tokio::test]
async fn inverted_range_is_a_validation_failure_even_when_licensing_would_deny() {
    let supplement = Arc::new(StaticSupplementSource::new());
    let pipeline = Pipeline::new(
        Arc::new(CountingPriceSource::new([])),
        supplement.clone(),
        LicensePolicy::default(),
    );

    // Both checks apply to this request; range validation runs first, so
    // the denial never masks the inverted dates.
    let request = FetchRequest::new(
        vec![String::from("2330")],
        date!(2025 - 02 - 01),
        Some(date!(2025 - 01 - 01)),
        Interval::OneDay,
        ProviderId::SupplementaryExchange,
        IntendedUse::Commercial,
    )
    .expect("valid request");

    let error = pipeline.run(&request, TODAY).await.expect_err("rejected");
    assert!(matches!(
        error,
        PipelineError::Validation(ValidationError::StartAfterEnd { .. })
    ));
    assert_eq!(supplement.call_count(), 0);
}

#[tokio::test]
async fn one_failing_symbol_does_not_abort_its_batch() {
    let failing = (
        String::from("BADCO"),
        SeriesOutcome::Failed(SourceError::transport("connection reset")),
    );
    let price = Arc::new(CountingPriceSource::new([tsmc_series(), failing]));
    let pipeline = Pipeline::new(
        price,
        Arc::new(StaticSupplementSource::new()),
        LicensePolicy::default(),
    );

    let run = pipeline
        .run(&request(&["2330", "BADCO"]), TODAY)
        .await
        .expect("run succeeds despite one failure");

    assert_eq!(run.summary.fetched, 1);
    assert_eq!(run.summary.failed, 1);
    assert!(!run.summary.is_total_failure());
    assert_eq!(run.summary.failures[0].symbol, "BADCO");
    assert_eq!(run.summary.failures[0].code, "source.transport");
    assert!(matches!(run.results[0].kind, SymbolResultKind::Fetched { .. }));
    assert!(matches!(run.results[1].kind, SymbolResultKind::Failed(_)));
}

#[tokio::test]
async fn all_symbols_failing_marks_the_run_a_total_failure() {
    let outcomes = [
        (
            String::from("2330.TW"),
            SeriesOutcome::Failed(SourceError::rate_limited("429")),
        ),
        (
            String::from("AAPL"),
            SeriesOutcome::Failed(SourceError::rate_limited("429")),
        ),
    ];
    let pipeline = Pipeline::new(
        Arc::new(CountingPriceSource::new(outcomes)),
        Arc::new(StaticSupplementSource::new()),
        LicensePolicy::default(),
    );

    let run = pipeline
        .run(&request(&["2330", "AAPL"]), TODAY)
        .await
        .expect("run completes");
    assert!(run.summary.is_total_failure());
    assert_eq!(run.summary.failed, 2);
}

#[tokio::test]
async fn duplicate_symbols_collapse_before_counting() {
    let price = Arc::new(CountingPriceSource::new([tsmc_series()]));
    let pipeline = Pipeline::new(
        price,
        Arc::new(StaticSupplementSource::new()),
        LicensePolicy::default(),
    );

    let run = pipeline
        .run(&request(&["2330", " 2330 ", "2330"]), TODAY)
        .await
        .expect("run succeeds");
    assert_eq!(run.summary.requested, 1);
    assert_eq!(run.results.len(), 1);
}

#[tokio::test]
async fn statistics_only_run_defaults_to_both_report_kinds() {
    let supplement = Arc::new(
        StaticSupplementSource::new()
            .with_series(
                SupplementKind::InstitutionalFlows,
                "2330",
                supplement_table("foreign_net", &[(date!(2025 - 01 - 02), 1_500)]),
            )
            .with_series(
                SupplementKind::DayTrading,
                "2330",
                supplement_table("daytrade_volume", &[(date!(2025 - 01 - 02), 900)]),
            ),
    );
    let pipeline = Pipeline::new(
        Arc::new(CountingPriceSource::new([])),
        supplement.clone(),
        LicensePolicy::default(),
    );

    let request = FetchRequest::new(
        vec![String::from("2330")],
        date!(2025 - 01 - 01),
        Some(date!(2025 - 01 - 31)),
        Interval::OneDay,
        ProviderId::SupplementaryExchange,
        IntendedUse::PrivateResearch,
    )
    .expect("valid request");

    let run = pipeline.run(&request, TODAY).await.expect("run succeeds");
    assert_eq!(supplement.call_count(), 2);

    let SymbolResultKind::Fetched { table, .. } = &run.results[0].kind else {
        panic!("expected fetched statistics");
    };
    assert_eq!(
        table.columns(),
        [
            String::from("inst_foreign_net"),
            String::from("dt_daytrade_volume")
        ]
    );
}

#[tokio::test]
async fn supplement_failure_on_a_price_run_degrades_to_a_warning() {
    let price = Arc::new(CountingPriceSource::new([tsmc_series()]));
    let pipeline = Pipeline::new(
        price,
        Arc::new(FailingSupplementSource::new(SourceError::transport(
            "exchange unreachable",
        ))),
        LicensePolicy::default(),
    );

    let request =
        request(&["2330"]).with_supplements(vec![SupplementKind::InstitutionalFlows]).with_merge(true);
    let run = pipeline.run(&request, TODAY).await.expect("run succeeds");

    assert_eq!(run.summary.fetched, 1);
    assert_eq!(run.summary.failed, 0);
    assert!(run
        .summary
        .warnings
        .iter()
        .any(|warning| warning.contains("institutional-flows")));
}
