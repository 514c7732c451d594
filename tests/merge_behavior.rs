use std::sync::Arc;

use time::macros::date;

use tickhaul_core::{
    Cell, FetchRequest, IntendedUse, Interval, LicensePolicy, NormalizedSymbol, Pipeline,
    ProviderId, SupplementKind, SymbolResultKind,
};
use tickhaul_tests::{price_table, supplement_table, CountingPriceSource, StaticSupplementSource};

const TODAY: time::Date = date!(2025 - 08 - 24);

fn merge_request(symbols: &[&str]) -> FetchRequest {
    FetchRequest::new(
        symbols.iter().map(|s| (*s).to_owned()).collect(),
        date!(2025 - 01 - 01),
        Some(date!(2025 - 01 - 10)),
        Interval::OneDay,
        ProviderId::Primary,
        IntendedUse::PrivateResearch,
    )
    .expect("valid request")
    .with_supplements(vec![SupplementKind::InstitutionalFlows])
    .with_merge(true)
}

/// Price rows on Jan 2, 3, 6; institutional rows on Jan 3, 6, 7, 8. The
/// join must keep all three price rows, fill Jan 2 with null, and drop the
/// supplement-only rows.
#[tokio::test]
async fn merged_output_is_left_joined_on_the_price_dates() {
    let symbol = NormalizedSymbol::normalize("2330");
    let price = Arc::new(CountingPriceSource::new([CountingPriceSource::with_table(
        &symbol,
        price_table(&[
            (date!(2025 - 01 - 02), 1_100.0, 20_000_000),
            (date!(2025 - 01 - 03), 1_120.0, 25_000_000),
            (date!(2025 - 01 - 06), 1_090.0, 18_000_000),
        ]),
    )]));
    let supplement = Arc::new(StaticSupplementSource::new().with_series(
        SupplementKind::InstitutionalFlows,
        "2330",
        supplement_table(
            "foreign_net",
            &[
                (date!(2025 - 01 - 03), 5_000_000),
                (date!(2025 - 01 - 06), -2_500_000),
                (date!(2025 - 01 - 07), 1_000_000),
                (date!(2025 - 01 - 08), 2_000_000),
            ],
        ),
    ));
    let pipeline = Pipeline::new(price, supplement, LicensePolicy::default());

    let run = pipeline
        .run(&merge_request(&["2330"]), TODAY)
        .await
        .expect("run succeeds");
    let SymbolResultKind::Fetched {
        table,
        merge_reports,
        ..
    } = &run.results[0].kind
    else {
        panic!("expected fetched result");
    };

    assert_eq!(table.len(), 3);
    assert_eq!(merge_reports[0].matched_rows, 2);
    assert_eq!(merge_reports[0].dropped_rows, 2);
    assert!(!merge_reports[0].no_overlap);
    assert_eq!(run.summary.supplement_rows_dropped, 2);

    let net = table.column_index("inst_foreign_net").expect("joined column");
    assert_eq!(table.get(date!(2025 - 01 - 02)).unwrap()[net], Cell::Null);
    assert_eq!(
        table.get(date!(2025 - 01 - 03)).unwrap()[net],
        Cell::Int(5_000_000)
    );

    // Derived ratio: foreign_net / Volume, null where the input is null.
    let ratio = table.column_index("foreign_net_ratio").expect("derived column");
    assert_eq!(table.get(date!(2025 - 01 - 02)).unwrap()[ratio], Cell::Null);
    assert_eq!(
        table.get(date!(2025 - 01 - 03)).unwrap()[ratio],
        Cell::Float(0.2)
    );
}

#[tokio::test]
async fn disjoint_supplement_produces_a_no_overlap_warning() {
    let symbol = NormalizedSymbol::normalize("2330");
    let price = Arc::new(CountingPriceSource::new([CountingPriceSource::with_table(
        &symbol,
        price_table(&[(date!(2025 - 01 - 02), 1_100.0, 20_000_000)]),
    )]));
    let supplement = Arc::new(StaticSupplementSource::new().with_series(
        SupplementKind::InstitutionalFlows,
        "2330",
        supplement_table("foreign_net", &[(date!(2025 - 03 - 03), 5_000_000)]),
    ));
    let pipeline = Pipeline::new(price, supplement, LicensePolicy::default());

    let run = pipeline
        .run(&merge_request(&["2330"]), TODAY)
        .await
        .expect("run succeeds");
    let SymbolResultKind::Fetched { merge_reports, .. } = &run.results[0].kind else {
        panic!("expected fetched result");
    };
    assert!(merge_reports[0].no_overlap);
    assert!(run
        .summary
        .warnings
        .iter()
        .any(|warning| warning.contains("share no dates")));
}

#[tokio::test]
async fn column_subsetting_applies_to_merged_output() {
    let symbol = NormalizedSymbol::normalize("2330");
    let price = Arc::new(CountingPriceSource::new([CountingPriceSource::with_table(
        &symbol,
        price_table(&[(date!(2025 - 01 - 02), 1_100.0, 20_000_000)]),
    )]));
    let supplement = Arc::new(StaticSupplementSource::new().with_series(
        SupplementKind::InstitutionalFlows,
        "2330",
        supplement_table("foreign_net", &[(date!(2025 - 01 - 02), 5_000_000)]),
    ));
    let pipeline = Pipeline::new(price, supplement, LicensePolicy::default());

    let request = merge_request(&["2330"]).with_columns(vec![
        String::from("Close"),
        String::from("inst_foreign_net"),
        String::from("NotAColumn"),
    ]);
    let run = pipeline.run(&request, TODAY).await.expect("run succeeds");
    let SymbolResultKind::Fetched { table, .. } = &run.results[0].kind else {
        panic!("expected fetched result");
    };
    assert_eq!(
        table.columns(),
        [String::from("Close"), String::from("inst_foreign_net")]
    );
}

#[tokio::test]
async fn merge_onto_the_statistics_provider_is_rejected() {
    let pipeline = Pipeline::new(
        Arc::new(CountingPriceSource::new([])),
        Arc::new(StaticSupplementSource::new()),
        LicensePolicy::default(),
    );
    let request = FetchRequest::new(
        vec![String::from("2330")],
        date!(2025 - 01 - 01),
        None,
        Interval::OneDay,
        ProviderId::SupplementaryExchange,
        IntendedUse::PrivateResearch,
    )
    .expect("valid request")
    .with_merge(true);

    let error = pipeline.run(&request, TODAY).await.expect_err("rejected");
    assert_eq!(
        error.to_string(),
        "provider 'supplementary-exchange' does not produce a price series to merge onto"
    );
}
