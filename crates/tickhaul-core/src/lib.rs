//! Core contracts for tickhaul.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Licensing policy and the pre-fetch gate
//! - Provider traits and the Yahoo/TWSE adapters
//! - The merge engine, summarizer, and fetch pipeline

pub mod adapters;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod license;
pub mod merge;
pub mod pipeline;
pub mod summary;
pub mod throttling;

pub use adapters::{TwseAdapter, YahooChartAdapter};
pub use data_source::{
    FetchOptions, PriceSource, ProviderId, RangeSemantics, SeriesOutcome, SourceError,
    SourceErrorKind, SupplementKind, SupplementOutcome, SupplementSeries, SupplementSource,
    SupplementSymbolOutcome, SymbolOutcome,
};
pub use domain::{
    format_compact, normalize_symbols, parse_date, Cell, DataTable, Interval, NormalizationRule,
    NormalizedSymbol, PriceSeries, ResolvedRange, DATE_COLUMN,
};
pub use error::{PipelineError, ValidationError};
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use license::{IntendedUse, LicenseDecision, LicenseDenial, LicensePolicy};
pub use merge::{combine_supplements, merge, MergeReport, MergedDataset};
pub use pipeline::{
    FetchRequest, Pipeline, PipelineRun, RunFailure, RunSummary, SymbolResult, SymbolResultKind,
};
pub use summary::{summarize, DatasetSummary};
pub use throttling::RequestPacer;
