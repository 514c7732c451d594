use thiserror::Error;
use time::Date;

use crate::data_source::ProviderId;
use crate::license::LicenseDenial;

/// Request validation errors. These always abort the run before any I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol set cannot be empty")]
    EmptySymbolSet,

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: Date, end: Date },

    #[error("invalid interval '{value}', expected one of 1m, 2m, 5m, 15m, 30m, 60m, 90m, 1h, 1d, 5d, 1wk, 1mo, 3mo")]
    InvalidInterval { value: String },

    #[error("invalid provider '{value}', expected one of primary, supplementary-exchange")]
    InvalidProvider { value: String },

    #[error("invalid intended use '{value}', expected one of private_research, redistribute, commercial")]
    InvalidIntendedUse { value: String },

    #[error("provider '{provider}' does not produce a price series to merge onto")]
    MergeUnavailable { provider: ProviderId },
}

/// Fatal pipeline failures. Per-symbol provider errors are not represented
/// here; they accumulate in the run summary instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    License(#[from] LicenseDenial),
}
