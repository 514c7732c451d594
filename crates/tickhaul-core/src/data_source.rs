use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{DataTable, Interval, NormalizedSymbol, PriceSeries, ResolvedRange};
use crate::error::ValidationError;

/// Data provider identifiers. String forms are part of the CLI contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    Primary,
    SupplementaryExchange,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::SupplementaryExchange => "supplementary-exchange",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "supplementary-exchange" => Ok(Self::SupplementaryExchange),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// How a provider's native range query treats the end date. The date range
/// resolver asks the adapter for this instead of branching on provider name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSemantics {
    EndExclusive,
    EndInclusive,
}

/// Price-adapter options. The statistics adapter has no equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Scale OHLC by the adjusted close and drop the `Adj Close` column.
    pub auto_adjust: bool,
    /// Apply the heuristic 100x unit-mixup correction.
    pub repair: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            auto_adjust: true,
            repair: false,
        }
    }
}

/// Supplementary exchange-report datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupplementKind {
    InstitutionalFlows,
    DayTrading,
}

impl SupplementKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstitutionalFlows => "institutional-flows",
            Self::DayTrading => "day-trading",
        }
    }

    /// Short identifier used to namespace merged columns.
    pub const fn short_id(self) -> &'static str {
        match self {
            Self::InstitutionalFlows => "inst",
            Self::DayTrading => "dt",
        }
    }
}

impl Display for SupplementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter-level error classification. A per-symbol empty result is not an
/// error and never reaches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Transport,
    Auth,
    MalformedResponse,
    RateLimited,
    InvalidRequest,
}

/// Structured provider failure recorded per symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Auth,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::MalformedResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::Auth => "source.auth",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Per-symbol fetch result for the price provider. One symbol's failure
/// never aborts its batch siblings.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesOutcome {
    Series(PriceSeries),
    Empty,
    Failed(SourceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub symbol: NormalizedSymbol,
    pub outcome: SeriesOutcome,
}

/// Per-symbol ordered series of exchange-report rows, same date-key
/// discipline as a price series.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplementSeries {
    pub kind: SupplementKind,
    pub table: DataTable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SupplementOutcome {
    Series(SupplementSeries),
    Empty,
    Failed(SourceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplementSymbolOutcome {
    pub symbol: NormalizedSymbol,
    pub outcome: SupplementOutcome,
}

/// Primary OHLCV provider contract. Batches are reduced back to input
/// symbol order before any downstream stage observes them.
pub trait PriceSource: Send + Sync {
    fn id(&self) -> ProviderId;
    fn range_semantics(&self) -> RangeSemantics;
    fn fetch_history<'a>(
        &'a self,
        symbols: &'a [NormalizedSymbol],
        range: ResolvedRange,
        interval: Interval,
        options: FetchOptions,
    ) -> Pin<Box<dyn Future<Output = Vec<SymbolOutcome>> + Send + 'a>>;
}

/// Supplementary exchange-statistics provider contract.
pub trait SupplementSource: Send + Sync {
    fn id(&self) -> ProviderId;
    fn range_semantics(&self) -> RangeSemantics;
    fn fetch_supplement<'a>(
        &'a self,
        kind: SupplementKind,
        symbols: &'a [NormalizedSymbol],
        range: ResolvedRange,
    ) -> Pin<Box<dyn Future<Output = Vec<SupplementSymbolOutcome>> + Send + 'a>>;
}
