use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::data_source::{
    FetchOptions, PriceSource, ProviderId, RangeSemantics, SeriesOutcome, SourceError,
    SymbolOutcome,
};
use crate::domain::{Cell, DataTable, Interval, NormalizedSymbol, PriceSeries, ResolvedRange};
use crate::http_client::{HttpClient, HttpRequest};

const CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// OHLCV column order produced by the adapter.
pub const PRICE_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];
const ADJ_CLOSE_COLUMN: &str = "Adj Close";

/// A close more than this many times the series median is treated as a
/// 100x currency/unit mixup by the repair heuristic.
const REPAIR_THRESHOLD: f64 = 75.0;

/// Primary OHLCV provider over the Yahoo Finance v8 chart API. The chart
/// query takes unix-second `period1`/`period2` bounds with an exclusive
/// end, so the adapter reports end-exclusive range semantics.
pub struct YahooChartAdapter {
    http: Arc<dyn HttpClient>,
}

impl YahooChartAdapter {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    async fn fetch_symbol(
        &self,
        symbol: &NormalizedSymbol,
        range: ResolvedRange,
        interval: Interval,
        options: FetchOptions,
    ) -> SeriesOutcome {
        let url = format!(
            "{CHART_BASE}/{}?period1={}&period2={}&interval={}&events=div%7Csplit&includeAdjustedClose=true",
            urlencoding::encode(symbol.qualified()),
            unix_seconds(range.query_start()),
            unix_seconds(range.query_end()),
            interval
        );
        let request = HttpRequest::get(&url).with_header("user-agent", BROWSER_USER_AGENT);

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                return SeriesOutcome::Failed(SourceError::transport(format!(
                    "chart transport error: {}",
                    error.message()
                )))
            }
        };

        match response.status {
            // Unknown tickers surface as a 404 chart error, not a failure.
            404 => return SeriesOutcome::Empty,
            401 | 403 => {
                return SeriesOutcome::Failed(SourceError::auth(format!(
                    "chart endpoint returned status {}",
                    response.status
                )))
            }
            429 => {
                return SeriesOutcome::Failed(SourceError::rate_limited(
                    "chart endpoint returned status 429",
                ))
            }
            status if !(200..300).contains(&status) => {
                return SeriesOutcome::Failed(SourceError::transport(format!(
                    "chart endpoint returned status {status}"
                )))
            }
            _ => {}
        }

        parse_chart(&response.body, symbol, options)
    }
}

impl PriceSource for YahooChartAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Primary
    }

    fn range_semantics(&self) -> RangeSemantics {
        RangeSemantics::EndExclusive
    }

    fn fetch_history<'a>(
        &'a self,
        symbols: &'a [NormalizedSymbol],
        range: ResolvedRange,
        interval: Interval,
        options: FetchOptions,
    ) -> Pin<Box<dyn Future<Output = Vec<SymbolOutcome>> + Send + 'a>> {
        Box::pin(async move {
            // One request per symbol, issued concurrently; join_all keeps
            // input order so downstream stages see a stable mapping.
            let fetches = symbols
                .iter()
                .map(|symbol| self.fetch_symbol(symbol, range, interval, options));
            let outcomes = join_all(fetches).await;
            symbols
                .iter()
                .cloned()
                .zip(outcomes)
                .map(|(symbol, outcome)| SymbolOutcome { symbol, outcome })
                .collect()
        })
    }
}

fn parse_chart(body: &str, symbol: &NormalizedSymbol, options: FetchOptions) -> SeriesOutcome {
    let parsed: ChartResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            return SeriesOutcome::Failed(SourceError::malformed_response(format!(
                "chart payload: {error}"
            )))
        }
    };

    if let Some(error) = parsed.chart.error {
        if error.code == "Not Found" {
            return SeriesOutcome::Empty;
        }
        return SeriesOutcome::Failed(SourceError::transport(format!(
            "chart error {}: {}",
            error.code, error.description
        )));
    }

    let Some(result) = parsed
        .chart
        .result
        .and_then(|mut results| (!results.is_empty()).then(|| results.remove(0)))
    else {
        return SeriesOutcome::Empty;
    };
    // A holiday-only window comes back without a timestamp array.
    let Some(timestamps) = result.timestamp else {
        return SeriesOutcome::Empty;
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return SeriesOutcome::Empty;
    };
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|mut blocks| (!blocks.is_empty()).then(|| blocks.remove(0).adjclose));

    let with_adj_column = !options.auto_adjust && adjclose.is_some();
    let mut columns = PRICE_COLUMNS
        .iter()
        .map(|column| (*column).to_owned())
        .collect::<Vec<_>>();
    if with_adj_column {
        columns.push(ADJ_CLOSE_COLUMN.to_owned());
    }
    let mut table = DataTable::new(columns);

    for (index, ts) in timestamps.iter().enumerate() {
        // Rows with no OHLC values are non-trading placeholders; skip them.
        let (Some(open), Some(high), Some(low), Some(close)) = (
            value_at(&quote.open, index),
            value_at(&quote.high, index),
            value_at(&quote.low, index),
            value_at(&quote.close, index),
        ) else {
            continue;
        };
        let Some(date) = date_from_unix(*ts) else {
            continue;
        };

        let adj = adjclose
            .as_ref()
            .and_then(|values| value_at(values, index));
        let factor = if options.auto_adjust {
            adj.map(|adj| adj / close)
                .filter(|factor| factor.is_finite() && *factor > 0.0)
                .unwrap_or(1.0)
        } else {
            1.0
        };

        let volume = quote
            .volume
            .get(index)
            .copied()
            .flatten()
            .map(Cell::Int)
            .unwrap_or(Cell::Null);

        let mut cells = vec![
            Cell::Float(open * factor),
            Cell::Float(high * factor),
            Cell::Float(low * factor),
            Cell::Float(close * factor),
            volume,
        ];
        if with_adj_column {
            cells.push(adj.map(Cell::Float).unwrap_or(Cell::Null));
        }
        table.insert_row(date, cells);
    }

    if table.is_empty() {
        return SeriesOutcome::Empty;
    }
    let table = if options.repair {
        repair_unit_mixups(table)
    } else {
        table
    };
    SeriesOutcome::Series(PriceSeries {
        symbol: symbol.clone(),
        table,
    })
}

/// Divides isolated 100x rows back into the series' unit. A row is repaired
/// when its close exceeds [`REPAIR_THRESHOLD`] times the median close.
fn repair_unit_mixups(table: DataTable) -> DataTable {
    let Some(close_index) = table.column_index("Close") else {
        return table;
    };
    let mut closes = table
        .rows()
        .iter()
        .filter_map(|(_, cells)| cells[close_index].as_f64())
        .collect::<Vec<_>>();
    if closes.is_empty() {
        return table;
    }
    closes.sort_by(|a, b| a.total_cmp(b));
    let median = closes[closes.len() / 2];
    if median <= 0.0 {
        return table;
    }

    let price_indices = PRICE_COLUMNS
        .iter()
        .chain(std::iter::once(&ADJ_CLOSE_COLUMN))
        .filter(|column| **column != "Volume")
        .filter_map(|column| table.column_index(column))
        .collect::<Vec<_>>();

    let mut repaired = DataTable::new(table.columns().to_vec());
    for (date, cells) in table.rows() {
        let mixup = cells[close_index]
            .as_f64()
            .is_some_and(|close| close > REPAIR_THRESHOLD * median);
        let mut row = cells.clone();
        if mixup {
            for &index in &price_indices {
                if let Cell::Float(value) = row[index] {
                    row[index] = Cell::Float(value / 100.0);
                }
            }
        }
        repaired.insert_row(*date, row);
    }
    repaired
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

fn unix_seconds(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

fn date_from_unix(ts: i64) -> Option<Date> {
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .map(OffsetDateTime::date)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}
