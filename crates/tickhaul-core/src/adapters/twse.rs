use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::{Date, Weekday};
use tracing::warn;

use crate::data_source::{
    ProviderId, RangeSemantics, SourceError, SupplementKind, SupplementOutcome, SupplementSeries,
    SupplementSource, SupplementSymbolOutcome,
};
use crate::domain::{format_compact, Cell, DataTable, NormalizedSymbol, ResolvedRange};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::RequestPacer;

const TWSE_BASE: &str = "https://www.twse.com.tw";
/// Institutional investors by stock.
const ENDPOINT_T86: &str = "/rwd/zh/fund/T86";
/// Objects for day trading daily report.
const ENDPOINT_DAYTRADE: &str = "/exchangeReport/TWTB4U";

const CODE_FIELD: &str = "證券代號";

/// T86 report fields in output order, exchange header to column name.
const T86_FIELDS: [(&str, &str); 16] = [
    ("外資及陸資(不含外資自營商)買進股數", "foreign_buy"),
    ("外資及陸資(不含外資自營商)賣出股數", "foreign_sell"),
    ("外資及陸資(不含外資自營商)買賣超股數", "foreign_net"),
    ("外資自營商買進股數", "foreign_dealer_buy"),
    ("外資自營商賣出股數", "foreign_dealer_sell"),
    ("外資自營商買賣超股數", "foreign_dealer_net"),
    ("投信買進股數", "it_buy"),
    ("投信賣出股數", "it_sell"),
    ("投信買賣超股數", "it_net"),
    ("自營商買進股數(自行買賣)", "dealer_self_buy"),
    ("自營商賣出股數(自行買賣)", "dealer_self_sell"),
    ("自營商買賣超股數(自行買賣)", "dealer_self_net"),
    ("自營商買進股數(避險)", "dealer_hedge_buy"),
    ("自營商賣出股數(避險)", "dealer_hedge_sell"),
    ("自營商買賣超股數(避險)", "dealer_hedge_net"),
    ("三大法人買賣超股數", "three_investors_net"),
];

/// TWTB4U volume fields in output order.
const DAYTRADE_FIELDS: [(&str, &str); 4] = [
    ("當日沖銷交易成交股數", "daytrade_volume"),
    ("當日沖銷交易買進成交股數", "daytrade_buy_volume"),
    ("當日沖銷交易賣出成交股數", "daytrade_sell_volume"),
    ("全部成交股數", "total_volume"),
];
const DAYTRADE_RATIO_FIELD: &str = "當日沖銷比率(%)";
const DAYTRADE_RATIO_COLUMN: &str = "daytrade_ratio";

/// Supplementary provider over TWSE exchange reports. One request per
/// calendar date over the inclusive range; the reports are natively
/// end-inclusive. Each per-date response covers all listed stocks and is
/// filtered down to the requested symbols by exchange code.
pub struct TwseAdapter {
    http: Arc<dyn HttpClient>,
    pacer: RequestPacer,
}

impl TwseAdapter {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        // TWSE tolerates a gentle request rate; roughly one request per
        // second keeps multi-month ranges under its informal limits.
        Self::with_pacer(http, RequestPacer::new(Duration::from_secs(5), 5))
    }

    pub fn with_pacer(http: Arc<dyn HttpClient>, pacer: RequestPacer) -> Self {
        Self { http, pacer }
    }

    async fn fetch_report(
        &self,
        kind: SupplementKind,
        date: Date,
    ) -> Result<Option<DailyReport>, SourceError> {
        match kind {
            SupplementKind::InstitutionalFlows => {
                let url = format!(
                    "{TWSE_BASE}{ENDPOINT_T86}?date={}&selectType=ALL&response=json",
                    format_compact(date)
                );
                self.fetch_json_report(&url).await
            }
            SupplementKind::DayTrading => self.fetch_daytrade_report(date).await,
        }
    }

    /// Day-trading strategy: try the JSON endpoint first and fall back to
    /// the open_data CSV form when JSON fails or comes back empty.
    async fn fetch_daytrade_report(&self, date: Date) -> Result<Option<DailyReport>, SourceError> {
        let json_url = format!(
            "{TWSE_BASE}{ENDPOINT_DAYTRADE}?date={}&response=json",
            format_compact(date)
        );
        match self.fetch_json_report(&json_url).await {
            Ok(Some(report)) => Ok(Some(report)),
            json_result => {
                let csv_url = format!(
                    "{TWSE_BASE}{ENDPOINT_DAYTRADE}?response=open_data&date={}",
                    format_compact(date)
                );
                match self.fetch_csv_report(&csv_url).await {
                    Ok(report) => Ok(report),
                    Err(csv_error) => {
                        warn!(date = %date, error = %csv_error, "day-trading CSV fallback failed");
                        // Surface the original JSON failure when there was one.
                        json_result
                    }
                }
            }
        }
    }

    async fn fetch_json_report(&self, url: &str) -> Result<Option<DailyReport>, SourceError> {
        let body = self.execute(url).await?;
        let parsed: TwseJsonReport = serde_json::from_str(&body)
            .map_err(|error| SourceError::malformed_response(format!("report payload: {error}")))?;

        // stat != "OK" marks a date with no published report (holiday or
        // not-yet-published), not a failure.
        if parsed.stat.as_deref() != Some("OK") {
            return Ok(None);
        }
        if parsed.data.is_empty() {
            return Ok(None);
        }
        Ok(Some(DailyReport {
            fields: parsed.fields,
            data: parsed
                .data
                .into_iter()
                .map(|row| row.into_iter().map(json_value_to_string).collect())
                .collect(),
        }))
    }

    async fn fetch_csv_report(&self, url: &str) -> Result<Option<DailyReport>, SourceError> {
        let body = self.execute(url).await?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(body.as_bytes());
        let fields = reader
            .headers()
            .map_err(|error| SourceError::malformed_response(format!("report csv: {error}")))?
            .iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        let mut data = Vec::new();
        for record in reader.records() {
            let record = record
                .map_err(|error| SourceError::malformed_response(format!("report csv: {error}")))?;
            data.push(record.iter().map(str::to_owned).collect());
        }
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(DailyReport { fields, data }))
    }

    async fn execute(&self, url: &str) -> Result<String, SourceError> {
        self.pacer.acquire().await;
        let response = self
            .http
            .execute(HttpRequest::get(url))
            .await
            .map_err(|error| {
                SourceError::transport(format!("exchange report transport error: {}", error.message()))
            })?;
        match response.status {
            status if (200..300).contains(&status) => Ok(response.body),
            401 | 403 => Err(SourceError::auth(format!(
                "exchange report endpoint returned status {}",
                response.status
            ))),
            429 => Err(SourceError::rate_limited(
                "exchange report endpoint returned status 429",
            )),
            status => Err(SourceError::transport(format!(
                "exchange report endpoint returned status {status}"
            ))),
        }
    }
}

impl SupplementSource for TwseAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::SupplementaryExchange
    }

    fn range_semantics(&self) -> RangeSemantics {
        RangeSemantics::EndInclusive
    }

    fn fetch_supplement<'a>(
        &'a self,
        kind: SupplementKind,
        symbols: &'a [NormalizedSymbol],
        range: ResolvedRange,
    ) -> Pin<Box<dyn Future<Output = Vec<SupplementSymbolOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let columns = output_columns(kind);
            let mut per_symbol: Vec<BTreeMap<Date, Vec<Cell>>> =
                vec![BTreeMap::new(); symbols.len()];
            let mut attempted = 0_usize;
            let mut hard_failures = 0_usize;
            let mut last_error: Option<SourceError> = None;

            for date in range.calendar_days() {
                // The exchange publishes nothing on weekends; skip without
                // a request.
                if matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday) {
                    continue;
                }
                attempted += 1;

                match self.fetch_report(kind, date).await {
                    Ok(Some(report)) => {
                        distribute_report(&report, kind, date, symbols, &mut per_symbol);
                    }
                    Ok(None) => {
                        warn!(date = %date, kind = %kind, "no exchange report for date");
                    }
                    Err(error) => {
                        warn!(date = %date, kind = %kind, error = %error, "exchange report request failed");
                        hard_failures += 1;
                        last_error = Some(error);
                    }
                }
            }

            // When every attempted date failed hard the whole batch is a
            // provider failure; scattered per-date failures degrade to
            // missing rows.
            if attempted > 0 && hard_failures == attempted {
                let error = last_error
                    .unwrap_or_else(|| SourceError::transport("all exchange report requests failed"));
                return symbols
                    .iter()
                    .cloned()
                    .map(|symbol| SupplementSymbolOutcome {
                        symbol,
                        outcome: SupplementOutcome::Failed(error.clone()),
                    })
                    .collect();
            }

            symbols
                .iter()
                .cloned()
                .zip(per_symbol)
                .map(|(symbol, rows)| {
                    let outcome = if rows.is_empty() {
                        SupplementOutcome::Empty
                    } else {
                        let mut table = DataTable::new(columns.clone());
                        for (date, cells) in rows {
                            table.insert_row(date, cells);
                        }
                        SupplementOutcome::Series(SupplementSeries { kind, table })
                    };
                    SupplementSymbolOutcome { symbol, outcome }
                })
                .collect()
        })
    }
}

/// Column names produced for a supplement kind, in fixed output order.
pub fn output_columns(kind: SupplementKind) -> Vec<String> {
    match kind {
        SupplementKind::InstitutionalFlows => T86_FIELDS
            .iter()
            .map(|(_, column)| (*column).to_owned())
            .collect(),
        SupplementKind::DayTrading => DAYTRADE_FIELDS
            .iter()
            .map(|(_, column)| (*column).to_owned())
            .chain(std::iter::once(DAYTRADE_RATIO_COLUMN.to_owned()))
            .collect(),
    }
}

fn distribute_report(
    report: &DailyReport,
    kind: SupplementKind,
    date: Date,
    symbols: &[NormalizedSymbol],
    per_symbol: &mut [BTreeMap<Date, Vec<Cell>>],
) {
    let Some(code_index) = report.field_index(CODE_FIELD) else {
        warn!(date = %date, kind = %kind, "exchange report has no code field");
        return;
    };

    for row in &report.data {
        let Some(code) = row.get(code_index) else {
            continue;
        };
        let code = code.trim();
        for (symbol_index, symbol) in symbols.iter().enumerate() {
            if symbol.exchange_code() != code {
                continue;
            }
            let cells = extract_cells(report, row, kind);
            per_symbol[symbol_index].entry(date).or_insert(cells);
        }
    }
}

fn extract_cells(report: &DailyReport, row: &[String], kind: SupplementKind) -> Vec<Cell> {
    match kind {
        SupplementKind::InstitutionalFlows => T86_FIELDS
            .iter()
            .map(|(field, _)| lookup(report, row, field).map_or(Cell::Null, parse_int_cell))
            .collect(),
        SupplementKind::DayTrading => DAYTRADE_FIELDS
            .iter()
            .map(|(field, _)| lookup(report, row, field).map_or(Cell::Null, parse_int_cell))
            .chain(std::iter::once(
                lookup(report, row, DAYTRADE_RATIO_FIELD).map_or(Cell::Null, parse_ratio_cell),
            ))
            .collect(),
    }
}

fn lookup<'a>(report: &DailyReport, row: &'a [String], field: &str) -> Option<&'a str> {
    report
        .field_index(field)
        .and_then(|index| row.get(index))
        .map(String::as_str)
}

/// Parses a share count with thousands separators.
fn parse_int_cell(raw: &str) -> Cell {
    raw.replace(',', "")
        .trim()
        .parse::<i64>()
        .map_or(Cell::Null, Cell::Int)
}

/// Parses a percentage ratio into its fractional form.
fn parse_ratio_cell(raw: &str) -> Cell {
    raw.replace(',', "")
        .replace('%', "")
        .trim()
        .parse::<f64>()
        .map_or(Cell::Null, |value| Cell::Float(value / 100.0))
}

fn json_value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

struct DailyReport {
    fields: Vec<String>,
    data: Vec<Vec<String>>,
}

impl DailyReport {
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field == name)
    }
}

#[derive(Debug, Deserialize)]
struct TwseJsonReport {
    #[serde(default)]
    stat: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}
