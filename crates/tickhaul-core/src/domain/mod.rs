pub mod date_range;
pub mod interval;
pub mod symbol;
pub mod table;

pub use date_range::{format_compact, parse_date, ResolvedRange};
pub use interval::Interval;
pub use symbol::{normalize_symbols, NormalizationRule, NormalizedSymbol};
pub use table::{Cell, DataTable, PriceSeries, DATE_COLUMN};
