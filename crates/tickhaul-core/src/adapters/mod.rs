pub mod twse;
pub mod yahoo;

pub use twse::TwseAdapter;
pub use yahoo::YahooChartAdapter;
