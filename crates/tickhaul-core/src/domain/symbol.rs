use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Exchange suffix appended to bare numeric tickers (Taiwan Stock Exchange).
pub const TW_SUFFIX: &str = ".TW";

/// Transformation applied when qualifying a raw ticker for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationRule {
    Identity,
    TwSuffix,
}

impl NormalizationRule {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::TwSuffix => "tw_suffix",
        }
    }
}

impl Display for NormalizationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw ticker paired with its provider-qualified form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSymbol {
    raw: String,
    qualified: String,
    rule: NormalizationRule,
}

impl NormalizedSymbol {
    /// Total mapping from a raw ticker to its provider-qualified form.
    /// Purely-numeric tickers gain the TWSE suffix; everything else passes
    /// through unchanged.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_numeric_ticker(trimmed) {
            Self {
                raw: trimmed.to_owned(),
                qualified: format!("{trimmed}{TW_SUFFIX}"),
                rule: NormalizationRule::TwSuffix,
            }
        } else {
            Self {
                raw: trimmed.to_owned(),
                qualified: trimmed.to_owned(),
                rule: NormalizationRule::Identity,
            }
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    pub const fn rule(&self) -> NormalizationRule {
        self.rule
    }

    /// The exchange-local code used to match rows in exchange reports.
    /// For suffixed symbols this is the bare numeric code.
    pub fn exchange_code(&self) -> &str {
        &self.raw
    }

    /// Transparency triple for reporting: (raw, qualified, rule applied).
    pub fn explain(&self) -> (&str, &str, NormalizationRule) {
        (&self.raw, &self.qualified, self.rule)
    }
}

impl Display for NormalizedSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified)
    }
}

fn is_numeric_ticker(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Batch normalization: trims whitespace, drops empty entries, and
/// de-duplicates by qualified form while preserving first-seen order.
pub fn normalize_symbols<I, S>(raw: I) -> Vec<NormalizedSymbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    let mut result = Vec::new();
    for entry in raw {
        let trimmed = entry.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let symbol = NormalizedSymbol::normalize(trimmed);
        if seen.insert(symbol.qualified().to_owned()) {
            result.push(symbol);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ticker_gains_tw_suffix() {
        let symbol = NormalizedSymbol::normalize("2330");
        assert_eq!(symbol.qualified(), "2330.TW");
        assert_eq!(symbol.rule(), NormalizationRule::TwSuffix);
        assert_eq!(symbol.exchange_code(), "2330");
    }

    #[test]
    fn alphabetic_ticker_passes_unchanged() {
        let symbol = NormalizedSymbol::normalize("AAPL");
        assert_eq!(symbol.qualified(), "AAPL");
        assert_eq!(symbol.rule(), NormalizationRule::Identity);
    }

    #[test]
    fn explain_returns_full_triple() {
        let symbol = NormalizedSymbol::normalize("  2330 ");
        let (raw, qualified, rule) = symbol.explain();
        assert_eq!(raw, "2330");
        assert_eq!(qualified, "2330.TW");
        assert_eq!(rule, NormalizationRule::TwSuffix);
    }

    #[test]
    fn batch_drops_duplicates_and_blanks_preserving_order() {
        let symbols = normalize_symbols(["2330", "AAPL", "", "  ", "2330"]);
        let qualified = symbols
            .iter()
            .map(NormalizedSymbol::qualified)
            .collect::<Vec<_>>();
        assert_eq!(qualified, vec!["2330.TW", "AAPL"]);
    }
}
