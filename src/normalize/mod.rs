// src/normalize/mod.rs

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub mod columns;

pub use columns::{default_columns, ColumnSpec};

/// A normalized numeric cell. `Missing` is a suppressed or blank value and is
/// never the same thing as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Value(f64),
    Missing,
}

impl Cell {
    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            Cell::Missing => None,
        }
    }

    /// Value for summation, where missing components count as zero.
    pub fn or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // integral values print without a fractional part so they normalize back to themselves
            Cell::Value(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Cell::Value(v) => write!(f, "{}", v),
            Cell::Missing => f.write_str("NA"),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Value(_) => serializer.collect_str(self),
            Cell::Missing => serializer.serialize_none(),
        }
    }
}

/// How the digits of a column are parsed once the textual repairs are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[default]
    Integer,
    Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("malformed numeric token {raw:?}")]
    MalformedNumericToken { raw: String },
}

/// Token tables for the textual repairs. Tokens are stored whitespace-free and
/// upper-cased, the same shape a cell has after step 1 of normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeRules {
    zero_placeholders: Vec<String>,
    missing_sentinels: Vec<String>,
}

impl NormalizeRules {
    pub fn new<Z, M, S>(zero_placeholders: Z, missing_sentinels: M) -> Self
    where
        Z: IntoIterator<Item = S>,
        M: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canon = |s: S| strip_whitespace(s.as_ref()).to_uppercase();
        Self {
            zero_placeholders: zero_placeholders.into_iter().map(canon).collect(),
            missing_sentinels: missing_sentinels.into_iter().map(canon).collect(),
        }
    }

    /// Add year-specific blank placeholders, e.g. `*` in the one year that prints it.
    pub fn with_zero_placeholders<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in extra {
            let token = strip_whitespace(token.as_ref()).to_uppercase();
            if !self.zero_placeholders.contains(&token) {
                self.zero_placeholders.push(token);
            }
        }
        self
    }

    fn is_zero_placeholder(&self, token: &str) -> bool {
        self.zero_placeholders
            .iter()
            .any(|p| p.eq_ignore_ascii_case(token))
    }

    fn is_missing_sentinel(&self, token: &str) -> bool {
        self.missing_sentinels
            .iter()
            .any(|p| p.eq_ignore_ascii_case(token))
    }
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self::new(DEFAULT_ZERO_PLACEHOLDERS, DEFAULT_MISSING_SENTINELS)
    }
}

pub const DEFAULT_ZERO_PLACEHOLDERS: [&str; 4] = ["-", "--", "\u{2013}", "\u{2014}"];
pub const DEFAULT_MISSING_SENTINELS: [&str; 5] = ["(X)", "(NA)", "(D)", "(S)", "NA"];

/// Drop every whitespace character, including the ones OCR puts inside
/// thousands groups ("1 234").
pub fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalize one raw OCR cell.
///
/// 1) strip whitespace
/// 2) blank placeholders → `Value(0)` (a printed dash means "reported as zero")
/// 3) suppression sentinels and empty cells → `Missing`
/// 4) parse per column kind
pub fn normalize_cell(
    raw: &str,
    kind: ColumnKind,
    rules: &NormalizeRules,
) -> Result<Cell, NormalizeError> {
    let token = strip_whitespace(raw);

    if rules.is_zero_placeholder(&token) {
        return Ok(Cell::Value(0.0));
    }
    if token.is_empty() || rules.is_missing_sentinel(&token) {
        return Ok(Cell::Missing);
    }

    let parsed = match kind {
        ColumnKind::Integer => token.parse::<i64>().ok().map(|v| v as f64),
        ColumnKind::Decimal => token.parse::<f64>().ok().filter(|v| v.is_finite()),
    };

    parsed
        .map(Cell::Value)
        .ok_or_else(|| NormalizeError::MalformedNumericToken {
            raw: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> Result<Cell, NormalizeError> {
        normalize_cell(raw, ColumnKind::Integer, &NormalizeRules::default())
    }

    #[test]
    fn strips_internal_spaces() {
        assert_eq!(norm("1 234").unwrap(), Cell::Value(1234.0));
        assert_eq!(norm(" 15\t0 ").unwrap(), Cell::Value(150.0));
    }

    #[test]
    fn dash_is_zero_and_sentinel_is_missing() {
        let zero = norm("-").unwrap();
        let missing = norm("(X)").unwrap();
        assert_eq!(zero, Cell::Value(0.0));
        assert_eq!(missing, Cell::Missing);
        assert_ne!(zero, missing);
        assert_eq!(norm("( x )").unwrap(), Cell::Missing);
        assert_eq!(norm("").unwrap(), Cell::Missing);
    }

    #[test]
    fn asterisk_only_with_year_extra() {
        assert!(norm("*").is_err());
        let rules = NormalizeRules::default().with_zero_placeholders(["*"]);
        assert_eq!(
            normalize_cell("*", ColumnKind::Integer, &rules).unwrap(),
            Cell::Value(0.0)
        );
    }

    #[test]
    fn malformed_token_keeps_raw_text() {
        let err = norm("1O4").unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MalformedNumericToken {
                raw: "1O4".to_string()
            }
        );
        // integer columns refuse decimals, decimal columns take them
        assert!(norm("12.5").is_err());
        let rules = NormalizeRules::default();
        assert_eq!(
            normalize_cell("12.5", ColumnKind::Decimal, &rules).unwrap(),
            Cell::Value(12.5)
        );
        assert!(normalize_cell("NaN", ColumnKind::Decimal, &rules).is_err());
    }

    #[test]
    fn normalization_is_idempotent() {
        let rules = NormalizeRules::default();
        for raw in ["1 234", "-", "(X)", "0", "98765", "-12"] {
            let once = norm(raw).unwrap();
            let twice = normalize_cell(&once.to_string(), ColumnKind::Integer, &rules).unwrap();
            assert_eq!(once, twice, "raw {:?}", raw);
        }
        let once = normalize_cell("3.25", ColumnKind::Decimal, &rules).unwrap();
        let twice = normalize_cell(&once.to_string(), ColumnKind::Decimal, &rules).unwrap();
        assert_eq!(once, twice);
    }
}
