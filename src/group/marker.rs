// src/group/marker.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static TOTAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bTOTALS?\b").expect("TOTAL marker pattern should be valid"));
static INSIDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bINSIDE\b").expect("INSIDE marker pattern should be valid"));
static OUTSIDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bOUTSIDE\b").expect("OUTSIDE marker pattern should be valid"));

/// What the geography text of a row says about table structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Subtotal line; its whole group is dropped.
    Total,
    /// "INSIDE CENTRAL CITY" line.
    Inside,
    /// "OUTSIDE CENTRAL CITY" line.
    Outside,
    Plain,
}

impl Marker {
    /// TOTAL wins over INSIDE, which wins over OUTSIDE.
    pub fn classify(name: &str) -> Self {
        if TOTAL_RE.is_match(name) {
            Marker::Total
        } else if INSIDE_RE.is_match(name) {
            Marker::Inside
        } else if OUTSIDE_RE.is_match(name) {
            Marker::Outside
        } else {
            Marker::Plain
        }
    }
}

/// Role of a row inside its metropolitan-area group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AreaSummary,
    InsideCentralCity,
    City,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AreaSummary => "area_summary",
            Role::InsideCentralCity => "inside_central_city",
            Role::City => "city",
        }
    }

    /// Position 0 of a group is always the summary; after that only the
    /// marker text matters.
    pub fn assign(first_in_group: bool, marker: Marker) -> Self {
        match (first_in_group, marker) {
            (true, _) => Role::AreaSummary,
            (false, Marker::Inside) => Role::InsideCentralCity,
            (false, _) => Role::City,
        }
    }
}
