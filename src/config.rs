// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::check::consistency::Tolerances;
use crate::group::BoundaryRule;
use crate::load::UnreadablePolicy;
use crate::normalize::{
    columns::{merge_columns, SMSA_NAME},
    default_columns, ColumnSpec, NormalizeRules, DEFAULT_MISSING_SENTINELS,
    DEFAULT_ZERO_PLACEHOLDERS,
};

pub const FIRST_YEAR: u16 = 1967;
pub const LAST_YEAR: u16 = 1979;

/// Pipeline settings, read from YAML. Every field has a default so an empty
/// file (or no file) gives the standard BPS layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root holding one directory of page JSON files per year.
    pub raw_dir: PathBuf,
    pub out_dir: PathBuf,
    pub years: Vec<u16>,
    /// Record field holding the geography name.
    pub name_field: String,
    pub columns: Vec<ColumnSpec>,
    pub zero_placeholders: Vec<String>,
    pub missing_sentinels: Vec<String>,
    pub boundary_rule: BoundaryRule,
    pub on_unreadable: UnreadablePolicy,
    pub tolerance: Tolerances,
    /// Per-year departures from the defaults above.
    pub overrides: BTreeMap<u16, YearOverride>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct YearOverride {
    pub boundary_rule: Option<BoundaryRule>,
    pub extra_zero_placeholders: Vec<String>,
    pub columns: Option<Vec<ColumnSpec>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("raw_ocr"),
            out_dir: PathBuf::from("panel"),
            years: (FIRST_YEAR..=LAST_YEAR).collect(),
            name_field: SMSA_NAME.to_string(),
            columns: default_columns(),
            zero_placeholders: DEFAULT_ZERO_PLACEHOLDERS.iter().map(|s| s.to_string()).collect(),
            missing_sentinels: DEFAULT_MISSING_SENTINELS.iter().map(|s| s.to_string()).collect(),
            boundary_rule: BoundaryRule::default(),
            on_unreadable: UnreadablePolicy::default(),
            tolerance: Tolerances::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_yaml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), years = cfg.years.len(), "config loaded");
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load `path` if given, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Resolve the settings that apply to one year.
    pub fn year(&self, year: u16) -> YearSettings {
        let over = self.overrides.get(&year);
        let rules = NormalizeRules::new(&self.zero_placeholders, &self.missing_sentinels)
            .with_zero_placeholders(over.map(|o| o.extra_zero_placeholders.as_slice()).unwrap_or(&[]));
        YearSettings {
            year,
            name_field: self.name_field.clone(),
            columns: over
                .and_then(|o| o.columns.clone())
                .unwrap_or_else(|| self.columns.clone()),
            rules,
            boundary_rule: over
                .and_then(|o| o.boundary_rule)
                .unwrap_or(self.boundary_rule),
            on_unreadable: self.on_unreadable,
            tolerance: self.tolerance,
        }
    }

    /// Every column any year may carry, in a stable order for flat outputs.
    pub fn all_columns(&self) -> Vec<ColumnSpec> {
        let mut layouts: Vec<&[ColumnSpec]> = vec![self.columns.as_slice()];
        layouts.extend(
            self.overrides
                .values()
                .filter_map(|o| o.columns.as_deref()),
        );
        merge_columns(layouts)
    }
}

/// Settings for one year, after overrides are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct YearSettings {
    pub year: u16,
    pub name_field: String,
    pub columns: Vec<ColumnSpec>,
    pub rules: NormalizeRules,
    pub boundary_rule: BoundaryRule,
    pub on_unreadable: UnreadablePolicy,
    pub tolerance: Tolerances,
}

impl YearSettings {
    pub fn standard(year: u16) -> Self {
        PipelineConfig::default().year(year)
    }
}
