use serde::Deserialize;

use crate::error::ReconError;
use crate::quantity::{Tolerance, DEFAULT_TOLERANCE};
use crate::tree::KeywordTreePredicate;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QtyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub master: MasterConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "quantity check".into()
}

impl Default for QtyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            tolerance: ToleranceConfig::default(),
            master: MasterConfig::default(),
            tree: TreeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

/// Absolute tolerance as an exact decimal string, applied to both stages.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToleranceConfig {
    #[serde(default = "default_tolerance")]
    pub quantity: String,
}

fn default_tolerance() -> String {
    DEFAULT_TOLERANCE.into()
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            quantity: default_tolerance(),
        }
    }
}

// ---------------------------------------------------------------------------
// Master table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterConfig {
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
}

/// What to do when two master rows normalize to the same key.
/// Every policy logs a `DuplicateMasterKey` anomaly first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first row seen.
    #[default]
    KeepFirst,
    /// Sum totals and recognized quantities, join remarks.
    Sum,
    /// Fail the run.
    Reject,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepFirst => write!(f, "keep_first"),
            Self::Sum => write!(f, "sum"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tree candidates
// ---------------------------------------------------------------------------

/// Keywords for the default tree-candidate predicate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeConfig {
    #[serde(default = "default_work_name_keywords")]
    pub work_name_keywords: Vec<String>,
    #[serde(default = "default_spec_keywords")]
    pub spec_keywords: Vec<String>,
}

fn default_work_name_keywords() -> Vec<String> {
    ["교목", "수목", "식재", "관목"].iter().map(|s| s.to_string()).collect()
}

fn default_spec_keywords() -> Vec<String> {
    ["H", "R", "흉고", "근원"].iter().map(|s| s.to_string()).collect()
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            work_name_keywords: default_work_name_keywords(),
            spec_keywords: default_spec_keywords(),
        }
    }
}

impl TreeConfig {
    pub fn predicate(&self) -> KeywordTreePredicate {
        KeywordTreePredicate::new(self.work_name_keywords.clone(), self.spec_keywords.clone())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Report directory used when the CLI gets no `--outdir`.
    #[serde(default)]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl QtyConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: QtyConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.tolerance()?;

        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        let tree = &self.tree;
        if tree.work_name_keywords.is_empty() && tree.spec_keywords.is_empty() {
            return Err(ReconError::ConfigValidation(
                "tree: at least one work_name or spec keyword is required".into(),
            ));
        }
        if let Some(blank) = tree
            .work_name_keywords
            .iter()
            .chain(&tree.spec_keywords)
            .find(|k| k.trim().is_empty())
        {
            return Err(ReconError::ConfigValidation(format!(
                "tree: blank keyword {blank:?} would match every row"
            )));
        }

        Ok(())
    }

    pub fn tolerance(&self) -> Result<Tolerance, ReconError> {
        Tolerance::parse(&self.tolerance.quantity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
