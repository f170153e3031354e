use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::normalize::normalize;

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Composite key `(work_name, spec, unit)`. Fields are always normalized;
/// equality is exact string equality after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LineItemKey {
    pub work_name: String,
    pub spec: String,
    pub unit: String,
}

impl LineItemKey {
    pub fn new(work_name: &str, spec: &str, unit: &str) -> Self {
        Self {
            work_name: normalize(work_name),
            spec: normalize(spec),
            unit: normalize(unit),
        }
    }
}

impl std::fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {} | {}", self.work_name, self.spec, self.unit)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One quantity entry extracted from a plan sheet.
#[derive(Debug, Clone)]
pub struct PlanRow {
    pub key: LineItemKey,
    pub qty: BigDecimal,
    pub source_file: String,
    /// 1-based page number; 0 when the extractor did not report one.
    pub page: u32,
}

/// One row of the master summary table (L-003).
#[derive(Debug, Clone)]
pub struct MasterRow {
    pub key: LineItemKey,
    /// None when the cell was blank or non-numeric.
    pub total_qty: Option<BigDecimal>,
    pub recognized_qty: Option<BigDecimal>,
    pub remark: String,
    pub source_file: String,
    pub page: u32,
}

/// Master rows indexed by key, one row per key.
pub type MasterTable = BTreeMap<LineItemKey, MasterRow>;

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Plan-sheet rows sharing one key, summed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPlan {
    pub total_qty: BigDecimal,
    pub row_count: usize,
    pub sources: BTreeSet<String>,
    pub pages: BTreeSet<u32>,
}

// ---------------------------------------------------------------------------
// Stage 2: totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconStatus {
    Ok,
    Mismatch,
    OnlyInMaster,
    OnlyInPlans,
}

impl std::fmt::Display for ReconStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Mismatch => write!(f, "MISMATCH"),
            Self::OnlyInMaster => write!(f, "ONLY_IN_MASTER"),
            Self::OnlyInPlans => write!(f, "ONLY_IN_PLANS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledItem {
    pub key: LineItemKey,
    pub master_total_qty: Option<BigDecimal>,
    pub plan_total_qty: Option<BigDecimal>,
    /// `plan − master`; None unless both totals exist.
    pub diff: Option<BigDecimal>,
    pub status: ReconStatus,
    pub plan_sources: BTreeSet<String>,
    pub plan_pages: BTreeSet<u32>,
}

// ---------------------------------------------------------------------------
// Stage 3: recognized quantity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecognizedStatus {
    Ok,
    Mismatch,
    Excluded,
    RuleNotFound,
    TreeCandidate,
}

impl std::fmt::Display for RecognizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Mismatch => write!(f, "MISMATCH"),
            Self::Excluded => write!(f, "EXCLUDED"),
            Self::RuleNotFound => write!(f, "RULE_NOT_FOUND"),
            Self::TreeCandidate => write!(f, "TREE_CANDIDATE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedItem {
    pub key: LineItemKey,
    pub actual_qty: BigDecimal,
    pub factor: Option<u32>,
    pub expected_recognized_qty: Option<BigDecimal>,
    pub recognized_qty_in_master: Option<BigDecimal>,
    /// `expected − recognized_in_master`; None unless both exist.
    pub diff: Option<BigDecimal>,
    pub status: RecognizedStatus,
    pub remark: String,
    pub sources: BTreeSet<String>,
    pub pages: BTreeSet<u32>,
}

/// One line of the per-row rule trace written next to the Stage-3 report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleLogEntry {
    pub index: usize,
    pub key: LineItemKey,
    pub status: RecognizedStatus,
    pub rule_note: String,
    pub remark: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub tolerance: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TotalsSummary {
    pub total_items: usize,
    pub ok: usize,
    pub mismatches: usize,
    pub only_in_master: usize,
    pub only_in_plans: usize,
    pub plan_rows: usize,
    pub master_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalsResult {
    pub meta: RunMeta,
    pub summary: TotalsSummary,
    pub items: Vec<ReconciledItem>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecognizedSummary {
    pub total_items: usize,
    pub status_counts: BTreeMap<RecognizedStatus, usize>,
    pub factor_counts: BTreeMap<u32, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecognizedResult {
    pub meta: RunMeta,
    pub summary: RecognizedSummary,
    pub items: Vec<RecognizedItem>,
    pub rule_log: Vec<RuleLogEntry>,
}
