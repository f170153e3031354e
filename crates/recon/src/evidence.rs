use std::collections::BTreeMap;

use crate::model::{
    RecognizedItem, RecognizedStatus, RecognizedSummary, ReconStatus, ReconciledItem,
    TotalsSummary,
};

/// Compute Stage-2 summary statistics.
pub fn totals_summary(items: &[ReconciledItem], plan_rows: usize, master_rows: usize) -> TotalsSummary {
    let mut summary = TotalsSummary {
        total_items: items.len(),
        plan_rows,
        master_rows,
        ..TotalsSummary::default()
    };

    for item in items {
        match item.status {
            ReconStatus::Ok => summary.ok += 1,
            ReconStatus::Mismatch => summary.mismatches += 1,
            ReconStatus::OnlyInMaster => summary.only_in_master += 1,
            ReconStatus::OnlyInPlans => summary.only_in_plans += 1,
        }
    }

    summary
}

/// Compute Stage-3 summary statistics: counts per status and per factor.
pub fn recognized_summary(items: &[RecognizedItem]) -> RecognizedSummary {
    let mut status_counts: BTreeMap<RecognizedStatus, usize> = BTreeMap::new();
    let mut factor_counts: BTreeMap<u32, usize> = BTreeMap::new();

    for item in items {
        *status_counts.entry(item.status).or_insert(0) += 1;
        if let Some(factor) = item.factor {
            *factor_counts.entry(factor).or_insert(0) += 1;
        }
    }

    RecognizedSummary {
        total_items: items.len(),
        status_counts,
        factor_counts,
    }
}

impl TotalsSummary {
    /// Anything other than `OK`.
    pub fn has_findings(&self) -> bool {
        self.mismatches + self.only_in_master + self.only_in_plans > 0
    }
}

impl RecognizedSummary {
    pub fn count(&self, status: RecognizedStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Anything other than `OK` or `EXCLUDED`.
    pub fn has_findings(&self) -> bool {
        [
            RecognizedStatus::Mismatch,
            RecognizedStatus::RuleNotFound,
            RecognizedStatus::TreeCandidate,
        ]
        .into_iter()
        .any(|s| self.count(s) > 0)
    }
}
