//! Stage 3: recognized-quantity validation for tree items.

use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;

use crate::extract::MASTER_TABLE_TITLE;
use crate::model::{
    AggregatedPlan, LineItemKey, MasterRow, MasterTable, RecognizedItem, RecognizedStatus,
    RuleLogEntry,
};
use crate::quantity::Tolerance;
use crate::remark::{explain, RuleNote, RuleOutcome};
use crate::runlog::{AnomalyKind, RunLog};
use crate::tree::TreePredicate;

/// Expected quantity, difference and status for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub expected_recognized_qty: Option<BigDecimal>,
    pub diff: Option<BigDecimal>,
    pub status: RecognizedStatus,
}

/// Compare `actual × factor` against the master's recorded recognized quantity.
///
/// Only `Recognized` outcomes compute anything; a missing recorded value
/// makes the item a `TREE_CANDIDATE` rather than a mismatch.
pub fn validate(
    actual_qty: &BigDecimal,
    recognized_in_master: Option<&BigDecimal>,
    outcome: RuleOutcome,
    tolerance: &Tolerance,
) -> Validation {
    let factor = match outcome {
        RuleOutcome::Excluded => return Validation::without_diff(RecognizedStatus::Excluded),
        RuleOutcome::RuleNotFound => {
            return Validation::without_diff(RecognizedStatus::RuleNotFound)
        }
        RuleOutcome::Recognized { factor } => factor,
    };

    let expected = actual_qty * BigDecimal::from(factor);
    match recognized_in_master {
        Some(recorded) => {
            let diff = &expected - recorded;
            let status = if tolerance.within(&diff) {
                RecognizedStatus::Ok
            } else {
                RecognizedStatus::Mismatch
            };
            Validation {
                expected_recognized_qty: Some(expected),
                diff: Some(diff),
                status,
            }
        }
        None => Validation {
            expected_recognized_qty: Some(expected),
            diff: None,
            status: RecognizedStatus::TreeCandidate,
        },
    }
}

impl Validation {
    fn without_diff(status: RecognizedStatus) -> Self {
        Self {
            expected_recognized_qty: None,
            diff: None,
            status,
        }
    }
}

/// Run Stage 3 over every master row the predicate accepts, in key order.
///
/// `actuals` holds Stage-2 master totals; rows missing from it fall back to
/// their own total. `plan` only contributes provenance.
pub fn recognize<P: TreePredicate + ?Sized>(
    master: &MasterTable,
    actuals: &BTreeMap<LineItemKey, BigDecimal>,
    plan: &BTreeMap<LineItemKey, AggregatedPlan>,
    predicate: &P,
    tolerance: &Tolerance,
    log: &mut RunLog,
) -> (Vec<RecognizedItem>, Vec<RuleLogEntry>) {
    let mut items = Vec::new();
    let mut rule_log = Vec::new();

    for (key, row) in master.iter().filter(|(key, _)| predicate.is_tree_candidate(key)) {
        let actual_qty = resolve_actual(row, actuals, log);
        let trace = explain(&row.remark);

        match &trace.note {
            RuleNote::FactorConflict(factors) => log.anomaly(
                AnomalyKind::FactorConflict,
                &row.source_file,
                row.page,
                MASTER_TABLE_TITLE,
                format!("({key}): remark {:?} gives factors {factors:?}; using the largest", row.remark),
            ),
            RuleNote::FactorOverflow(literals) => log.anomaly(
                AnomalyKind::AmbiguousRemark,
                &row.source_file,
                row.page,
                MASTER_TABLE_TITLE,
                format!("({key}): remark {:?} has factor {} out of range", row.remark, literals.join(", ")),
            ),
            RuleNote::FactorNotFound => log.anomaly(
                AnomalyKind::AmbiguousRemark,
                &row.source_file,
                row.page,
                MASTER_TABLE_TITLE,
                format!("({key}): remark {:?} matches no rule", row.remark),
            ),
            _ => {}
        }

        let factor = match trace.outcome {
            RuleOutcome::Recognized { factor } => Some(factor),
            _ => None,
        };
        let verdict = validate(&actual_qty, row.recognized_qty.as_ref(), trace.outcome, tolerance);

        let (sources, pages) = provenance(row, plan.get(key));

        rule_log.push(RuleLogEntry {
            index: rule_log.len() + 1,
            key: key.clone(),
            status: verdict.status,
            rule_note: trace.note.to_string(),
            remark: row.remark.clone(),
        });
        items.push(RecognizedItem {
            key: key.clone(),
            actual_qty,
            factor,
            expected_recognized_qty: verdict.expected_recognized_qty,
            recognized_qty_in_master: row.recognized_qty.clone(),
            diff: verdict.diff,
            status: verdict.status,
            remark: row.remark.clone(),
            sources,
            pages,
        });
    }

    (items, rule_log)
}

fn resolve_actual(
    row: &MasterRow,
    actuals: &BTreeMap<LineItemKey, BigDecimal>,
    log: &mut RunLog,
) -> BigDecimal {
    if let Some(actual) = actuals.get(&row.key).or(row.total_qty.as_ref()) {
        return actual.clone();
    }
    log.anomaly(
        AnomalyKind::Extraction,
        &row.source_file,
        row.page,
        MASTER_TABLE_TITLE,
        format!("({}): no actual quantity in stage 2 or master; using 0", row.key),
    );
    BigDecimal::from(0)
}

fn provenance(row: &MasterRow, plan: Option<&AggregatedPlan>) -> (BTreeSet<String>, BTreeSet<u32>) {
    let mut sources = BTreeSet::new();
    let mut pages = BTreeSet::new();
    if !row.source_file.is_empty() {
        sources.insert(row.source_file.clone());
    }
    if row.page > 0 {
        pages.insert(row.page);
    }
    if let Some(p) = plan {
        sources.extend(p.sources.iter().cloned());
        pages.extend(p.pages.iter().copied());
    }
    (sources, pages)
}
