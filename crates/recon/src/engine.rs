use std::collections::BTreeMap;

use bigdecimal::BigDecimal;

use crate::aggregate::aggregate_plan_rows;
use crate::config::QtyConfig;
use crate::error::ReconError;
use crate::evidence::{recognized_summary, totals_summary};
use crate::matcher::reconcile;
use crate::model::{
    LineItemKey, MasterTable, PlanRow, RecognizedResult, RunMeta, TotalsResult,
};
use crate::quantity::Tolerance;
use crate::recognized::recognize;
use crate::runlog::RunLog;
use crate::tree::TreePredicate;

/// Stage 2: aggregate plan rows and reconcile them against the master table.
///
/// Fails only when a whole input is missing; row-level problems end up in
/// `log` and in item statuses.
pub fn run_totals(
    config: &QtyConfig,
    plan_rows: &[PlanRow],
    master: &MasterTable,
    log: &mut RunLog,
) -> Result<TotalsResult, ReconError> {
    if plan_rows.is_empty() {
        return Err(ReconError::MissingInput("plan-sheet rows".into()));
    }
    if master.is_empty() {
        return Err(ReconError::MissingInput("master table rows".into()));
    }
    let tolerance = config.tolerance()?;

    let plan = aggregate_plan_rows(plan_rows);
    let items = reconcile(&plan, master, &tolerance, log);
    let summary = totals_summary(&items, plan_rows.len(), master.len());

    log::info!(
        "stage 2: {} item(s), {} OK, {} mismatch, {} master-only, {} plan-only",
        summary.total_items,
        summary.ok,
        summary.mismatches,
        summary.only_in_master,
        summary.only_in_plans
    );

    Ok(TotalsResult {
        meta: run_meta(config, &tolerance),
        summary,
        items,
    })
}

/// Stage 3: classify remarks of tree-candidate master rows and validate
/// their recognized quantities.
///
/// `actuals` is the Stage-2 master total per key (from `master_actuals` or a
/// previous `recon_summary.csv`); it may be empty. `plan_rows` only feed
/// provenance and may be empty too.
pub fn run_recognized<P: TreePredicate + ?Sized>(
    config: &QtyConfig,
    master: &MasterTable,
    actuals: &BTreeMap<LineItemKey, BigDecimal>,
    plan_rows: &[PlanRow],
    predicate: &P,
    log: &mut RunLog,
) -> Result<RecognizedResult, ReconError> {
    if master.is_empty() {
        return Err(ReconError::MissingInput("master table rows".into()));
    }
    let tolerance = config.tolerance()?;

    let plan = aggregate_plan_rows(plan_rows);
    let (items, rule_log) = recognize(master, actuals, &plan, predicate, &tolerance, log);
    let summary = recognized_summary(&items);

    log::info!(
        "stage 3: {} tree item(s) of {} master row(s)",
        summary.total_items,
        master.len()
    );

    Ok(RecognizedResult {
        meta: run_meta(config, &tolerance),
        summary,
        items,
        rule_log,
    })
}

fn run_meta(config: &QtyConfig, tolerance: &Tolerance) -> RunMeta {
    RunMeta {
        config_name: config.name.clone(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
        tolerance: tolerance.value().to_string(),
    }
}
