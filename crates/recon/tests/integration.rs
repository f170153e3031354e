use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use qtycheck_recon::config::QtyConfig;
use qtycheck_recon::engine::{run_recognized, run_totals};
use qtycheck_recon::extract::{
    index_master, load_extract_log, load_master_csv, load_plan_csv, load_stage2_actuals,
};
use qtycheck_recon::matcher::master_actuals;
use qtycheck_recon::model::{LineItemKey, MasterTable, PlanRow, RecognizedStatus, ReconStatus};
use qtycheck_recon::presence::{audit, MatchLevel};
use qtycheck_recon::runlog::{AnomalyKind, RunLog};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn key(work_name: &str, spec: &str, unit: &str) -> LineItemKey {
    LineItemKey::new(work_name, spec, unit)
}

struct Loaded {
    config: QtyConfig,
    plan: Vec<PlanRow>,
    master: MasterTable,
    log: RunLog,
}

fn load_fixtures() -> Loaded {
    let config = QtyConfig::from_toml(&fixture("qty.toml")).unwrap();
    let mut log = RunLog::new();
    let plan = load_plan_csv(&fixture("plan.csv"), "plan.csv", &mut log).unwrap();
    let rows = load_master_csv(&fixture("master.csv"), "master.csv", &mut log).unwrap();
    let master = index_master(rows, config.master.on_duplicate, &mut log).unwrap();
    Loaded { config, plan, master, log }
}

// -------------------------------------------------------------------------
// Loading
// -------------------------------------------------------------------------

#[test]
fn fixtures_load_with_logged_anomalies() {
    let loaded = load_fixtures();
    assert_eq!(loaded.config.name, "Sample drawing set");
    assert_eq!(loaded.plan.len(), 6);
    assert_eq!(loaded.master.len(), 6);

    // `잔디 평떼 일식` has no numeric quantity
    let extraction: Vec<_> = loaded
        .log
        .entries()
        .iter()
        .filter(|e| e.kind == AnomalyKind::Extraction)
        .collect();
    assert_eq!(extraction.len(), 1);
    assert_eq!(extraction[0].file, "L-103.pdf");
    assert_eq!(extraction[0].page, 3);
}

#[test]
fn upstream_log_is_merged() {
    let mut log = RunLog::new();
    log.extend(load_extract_log(&fixture("extract_log.txt")).unwrap());
    assert_eq!(log.entries().len(), 2);
    assert_eq!(log.count(AnomalyKind::Upstream), 1);
    assert_eq!(log.anomaly_count(), 1);
    assert_eq!(log.entries()[1].reason, "표 헤더 미탐지");
}

// -------------------------------------------------------------------------
// Stage 2
// -------------------------------------------------------------------------

#[test]
fn stage2_statuses() {
    let mut loaded = load_fixtures();
    let result = run_totals(&loaded.config, &loaded.plan, &loaded.master, &mut loaded.log).unwrap();

    assert_eq!(result.summary.total_items, 7);
    assert_eq!(result.summary.ok, 2);
    assert_eq!(result.summary.mismatches, 1);
    assert_eq!(result.summary.only_in_master, 3);
    assert_eq!(result.summary.only_in_plans, 1);
    assert!(result.summary.has_findings());

    // output is in key order
    let keys: Vec<_> = result.items.iter().map(|i| i.key.clone()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn scenario_a_within_tolerance() {
    let mut loaded = load_fixtures();
    let result = run_totals(&loaded.config, &loaded.plan, &loaded.master, &mut loaded.log).unwrap();
    let item = result.items.iter().find(|i| i.key == key("조경공사", "H3.0×W1.5", "주")).unwrap();

    assert_eq!(item.plan_total_qty, Some(dec("10.0005")));
    assert_eq!(item.diff, Some(dec("0.0005")));
    assert_eq!(item.status, ReconStatus::Ok);
    assert_eq!(item.plan_sources.len(), 2);
    assert_eq!(item.plan_pages.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn scenario_b_outside_tolerance() {
    let mut loaded = load_fixtures();
    let result = run_totals(&loaded.config, &loaded.plan, &loaded.master, &mut loaded.log).unwrap();
    let item = result.items.iter().find(|i| i.key == key("소나무", "H4.0×R15", "주")).unwrap();

    assert_eq!(item.diff, Some(dec("0.002")));
    assert_eq!(item.status, ReconStatus::Mismatch);
}

#[test]
fn scenario_c_only_in_plans() {
    let mut loaded = load_fixtures();
    let result = run_totals(&loaded.config, &loaded.plan, &loaded.master, &mut loaded.log).unwrap();
    let item = result.items.iter().find(|i| i.key == key("느티나무", "R12", "주")).unwrap();

    assert_eq!(item.status, ReconStatus::OnlyInPlans);
    assert_eq!(item.master_total_qty, None);
    assert_eq!(item.diff, None);

    let json = serde_json::to_value(item).unwrap();
    assert!(json["master_total_qty"].is_null());
    assert!(json["diff"].is_null());
    assert_eq!(json["status"], "ONLY_IN_PLANS");
}

#[test]
fn whitespace_variants_share_a_key() {
    let mut loaded = load_fixtures();
    let result = run_totals(&loaded.config, &loaded.plan, &loaded.master, &mut loaded.log).unwrap();
    let item = result.items.iter().find(|i| i.key == key("보도블럭 포장", "300x300x60", "m2")).unwrap();
    assert_eq!(item.status, ReconStatus::Ok);
    assert_eq!(item.plan_total_qty, Some(dec("1250.5")));
}

// -------------------------------------------------------------------------
// Stage 3
// -------------------------------------------------------------------------

fn stage3_in_memory() -> qtycheck_recon::RecognizedResult {
    let mut loaded = load_fixtures();
    let totals = run_totals(&loaded.config, &loaded.plan, &loaded.master, &mut loaded.log).unwrap();
    let actuals = master_actuals(&totals.items);
    let predicate = loaded.config.tree.predicate();
    run_recognized(&loaded.config, &loaded.master, &actuals, &loaded.plan, &predicate, &mut loaded.log)
        .unwrap()
}

fn status_of(result: &qtycheck_recon::RecognizedResult, k: LineItemKey) -> RecognizedStatus {
    result.items.iter().find(|i| i.key == k).map(|i| i.status).unwrap()
}

#[test]
fn stage3_only_tree_candidates() {
    let result = stage3_in_memory();
    assert_eq!(result.items.len(), 5);
    assert!(result.items.iter().all(|i| i.key.work_name != "보도블럭 포장"));
    assert_eq!(result.rule_log.len(), 5);
    assert_eq!(result.rule_log[0].index, 1);
}

#[test]
fn scenario_d_factor_two() {
    let result = stage3_in_memory();

    let ok = result.items.iter().find(|i| i.key.work_name == "조경공사").unwrap();
    assert_eq!(ok.factor, Some(2));
    assert_eq!(ok.actual_qty, dec("10"));
    assert_eq!(ok.expected_recognized_qty, Some(dec("20")));
    assert_eq!(ok.status, RecognizedStatus::Ok);
    assert!(ok.sources.contains("L-003.pdf") && ok.sources.contains("L-101.pdf"));

    let bad = result.items.iter().find(|i| i.key.work_name == "산수유").unwrap();
    assert_eq!(bad.status, RecognizedStatus::Mismatch);
    assert_eq!(bad.diff, Some(dec("2")));
}

#[test]
fn scenario_e_excluded() {
    let result = stage3_in_memory();
    assert_eq!(status_of(&result, key("소나무", "H4.0×R15", "주")), RecognizedStatus::Excluded);
}

#[test]
fn scenario_f_rule_not_found() {
    let result = stage3_in_memory();
    assert_eq!(status_of(&result, key("이팝나무", "R8", "주")), RecognizedStatus::RuleNotFound);
    let note = result.rule_log.iter().find(|r| r.key.work_name == "이팝나무").unwrap();
    assert_eq!(note.rule_note, "factor_not_found");
}

#[test]
fn missing_recorded_value_is_tree_candidate() {
    let result = stage3_in_memory();
    let item = result.items.iter().find(|i| i.key.work_name == "회양목").unwrap();
    assert_eq!(item.status, RecognizedStatus::TreeCandidate);
    assert_eq!(item.expected_recognized_qty, Some(dec("200")));
    assert_eq!(item.recognized_qty_in_master, None);
}

#[test]
fn stage3_from_previous_summary_file() {
    let loaded = load_fixtures();
    let actuals = load_stage2_actuals(&fixture("recon_summary.csv")).unwrap();
    let predicate = loaded.config.tree.predicate();
    let mut log = RunLog::new();
    let result =
        run_recognized(&loaded.config, &loaded.master, &actuals, &[], &predicate, &mut log).unwrap();

    // 12 from the Stage-2 file beats 10 from the master row
    let item = result.items.iter().find(|i| i.key.work_name == "조경공사").unwrap();
    assert_eq!(item.actual_qty, dec("12"));
    assert_eq!(item.diff, Some(dec("4")));
    assert_eq!(item.status, RecognizedStatus::Mismatch);

    // other rows fall back to their master totals
    let item = result.items.iter().find(|i| i.key.work_name == "회양목").unwrap();
    assert_eq!(item.actual_qty, dec("100"));
}

#[test]
fn stage3_is_idempotent() {
    let a = stage3_in_memory();
    let b = stage3_in_memory();
    assert_eq!(a.items, b.items);
    assert_eq!(a.rule_log, b.rule_log);
}

// -------------------------------------------------------------------------
// Presence audit
// -------------------------------------------------------------------------

#[test]
fn presence_audit_over_fixtures() {
    let loaded = load_fixtures();
    let rows = audit(&loaded.plan, &loaded.master);
    assert_eq!(rows.len(), loaded.plan.len());

    let levels: BTreeMap<String, MatchLevel> =
        rows.iter().map(|r| (r.key.work_name.clone(), r.match_level)).collect();
    assert_eq!(levels["조경공사"], MatchLevel::Exact);
    assert_eq!(levels["느티나무"], MatchLevel::None);
}
