// Property-based tests for the reconciliation core.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use proptest::prelude::*;
use qtycheck_recon::aggregate::aggregate_plan_rows;
use qtycheck_recon::matcher::reconcile;
use qtycheck_recon::model::{LineItemKey, MasterRow, MasterTable, PlanRow, ReconStatus};
use qtycheck_recon::normalize::normalize;
use qtycheck_recon::quantity::Tolerance;
use qtycheck_recon::remark::{classify, RuleOutcome, EXCLUSION_PHRASES};
use qtycheck_recon::runlog::RunLog;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Quantity with up to four decimal places.
fn arb_qty() -> impl Strategy<Value = BigDecimal> {
    (-1_000_000i64..1_000_000, 0i64..=4).prop_map(|(digits, scale)| BigDecimal::new(digits.into(), scale))
}

fn arb_key() -> impl Strategy<Value = LineItemKey> {
    (
        prop::sample::select(vec!["소나무", "느티나무", "조경공사", "경계석"]),
        prop::sample::select(vec!["H4.0×R15", "R10", "", "300x300x60"]),
        prop::sample::select(vec!["주", "m2", "EA"]),
    )
        .prop_map(|(w, s, u)| LineItemKey::new(w, s, u))
}

fn arb_plan_rows() -> impl Strategy<Value = Vec<PlanRow>> {
    prop::collection::vec((arb_key(), arb_qty(), 1u32..20), 1..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(key, qty, page)| PlanRow {
                key,
                qty,
                source_file: format!("L-{:03}.pdf", 100 + page),
                page,
            })
            .collect()
    })
}

fn arb_master() -> impl Strategy<Value = MasterTable> {
    prop::collection::btree_map(arb_key(), arb_qty(), 0..8).prop_map(|totals| {
        totals
            .into_iter()
            .map(|(key, total)| {
                let row = MasterRow {
                    key: key.clone(),
                    total_qty: Some(total),
                    recognized_qty: None,
                    remark: String::new(),
                    source_file: "L-003.pdf".into(),
                    page: 1,
                };
                (key, row)
            })
            .collect()
    })
}

/// Free text with Korean, digits, whitespace and the week marker.
fn arb_remark() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"[0-9가-힣 주인정제외\t\n]{0,24}",
        1 => r"[0-9]{1,2} ?주 ?인정",
        1 => Just(String::new()),
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn plan_total_is_exact_sum_in_any_order(
        (rows, shuffled) in arb_plan_rows().prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle()))
    ) {
        let forward = aggregate_plan_rows(&rows);
        let backward = aggregate_plan_rows(&shuffled);

        prop_assert_eq!(&forward, &backward);

        let mut expected: BTreeMap<LineItemKey, BigDecimal> = BTreeMap::new();
        for row in &rows {
            *expected.entry(row.key.clone()).or_insert_with(|| BigDecimal::from(0)) += &row.qty;
        }
        for (key, agg) in &forward {
            prop_assert_eq!(&agg.total_qty, &expected[key]);
        }
    }

    #[test]
    fn one_sided_keys_and_equal_totals(rows in arb_plan_rows(), master in arb_master()) {
        let plan = aggregate_plan_rows(&rows);
        let items = reconcile(&plan, &master, &Tolerance::default(), &mut RunLog::new());

        for item in &items {
            match (plan.contains_key(&item.key), master.contains_key(&item.key)) {
                (true, false) => {
                    prop_assert_eq!(item.status, ReconStatus::OnlyInPlans);
                    prop_assert!(item.master_total_qty.is_none());
                    prop_assert!(item.diff.is_none());
                }
                (false, true) => {
                    prop_assert_eq!(item.status, ReconStatus::OnlyInMaster);
                    prop_assert!(item.plan_total_qty.is_none());
                    prop_assert!(item.diff.is_none());
                }
                (true, true) => {
                    let diff = item.diff.clone().unwrap();
                    if item.plan_total_qty == item.master_total_qty {
                        prop_assert_eq!(item.status, ReconStatus::Ok);
                    }
                    let within = diff.abs() <= BigDecimal::new(1.into(), 3);
                    prop_assert_eq!(item.status == ReconStatus::Ok, within);
                }
                (false, false) => prop_assert!(false, "key from nowhere: {}", item.key),
            }
        }
        prop_assert_eq!(items.len(), plan.keys().chain(master.keys()).collect::<std::collections::BTreeSet<_>>().len());
    }

    #[test]
    fn stage2_is_idempotent(rows in arb_plan_rows(), master in arb_master()) {
        let plan = aggregate_plan_rows(&rows);
        let a = reconcile(&plan, &master, &Tolerance::default(), &mut RunLog::new());
        let b = reconcile(&plan, &master, &Tolerance::default(), &mut RunLog::new());
        prop_assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn classify_is_total_and_deterministic(remark in arb_remark()) {
        let first = classify(&remark);
        prop_assert_eq!(first, classify(&remark));
        if let RuleOutcome::Recognized { factor } = first {
            prop_assert!(factor > 0);
        }
    }

    #[test]
    fn exclusion_beats_factor(
        factor in 1u32..99,
        phrase in prop::sample::select(EXCLUSION_PHRASES.to_vec()),
        before in any::<bool>(),
    ) {
        let remark = if before {
            format!("{phrase} ({factor}주인정)")
        } else {
            format!("{factor}주인정, {phrase}")
        };
        prop_assert_eq!(classify(&remark), RuleOutcome::Excluded);
    }

    #[test]
    fn normalize_is_idempotent(text in r"[ \t\n가-힣a-zA-Z0-9×.]{0,30}") {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
        prop_assert!(!once.contains("  "));
    }
}
