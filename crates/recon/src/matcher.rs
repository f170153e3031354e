use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;

use crate::extract::MASTER_TABLE_TITLE;
use crate::model::{AggregatedPlan, LineItemKey, MasterTable, ReconStatus, ReconciledItem};
use crate::quantity::Tolerance;
use crate::runlog::{AnomalyKind, RunLog};

/// Join aggregated plan totals against master totals by exact key.
///
/// Output covers the union of keys in key order. Matching happens only at
/// the aggregate level: several drawing pages may each contribute part of
/// one item's quantity. A master row without a usable total counts as
/// absent from the master for its key and is logged.
pub fn reconcile(
    plan: &BTreeMap<LineItemKey, AggregatedPlan>,
    master: &MasterTable,
    tolerance: &Tolerance,
    log: &mut RunLog,
) -> Vec<ReconciledItem> {
    let mut master_totals: BTreeMap<&LineItemKey, &BigDecimal> = BTreeMap::new();
    for (key, row) in master {
        match &row.total_qty {
            Some(total) => {
                master_totals.insert(key, total);
            }
            None => log.anomaly(
                AnomalyKind::Extraction,
                &row.source_file,
                row.page,
                MASTER_TABLE_TITLE,
                format!("({key}): master total missing or non-numeric; treated as absent"),
            ),
        }
    }

    let keys: BTreeSet<&LineItemKey> = plan.keys().chain(master_totals.keys().copied()).collect();

    keys.into_iter()
        .map(|key| reconcile_key(key, plan.get(key), master_totals.get(key).copied(), tolerance))
        .collect()
}

fn reconcile_key(
    key: &LineItemKey,
    plan: Option<&AggregatedPlan>,
    master_total: Option<&BigDecimal>,
    tolerance: &Tolerance,
) -> ReconciledItem {
    let (diff, status) = match (plan, master_total) {
        (Some(p), Some(m)) => {
            let diff = &p.total_qty - m;
            let status = if tolerance.within(&diff) {
                ReconStatus::Ok
            } else {
                ReconStatus::Mismatch
            };
            (Some(diff), status)
        }
        (None, Some(_)) => (None, ReconStatus::OnlyInMaster),
        (Some(_), None) => (None, ReconStatus::OnlyInPlans),
        (None, None) => unreachable!("key comes from the union of both sides"),
    };

    ReconciledItem {
        key: key.clone(),
        master_total_qty: master_total.cloned(),
        plan_total_qty: plan.map(|p| p.total_qty.clone()),
        diff,
        status,
        plan_sources: plan.map(|p| p.sources.clone()).unwrap_or_default(),
        plan_pages: plan.map(|p| p.pages.clone()).unwrap_or_default(),
    }
}

/// Stage-2 `master_total_qty` per key, for Stage 3's actual-quantity lookup.
pub fn master_actuals(items: &[ReconciledItem]) -> BTreeMap<LineItemKey, BigDecimal> {
    items
        .iter()
        .filter_map(|item| Some((item.key.clone(), item.master_total_qty.clone()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MasterRow;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn key(spec: &str) -> LineItemKey {
        LineItemKey::new("조경공사", spec, "주")
    }

    fn plan(entries: &[(&str, &str)]) -> BTreeMap<LineItemKey, AggregatedPlan> {
        entries
            .iter()
            .map(|(spec, qty)| {
                (
                    key(spec),
                    AggregatedPlan {
                        total_qty: dec(qty),
                        row_count: 1,
                        sources: ["L-101.pdf".to_string()].into(),
                        pages: [4].into(),
                    },
                )
            })
            .collect()
    }

    fn master(entries: &[(&str, Option<&str>)]) -> MasterTable {
        entries
            .iter()
            .map(|(spec, total)| {
                (
                    key(spec),
                    MasterRow {
                        key: key(spec),
                        total_qty: total.map(dec),
                        recognized_qty: None,
                        remark: String::new(),
                        source_file: "L-003.pdf".into(),
                        page: 1,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn within_tolerance_is_ok() {
        let mut log = RunLog::new();
        let items = reconcile(
            &plan(&[("H3.0×W1.5", "10.0005")]),
            &master(&[("H3.0×W1.5", Some("10"))]),
            &Tolerance::default(),
            &mut log,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, ReconStatus::Ok);
        assert_eq!(items[0].diff, Some(dec("0.0005")));
        assert_eq!(items[0].plan_pages.len(), 1);
    }

    #[test]
    fn outside_tolerance_is_mismatch() {
        let mut log = RunLog::new();
        let items = reconcile(
            &plan(&[("H3.0×W1.5", "10.002")]),
            &master(&[("H3.0×W1.5", Some("10"))]),
            &Tolerance::default(),
            &mut log,
        );
        assert_eq!(items[0].status, ReconStatus::Mismatch);
        assert_eq!(items[0].diff, Some(dec("0.002")));
    }

    #[test]
    fn negative_diff_uses_absolute_value() {
        let mut log = RunLog::new();
        let items = reconcile(
            &plan(&[("H3.0×W1.5", "9.5")]),
            &master(&[("H3.0×W1.5", Some("10"))]),
            &Tolerance::default(),
            &mut log,
        );
        assert_eq!(items[0].diff, Some(dec("-0.5")));
        assert_eq!(items[0].status, ReconStatus::Mismatch);
    }

    #[test]
    fn one_sided_keys() {
        let mut log = RunLog::new();
        let items = reconcile(
            &plan(&[("H2.0", "3")]),
            &master(&[("H4.0", Some("5"))]),
            &Tolerance::default(),
            &mut log,
        );
        assert_eq!(items.len(), 2);

        let only_plan = items.iter().find(|i| i.key.spec == "H2.0").unwrap();
        assert_eq!(only_plan.status, ReconStatus::OnlyInPlans);
        assert!(only_plan.master_total_qty.is_none());
        assert!(only_plan.diff.is_none());

        let only_master = items.iter().find(|i| i.key.spec == "H4.0").unwrap();
        assert_eq!(only_master.status, ReconStatus::OnlyInMaster);
        assert!(only_master.plan_total_qty.is_none());
        assert!(only_master.diff.is_none());
        assert!(only_master.plan_sources.is_empty());
    }

    #[test]
    fn output_sorted_by_key() {
        let mut log = RunLog::new();
        let items = reconcile(
            &plan(&[("C", "1"), ("A", "1")]),
            &master(&[("B", Some("1")), ("A", Some("1"))]),
            &Tolerance::default(),
            &mut log,
        );
        let specs: Vec<&str> = items.iter().map(|i| i.key.spec.as_str()).collect();
        assert_eq!(specs, vec!["A", "B", "C"]);
    }

    #[test]
    fn master_without_total_is_absent_and_logged() {
        let mut log = RunLog::new();
        let items = reconcile(
            &plan(&[("H3.0", "4")]),
            &master(&[("H3.0", None), ("H9.9", None)]),
            &Tolerance::default(),
            &mut log,
        );
        // H9.9 has neither a plan total nor a usable master total.
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, ReconStatus::OnlyInPlans);
        assert_eq!(log.count(AnomalyKind::Extraction), 2);
    }

    #[test]
    fn actuals_skip_missing_master_totals() {
        let mut log = RunLog::new();
        let items = reconcile(
            &plan(&[("P", "1")]),
            &master(&[("M", Some("7"))]),
            &Tolerance::default(),
            &mut log,
        );
        let actuals = master_actuals(&items);
        assert_eq!(actuals.len(), 1);
        assert_eq!(actuals[&key("M")], dec("7"));
    }
}
