use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;

use crate::model::{AggregatedPlan, LineItemKey, PlanRow};

/// Group plan rows by key and sum quantities exactly.
///
/// Sources and pages are unioned for traceability only. Page 0 (unknown)
/// is left out of the page set.
pub fn aggregate_plan_rows(rows: &[PlanRow]) -> BTreeMap<LineItemKey, AggregatedPlan> {
    let mut groups: BTreeMap<LineItemKey, AggregatedPlan> = BTreeMap::new();

    for row in rows {
        let entry = groups.entry(row.key.clone()).or_insert_with(|| AggregatedPlan {
            total_qty: BigDecimal::from(0),
            row_count: 0,
            sources: BTreeSet::new(),
            pages: BTreeSet::new(),
        });
        entry.total_qty += &row.qty;
        entry.row_count += 1;
        if !row.source_file.is_empty() {
            entry.sources.insert(row.source_file.clone());
        }
        if row.page > 0 {
            entry.pages.insert(row.page);
        }
    }

    groups
}
