//! Per-plan-row presence audit against the master table.
//!
//! A diagnostic only: it loosens the key step by step to show *why* an item
//! is missing (unit typo, spec written differently). Reconciliation itself
//! always uses exact keys.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::model::{LineItemKey, MasterTable, PlanRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchLevel {
    Exact,
    NoUnit,
    NoSpec,
    NameOnly,
    None,
}

impl MatchLevel {
    pub fn presence(self) -> PresenceStatus {
        match self {
            Self::Exact => PresenceStatus::Found,
            Self::NoUnit | Self::NoSpec | Self::NameOnly => PresenceStatus::WeakFound,
            Self::None => PresenceStatus::NotFound,
        }
    }
}

impl std::fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "EXACT"),
            Self::NoUnit => write!(f, "NO_UNIT"),
            Self::NoSpec => write!(f, "NO_SPEC"),
            Self::NameOnly => write!(f, "NAME_ONLY"),
            Self::None => write!(f, "NONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceStatus {
    Found,
    WeakFound,
    NotFound,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found => write!(f, "FOUND"),
            Self::WeakFound => write!(f, "WEAK_FOUND"),
            Self::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceRow {
    pub source_file: String,
    pub page: u32,
    pub key: LineItemKey,
    pub qty: BigDecimal,
    pub status: PresenceStatus,
    pub match_level: MatchLevel,
    /// First master key (in key order) at the reported level.
    pub master_hit: Option<LineItemKey>,
}

/// Lookup indexes for each rung of the ladder, first key wins.
struct LooseIndex<'a> {
    no_unit: BTreeMap<(&'a str, &'a str), &'a LineItemKey>,
    no_spec: BTreeMap<(&'a str, &'a str), &'a LineItemKey>,
    name_only: BTreeMap<&'a str, &'a LineItemKey>,
}

impl<'a> LooseIndex<'a> {
    fn build(master: &'a MasterTable) -> Self {
        let mut index = Self {
            no_unit: BTreeMap::new(),
            no_spec: BTreeMap::new(),
            name_only: BTreeMap::new(),
        };
        for key in master.keys() {
            let name = key.work_name.as_str();
            index.no_unit.entry((name, key.spec.as_str())).or_insert(key);
            index.no_spec.entry((name, key.unit.as_str())).or_insert(key);
            index.name_only.entry(name).or_insert(key);
        }
        index
    }

    fn lookup(&self, master: &'a MasterTable, key: &LineItemKey) -> (MatchLevel, Option<&'a LineItemKey>) {
        if let Some((hit, _)) = master.get_key_value(key) {
            return (MatchLevel::Exact, Some(hit));
        }
        if let Some(hit) = self.no_unit.get(&(key.work_name.as_str(), key.spec.as_str())) {
            return (MatchLevel::NoUnit, Some(*hit));
        }
        if let Some(hit) = self.no_spec.get(&(key.work_name.as_str(), key.unit.as_str())) {
            return (MatchLevel::NoSpec, Some(*hit));
        }
        if let Some(hit) = self.name_only.get(key.work_name.as_str()) {
            return (MatchLevel::NameOnly, Some(*hit));
        }
        (MatchLevel::None, None)
    }
}

/// Audit every plan row, preserving input order.
pub fn audit(plan_rows: &[PlanRow], master: &MasterTable) -> Vec<PresenceRow> {
    let index = LooseIndex::build(master);
    plan_rows
        .iter()
        .map(|row| {
            let (level, hit) = index.lookup(master, &row.key);
            PresenceRow {
                source_file: row.source_file.clone(),
                page: row.page,
                key: row.key.clone(),
                qty: row.qty.clone(),
                status: level.presence(),
                match_level: level,
                master_hit: hit.cloned(),
            }
        })
        .collect()
}
