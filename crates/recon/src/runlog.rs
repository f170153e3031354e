//! Explicit per-run log collector.
//!
//! Every stage takes `&mut RunLog` instead of writing to shared state, so two
//! runs (or two tests) never see each other's entries. Recording an entry
//! also forwards it to the `log` facade.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Per-table bookkeeping (rows extracted, rows skipped). Not a failure.
    Info,
    /// Malformed or missing numeric field; the row is excluded or degraded.
    Extraction,
    /// Remark matched no rule.
    AmbiguousRemark,
    /// Remark carried more than one distinct recognition factor.
    FactorConflict,
    /// More than one master row for the same key.
    DuplicateMasterKey,
    /// Failure line read from an upstream extractor log; the reason is kept verbatim.
    Upstream,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Extraction => write!(f, "extraction"),
            Self::AmbiguousRemark => write!(f, "ambiguous_remark"),
            Self::FactorConflict => write!(f, "factor_conflict"),
            Self::DuplicateMasterKey => write!(f, "duplicate_master_key"),
            Self::Upstream => write!(f, "upstream"),
        }
    }
}

/// One line of `extract_log.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub file: String,
    pub page: u32,
    pub table_title: String,
    pub row_count: usize,
    pub kind: AnomalyKind,
    /// Empty for info entries.
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LogEntry) {
        match entry.kind {
            AnomalyKind::Info => log::debug!(
                "{}:{} [{}] {} row(s)",
                entry.file, entry.page, entry.table_title, entry.row_count
            ),
            kind => log::warn!(
                "{}:{} [{}] {kind}: {}",
                entry.file, entry.page, entry.table_title, entry.reason
            ),
        }
        self.entries.push(entry);
    }

    /// Record a single-row anomaly.
    pub fn anomaly(
        &mut self,
        kind: AnomalyKind,
        file: &str,
        page: u32,
        table_title: &str,
        reason: impl Into<String>,
    ) {
        self.record(LogEntry {
            file: file.into(),
            page,
            table_title: table_title.into(),
            row_count: 0,
            kind,
            reason: reason.into(),
        });
    }

    /// Record how many rows a table contributed.
    pub fn table_rows(&mut self, file: &str, page: u32, table_title: &str, row_count: usize) {
        self.record(LogEntry {
            file: file.into(),
            page,
            table_title: table_title.into(),
            row_count,
            kind: AnomalyKind::Info,
            reason: String::new(),
        });
    }

    /// Append entries produced elsewhere (e.g. an upstream extractor's log).
    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        for entry in entries {
            self.record(entry);
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn anomaly_count(&self) -> usize {
        self.entries.iter().filter(|e| e.kind != AnomalyKind::Info).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
