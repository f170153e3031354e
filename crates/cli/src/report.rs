//! CSV report and log writers. Column sets are a contract with the
//! spreadsheet templates downstream; keep names and order stable.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::Path;

use bigdecimal::BigDecimal;
use qtycheck_recon::model::{RecognizedItem, ReconciledItem, RuleLogEntry};
use qtycheck_recon::presence::PresenceRow;
use qtycheck_recon::runlog::{AnomalyKind, LogEntry};

use crate::exit_codes::EXIT_RUNTIME;
use crate::CliError;

pub const RECON_SUMMARY_FILE: &str = "recon_summary.csv";
pub const RECOGNIZED_SUMMARY_FILE: &str = "recognized_summary.csv";
pub const PRESENCE_AUDIT_FILE: &str = "presence_audit.csv";
pub const EXTRACT_LOG_FILE: &str = "extract_log.txt";
pub const RECOGNIZED_LOG_FILE: &str = "recognized_log.txt";

const RECON_SUMMARY_COLUMNS: [&str; 9] = [
    "work_name", "spec", "unit", "master_total_qty", "plan_total_qty", "diff", "status",
    "plan_sources", "plan_pages",
];
const RECOGNIZED_SUMMARY_COLUMNS: [&str; 12] = [
    "work_name", "spec", "unit", "actual_qty", "factor", "expected_recognized_qty",
    "recognized_qty_in_master", "diff", "status", "remark", "sources", "pages",
];
const PRESENCE_AUDIT_COLUMNS: [&str; 9] = [
    "source_file", "page", "work_name", "spec", "unit", "qty", "status", "match_level",
    "master_hit",
];
const EXTRACT_LOG_COLUMNS: [&str; 5] = ["file", "page", "table_title", "row_count", "fail_reason"];
const RECOGNIZED_LOG_COLUMNS: [&str; 7] =
    ["index", "work_name", "spec", "unit", "status", "rule_note", "remark"];

// ---------------------------------------------------------------------------
// Cell formatting
// ---------------------------------------------------------------------------

/// Absent values are empty cells, never `0`.
fn opt_cell<T: Display>(value: Option<&T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Plain positional notation; `Display` switches to `5E-7` for small magnitudes.
fn qty_cell(value: &BigDecimal) -> String {
    value.to_plain_string()
}

fn dec_cell(value: &Option<BigDecimal>) -> String {
    value.as_ref().map(qty_cell).unwrap_or_default()
}

fn join_cell<T: Display>(set: &BTreeSet<T>) -> String {
    set.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

fn page_cell(page: u32) -> String {
    if page == 0 {
        String::new()
    } else {
        page.to_string()
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_rows<const N: usize>(
    path: &Path,
    columns: [&str; N],
    rows: impl IntoIterator<Item = [String; N]>,
) -> Result<(), CliError> {
    let io_err = |e: csv::Error| {
        CliError::new(EXIT_RUNTIME, format!("cannot write {}: {e}", path.display()))
    };
    let mut writer = csv::Writer::from_path(path).map_err(io_err)?;
    writer.write_record(columns).map_err(io_err)?;
    for row in rows {
        writer.write_record(&row).map_err(io_err)?;
    }
    writer
        .flush()
        .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write {}: {e}", path.display())))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

pub fn write_recon_summary(path: &Path, items: &[ReconciledItem]) -> Result<(), CliError> {
    write_rows(
        path,
        RECON_SUMMARY_COLUMNS,
        items.iter().map(|item| {
            [
                item.key.work_name.clone(),
                item.key.spec.clone(),
                item.key.unit.clone(),
                dec_cell(&item.master_total_qty),
                dec_cell(&item.plan_total_qty),
                dec_cell(&item.diff),
                item.status.to_string(),
                join_cell(&item.plan_sources),
                join_cell(&item.plan_pages),
            ]
        }),
    )
}

pub fn write_recognized_summary(path: &Path, items: &[RecognizedItem]) -> Result<(), CliError> {
    write_rows(
        path,
        RECOGNIZED_SUMMARY_COLUMNS,
        items.iter().map(|item| {
            [
                item.key.work_name.clone(),
                item.key.spec.clone(),
                item.key.unit.clone(),
                qty_cell(&item.actual_qty),
                opt_cell(item.factor.as_ref()),
                dec_cell(&item.expected_recognized_qty),
                dec_cell(&item.recognized_qty_in_master),
                dec_cell(&item.diff),
                item.status.to_string(),
                item.remark.clone(),
                join_cell(&item.sources),
                join_cell(&item.pages),
            ]
        }),
    )
}

pub fn write_presence_audit(path: &Path, rows: &[PresenceRow]) -> Result<(), CliError> {
    write_rows(
        path,
        PRESENCE_AUDIT_COLUMNS,
        rows.iter().map(|row| {
            [
                row.source_file.clone(),
                page_cell(row.page),
                row.key.work_name.clone(),
                row.key.spec.clone(),
                row.key.unit.clone(),
                qty_cell(&row.qty),
                row.status.to_string(),
                row.match_level.to_string(),
                opt_cell(row.master_hit.as_ref()),
            ]
        }),
    )
}

/// `fail_reason` is empty for per-table info lines, verbatim for upstream lines
/// and `kind: reason` otherwise.
pub fn write_extract_log(path: &Path, entries: &[LogEntry]) -> Result<(), CliError> {
    write_rows(
        path,
        EXTRACT_LOG_COLUMNS,
        entries.iter().map(|entry| {
            let fail_reason = match entry.kind {
                AnomalyKind::Info | AnomalyKind::Upstream => entry.reason.clone(),
                kind => format!("{kind}: {}", entry.reason),
            };
            [
                entry.file.clone(),
                page_cell(entry.page),
                entry.table_title.clone(),
                entry.row_count.to_string(),
                fail_reason,
            ]
        }),
    )
}

pub fn write_recognized_log(path: &Path, entries: &[RuleLogEntry]) -> Result<(), CliError> {
    write_rows(
        path,
        RECOGNIZED_LOG_COLUMNS,
        entries.iter().map(|entry| {
            [
                entry.index.to_string(),
                entry.key.work_name.clone(),
                entry.key.spec.clone(),
                entry.key.unit.clone(),
                entry.status.to_string(),
                entry.rule_note.clone(),
                entry.remark.clone(),
            ]
        }),
    )
}
