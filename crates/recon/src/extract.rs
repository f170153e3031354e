//! Input loading: CSV text produced by the drawing-table extractor → typed rows.
//!
//! Header captions vary between drawing sets, so columns are located by
//! candidate names (canonical English or Korean table captions). Row-level
//! problems are logged to the `RunLog` and never abort the load.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use bigdecimal::BigDecimal;

use crate::config::DuplicatePolicy;
use crate::error::ReconError;
use crate::model::{LineItemKey, MasterRow, MasterTable, PlanRow};
use crate::normalize::{compact, normalize};
use crate::quantity::parse_quantity;
use crate::runlog::{AnomalyKind, LogEntry, RunLog};

pub const PLAN_TABLE_TITLE: &str = "수량표";
pub const MASTER_TABLE_TITLE: &str = "총괄수량표";

// ---------------------------------------------------------------------------
// Column detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    SourceFile,
    Page,
    WorkName,
    Spec,
    Unit,
    Qty,
    RecognizedQty,
    Remark,
}

struct ColumnSpec {
    column: Column,
    /// Whole-caption matches, compared lowercase with whitespace removed.
    exact: &'static [&'static str],
    /// Substring matches, tried only after every exact match is claimed.
    contains: &'static [&'static str],
}

const SOURCE_FILE: ColumnSpec = ColumnSpec {
    column: Column::SourceFile,
    exact: &["source_file", "source_pdf", "file", "파일명"],
    contains: &[],
};
const PAGE: ColumnSpec = ColumnSpec {
    column: Column::Page,
    exact: &["page", "source_page", "원본페이지", "페이지"],
    contains: &[],
};
const WORK_NAME: ColumnSpec = ColumnSpec {
    column: Column::WorkName,
    exact: &["work_name", "공종", "품명", "명칭", "항목", "수목명"],
    contains: &["공종", "품명", "명칭", "항목"],
};
const SPEC: ColumnSpec = ColumnSpec {
    column: Column::Spec,
    exact: &["spec", "규격", "사양", "치수"],
    contains: &["규격", "사양", "치수"],
};
const UNIT: ColumnSpec = ColumnSpec {
    column: Column::Unit,
    exact: &["unit", "단위"],
    contains: &["단위"],
};
const RECOGNIZED_QTY: ColumnSpec = ColumnSpec {
    column: Column::RecognizedQty,
    exact: &["recognized_qty", "recognized_qty_in_master", "인정수량", "법적수량"],
    contains: &["인정", "법적"],
};
const PLAN_QTY: ColumnSpec = ColumnSpec {
    column: Column::Qty,
    exact: &["qty", "수량", "물량", "합계", "총수량", "실제수량"],
    contains: &["수량", "물량", "합계"],
};
const MASTER_QTY: ColumnSpec = ColumnSpec {
    column: Column::Qty,
    exact: &["master_total_qty", "total_qty", "qty", "합계", "실제수량", "총수량", "수량", "물량"],
    contains: &["합계", "실제수량", "총수량", "수량", "물량"],
};
const REMARK: ColumnSpec = ColumnSpec {
    column: Column::Remark,
    exact: &["remark", "비고", "참고"],
    contains: &["비고", "참고"],
};

// Specific roles come before generic ones so `인정수량` never lands on Qty.
const PLAN_COLUMNS: [&ColumnSpec; 8] = [
    &SOURCE_FILE, &PAGE, &RECOGNIZED_QTY, &WORK_NAME, &SPEC, &UNIT, &PLAN_QTY, &REMARK,
];
const MASTER_COLUMNS: [&ColumnSpec; 8] = [
    &SOURCE_FILE, &PAGE, &RECOGNIZED_QTY, &WORK_NAME, &SPEC, &UNIT, &MASTER_QTY, &REMARK,
];

/// Map header captions to columns. Each header cell is claimed at most once.
fn detect_columns(headers: &[String], specs: &[&ColumnSpec]) -> HashMap<Column, usize> {
    let captions: Vec<String> = headers.iter().map(|h| compact(h).to_lowercase()).collect();
    let mut claimed = vec![false; captions.len()];
    let mut found: HashMap<Column, usize> = HashMap::new();

    for spec in specs {
        if let Some(i) = (0..captions.len())
            .find(|&i| !claimed[i] && spec.exact.iter().any(|name| captions[i] == *name))
        {
            claimed[i] = true;
            found.insert(spec.column, i);
        }
    }

    for spec in specs {
        if found.contains_key(&spec.column) {
            continue;
        }
        if let Some(i) = (0..captions.len()).find(|&i| {
            !claimed[i] && spec.contains.iter().any(|part| captions[i].contains(part))
        }) {
            claimed[i] = true;
            found.insert(spec.column, i);
        }
    }

    found
}

fn require(
    found: &HashMap<Column, usize>,
    column: Column,
    table: &str,
    name: &str,
) -> Result<(), ReconError> {
    if found.contains_key(&column) {
        Ok(())
    } else {
        Err(ReconError::MissingColumn {
            table: table.into(),
            column: name.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Row filters
// ---------------------------------------------------------------------------

/// Captions, totals and group subtotals that extractors pick up as data rows.
const NON_ITEM_NAMES: &[&str] = &[
    "work_name", "구분", "기호", "수목명", "품명", "명칭", "항목", "규격", "단위",
    "인정수량", "실제수량", "지상층", "옥상층", "비고", "합계", "총계", "소계",
    "교목계", "관목계", "초화류계", "식재지반계", "subtotal", "total",
];
const NON_ITEM_SUFFIXES: &[&str] = &["소계", "합계", "총계"];
const NOTE_MARKERS: &[&str] = &["NOTE", "노트", "주)"];

/// True for header, total and note rows that are not work items.
pub fn is_non_item_row(work_name: &str) -> bool {
    let name = compact(work_name);
    if name.is_empty() {
        return false;
    }
    let lower = name.to_lowercase();
    let upper = name.to_uppercase();
    NON_ITEM_NAMES.contains(&lower.as_str())
        || NON_ITEM_SUFFIXES.iter().any(|s| name.ends_with(s))
        || NOTE_MARKERS.iter().any(|m| upper.contains(m))
}

fn parse_page(cell: &str) -> u32 {
    cell.trim().parse().unwrap_or(0)
}

/// Per (file, page) row tally, flushed to the log as info entries.
#[derive(Default)]
struct TableTally(BTreeMap<(String, u32), usize>);

impl TableTally {
    fn bump(&mut self, file: &str, page: u32) {
        *self.0.entry((file.to_string(), page)).or_insert(0) += 1;
    }

    fn flush(self, title: &str, log: &mut RunLog) {
        for ((file, page), count) in self.0 {
            log.table_rows(&file, page, title, count);
        }
    }
}

struct Cells<'a> {
    record: &'a csv::StringRecord,
    columns: &'a HashMap<Column, usize>,
}

impl Cells<'_> {
    fn get(&self, column: Column) -> String {
        self.columns
            .get(&column)
            .and_then(|&i| self.record.get(i))
            .map(normalize)
            .unwrap_or_default()
    }

    fn is_blank(&self) -> bool {
        self.record.iter().all(|c| c.trim().is_empty())
    }

    fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }
}

fn read_headers(reader: &mut csv::Reader<&[u8]>) -> Result<Vec<String>, ReconError> {
    Ok(reader.headers()?.iter().map(|h| h.to_string()).collect())
}

fn csv_reader(csv_data: &str) -> csv::Reader<&[u8]> {
    // Spreadsheet exports often start with a UTF-8 BOM.
    let data = csv_data.strip_prefix('\u{feff}').unwrap_or(csv_data);
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes())
}

// ---------------------------------------------------------------------------
// Plan sheets
// ---------------------------------------------------------------------------

/// Load plan-sheet quantity rows.
///
/// `default_source` names the file when the CSV has no source column.
/// Rows without a usable quantity are logged and dropped.
pub fn load_plan_csv(
    csv_data: &str,
    default_source: &str,
    log: &mut RunLog,
) -> Result<Vec<PlanRow>, ReconError> {
    let mut reader = csv_reader(csv_data);
    let headers = read_headers(&mut reader)?;
    let columns = detect_columns(&headers, &PLAN_COLUMNS);
    require(&columns, Column::WorkName, "plan", "work_name")?;
    require(&columns, Column::Qty, "plan", "qty")?;

    let mut rows = Vec::new();
    let mut tally = TableTally::default();
    let mut carry_work_name = String::new();

    for record in reader.records() {
        let record = record?;
        let cells = Cells { record: &record, columns: &columns };
        if cells.is_blank() {
            continue;
        }

        let mut work_name = cells.get(Column::WorkName);
        if work_name.is_empty() {
            work_name = carry_work_name.clone();
        } else {
            carry_work_name = work_name.clone();
        }

        let qty_text = cells.get(Column::Qty);
        if work_name.is_empty() && qty_text.is_empty() {
            continue;
        }

        let source = cells.get(Column::SourceFile);
        let source_file = if source.is_empty() { default_source.to_string() } else { source };
        let page = parse_page(&cells.get(Column::Page));

        if is_non_item_row(&work_name) {
            log::info!("{source_file}:{page} skipping non-item row '{work_name}'");
            continue;
        }

        let key = LineItemKey::new(&work_name, &cells.get(Column::Spec), &cells.get(Column::Unit));
        match parse_quantity(&qty_text) {
            Some(qty) => {
                tally.bump(&source_file, page);
                rows.push(PlanRow { key, qty, source_file, page });
            }
            None => log.anomaly(
                AnomalyKind::Extraction,
                &source_file,
                page,
                PLAN_TABLE_TITLE,
                format!(
                    "line {} ({key}): quantity {qty_text:?} missing or non-numeric; row excluded",
                    cells.line()
                ),
            ),
        }
    }

    tally.flush(PLAN_TABLE_TITLE, log);
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Master table
// ---------------------------------------------------------------------------

/// Load master summary rows. A blank or non-numeric total is kept as `None`.
pub fn load_master_csv(
    csv_data: &str,
    default_source: &str,
    log: &mut RunLog,
) -> Result<Vec<MasterRow>, ReconError> {
    let mut reader = csv_reader(csv_data);
    let headers = read_headers(&mut reader)?;
    let columns = detect_columns(&headers, &MASTER_COLUMNS);
    require(&columns, Column::WorkName, "master", "work_name")?;
    require(&columns, Column::Qty, "master", "master_total_qty")?;

    let mut rows = Vec::new();
    let mut tally = TableTally::default();
    let mut carry_work_name = String::new();

    for record in reader.records() {
        let record = record?;
        let cells = Cells { record: &record, columns: &columns };
        if cells.is_blank() {
            continue;
        }

        let mut work_name = cells.get(Column::WorkName);
        if work_name.is_empty() {
            work_name = carry_work_name.clone();
        } else {
            carry_work_name = work_name.clone();
        }

        let total_text = cells.get(Column::Qty);
        let recognized_text = cells.get(Column::RecognizedQty);
        if work_name.is_empty() && total_text.is_empty() && recognized_text.is_empty() {
            continue;
        }
        let source = cells.get(Column::SourceFile);
        let source_file = if source.is_empty() { default_source.to_string() } else { source };
        let page = parse_page(&cells.get(Column::Page));

        if is_non_item_row(&work_name) {
            log::info!("{source_file}:{page} skipping non-item row '{work_name}'");
            continue;
        }

        let key = LineItemKey::new(&work_name, &cells.get(Column::Spec), &cells.get(Column::Unit));

        let recognized_qty = parse_quantity(&recognized_text);
        if recognized_qty.is_none() && !recognized_text.is_empty() {
            log.anomaly(
                AnomalyKind::Extraction,
                &source_file,
                page,
                MASTER_TABLE_TITLE,
                format!(
                    "line {} ({key}): recognized quantity {recognized_text:?} is not numeric",
                    cells.line()
                ),
            );
        }

        tally.bump(&source_file, page);
        rows.push(MasterRow {
            key,
            total_qty: parse_quantity(&total_text),
            recognized_qty,
            remark: cells.get(Column::Remark),
            source_file,
            page,
        });
    }

    tally.flush(MASTER_TABLE_TITLE, log);
    Ok(rows)
}

/// Index master rows by key. Duplicates are always logged; `policy` decides
/// whether the first row wins, rows are summed, or the run fails.
pub fn index_master(
    rows: Vec<MasterRow>,
    policy: DuplicatePolicy,
    log: &mut RunLog,
) -> Result<MasterTable, ReconError> {
    let mut table = MasterTable::new();

    for row in rows {
        match table.entry(row.key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                log.anomaly(
                    AnomalyKind::DuplicateMasterKey,
                    &row.source_file,
                    row.page,
                    MASTER_TABLE_TITLE,
                    format!("({}) listed more than once; on_duplicate = {policy}", row.key),
                );
                match policy {
                    DuplicatePolicy::KeepFirst => {}
                    DuplicatePolicy::Sum => merge_master_rows(slot.get_mut(), row),
                    DuplicatePolicy::Reject => {
                        return Err(ReconError::DuplicateMasterKey {
                            work_name: row.key.work_name,
                            spec: row.key.spec,
                            unit: row.key.unit,
                        })
                    }
                }
            }
        }
    }

    Ok(table)
}

fn merge_master_rows(into: &mut MasterRow, other: MasterRow) {
    into.total_qty = add_present(into.total_qty.take(), other.total_qty);
    into.recognized_qty = add_present(into.recognized_qty.take(), other.recognized_qty);
    if !other.remark.is_empty() && other.remark != into.remark {
        into.remark = if into.remark.is_empty() {
            other.remark
        } else {
            format!("{} / {}", into.remark, other.remark)
        };
    }
}

fn add_present(a: Option<BigDecimal>, b: Option<BigDecimal>) -> Option<BigDecimal> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

// ---------------------------------------------------------------------------
// Previous-run artifacts
// ---------------------------------------------------------------------------

/// Read `master_total_qty` per key from a Stage-2 `recon_summary.csv`.
pub fn load_stage2_actuals(csv_data: &str) -> Result<BTreeMap<LineItemKey, BigDecimal>, ReconError> {
    let mut reader = csv_reader(csv_data);
    let headers = read_headers(&mut reader)?;
    let idx = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| ReconError::MissingColumn {
            table: "recon_summary".into(),
            column: name.into(),
        })
    };
    let (work_idx, spec_idx, unit_idx, total_idx) =
        (idx("work_name")?, idx("spec")?, idx("unit")?, idx("master_total_qty")?);

    let mut actuals = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or("");
        if let Some(total) = parse_quantity(cell(total_idx)) {
            actuals.insert(LineItemKey::new(cell(work_idx), cell(spec_idx), cell(unit_idx)), total);
        }
    }
    Ok(actuals)
}

/// Read an upstream extractor log (`file,page,table_title,row_count,fail_reason`).
pub fn load_extract_log(csv_data: &str) -> Result<Vec<LogEntry>, ReconError> {
    let mut reader = csv_reader(csv_data);
    let headers = read_headers(&mut reader)?;
    let idx = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| ReconError::MissingColumn {
            table: "extract_log".into(),
            column: name.into(),
        })
    };
    let (file_idx, page_idx, title_idx, count_idx, reason_idx) = (
        idx("file")?,
        idx("page")?,
        idx("table_title")?,
        idx("row_count")?,
        idx("fail_reason")?,
    );

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        let reason = cell(reason_idx);
        entries.push(LogEntry {
            file: cell(file_idx),
            page: parse_page(&cell(page_idx)),
            table_title: cell(title_idx),
            row_count: cell(count_idx).parse().unwrap_or(0),
            kind: if reason.is_empty() { AnomalyKind::Info } else { AnomalyKind::Upstream },
            reason,
        });
    }
    Ok(entries)
}
