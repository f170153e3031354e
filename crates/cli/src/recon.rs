//! `qtycheck totals|recognized|run|audit|validate`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use qtycheck_recon::engine::{run_recognized, run_totals};
use qtycheck_recon::extract::{
    index_master, load_extract_log, load_master_csv, load_plan_csv, load_stage2_actuals,
};
use qtycheck_recon::matcher::master_actuals;
use qtycheck_recon::model::{MasterTable, PlanRow, RecognizedResult, TotalsResult};
use qtycheck_recon::presence::{audit, PresenceStatus};
use qtycheck_recon::{QtyConfig, RunLog};
use serde::Serialize;

use crate::exit_codes::{EXIT_FINDINGS, EXIT_INVALID_CONFIG, EXIT_RUNTIME};
use crate::report;
use crate::{CliError, RunOpts};

const DEFAULT_OUTDIR: &str = "output";

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

// ---------------------------------------------------------------------------
// Shared loading
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| recon_err(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display())))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_config(path: Option<&Path>) -> Result<QtyConfig, CliError> {
    match path {
        None => Ok(QtyConfig::default()),
        Some(path) => {
            let text = read_file(path)?;
            QtyConfig::from_toml(&text).map_err(|e| {
                recon_err(EXIT_INVALID_CONFIG, format!("{}: {e}", path.display()))
                    .with_hint(format!("check with: qtycheck validate {}", path.display()))
            })
        }
    }
}

/// Everything a stage needs, loaded once per invocation.
struct Session {
    config: QtyConfig,
    outdir: PathBuf,
    log: RunLog,
}

impl Session {
    fn open(opts: &RunOpts) -> Result<Self, CliError> {
        let config = load_config(opts.config.as_deref())?;
        let outdir = opts
            .outdir
            .clone()
            .or_else(|| config.output.dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTDIR));
        std::fs::create_dir_all(&outdir).map_err(|e| {
            recon_err(EXIT_RUNTIME, format!("cannot create {}: {e}", outdir.display()))
        })?;

        let mut log = RunLog::new();
        if let Some(path) = &opts.extract_log {
            log.extend(load_extract_log(&read_file(path)?)?);
        }

        Ok(Self { config, outdir, log })
    }

    fn load_plan(&mut self, paths: &[PathBuf]) -> Result<Vec<PlanRow>, CliError> {
        let mut rows = Vec::new();
        for path in paths {
            let text = read_file(path)?;
            rows.extend(load_plan_csv(&text, &file_label(path), &mut self.log)?);
        }
        log::info!("loaded {} plan row(s) from {} file(s)", rows.len(), paths.len());
        Ok(rows)
    }

    fn load_master(&mut self, path: &Path) -> Result<MasterTable, CliError> {
        let text = read_file(path)?;
        let rows = load_master_csv(&text, &file_label(path), &mut self.log)?;
        let table = index_master(rows, self.config.master.on_duplicate, &mut self.log)?;
        log::info!("loaded {} master item(s) from {}", table.len(), path.display());
        Ok(table)
    }

    fn out(&self, name: &str) -> PathBuf {
        self.outdir.join(name)
    }

    fn write_extract_log(&self) -> Result<(), CliError> {
        report::write_extract_log(&self.out(report::EXTRACT_LOG_FILE), self.log.entries())
    }

    fn write_totals(&self, result: &TotalsResult) -> Result<(), CliError> {
        report::write_recon_summary(&self.out(report::RECON_SUMMARY_FILE), &result.items)
    }

    fn write_recognized(&self, result: &RecognizedResult) -> Result<(), CliError> {
        report::write_recognized_summary(&self.out(report::RECOGNIZED_SUMMARY_FILE), &result.items)?;
        report::write_recognized_log(&self.out(report::RECOGNIZED_LOG_FILE), &result.rule_log)
    }
}

fn emit_json<T: Serialize>(value: &T, opts: &RunOpts) -> Result<(), CliError> {
    if !opts.json && opts.output.is_none() {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| recon_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = opts.output {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if opts.json {
        println!("{json_str}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Human summaries (stderr)
// ---------------------------------------------------------------------------

fn print_totals(result: &TotalsResult) {
    let s = &result.summary;
    eprintln!(
        "stage 2: {} item(s) from {} plan row(s) / {} master row(s): {} OK, {} mismatch, {} only in master, {} only in plans",
        s.total_items, s.plan_rows, s.master_rows, s.ok, s.mismatches, s.only_in_master, s.only_in_plans,
    );
}

fn print_recognized(result: &RecognizedResult) {
    let s = &result.summary;
    let statuses: Vec<String> = s.status_counts.iter().map(|(k, v)| format!("{v} {k}")).collect();
    eprintln!("stage 3: {} tree item(s): {}", s.total_items, statuses.join(", "));
    if !s.factor_counts.is_empty() {
        let factors: Vec<String> =
            s.factor_counts.iter().map(|(f, n)| format!("x{f}: {n}")).collect();
        eprintln!("factors: {}", factors.join(", "));
    }
}

fn print_log_tally(log: &RunLog) {
    let anomalies = log.anomaly_count();
    if anomalies > 0 {
        eprintln!("{anomalies} anomaly(ies) recorded in {}", report::EXTRACT_LOG_FILE);
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn cmd_totals(plan: Vec<PathBuf>, master: PathBuf, opts: RunOpts) -> Result<(), CliError> {
    let mut session = Session::open(&opts)?;
    let plan_rows = session.load_plan(&plan)?;
    let master = session.load_master(&master)?;

    let result = run_totals(&session.config, &plan_rows, &master, &mut session.log);
    // the log is worth keeping even when the run fails for missing input
    session.write_extract_log()?;
    let result = result?;
    session.write_totals(&result)?;

    emit_json(&result, &opts)?;
    print_totals(&result);
    print_log_tally(&session.log);

    if result.summary.has_findings() {
        return Err(recon_err(EXIT_FINDINGS, "quantity differences found"));
    }
    Ok(())
}

pub fn cmd_recognized(
    master: PathBuf,
    plan: Vec<PathBuf>,
    stage2: Option<PathBuf>,
    opts: RunOpts,
) -> Result<(), CliError> {
    let mut session = Session::open(&opts)?;
    let master = session.load_master(&master)?;
    let plan_rows = session.load_plan(&plan)?;
    let actuals = match &stage2 {
        Some(path) => load_stage2_actuals(&read_file(path)?)?,
        None => BTreeMap::new(),
    };

    let predicate = session.config.tree.predicate();
    let result = run_recognized(&session.config, &master, &actuals, &plan_rows, &predicate, &mut session.log);
    session.write_extract_log()?;
    let result = result?;
    session.write_recognized(&result)?;

    emit_json(&result, &opts)?;
    print_recognized(&result);
    print_log_tally(&session.log);

    if result.summary.has_findings() {
        return Err(recon_err(EXIT_FINDINGS, "recognized-quantity findings"));
    }
    Ok(())
}

#[derive(Serialize)]
struct RunOutput<'a> {
    totals: &'a TotalsResult,
    recognized: &'a RecognizedResult,
}

pub fn cmd_run(plan: Vec<PathBuf>, master: PathBuf, opts: RunOpts) -> Result<(), CliError> {
    let mut session = Session::open(&opts)?;
    let plan_rows = session.load_plan(&plan)?;
    let master = session.load_master(&master)?;

    let totals = match run_totals(&session.config, &plan_rows, &master, &mut session.log) {
        Ok(totals) => totals,
        Err(e) => {
            session.write_extract_log()?;
            return Err(e.into());
        }
    };
    session.write_totals(&totals)?;

    let actuals = master_actuals(&totals.items);
    let predicate = session.config.tree.predicate();
    let recognized =
        run_recognized(&session.config, &master, &actuals, &plan_rows, &predicate, &mut session.log);
    session.write_extract_log()?;
    let recognized = recognized?;
    session.write_recognized(&recognized)?;

    emit_json(&RunOutput { totals: &totals, recognized: &recognized }, &opts)?;
    print_totals(&totals);
    print_recognized(&recognized);
    print_log_tally(&session.log);

    if totals.summary.has_findings() || recognized.summary.has_findings() {
        return Err(recon_err(EXIT_FINDINGS, "findings in stage 2 or stage 3"));
    }
    Ok(())
}

pub fn cmd_audit(plan: Vec<PathBuf>, master: PathBuf, opts: RunOpts) -> Result<(), CliError> {
    let mut session = Session::open(&opts)?;
    let plan_rows = session.load_plan(&plan)?;
    let master = session.load_master(&master)?;

    let rows = audit(&plan_rows, &master);
    report::write_presence_audit(&session.out(report::PRESENCE_AUDIT_FILE), &rows)?;
    session.write_extract_log()?;
    emit_json(&rows, &opts)?;

    let count = |status: PresenceStatus| rows.iter().filter(|r| r.status == status).count();
    let not_found = count(PresenceStatus::NotFound);
    eprintln!(
        "audit: {} plan row(s): {} found, {} weak, {} not found",
        rows.len(),
        count(PresenceStatus::Found),
        count(PresenceStatus::WeakFound),
        not_found,
    );

    if not_found > 0 {
        return Err(recon_err(EXIT_FINDINGS, format!("{not_found} plan row(s) not in the master table")));
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(config_path.as_path()))?;
    let tolerance = config.tolerance()?;
    eprintln!(
        "valid: '{}' (tolerance {}, on_duplicate = {}, {} work-name / {} spec tree keyword(s))",
        config.name,
        tolerance.value(),
        config.master.on_duplicate,
        config.tree.work_name_keywords.len(),
        config.tree.spec_keywords.len(),
    );
    Ok(())
}
