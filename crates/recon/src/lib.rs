//! `qtycheck-recon`: quantity reconciliation for landscaping drawing sets.
//!
//! Stage 2 checks plan-sheet quantity tables against the master summary
//! table by `(work_name, spec, unit)`. Stage 3 reads master remarks of tree
//! items and checks the recognized quantities they imply.
//!
//! Pure engine crate: receives CSV text or pre-loaded rows, returns typed
//! results. No CLI or filesystem access.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod presence;
pub mod quantity;
pub mod recognized;
pub mod remark;
pub mod runlog;
pub mod tree;

pub use config::{DuplicatePolicy, QtyConfig};
pub use engine::{run_recognized, run_totals};
pub use error::ReconError;
pub use model::{
    LineItemKey, MasterRow, MasterTable, PlanRow, RecognizedItem, RecognizedResult,
    RecognizedStatus, ReconStatus, ReconciledItem, TotalsResult,
};
pub use remark::{classify, RuleOutcome};
pub use runlog::{AnomalyKind, LogEntry, RunLog};
pub use tree::{KeywordTreePredicate, TreePredicate};
