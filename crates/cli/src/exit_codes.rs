//! CLI Exit Code Registry
//!
//! Single source of truth for `qtycheck` exit codes. Scripts and CI jobs
//! rely on them, so codes are never reused for a different meaning.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                      |
//! |------|--------------------------------------------------------------|
//! | 0    | Every item is OK (or EXCLUDED)                               |
//! | 1    | General error (unspecified)                                  |
//! | 2    | Usage error (clap: bad arguments, missing options)           |
//! | 3    | Findings: mismatch, one-sided key, rule not found, candidate |
//! | 4    | Invalid config                                               |
//! | 5    | Runtime failure (IO, unreadable CSV, rejected duplicate)     |
//! | 6    | Missing input: no plan rows or no master rows at all         |

use qtycheck_recon::ReconError;

/// Success - all items reconciled.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error. Emitted by clap itself.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

/// The run completed and reported items that need attention.
pub const EXIT_FINDINGS: u8 = 3;

/// Config file failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// IO, CSV or other failure while running.
pub const EXIT_RUNTIME: u8 = 5;

/// A whole input table is absent. Distinct from per-row statuses.
pub const EXIT_MISSING_INPUT: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::InvalidQuantity { .. } => EXIT_INVALID_CONFIG,
        ReconError::MissingInput(_) => EXIT_MISSING_INPUT,
        ReconError::MissingColumn { .. }
        | ReconError::DuplicateMasterKey { .. }
        | ReconError::Csv(_) => EXIT_RUNTIME,
    }
}
