//! Decimal quantities: lenient parsing of table cells and the tolerance policy.

use std::str::FromStr;
use std::sync::OnceLock;

use bigdecimal::BigDecimal;
use regex::Regex;

use crate::error::ReconError;
use crate::normalize::normalize;

/// Default absolute tolerance for both stages.
pub const DEFAULT_TOLERANCE: &str = "0.001";

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?").expect("static pattern"))
}

/// Parse a quantity cell.
///
/// - Strips thousands separators (`1,234.5` → `1234.5`)
/// - Takes the first signed decimal literal, so trailing units are ignored (`12 주` → `12`)
/// - Accepts an exponent suffix (`5E-7`), the form `BigDecimal` prints for small values
/// - Returns None for blank cells and cells without any digits
pub fn parse_quantity(cell: &str) -> Option<BigDecimal> {
    let text = normalize(cell).replace(',', "");
    if text.is_empty() {
        return None;
    }
    let literal = number_re().find(&text)?;
    BigDecimal::from_str(literal.as_str()).ok()
}

/// Absolute tolerance applied to `|diff|`, independent of magnitude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tolerance(BigDecimal);

impl Tolerance {
    pub fn new(value: BigDecimal) -> Result<Self, ReconError> {
        if value < BigDecimal::from(0) {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance must not be negative, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Parse an exact decimal string such as `"0.001"`.
    pub fn parse(text: &str) -> Result<Self, ReconError> {
        let value = BigDecimal::from_str(text.trim()).map_err(|_| ReconError::InvalidQuantity {
            field: "tolerance.quantity".into(),
            value: text.into(),
        })?;
        Self::new(value)
    }

    pub fn value(&self) -> &BigDecimal {
        &self.0
    }

    pub fn within(&self, diff: &BigDecimal) -> bool {
        diff.abs() <= self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        // 0.001 = 1 × 10^-3
        Self(BigDecimal::new(1.into(), 3))
    }
}
