//! Remark classification for tree items.
//!
//! Rules are an ordered list evaluated top-down; the first rule that fires
//! decides. Exclusion phrases sit above the factor pattern, so a remark that
//! says both is `Excluded`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::normalize::{compact, normalize};

/// Phrases meaning "excluded from recognized quantity". Compared as exact
/// substrings with all whitespace removed on both sides.
pub const EXCLUSION_PHRASES: [&str; 3] = ["인정수량 제외", "인정 제외", "산입 제외"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleOutcome {
    Excluded,
    Recognized { factor: u32 },
    RuleNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleNote {
    RemarkEmpty,
    ExcludeKeyword(&'static str),
    Factor(u32),
    /// Distinct factors in order of appearance; the largest was used.
    FactorConflict(Vec<u32>),
    /// Factor literals too large to represent; the remark is not classified.
    FactorOverflow(Vec<String>),
    FactorNotFound,
}

impl std::fmt::Display for RuleNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemarkEmpty => write!(f, "remark_empty"),
            Self::ExcludeKeyword(phrase) => write!(f, "exclude_keyword:{phrase}"),
            Self::Factor(n) => write!(f, "factor:{n}"),
            Self::FactorConflict(factors) => {
                let list: Vec<String> = factors.iter().map(|n| n.to_string()).collect();
                write!(f, "factor_conflict:{}", list.join(","))
            }
            Self::FactorOverflow(literals) => write!(f, "factor_overflow:{}", literals.join(",")),
            Self::FactorNotFound => write!(f, "factor_not_found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTrace {
    pub outcome: RuleOutcome,
    pub note: RuleNote,
}

struct Rule {
    name: &'static str,
    apply: fn(&str) -> Option<RuleTrace>,
}

const RULES: &[Rule] = &[
    Rule { name: "remark_empty", apply: empty_rule },
    Rule { name: "exclusion", apply: exclusion_rule },
    Rule { name: "week_recognized", apply: factor_rule },
];

/// Classify a remark. Total: every input yields exactly one outcome.
pub fn classify(remark: &str) -> RuleOutcome {
    explain(remark).outcome
}

/// Classify a remark and say which rule decided it.
pub fn explain(remark: &str) -> RuleTrace {
    let text = normalize(remark);
    RULES
        .iter()
        .find_map(|rule| {
            let trace = (rule.apply)(&text)?;
            log::trace!("remark {text:?}: rule '{}' fired", rule.name);
            Some(trace)
        })
        .unwrap_or(RuleTrace {
            outcome: RuleOutcome::RuleNotFound,
            note: RuleNote::FactorNotFound,
        })
}

fn empty_rule(text: &str) -> Option<RuleTrace> {
    text.is_empty().then_some(RuleTrace {
        outcome: RuleOutcome::RuleNotFound,
        note: RuleNote::RemarkEmpty,
    })
}

fn exclusion_rule(text: &str) -> Option<RuleTrace> {
    let haystack = compact(text);
    EXCLUSION_PHRASES
        .iter()
        .find(|phrase| haystack.contains(&compact(phrase)))
        .map(|phrase| RuleTrace {
            outcome: RuleOutcome::Excluded,
            note: RuleNote::ExcludeKeyword(*phrase),
        })
}

fn factor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*주\s*인정").expect("static pattern"))
}

fn factor_rule(text: &str) -> Option<RuleTrace> {
    let mut factors: Vec<u32> = Vec::new();
    let mut overflow: Vec<String> = Vec::new();
    for caps in factor_re().captures_iter(text) {
        let Ok(n) = caps[1].parse::<u32>() else {
            overflow.push(caps[1].to_string());
            continue;
        };
        if n > 0 && !factors.contains(&n) {
            factors.push(n);
        }
    }

    // An unrepresentable factor would otherwise lose to a smaller one.
    if !overflow.is_empty() {
        return Some(RuleTrace {
            outcome: RuleOutcome::RuleNotFound,
            note: RuleNote::FactorOverflow(overflow),
        });
    }

    let factor = *factors.iter().max()?;
    let note = if factors.len() > 1 {
        RuleNote::FactorConflict(factors)
    } else {
        RuleNote::Factor(factor)
    };
    Some(RuleTrace {
        outcome: RuleOutcome::Recognized { factor },
        note,
    })
}
