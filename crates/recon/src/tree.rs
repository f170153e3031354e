//! Tree-candidate categorization, injected by the caller.
//!
//! Which work items count as trees is project configuration, so Stage 3
//! takes any `TreePredicate` rather than matching strings itself.

use crate::model::LineItemKey;

pub trait TreePredicate {
    fn is_tree_candidate(&self, key: &LineItemKey) -> bool;
}

impl<F> TreePredicate for F
where
    F: Fn(&LineItemKey) -> bool,
{
    fn is_tree_candidate(&self, key: &LineItemKey) -> bool {
        self(key)
    }
}

/// Substring match against the work name, or against the spec
/// (`H3.0×W1.5`, `R10`, `흉고 8cm` …).
#[derive(Debug, Clone, Default)]
pub struct KeywordTreePredicate {
    work_name_keywords: Vec<String>,
    spec_keywords: Vec<String>,
}

impl KeywordTreePredicate {
    pub fn new(work_name_keywords: Vec<String>, spec_keywords: Vec<String>) -> Self {
        Self {
            work_name_keywords,
            spec_keywords,
        }
    }
}

impl TreePredicate for KeywordTreePredicate {
    fn is_tree_candidate(&self, key: &LineItemKey) -> bool {
        self.work_name_keywords
            .iter()
            .any(|k| key.work_name.contains(k.as_str()))
            || self.spec_keywords.iter().any(|k| key.spec.contains(k.as_str()))
    }
}
