//! Formula evaluation under closed-world negation.
//!
//! Evaluation is two-valued and pure. An axis with no asserted value makes
//! every `hasAxis(*)` atom false, so every negated atom on that axis holds.
//! Nothing here can fail.

use crate::formula::Formula;
use crate::types::Facts;

/// Evaluate `formula` against one item's facts.
pub fn evaluate(formula: &Formula, facts: &Facts) -> bool {
    match formula {
        Formula::HasValue { axis, value } => facts.has(*axis, *value),
        Formula::Not(inner) => !evaluate(inner, facts),
        Formula::And(children) => children.iter().all(|child| evaluate(child, facts)),
    }
}

/// The top-level conjuncts of `formula` that are false for `facts`.
///
/// Empty iff the formula holds.
pub fn unmet_conjuncts<'f>(formula: &'f Formula, facts: &Facts) -> Vec<&'f Formula> {
    formula
        .conjuncts()
        .iter()
        .filter(|conjunct| !evaluate(conjunct, facts))
        .collect()
}
