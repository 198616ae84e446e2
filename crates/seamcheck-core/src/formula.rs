//! Defining formulas.
//!
//! A category is defined by a boolean expression over `hasAxis(value)` atoms.
//! Formulas are immutable once built; the schema checks that every atom
//! refers to a declared axis and value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{AttributeValue, Axis};

/// A tagged expression tree over attribute atoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formula {
    /// The item has `value` on `axis`.
    HasValue { axis: Axis, value: AttributeValue },

    /// True iff every child is true. Empty is vacuously true.
    And(Vec<Formula>),

    /// Boolean negation.
    Not(Box<Formula>),
}

impl Formula {
    pub fn has(axis: Axis, value: AttributeValue) -> Self {
        Formula::HasValue { axis, value }
    }

    pub fn and(children: impl IntoIterator<Item = Formula>) -> Self {
        Formula::And(children.into_iter().collect())
    }

    pub fn not(inner: Formula) -> Self {
        Formula::Not(Box::new(inner))
    }

    /// The closed-world definition of an exact attribute vector.
    ///
    /// Positive atoms for `required` come first, then a negated atom for
    /// every other value of every axis in `axes`.
    pub fn exactly<'a>(
        axes: impl IntoIterator<Item = (Axis, &'a [AttributeValue])>,
        required: &[(Axis, AttributeValue)],
    ) -> Self {
        let mut conjuncts: Vec<Formula> = required
            .iter()
            .map(|&(axis, value)| Formula::has(axis, value))
            .collect();

        for (axis, values) in axes {
            for &value in values {
                if !required.contains(&(axis, value)) {
                    conjuncts.push(Formula::not(Formula::has(axis, value)));
                }
            }
        }

        Formula::And(conjuncts)
    }

    /// Every atom in the tree, in depth-first order.
    pub fn atoms(&self) -> Vec<(Axis, AttributeValue)> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<(Axis, AttributeValue)>) {
        match self {
            Formula::HasValue { axis, value } => out.push((*axis, *value)),
            Formula::And(children) => children.iter().for_each(|c| c.collect_atoms(out)),
            Formula::Not(inner) => inner.collect_atoms(out),
        }
    }

    /// Whether the formula positively requires `value` on `axis`.
    ///
    /// Only atoms reachable through `And` nodes count; anything under a
    /// `Not` is a prohibition, not a requirement.
    pub fn requires(&self, axis: Axis, value: AttributeValue) -> bool {
        match self {
            Formula::HasValue { axis: a, value: v } => *a == axis && *v == value,
            Formula::And(children) => children.iter().any(|c| c.requires(axis, value)),
            Formula::Not(_) => false,
        }
    }

    /// Top-level conjuncts (a non-`And` formula is its own single conjunct).
    pub fn conjuncts(&self) -> &[Formula] {
        match self {
            Formula::And(children) => children,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::HasValue { axis, value } => write!(f, "{}({})", axis.predicate(), value),
            Formula::Not(inner) => match inner.as_ref() {
                Formula::And(_) => write!(f, "not ({})", inner),
                _ => write!(f, "not {}", inner),
            },
            Formula::And(children) if children.is_empty() => f.write_str("true"),
            Formula::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    match child {
                        Formula::And(_) => write!(f, "({})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
        }
    }
}
