//! Schema construction and lookup.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use super::vocabulary::{AttributeValue, Axis, Category};
use crate::evaluator::evaluate;
use crate::formula::Formula;
use crate::types::Facts;

/// Errors from building or validating a schema. All are fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{category} references {axis}({value}), which the schema does not declare")]
    UnknownReference {
        category: Category,
        axis: Axis,
        value: AttributeValue,
    },

    #[error("Axis {0} declared more than once")]
    DuplicateAxis(Axis),

    #[error("Value {0} declared more than once")]
    DuplicateValue(AttributeValue),

    #[error("Axis {0} declares no values")]
    EmptyAxis(Axis),

    #[error("Category {0} defined more than once")]
    DuplicateCategory(Category),

    #[error("Category {0} can never be satisfied")]
    Unsatisfiable(Category),
}

/// For each axis value, the categories that positively require it.
pub type PropertyIndex = BTreeMap<Axis, BTreeMap<AttributeValue, Vec<Category>>>;

#[derive(Debug, Clone, Serialize)]
struct AxisDefinition {
    axis: Axis,
    values: Vec<AttributeValue>,
}

/// The immutable taxonomy: axes with ordered values, one formula per
/// category.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    axes: Vec<AxisDefinition>,
    formulas: BTreeMap<Category, Formula>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Declared values of `axis`, in order. Empty if the axis is undeclared.
    pub fn axis_values(&self, axis: Axis) -> &[AttributeValue] {
        self.axes
            .iter()
            .find(|d| d.axis == axis)
            .map(|d| d.values.as_slice())
            .unwrap_or(&[])
    }

    /// Defining formula of `category`, if the schema defines it.
    pub fn formula_for(&self, category: Category) -> Option<&Formula> {
        self.formulas.get(&category)
    }

    /// Defined categories, in vocabulary order.
    pub fn all_categories(&self) -> Vec<Category> {
        self.formulas.keys().copied().collect()
    }

    /// Declared axes, in declaration order.
    pub fn all_axes(&self) -> Vec<Axis> {
        self.axes.iter().map(|d| d.axis).collect()
    }

    /// Whether `value` is declared on `axis`.
    pub fn declares(&self, axis: Axis, value: AttributeValue) -> bool {
        self.axis_values(axis).contains(&value)
    }

    /// Every `(axis, value)` pair in axis order then value order.
    pub fn all_values(&self) -> impl Iterator<Item = (Axis, AttributeValue)> + '_ {
        self.axes
            .iter()
            .flat_map(|d| d.values.iter().map(move |v| (d.axis, *v)))
    }

    /// A fact set satisfying `category`'s formula, if one exists.
    ///
    /// Searches the whole closed attribute space: each declared axis is
    /// either absent or holds one of its values.
    pub fn witness(&self, category: Category) -> Option<Facts> {
        let formula = self.formula_for(category)?;

        // Mixed-radix counter; digit 0 means the axis is absent.
        let radices: Vec<usize> = self.axes.iter().map(|d| d.values.len() + 1).collect();
        let mut digits = vec![0usize; radices.len()];

        loop {
            let mut facts = Facts::new();
            for (definition, &digit) in self.axes.iter().zip(&digits) {
                if digit > 0 {
                    // Axes are distinct, so this assertion cannot collide.
                    let _ = facts.assert(definition.axis, definition.values[digit - 1]);
                }
            }
            if evaluate(formula, &facts) {
                return Some(facts);
            }

            let mut position = 0;
            loop {
                if position == digits.len() {
                    return None;
                }
                digits[position] += 1;
                if digits[position] < radices[position] {
                    break;
                }
                digits[position] = 0;
                position += 1;
            }
        }
    }

    /// Fail on the first category no fact set can satisfy.
    pub fn check_satisfiable(&self) -> Result<(), SchemaError> {
        for &category in self.formulas.keys() {
            if self.witness(category).is_none() {
                return Err(SchemaError::Unsatisfiable(category));
            }
        }
        Ok(())
    }

    /// Categories whose formula positively requires `value` on `axis`.
    pub fn categories_requiring(&self, axis: Axis, value: AttributeValue) -> Vec<Category> {
        self.formulas
            .iter()
            .filter(|(_, formula)| formula.requires(axis, value))
            .map(|(category, _)| *category)
            .collect()
    }

    /// The requirement index for every declared value. Values that no
    /// category requires are left out.
    pub fn property_index(&self) -> PropertyIndex {
        let mut index = PropertyIndex::new();
        for (axis, value) in self.all_values() {
            let categories = self.categories_requiring(axis, value);
            if !categories.is_empty() {
                index.entry(axis).or_default().insert(value, categories);
            }
        }
        index
    }
}

enum Definition {
    Formula(Formula),
    Exact(Vec<(Axis, AttributeValue)>),
}

/// Builder for [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    axes: Vec<(Axis, Vec<AttributeValue>)>,
    definitions: Vec<(Category, Definition)>,
}

impl SchemaBuilder {
    /// Declare an axis and its ordered, mutually exclusive values.
    pub fn axis(mut self, axis: Axis, values: impl IntoIterator<Item = AttributeValue>) -> Self {
        self.axes.push((axis, values.into_iter().collect()));
        self
    }

    /// Define a category by an explicit formula.
    pub fn category(mut self, category: Category, formula: Formula) -> Self {
        self.definitions.push((category, Definition::Formula(formula)));
        self
    }

    /// Define a category by an exact attribute vector. Expanded at build
    /// time into positive atoms plus negations of every other declared value.
    pub fn exact(mut self, category: Category, required: &[(Axis, AttributeValue)]) -> Self {
        self.definitions
            .push((category, Definition::Exact(required.to_vec())));
        self
    }

    /// Validate every reference and freeze the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut seen_axes = HashSet::new();
        let mut seen_values = HashSet::new();
        let mut axes = Vec::with_capacity(self.axes.len());

        for (axis, values) in self.axes {
            if !seen_axes.insert(axis) {
                return Err(SchemaError::DuplicateAxis(axis));
            }
            if values.is_empty() {
                return Err(SchemaError::EmptyAxis(axis));
            }
            for &value in &values {
                if !seen_values.insert(value) {
                    return Err(SchemaError::DuplicateValue(value));
                }
            }
            axes.push(AxisDefinition { axis, values });
        }

        let mut schema = Schema {
            axes,
            formulas: BTreeMap::new(),
        };

        for (category, definition) in self.definitions {
            if schema.formulas.contains_key(&category) {
                return Err(SchemaError::DuplicateCategory(category));
            }

            let formula = match definition {
                Definition::Formula(formula) => formula,
                Definition::Exact(required) => Formula::exactly(
                    schema
                        .axes
                        .iter()
                        .map(|d| (d.axis, d.values.as_slice())),
                    &required,
                ),
            };

            for (axis, value) in formula.atoms() {
                if !schema.declares(axis, value) {
                    return Err(SchemaError::UnknownReference {
                        category,
                        axis,
                        value,
                    });
                }
            }

            schema.formulas.insert(category, formula);
        }

        Ok(schema)
    }
}
