//! The taxonomy: closed vocabulary, category definitions and the standard
//! table.
//!
//! A schema is built once and never mutated. Building fails if any formula
//! references an axis or value the schema does not declare.

mod definition;
mod standard;
mod vocabulary;

pub use definition::{PropertyIndex, Schema, SchemaBuilder, SchemaError};
pub use standard::{build_standard, STANDARD_SCHEMA_VERSION};
pub use vocabulary::{AttributeValue, Axis, Category, UnknownName};
