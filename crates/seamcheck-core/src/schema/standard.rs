//! The standard clothing taxonomy compiled into the engine.
//!
//! Ten categories over three axes. Each category is an exact attribute
//! vector: its three required values hold and every other value is negated.
//! Changing this table requires a new build.

use std::sync::OnceLock;

use super::definition::{Schema, SchemaError};
use super::vocabulary::{AttributeValue, Axis, Category};

use AttributeValue::*;

/// Table version; bump whenever the rows below change.
pub const STANDARD_SCHEMA_VERSION: &str = "1";

const BODY_PART_VALUES: [AttributeValue; 5] = [WholeBody, TopPart, BottomPart, Feet, Hands];
const WEATHER_TYPE_VALUES: [AttributeValue; 3] = [Cold, Warm, Any];
const EDGE_SHAPE_VALUES: [AttributeValue; 2] = [StraightEdge, CurveEdge];

/// (category, body part, weather type, edge shape)
const STANDARD_CATEGORIES: [(Category, AttributeValue, AttributeValue, AttributeValue); 10] = [
    (Category::TshirtTop, TopPart, Warm, CurveEdge),
    (Category::Trouser, BottomPart, Any, StraightEdge),
    (Category::Pullover, TopPart, Cold, CurveEdge),
    (Category::Dress, WholeBody, Any, StraightEdge),
    (Category::Coat, TopPart, Cold, CurveEdge),
    (Category::Sandal, Feet, Warm, StraightEdge),
    (Category::Shirt, TopPart, Any, CurveEdge),
    (Category::Sneaker, Feet, Any, CurveEdge),
    (Category::Bag, Hands, Any, StraightEdge),
    (Category::AnkleBoot, Feet, Cold, StraightEdge),
];

static STANDARD: OnceLock<Result<Schema, SchemaError>> = OnceLock::new();

/// Build the standard schema from the static table and verify every
/// category is satisfiable.
pub fn build_standard() -> Result<Schema, SchemaError> {
    let mut builder = Schema::builder()
        .axis(Axis::BodyPart, BODY_PART_VALUES)
        .axis(Axis::WeatherType, WEATHER_TYPE_VALUES)
        .axis(Axis::EdgeShape, EDGE_SHAPE_VALUES);

    for (category, body_part, weather_type, edge_shape) in STANDARD_CATEGORIES {
        builder = builder.exact(
            category,
            &[
                (Axis::BodyPart, body_part),
                (Axis::WeatherType, weather_type),
                (Axis::EdgeShape, edge_shape),
            ],
        );
    }

    let schema = builder.build()?;
    schema.check_satisfiable()?;
    Ok(schema)
}

impl Schema {
    /// The process-wide standard schema (built once, then shared).
    pub fn standard() -> Result<&'static Schema, SchemaError> {
        let result = STANDARD.get_or_init(|| {
            let built = build_standard();
            match &built {
                Ok(schema) => tracing::debug!(
                    version = STANDARD_SCHEMA_VERSION,
                    categories = schema.all_categories().len(),
                    "Standard schema initialized"
                ),
                Err(e) => tracing::error!(error = %e, "Standard schema is invalid"),
            }
            built
        });

        match result {
            Ok(schema) => Ok(schema),
            Err(e) => Err(e.clone()),
        }
    }
}
