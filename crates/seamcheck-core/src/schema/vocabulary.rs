//! The closed vocabulary: axes, attribute values and categories.
//!
//! String names only exist at the serialization boundary. Everything past
//! ingestion works on these enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An independent attribute dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Where on the body the item is worn
    #[serde(alias = "BodyPlacement")]
    BodyPart,

    /// Which weather the item suits
    #[serde(alias = "WeatherSuitability", alias = "Weather")]
    WeatherType,

    /// Dominant outline of the item
    #[serde(alias = "Edge")]
    EdgeShape,
}

impl Axis {
    /// All axes in declaration order.
    pub const ALL: [Axis; 3] = [Axis::BodyPart, Axis::WeatherType, Axis::EdgeShape];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Axis::BodyPart => "BodyPart",
            Axis::WeatherType => "WeatherType",
            Axis::EdgeShape => "EdgeShape",
        }
    }

    /// Predicate name used when rendering atoms, e.g. `hasBodyPart`.
    pub fn predicate(&self) -> &'static str {
        match self {
            Axis::BodyPart => "hasBodyPart",
            Axis::WeatherType => "hasWeatherType",
            Axis::EdgeShape => "hasEdgeShape",
        }
    }

    /// Key the attribute model uses for this axis in its raw output.
    pub fn model_key(&self) -> &'static str {
        match self {
            Axis::BodyPart => "body_part",
            Axis::WeatherType => "weather_type",
            Axis::EdgeShape => "edge_shape",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BodyPart" | "BodyPlacement" => Ok(Axis::BodyPart),
            "WeatherType" | "WeatherSuitability" | "Weather" => Ok(Axis::WeatherType),
            "EdgeShape" | "Edge" => Ok(Axis::EdgeShape),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// A value on some axis. Which axis owns it is declared by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    WholeBody,
    TopPart,
    BottomPart,
    Feet,
    Hands,
    Cold,
    Warm,
    Any,
    StraightEdge,
    CurveEdge,
}

impl AttributeValue {
    pub const ALL: [AttributeValue; 10] = [
        AttributeValue::WholeBody,
        AttributeValue::TopPart,
        AttributeValue::BottomPart,
        AttributeValue::Feet,
        AttributeValue::Hands,
        AttributeValue::Cold,
        AttributeValue::Warm,
        AttributeValue::Any,
        AttributeValue::StraightEdge,
        AttributeValue::CurveEdge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AttributeValue::WholeBody => "WholeBody",
            AttributeValue::TopPart => "TopPart",
            AttributeValue::BottomPart => "BottomPart",
            AttributeValue::Feet => "Feet",
            AttributeValue::Hands => "Hands",
            AttributeValue::Cold => "Cold",
            AttributeValue::Warm => "Warm",
            AttributeValue::Any => "Any",
            AttributeValue::StraightEdge => "StraightEdge",
            AttributeValue::CurveEdge => "CurveEdge",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttributeValue {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributeValue::ALL
            .iter()
            .copied()
            .find(|v| v.name() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// A clothing category, in the classifier's output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    TshirtTop,
    Trouser,
    Pullover,
    Dress,
    Coat,
    Sandal,
    Shirt,
    Sneaker,
    Bag,
    AnkleBoot,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::TshirtTop,
        Category::Trouser,
        Category::Pullover,
        Category::Dress,
        Category::Coat,
        Category::Sandal,
        Category::Shirt,
        Category::Sneaker,
        Category::Bag,
        Category::AnkleBoot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::TshirtTop => "TshirtTop",
            Category::Trouser => "Trouser",
            Category::Pullover => "Pullover",
            Category::Dress => "Dress",
            Category::Coat => "Coat",
            Category::Sandal => "Sandal",
            Category::Shirt => "Shirt",
            Category::Sneaker => "Sneaker",
            Category::Bag => "Bag",
            Category::AnkleBoot => "AnkleBoot",
        }
    }

    /// Category for a classifier output index, if in range.
    pub fn from_model_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// A name outside the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name: {0}")]
pub struct UnknownName(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aliases_resolve() {
        assert_eq!("BodyPlacement".parse::<Axis>().unwrap(), Axis::BodyPart);
        assert_eq!("Weather".parse::<Axis>().unwrap(), Axis::WeatherType);
        assert_eq!("Edge".parse::<Axis>().unwrap(), Axis::EdgeShape);
        assert!("Sleeve".parse::<Axis>().is_err());
    }

    #[test]
    fn test_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.name().parse::<Category>().unwrap(), category);
        }
        for value in AttributeValue::ALL {
            assert_eq!(value.name().parse::<AttributeValue>().unwrap(), value);
        }
    }

    #[test]
    fn test_model_index_order() {
        assert_eq!(Category::from_model_index(0), Some(Category::TshirtTop));
        assert_eq!(Category::from_model_index(9), Some(Category::AnkleBoot));
        assert_eq!(Category::from_model_index(10), None);
    }

    #[test]
    fn test_unknown_category_name() {
        let err = "Unknown".parse::<Category>().unwrap_err();
        assert_eq!(err, UnknownName("Unknown".to_string()));
    }
}
