//! Vector data structures
//!
//! - `Feature`: optional geometry + ordered attributes + optional id
//! - `VectorDataset`: the features of one file plus its CRS

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crs::CRS;

/// Attribute value types.
///
/// `Json` carries composite values (arrays, objects, numbers that do not fit
/// an `i64`) verbatim, so pass-through never rewrites an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl AttributeValue {
    /// Optional float, `Null` when absent
    pub fn from_optional(value: Option<f64>) -> Self {
        value.map_or(AttributeValue::Null, AttributeValue::Float)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(v) => write!(f, "{}", v),
            AttributeValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Ordered attribute mapping.
///
/// Keeps insertion order so output files list attributes in the same order
/// as their inputs. Lookups are linear; feature schemas are small.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, AttributeValue)>);

impl Attributes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a value by name
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert a value. An existing key keeps its position and its previous
    /// value is returned; a new key is appended.
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) -> Option<AttributeValue> {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

impl IntoIterator for Attributes {
    type Item = (String, AttributeValue);
    type IntoIter = std::vec::IntoIter<(String, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Feature identifier as found in the source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureId {
    Text(String),
    Number(serde_json::Number),
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, Default)]
pub struct Feature {
    /// Feature geometry; `None` for features with a null geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, in source order
    pub properties: Attributes,
    /// Optional feature ID
    pub id: Option<FeatureId>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key, value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// The parsed content of one vector file.
///
/// Feature identity is positional: index `i` in `features` is feature `i`
/// everywhere downstream.
#[derive(Debug, Clone, Default)]
pub struct VectorDataset {
    pub features: Vec<Feature>,
    /// Native CRS; `None` when the file does not define one
    pub crs: Option<CRS>,
}

impl VectorDataset {
    pub fn new(crs: Option<CRS>) -> Self {
        Self {
            features: Vec::new(),
            crs,
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Geometries in feature order
    pub fn geometries(&self) -> impl Iterator<Item = Option<&Geometry<f64>>> {
        self.features.iter().map(|f| f.geometry.as_ref())
    }
}
