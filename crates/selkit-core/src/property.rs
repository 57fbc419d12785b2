//! Node qualifiers
//!
//! A closed set of known properties plus an [`Property::Extension`] variant
//! for keys this crate does not know about. A node holds at most one entry
//! per [`PropertyKey`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A qualifier attached to a selection node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    /// Distance tolerance for location selections
    Epsilon(f64),
    /// Select cells containing the selected points
    ContainingCells(bool),
    /// Select the complement of the criterion
    Inverse(bool),
    /// Array component the criterion applies to
    ComponentNumber(i32),
    /// Process the selection belongs to
    ProcessId(i32),
    /// Flat index of a composite block
    CompositeIndex(u32),
    /// Level in a hierarchical dataset
    HierarchicalLevel(u32),
    /// Index within a hierarchical level
    HierarchicalIndex(u32),
    /// Number of neighbor layers to grow the selection by
    ConnectedLayers(u32),
    /// Drop the seed when growing by connected layers
    ConnectedLayersRemoveSeed(bool),
    /// Keep only the outermost grown layer
    ConnectedLayersRemoveIntermediateLayers(bool),
    /// Pixels covered when the selection came from a picker
    PixelCount(u64),
    /// Assembly the block selectors refer to
    AssemblyName(String),
    /// Block selector paths
    Selectors(Vec<String>),
    /// Forward-compatible unknown key
    Extension { key: String, value: ExtensionValue },
}

/// Value of an extension property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtensionValue {
    Int(i64),
    Double(f64),
    Text(String),
}

impl fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionValue::Int(v) => write!(f, "{}", v),
            ExtensionValue::Double(v) => write!(f, "{}", v),
            ExtensionValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Identity of a property, independent of its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyKey {
    Epsilon,
    ContainingCells,
    Inverse,
    ComponentNumber,
    ProcessId,
    CompositeIndex,
    HierarchicalLevel,
    HierarchicalIndex,
    ConnectedLayers,
    ConnectedLayersRemoveSeed,
    ConnectedLayersRemoveIntermediateLayers,
    PixelCount,
    AssemblyName,
    Selectors,
    Extension(String),
}

impl Property {
    /// The key this property is stored under
    pub fn key(&self) -> PropertyKey {
        match self {
            Property::Epsilon(_) => PropertyKey::Epsilon,
            Property::ContainingCells(_) => PropertyKey::ContainingCells,
            Property::Inverse(_) => PropertyKey::Inverse,
            Property::ComponentNumber(_) => PropertyKey::ComponentNumber,
            Property::ProcessId(_) => PropertyKey::ProcessId,
            Property::CompositeIndex(_) => PropertyKey::CompositeIndex,
            Property::HierarchicalLevel(_) => PropertyKey::HierarchicalLevel,
            Property::HierarchicalIndex(_) => PropertyKey::HierarchicalIndex,
            Property::ConnectedLayers(_) => PropertyKey::ConnectedLayers,
            Property::ConnectedLayersRemoveSeed(_) => PropertyKey::ConnectedLayersRemoveSeed,
            Property::ConnectedLayersRemoveIntermediateLayers(_) => {
                PropertyKey::ConnectedLayersRemoveIntermediateLayers
            }
            Property::PixelCount(_) => PropertyKey::PixelCount,
            Property::AssemblyName(_) => PropertyKey::AssemblyName,
            Property::Selectors(_) => PropertyKey::Selectors,
            Property::Extension { key, .. } => PropertyKey::Extension(key.clone()),
        }
    }

    /// Create an extension property
    pub fn extension(key: impl Into<String>, value: ExtensionValue) -> Self {
        Property::Extension {
            key: key.into(),
            value,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Epsilon(v) => write!(f, "EPSILON: {}", v),
            Property::ContainingCells(v) => write!(f, "CONTAINING_CELLS: {}", v),
            Property::Inverse(v) => write!(f, "INVERSE: {}", v),
            Property::ComponentNumber(v) => write!(f, "COMPONENT_NUMBER: {}", v),
            Property::ProcessId(v) => write!(f, "PROCESS_ID: {}", v),
            Property::CompositeIndex(v) => write!(f, "COMPOSITE_INDEX: {}", v),
            Property::HierarchicalLevel(v) => write!(f, "HIERARCHICAL_LEVEL: {}", v),
            Property::HierarchicalIndex(v) => write!(f, "HIERARCHICAL_INDEX: {}", v),
            Property::ConnectedLayers(v) => write!(f, "CONNECTED_LAYERS: {}", v),
            Property::ConnectedLayersRemoveSeed(v) => {
                write!(f, "CONNECTED_LAYERS_REMOVE_SEED: {}", v)
            }
            Property::ConnectedLayersRemoveIntermediateLayers(v) => {
                write!(f, "CONNECTED_LAYERS_REMOVE_INTERMEDIATE_LAYERS: {}", v)
            }
            Property::PixelCount(v) => write!(f, "PIXEL_COUNT: {}", v),
            Property::AssemblyName(v) => write!(f, "ASSEMBLY_NAME: {}", v),
            Property::Selectors(v) => write!(f, "SELECTORS: {}", v.join(", ")),
            Property::Extension { key, value } => write!(f, "{}: {}", key, value),
        }
    }
}

/// The property bag of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Property>", into = "Vec<Property>")]
pub struct Properties {
    entries: BTreeMap<PropertyKey, Property>,
}

impl Properties {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, returning the value it replaced
    pub fn set(&mut self, property: Property) -> Option<Property> {
        self.entries.insert(property.key(), property)
    }

    /// Get a property by key
    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.entries.get(key)
    }

    /// Remove a property by key
    pub fn remove(&mut self, key: &PropertyKey) -> Option<Property> {
        self.entries.remove(key)
    }

    /// Whether a property is present
    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no properties are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every property
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over properties in key order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.values()
    }

    /// Whether every property here is present with the same value in `other`
    pub fn is_subset_of(&self, other: &Properties) -> bool {
        self.entries
            .iter()
            .all(|(key, value)| other.entries.get(key) == Some(value))
    }

    /// The inverse flag, false when unset
    pub fn inverse(&self) -> bool {
        matches!(self.get(&PropertyKey::Inverse), Some(Property::Inverse(true)))
    }

    /// The epsilon tolerance, if set
    pub fn epsilon(&self) -> Option<f64> {
        match self.get(&PropertyKey::Epsilon) {
            Some(Property::Epsilon(v)) => Some(*v),
            _ => None,
        }
    }

    /// The component number, if set
    pub fn component_number(&self) -> Option<i32> {
        match self.get(&PropertyKey::ComponentNumber) {
            Some(Property::ComponentNumber(v)) => Some(*v),
            _ => None,
        }
    }
}

impl FromIterator<Property> for Properties {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for property in iter {
            properties.set(property);
        }
        properties
    }
}

impl From<Vec<Property>> for Properties {
    fn from(list: Vec<Property>) -> Self {
        list.into_iter().collect()
    }
}

impl From<Properties> for Vec<Property> {
    fn from(properties: Properties) -> Self {
        properties.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_same_key() {
        let mut props = Properties::new();
        assert!(props.set(Property::ProcessId(1)).is_none());
        assert_eq!(props.set(Property::ProcessId(2)), Some(Property::ProcessId(1)));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_extension_keys_are_distinct() {
        let props: Properties = [
            Property::extension("color", ExtensionValue::Text("red".to_string())),
            Property::extension("weight", ExtensionValue::Double(0.5)),
        ]
        .into_iter()
        .collect();
        assert_eq!(props.len(), 2);
        assert!(props.contains(&PropertyKey::Extension("color".to_string())));
    }

    #[test]
    fn test_subset_is_directional() {
        let small: Properties = [Property::ProcessId(0)].into_iter().collect();
        let large: Properties = [Property::ProcessId(0), Property::Inverse(true)]
            .into_iter()
            .collect();
        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));
    }

    #[test]
    fn test_typed_accessors() {
        let props: Properties = [
            Property::Inverse(true),
            Property::Epsilon(0.25),
            Property::ComponentNumber(2),
        ]
        .into_iter()
        .collect();
        assert!(props.inverse());
        assert_eq!(props.epsilon(), Some(0.25));
        assert_eq!(props.component_number(), Some(2));
        assert!(!Properties::new().inverse());
    }
}
