//! Content and field types of a selection node
//!
//! The content type says how a node's selection list is interpreted; the
//! field type says which kind of entity it restricts. Every capability query
//! is an exhaustive match, so a new content type has to be placed explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Representation family of a selection's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentType {
    /// Global ids from the dataset's global-id array
    GlobalIds,
    /// Application-assigned pedigree ids
    PedigreeIds,
    /// Values of named dataset arrays
    Values,
    /// Positional indices into the dataset
    Indices,
    /// Eight homogeneous corner points of a view frustum
    Frustum,
    /// Points in space
    Locations,
    /// `(min, max)` ranges over named dataset arrays
    Thresholds,
    /// Composite block indices
    Blocks,
    /// Composite block selector paths
    BlockSelectors,
    /// Query string
    Query,
    /// Caller-defined content
    User,
}

impl ContentType {
    /// All content types
    pub const ALL: [ContentType; 11] = [
        ContentType::GlobalIds,
        ContentType::PedigreeIds,
        ContentType::Values,
        ContentType::Indices,
        ContentType::Frustum,
        ContentType::Locations,
        ContentType::Thresholds,
        ContentType::Blocks,
        ContentType::BlockSelectors,
        ContentType::Query,
        ContentType::User,
    ];

    /// Get the canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::GlobalIds => "GLOBALIDS",
            ContentType::PedigreeIds => "PEDIGREEIDS",
            ContentType::Values => "VALUES",
            ContentType::Indices => "INDICES",
            ContentType::Frustum => "FRUSTUM",
            ContentType::Locations => "LOCATIONS",
            ContentType::Thresholds => "THRESHOLDS",
            ContentType::Blocks => "BLOCKS",
            ContentType::BlockSelectors => "BLOCK_SELECTORS",
            ContentType::Query => "QUERY",
            ContentType::User => "USER",
        }
    }

    /// Whether two lists of this type can be merged
    pub fn supports_union(&self) -> bool {
        match self {
            ContentType::GlobalIds
            | ContentType::PedigreeIds
            | ContentType::Values
            | ContentType::Indices
            | ContentType::Locations
            | ContentType::Thresholds
            | ContentType::Blocks => true,
            ContentType::Frustum
            | ContentType::BlockSelectors
            | ContentType::Query
            | ContentType::User => false,
        }
    }

    /// Whether one list of this type can be subtracted from another
    pub fn supports_subtract(&self) -> bool {
        match self {
            ContentType::GlobalIds | ContentType::Indices | ContentType::PedigreeIds => true,
            ContentType::Values
            | ContentType::Frustum
            | ContentType::Locations
            | ContentType::Thresholds
            | ContentType::Blocks
            | ContentType::BlockSelectors
            | ContentType::Query
            | ContentType::User => false,
        }
    }

    /// Whether arrays are paired by name rather than position during union
    pub fn pairs_arrays_by_name(&self) -> bool {
        match self {
            ContentType::Values | ContentType::Thresholds => true,
            ContentType::GlobalIds
            | ContentType::PedigreeIds
            | ContentType::Indices
            | ContentType::Frustum
            | ContentType::Locations
            | ContentType::Blocks
            | ContentType::BlockSelectors
            | ContentType::Query
            | ContentType::User => false,
        }
    }

    /// Whether array names take part in property equality
    pub fn compares_array_names(&self) -> bool {
        match self {
            ContentType::Values | ContentType::PedigreeIds | ContentType::Thresholds => true,
            ContentType::GlobalIds
            | ContentType::Indices
            | ContentType::Frustum
            | ContentType::Locations
            | ContentType::Blocks
            | ContentType::BlockSelectors
            | ContentType::Query
            | ContentType::User => false,
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Indices
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a type name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} type: {name}")]
pub struct UnknownTypeName {
    pub kind: &'static str,
    pub name: String,
}

impl FromStr for ContentType {
    type Err = UnknownTypeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTypeName {
                kind: "content",
                name: s.to_string(),
            })
    }
}

/// Entity kind a selection restricts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    Cell,
    Point,
    Field,
    Vertex,
    Edge,
    Row,
}

impl FieldType {
    /// All field types
    pub const ALL: [FieldType; 6] = [
        FieldType::Cell,
        FieldType::Point,
        FieldType::Field,
        FieldType::Vertex,
        FieldType::Edge,
        FieldType::Row,
    ];

    /// Get the canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Cell => "CELL",
            FieldType::Point => "POINT",
            FieldType::Field => "FIELD",
            FieldType::Vertex => "VERTEX",
            FieldType::Edge => "EDGE",
            FieldType::Row => "ROW",
        }
    }
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Cell
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = UnknownTypeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTypeName {
                kind: "field",
                name: s.to_string(),
            })
    }
}
