//! Selection nodes and their set algebra
//!
//! A [`SelectionNode`] is one typed criterion: a content type saying how the
//! list is read, a field type saying which entities it restricts, the list
//! itself and a bag of qualifiers.
//!
//! Union and subtract validate everything before touching the list, so a
//! failed call leaves the node unchanged.

use crate::content::{ContentType, FieldType};
use crate::error::{SelectionError, SelectionResult};
use crate::list::{ArrayData, ElementType, SelectionArray, SelectionList};
use crate::property::{Properties, Property};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed selection criterion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionNode {
    content_type: ContentType,
    field_type: FieldType,
    selection_list: SelectionList,
    properties: Properties,
}

impl SelectionNode {
    /// Create an empty node
    pub fn new(content_type: ContentType, field_type: FieldType) -> Self {
        Self {
            content_type,
            field_type,
            selection_list: SelectionList::new(),
            properties: Properties::new(),
        }
    }

    /// Create a node holding one identifier array
    pub fn with_ids(
        content_type: ContentType,
        field_type: FieldType,
        ids: impl Into<Vec<i64>>,
    ) -> Self {
        let mut node = Self::new(content_type, field_type);
        node.selection_list = SelectionList::single(SelectionArray::ids(ids));
        node
    }

    /// Create a `Values` node holding one named array
    pub fn with_values(field_type: FieldType, name: impl Into<String>, data: ArrayData) -> Self {
        let mut node = Self::new(ContentType::Values, field_type);
        node.selection_list = SelectionList::single(SelectionArray::new(data).named(name));
        node
    }

    /// Builder-style property setter
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.set(property);
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.content_type = content_type;
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn set_field_type(&mut self, field_type: FieldType) {
        self.field_type = field_type;
    }

    pub fn selection_list(&self) -> &SelectionList {
        &self.selection_list
    }

    /// Replace the list as a whole
    pub fn set_selection_list(&mut self, list: impl Into<SelectionList>) {
        self.selection_list = list.into();
    }

    /// Take the list, leaving an empty one behind
    pub fn take_selection_list(&mut self) -> SelectionList {
        std::mem::take(&mut self.selection_list)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Set a property, replacing any value under the same key
    pub fn set_property(&mut self, property: Property) -> Option<Property> {
        self.properties.set(property)
    }

    /// Identifier values of the first array, if it is an id array
    pub fn ids(&self) -> Option<&[i64]> {
        self.selection_list.array(0)?.data().as_ids()
    }

    /// Tuples in the first array
    pub fn tuple_count(&self) -> usize {
        self.selection_list.tuple_count()
    }

    /// Clear the list and every property; content and field type are kept
    pub fn initialize(&mut self) {
        self.selection_list.clear();
        self.properties.clear();
    }

    /// Check that `other` could be merged into this node, without merging
    pub fn check_union(&self, other: &SelectionNode) -> SelectionResult<()> {
        self.union_pairs(other).map(|_| ())
    }

    /// Pair each of our arrays with the array of `other` it will absorb
    fn union_pairs<'o>(&self, other: &'o SelectionNode) -> SelectionResult<Vec<&'o SelectionArray>> {
        if self.content_type != other.content_type || !self.content_type.supports_union() {
            return Err(SelectionError::incompatible(
                "union",
                self.content_type,
                other.content_type,
            ));
        }

        let ours = self.selection_list.arrays();
        if ours.len() != other.selection_list.len() {
            return Err(SelectionError::mismatch(format!(
                "cannot union lists with {} and {} arrays",
                ours.len(),
                other.selection_list.len()
            )));
        }

        let by_name = self.content_type.pairs_arrays_by_name();
        let theirs_all = other.selection_list.arrays();
        let mut claimed = vec![false; theirs_all.len()];
        let mut pairs = Vec::with_capacity(ours.len());
        for (i, array) in ours.iter().enumerate() {
            // each array of `other` is absorbed at most once
            let slot = if by_name {
                (0..theirs_all.len())
                    .find(|&j| !claimed[j] && theirs_all[j].name() == array.name())
            } else {
                Some(i)
            };
            let j = slot.ok_or_else(|| {
                SelectionError::mismatch(format!(
                    "no array named '{}' to union with",
                    array.name().unwrap_or("<unnamed>")
                ))
            })?;
            claimed[j] = true;
            let theirs = &theirs_all[j];
            array.check_compatible(theirs)?;
            pairs.push(theirs);
        }
        Ok(pairs)
    }

    /// Merge `other`'s list into this node's list.
    ///
    /// Values and Thresholds arrays are paired by name, everything else by
    /// position. Single-component arrays do not receive values they already
    /// hold; multi-component arrays are appended unconditionally.
    pub fn union_selection_list(&mut self, other: &SelectionNode) -> SelectionResult<()> {
        let pairs = self.union_pairs(other)?;

        let mut added = 0;
        for (array, theirs) in self.selection_list.arrays_mut().iter_mut().zip(pairs) {
            added += array.union_with(theirs)?;
        }
        tracing::debug!(
            content = %self.content_type,
            field = %self.field_type,
            added,
            "union of selection lists"
        );
        Ok(())
    }

    /// Check that `other` could be subtracted from this node, without subtracting
    pub fn check_subtract(&self, other: &SelectionNode) -> SelectionResult<()> {
        if self.content_type != other.content_type || !self.content_type.supports_subtract() {
            return Err(SelectionError::incompatible(
                "subtract",
                self.content_type,
                other.content_type,
            ));
        }
        for list in [&self.selection_list, &other.selection_list] {
            if list.len() > 1 {
                return Err(SelectionError::mismatch(
                    "cannot subtract selections with more than one array",
                ));
            }
            if let Some(array) = list.array(0) {
                if array.element_type() != ElementType::Id || array.components() != 1 {
                    return Err(SelectionError::mismatch(
                        "can only subtract single-component id arrays",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Remove every value of `other`'s list from this node's list.
    ///
    /// The surviving ids replace the list in ascending order.
    pub fn subtract_selection_list(&mut self, other: &SelectionNode) -> SelectionResult<()> {
        self.check_subtract(other)?;

        let theirs = match other.ids() {
            Some(ids) => ids,
            None => return Ok(()),
        };
        let array = match self.selection_list.arrays_mut().first_mut() {
            Some(array) => array,
            None => return Ok(()),
        };
        let ours = array.data().as_ids().unwrap_or(&[]);

        let before = ours.len();
        let survivors = sorted_difference(ours, theirs);
        tracing::debug!(
            content = %self.content_type,
            removed = before - survivors.len(),
            remaining = survivors.len(),
            "subtract of selection lists"
        );
        array.set_data(ArrayData::Id(survivors));
        Ok(())
    }

    /// Compare core properties, qualifiers and, where relevant, array names.
    ///
    /// Without `full_compare` only the properties set on `self` are checked
    /// against `other`; with it the check runs in both directions.
    pub fn equal_properties(&self, other: &SelectionNode, full_compare: bool) -> bool {
        if self.content_type != other.content_type || self.field_type != other.field_type {
            return false;
        }
        if !self.properties.is_subset_of(&other.properties) {
            return false;
        }
        if self.content_type.compares_array_names() {
            let ours = &self.selection_list;
            let theirs = &other.selection_list;
            if ours.len() != theirs.len() || !ours.names().eq(theirs.names()) {
                return false;
            }
        }
        if full_compare {
            return other.equal_properties(self, false);
        }
        true
    }
}

/// `left - right` over sorted copies, in one merge pass.
///
/// Every occurrence of a value found in `right` is dropped.
fn sorted_difference(left: &[i64], right: &[i64]) -> Vec<i64> {
    let mut left = left.to_vec();
    left.sort_unstable();
    let mut right = right.to_vec();
    right.sort_unstable();

    let mut out = Vec::with_capacity(left.len());
    let mut j = 0;
    for value in left {
        while j < right.len() && right[j] < value {
            j += 1;
        }
        if j < right.len() && right[j] == value {
            continue;
        }
        out.push(value);
    }
    out
}

impl fmt::Display for SelectionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ContentType: {}", self.content_type)?;
        writeln!(f, "FieldType: {}", self.field_type)?;
        for property in self.properties.iter() {
            writeln!(f, "{}", property)?;
        }
        for array in self.selection_list.arrays() {
            writeln!(f, "{}", array)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(content: ContentType, values: &[i64]) -> SelectionNode {
        SelectionNode::with_ids(content, FieldType::Cell, values.to_vec())
    }

    #[test]
    fn test_sorted_difference() {
        assert_eq!(sorted_difference(&[5, 1, 3, 2], &[3, 9]), vec![1, 2, 5]);
        assert_eq!(sorted_difference(&[1, 1, 2], &[1]), vec![2]);
        assert!(sorted_difference(&[], &[1]).is_empty());
    }

    #[test]
    fn test_union_indices() {
        let mut a = ids(ContentType::Indices, &[0, 1]);
        let b = ids(ContentType::Indices, &[1, 2]);
        a.union_selection_list(&b).unwrap();
        assert_eq!(a.ids(), Some(&[0, 1, 2][..]));
    }

    #[test]
    fn test_union_rejects_frustum() {
        let mut a = SelectionNode::new(ContentType::Frustum, FieldType::Point);
        let b = a.clone();
        assert!(matches!(
            a.union_selection_list(&b),
            Err(SelectionError::IncompatibleContentType { .. })
        ));
    }

    #[test]
    fn test_union_values_pairs_by_name() {
        let mut a = SelectionNode::new(ContentType::Values, FieldType::Point);
        a.set_selection_list(
            SelectionList::new()
                .with(SelectionArray::new(ArrayData::Int(vec![1])).named("a"))
                .with(SelectionArray::new(ArrayData::Double(vec![0.5])).named("b")),
        );
        let mut b = SelectionNode::new(ContentType::Values, FieldType::Point);
        b.set_selection_list(
            SelectionList::new()
                .with(SelectionArray::new(ArrayData::Double(vec![1.5])).named("b"))
                .with(SelectionArray::new(ArrayData::Int(vec![2])).named("a")),
        );

        a.union_selection_list(&b).unwrap();
        let list = a.selection_list();
        assert_eq!(
            list.array_by_name(Some("a")).unwrap().data(),
            &ArrayData::Int(vec![1, 2])
        );
        assert_eq!(
            list.array_by_name(Some("b")).unwrap().data(),
            &ArrayData::Double(vec![0.5, 1.5])
        );
    }

    #[test]
    fn test_union_missing_named_array_leaves_node_unchanged() {
        let mut a = SelectionNode::with_values(FieldType::Point, "a", ArrayData::Int(vec![1]));
        let b = SelectionNode::with_values(FieldType::Point, "z", ArrayData::Int(vec![2]));
        let before = a.clone();
        assert!(a.union_selection_list(&b).is_err());
        assert_eq!(a, before);
    }

    fn values(arrays: &[(&str, i32)]) -> SelectionNode {
        let mut node = SelectionNode::new(ContentType::Values, FieldType::Point);
        let list = arrays.iter().fold(SelectionList::new(), |list, &(name, value)| {
            list.with(SelectionArray::new(ArrayData::Int(vec![value])).named(name))
        });
        node.set_selection_list(list);
        node
    }

    #[test]
    fn test_union_never_pairs_one_array_twice() {
        let mut a = values(&[("a", 1), ("a", 5)]);
        let b = values(&[("a", 2), ("b", 9)]);
        let before = a.clone();

        assert!(matches!(
            a.union_selection_list(&b),
            Err(SelectionError::StructuralMismatch(_))
        ));
        assert_eq!(a, before);
    }

    #[test]
    fn test_union_pairs_repeated_names_in_order() {
        let mut a = values(&[("a", 1), ("a", 5)]);
        let b = values(&[("a", 2), ("a", 6)]);

        a.union_selection_list(&b).unwrap();
        let arrays = a.selection_list().arrays();
        assert_eq!(arrays[0].data(), &ArrayData::Int(vec![1, 2]));
        assert_eq!(arrays[1].data(), &ArrayData::Int(vec![5, 6]));
    }

    #[test]
    fn test_subtract_rejects_values() {
        let mut a = SelectionNode::with_values(FieldType::Point, "a", ArrayData::Int(vec![1]));
        let b = a.clone();
        assert!(matches!(
            a.subtract_selection_list(&b),
            Err(SelectionError::IncompatibleContentType { .. })
        ));
    }

    #[test]
    fn test_subtract_rejects_non_id_arrays() {
        let mut a = SelectionNode::new(ContentType::PedigreeIds, FieldType::Row);
        a.set_selection_list(SelectionArray::new(ArrayData::String(vec!["x".into()])));
        let b = a.clone();
        assert!(matches!(
            a.subtract_selection_list(&b),
            Err(SelectionError::StructuralMismatch(_))
        ));
    }

    #[test]
    fn test_subtract_from_empty_is_noop() {
        let mut a = SelectionNode::new(ContentType::GlobalIds, FieldType::Cell);
        let b = ids(ContentType::GlobalIds, &[1]);
        a.subtract_selection_list(&b).unwrap();
        assert!(a.selection_list().is_empty());
    }

    #[test]
    fn test_equal_properties_directional() {
        let plain = ids(ContentType::Indices, &[1]);
        let inverted = ids(ContentType::Indices, &[1]).with_property(Property::Inverse(true));

        assert!(plain.equal_properties(&inverted, false));
        assert!(!plain.equal_properties(&inverted, true));
        assert!(!inverted.equal_properties(&plain, false));
    }

    #[test]
    fn test_equal_properties_compares_array_names() {
        let a = SelectionNode::with_values(FieldType::Point, "a", ArrayData::Int(vec![1]));
        let b = SelectionNode::with_values(FieldType::Point, "b", ArrayData::Int(vec![1]));
        assert!(!a.equal_properties(&b, true));

        // GlobalIds ignore names
        let mut c = ids(ContentType::GlobalIds, &[1]);
        let d = ids(ContentType::GlobalIds, &[2]);
        c.set_selection_list(SelectionArray::ids(vec![1]).named("gid"));
        assert!(c.equal_properties(&d, true));
    }

    #[test]
    fn test_display_dump() {
        let node = ids(ContentType::Indices, &[4, 2]).with_property(Property::ProcessId(3));
        let dump = node.to_string();
        assert!(dump.contains("ContentType: INDICES"));
        assert!(dump.contains("PROCESS_ID: 3"));
        assert!(dump.contains(" 4 2"));
    }
}
