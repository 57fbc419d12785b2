//! Typed selection lists
//!
//! A [`SelectionList`] is an ordered set of [`SelectionArray`]s. Each array is
//! a flat buffer of one element type, grouped into tuples of a fixed number of
//! components and optionally named after the dataset array it came from.

use crate::error::{SelectionError, SelectionResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// Identifier integers (ids and indices)
    Id,
    /// Plain 32-bit integers
    Int,
    /// Floating point
    Double,
    /// Strings
    String,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Id => "id",
            ElementType::Int => "int",
            ElementType::Double => "double",
            ElementType::String => "string",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat typed storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Id(Vec<i64>),
    Int(Vec<i32>),
    Double(Vec<f64>),
    String(Vec<String>),
}

/// A hashable view of one element, used for membership tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKey<'a> {
    Id(i64),
    Int(i32),
    /// Bit pattern of the value, with `-0.0` folded into `0.0`
    Double(u64),
    Str(&'a str),
}

impl ArrayData {
    /// The element type tag
    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::Id(_) => ElementType::Id,
            ArrayData::Int(_) => ElementType::Int,
            ArrayData::Double(_) => ElementType::Double,
            ArrayData::String(_) => ElementType::String,
        }
    }

    /// An empty buffer of the given type
    pub fn empty(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Id => ArrayData::Id(Vec::new()),
            ElementType::Int => ArrayData::Int(Vec::new()),
            ElementType::Double => ArrayData::Double(Vec::new()),
            ElementType::String => ArrayData::String(Vec::new()),
        }
    }

    /// Number of scalar values
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Id(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier values, if this is an id buffer
    pub fn as_ids(&self) -> Option<&[i64]> {
        match self {
            ArrayData::Id(v) => Some(v),
            _ => None,
        }
    }

    /// Scalar at `index` as an integer id, for id and int buffers
    pub fn id_at(&self, index: usize) -> Option<i64> {
        match self {
            ArrayData::Id(v) => v.get(index).copied(),
            ArrayData::Int(v) => v.get(index).map(|&x| i64::from(x)),
            ArrayData::Double(_) | ArrayData::String(_) => None,
        }
    }

    /// Scalar at `index` as a float, for numeric buffers
    pub fn f64_at(&self, index: usize) -> Option<f64> {
        match self {
            ArrayData::Id(v) => v.get(index).map(|&x| x as f64),
            ArrayData::Int(v) => v.get(index).map(|&x| f64::from(x)),
            ArrayData::Double(v) => v.get(index).copied(),
            ArrayData::String(_) => None,
        }
    }

    /// Hashable key of the scalar at `index`
    pub fn key_at(&self, index: usize) -> Option<ValueKey<'_>> {
        match self {
            ArrayData::Id(v) => v.get(index).map(|&x| ValueKey::Id(x)),
            ArrayData::Int(v) => v.get(index).map(|&x| ValueKey::Int(x)),
            ArrayData::Double(v) => v
                .get(index)
                .map(|&x| ValueKey::Double(if x == 0.0 { 0 } else { x.to_bits() })),
            ArrayData::String(v) => v.get(index).map(|s| ValueKey::Str(s.as_str())),
        }
    }

    /// Copy the tuples at `tuples` (of `components` values each) into a new buffer
    pub fn gather(&self, tuples: &[usize], components: usize) -> ArrayData {
        fn pick<T: Clone>(src: &[T], tuples: &[usize], components: usize) -> Vec<T> {
            let mut out = Vec::with_capacity(tuples.len() * components);
            for &t in tuples {
                let start = t * components;
                if let Some(tuple) = src.get(start..start + components) {
                    out.extend_from_slice(tuple);
                }
            }
            out
        }

        match self {
            ArrayData::Id(v) => ArrayData::Id(pick(v, tuples, components)),
            ArrayData::Int(v) => ArrayData::Int(pick(v, tuples, components)),
            ArrayData::Double(v) => ArrayData::Double(pick(v, tuples, components)),
            ArrayData::String(v) => ArrayData::String(pick(v, tuples, components)),
        }
    }
}

/// Append the values of `src` that `dst` does not already hold
fn append_missing<T: PartialEq + Clone>(dst: &mut Vec<T>, src: &[T]) -> usize {
    let before = dst.len();
    for value in src {
        if !dst.contains(value) {
            dst.push(value.clone());
        }
    }
    dst.len() - before
}

fn append_all<T: Clone>(dst: &mut Vec<T>, src: &[T]) -> usize {
    dst.extend_from_slice(src);
    src.len()
}

/// One named, typed component array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionArray {
    name: Option<String>,
    components: usize,
    data: ArrayData,
}

impl SelectionArray {
    /// Create a single-component array
    pub fn new(data: ArrayData) -> Self {
        Self {
            name: None,
            components: 1,
            data,
        }
    }

    /// Create a single-component identifier array
    pub fn ids(ids: impl Into<Vec<i64>>) -> Self {
        Self::new(ArrayData::Id(ids.into()))
    }

    /// Create an array of `components`-wide tuples
    pub fn tuples(data: ArrayData, components: usize) -> SelectionResult<Self> {
        if components == 0 {
            return Err(SelectionError::mismatch("arrays need at least one component"));
        }
        if data.len() % components != 0 {
            return Err(SelectionError::mismatch(format!(
                "{} values do not form {}-component tuples",
                data.len(),
                components
            )));
        }
        Ok(Self {
            name: None,
            components,
            data,
        })
    }

    /// Set the name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Values per tuple
    pub fn components(&self) -> usize {
        self.components
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Replace the data, keeping name and component count
    pub fn set_data(&mut self, data: ArrayData) {
        self.data = data;
    }

    /// Number of tuples
    pub fn tuple_count(&self) -> usize {
        self.data.len() / self.components
    }

    /// Whether the two arrays can be merged or compared element-wise
    pub fn check_compatible(&self, other: &SelectionArray) -> SelectionResult<()> {
        if self.element_type() != other.element_type() {
            return Err(SelectionError::mismatch(format!(
                "element types differ: {} vs {}",
                self.element_type(),
                other.element_type()
            )));
        }
        if self.components != other.components {
            return Err(SelectionError::mismatch(format!(
                "component counts differ: {} vs {}",
                self.components, other.components
            )));
        }
        Ok(())
    }

    /// Merge `other` into this array and return the number of values added.
    ///
    /// Single-component arrays skip values already present. Tuples are
    /// appended as-is.
    pub(crate) fn union_with(&mut self, other: &SelectionArray) -> SelectionResult<usize> {
        self.check_compatible(other)?;
        let single = self.components == 1;

        let added = match (&mut self.data, &other.data) {
            (ArrayData::Id(dst), ArrayData::Id(src)) if single => append_missing(dst, src),
            (ArrayData::Int(dst), ArrayData::Int(src)) if single => append_missing(dst, src),
            (ArrayData::Double(dst), ArrayData::Double(src)) if single => append_missing(dst, src),
            (ArrayData::String(dst), ArrayData::String(src)) if single => {
                append_missing(dst, src)
            }
            (ArrayData::Id(dst), ArrayData::Id(src)) => append_all(dst, src),
            (ArrayData::Int(dst), ArrayData::Int(src)) => append_all(dst, src),
            (ArrayData::Double(dst), ArrayData::Double(src)) => append_all(dst, src),
            (ArrayData::String(dst), ArrayData::String(src)) => append_all(dst, src),
            _ => return Err(SelectionError::mismatch("element types differ")),
        };
        Ok(added)
    }
}

impl fmt::Display for SelectionArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} x {}]:",
            self.name().unwrap_or("<unnamed>"),
            self.tuple_count(),
            self.components
        )?;
        match &self.data {
            ArrayData::Id(v) => v.iter().try_for_each(|x| write!(f, " {}", x)),
            ArrayData::Int(v) => v.iter().try_for_each(|x| write!(f, " {}", x)),
            ArrayData::Double(v) => v.iter().try_for_each(|x| write!(f, " {}", x)),
            ArrayData::String(v) => v.iter().try_for_each(|x| write!(f, " {:?}", x)),
        }
    }
}

/// The arrays that make up a node's selection criterion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionList {
    arrays: Vec<SelectionArray>,
}

impl SelectionList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list holding one array
    pub fn single(array: SelectionArray) -> Self {
        Self {
            arrays: vec![array],
        }
    }

    /// Append an array
    pub fn push(&mut self, array: SelectionArray) {
        self.arrays.push(array);
    }

    /// Builder-style [`SelectionList::push`]
    pub fn with(mut self, array: SelectionArray) -> Self {
        self.push(array);
        self
    }

    /// Number of arrays
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
    }

    pub fn arrays(&self) -> &[SelectionArray] {
        &self.arrays
    }

    pub(crate) fn arrays_mut(&mut self) -> &mut [SelectionArray] {
        &mut self.arrays
    }

    /// Array at a position
    pub fn array(&self, index: usize) -> Option<&SelectionArray> {
        self.arrays.get(index)
    }

    /// First array whose name equals `name` (`None` matches unnamed arrays)
    pub fn array_by_name(&self, name: Option<&str>) -> Option<&SelectionArray> {
        self.arrays.iter().find(|a| a.name() == name)
    }

    /// Names of the arrays, in order
    pub fn names(&self) -> impl Iterator<Item = Option<&str>> {
        self.arrays.iter().map(SelectionArray::name)
    }

    /// Tuples in the first array
    pub fn tuple_count(&self) -> usize {
        self.arrays.first().map_or(0, SelectionArray::tuple_count)
    }
}

impl From<SelectionArray> for SelectionList {
    fn from(array: SelectionArray) -> Self {
        SelectionList::single(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuples_validates_shape() {
        assert!(SelectionArray::tuples(ArrayData::Double(vec![0.0; 6]), 3).is_ok());
        assert!(SelectionArray::tuples(ArrayData::Double(vec![0.0; 5]), 3).is_err());
        assert!(SelectionArray::tuples(ArrayData::Double(vec![]), 0).is_err());
    }

    #[test]
    fn test_union_single_component_skips_duplicates() {
        let mut a = SelectionArray::ids(vec![1, 2, 3]);
        let b = SelectionArray::ids(vec![3, 4, 4, 1]);
        assert_eq!(a.union_with(&b).unwrap(), 1);
        assert_eq!(a.data().as_ids(), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn test_union_tuples_appends_everything() {
        let mut a = SelectionArray::tuples(ArrayData::Double(vec![0.0, 1.0]), 2).unwrap();
        let b = a.clone();
        assert_eq!(a.union_with(&b).unwrap(), 2);
        assert_eq!(a.tuple_count(), 2);
    }

    #[test]
    fn test_union_rejects_type_mismatch() {
        let mut a = SelectionArray::ids(vec![1]);
        let b = SelectionArray::new(ArrayData::Int(vec![1]));
        assert!(matches!(
            a.union_with(&b),
            Err(SelectionError::StructuralMismatch(_))
        ));
    }

    #[test]
    fn test_gather_tuples() {
        let data = ArrayData::Int(vec![10, 11, 20, 21, 30, 31]);
        assert_eq!(data.gather(&[2, 0], 2), ArrayData::Int(vec![30, 31, 10, 11]));
    }

    #[test]
    fn test_double_keys_fold_negative_zero() {
        let data = ArrayData::Double(vec![0.0, -0.0]);
        assert_eq!(data.key_at(0), data.key_at(1));
    }

    #[test]
    fn test_array_by_name() {
        let list = SelectionList::new()
            .with(SelectionArray::ids(vec![1]))
            .with(SelectionArray::ids(vec![2]).named("b"));
        assert_eq!(list.array_by_name(Some("b")).unwrap().tuple_count(), 1);
        assert!(list.array_by_name(None).is_some());
        assert!(list.array_by_name(Some("c")).is_none());
    }
}
