//! Data sources for content-type conversion
//!
//! The [`DataSource`] trait is the only view the converter has of a dataset:
//! per field type, an element count, named arrays, the identifier arrays and
//! optionally one position per element.

use crate::content::FieldType;
use crate::list::SelectionArray;
use std::collections::HashMap;

/// Read access to the arrays a selection refers to
pub trait DataSource {
    /// Number of entities of the given kind
    fn element_count(&self, field: FieldType) -> usize;

    /// Look up an attribute array by name
    fn array(&self, field: FieldType, name: &str) -> Option<&SelectionArray>;

    /// The global-id array, if the dataset has one
    fn global_ids(&self, field: FieldType) -> Option<&SelectionArray>;

    /// The pedigree-id array, if the dataset has one
    fn pedigree_ids(&self, field: FieldType) -> Option<&SelectionArray>;

    /// One position per entity, for spatial criteria
    fn positions(&self, _field: FieldType) -> Option<&[[f64; 3]]> {
        None
    }
}

/// Arrays of one field type
#[derive(Debug, Clone, Default)]
struct FieldTable {
    count: Option<usize>,
    arrays: Vec<SelectionArray>,
    global_ids: Option<SelectionArray>,
    pedigree_ids: Option<SelectionArray>,
    positions: Option<Vec<[f64; 3]>>,
}

impl FieldTable {
    fn inferred_count(&self) -> usize {
        let arrays = self
            .arrays
            .iter()
            .chain(self.global_ids.iter())
            .chain(self.pedigree_ids.iter())
            .map(SelectionArray::tuple_count);
        let positions = self.positions.as_ref().map(Vec::len);
        arrays.chain(positions).max().unwrap_or(0)
    }
}

/// An in-memory [`DataSource`] keyed by field type
#[derive(Debug, Clone, Default)]
pub struct TableSource {
    fields: HashMap<FieldType, FieldTable>,
}

impl TableSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&mut self, field: FieldType) -> &mut FieldTable {
        self.fields.entry(field).or_default()
    }

    /// Fix the element count instead of inferring it from the arrays
    pub fn with_count(mut self, field: FieldType, count: usize) -> Self {
        self.table(field).count = Some(count);
        self
    }

    /// Add or replace a named attribute array
    pub fn with_array(mut self, field: FieldType, array: SelectionArray) -> Self {
        let table = self.table(field);
        table.arrays.retain(|a| a.name() != array.name());
        table.arrays.push(array);
        self
    }

    /// Set the global-id array
    pub fn with_global_ids(mut self, field: FieldType, ids: SelectionArray) -> Self {
        self.table(field).global_ids = Some(ids);
        self
    }

    /// Set the pedigree-id array
    pub fn with_pedigree_ids(mut self, field: FieldType, ids: SelectionArray) -> Self {
        self.table(field).pedigree_ids = Some(ids);
        self
    }

    /// Set per-element positions
    pub fn with_positions(mut self, field: FieldType, positions: Vec<[f64; 3]>) -> Self {
        self.table(field).positions = Some(positions);
        self
    }
}

impl DataSource for TableSource {
    fn element_count(&self, field: FieldType) -> usize {
        self.fields
            .get(&field)
            .map_or(0, |t| t.count.unwrap_or_else(|| t.inferred_count()))
    }

    fn array(&self, field: FieldType, name: &str) -> Option<&SelectionArray> {
        self.fields
            .get(&field)?
            .arrays
            .iter()
            .find(|a| a.name() == Some(name))
    }

    fn global_ids(&self, field: FieldType) -> Option<&SelectionArray> {
        self.fields.get(&field)?.global_ids.as_ref()
    }

    fn pedigree_ids(&self, field: FieldType) -> Option<&SelectionArray> {
        self.fields.get(&field)?.pedigree_ids.as_ref()
    }

    fn positions(&self, field: FieldType) -> Option<&[[f64; 3]]> {
        self.fields.get(&field)?.positions.as_deref()
    }
}
