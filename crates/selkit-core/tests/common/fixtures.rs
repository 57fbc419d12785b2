//! Shared builders for selection tests

#![allow(dead_code)]

use selkit_core::{
    ArrayData, ContentType, FieldType, Selection, SelectionArray, SelectionNode, TableSource,
};

/// Node names used by the truth-table tests
pub const NAMES: [&str; 7] = ["A", "B", "C", "D", "E", "F", "G"];

/// A single-array id node on cells
pub fn id_node(content: ContentType, ids: &[i64]) -> SelectionNode {
    SelectionNode::with_ids(content, FieldType::Cell, ids.to_vec())
}

/// A selection holding one empty Indices node per entry of [`NAMES`]
pub fn lettered_selection(expression: &str) -> Selection {
    let mut selection = Selection::new();
    for name in NAMES {
        selection.set_node(name, SelectionNode::new(ContentType::Indices, FieldType::Cell));
    }
    selection.set_expression(expression);
    selection
}

/// Split rows of seven flags into one column per name
pub fn columns(rows: &[[bool; 7]]) -> Vec<Vec<bool>> {
    (0..NAMES.len())
        .map(|c| rows.iter().map(|row| row[c]).collect())
        .collect()
}

/// Cells with global ids `1000 + i`, pedigree names and a temperature array
pub fn cell_table(count: usize) -> TableSource {
    let count_i64 = i64::try_from(count).unwrap();
    TableSource::new()
        .with_global_ids(
            FieldType::Cell,
            SelectionArray::ids((0..count_i64).map(|i| 1000 + i).collect::<Vec<_>>()),
        )
        .with_pedigree_ids(
            FieldType::Cell,
            SelectionArray::new(ArrayData::Id((0..count_i64).map(|i| 7 * i).collect()))
                .named("Origin"),
        )
        .with_array(
            FieldType::Cell,
            SelectionArray::new(ArrayData::Double(
                (0..count).map(|i| i as f64 * 0.5).collect(),
            ))
            .named("Temperature"),
        )
}
