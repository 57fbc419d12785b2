//! Content-type conversion
//!
//! A node is first resolved to a sorted, unique set of entity indices against
//! a [`DataSource`], then re-expressed in the target content type. The same
//! resolution backs [`selection_mask`], which turns a whole [`Selection`]
//! into one boolean mask over the entities of a field type.

use crate::config::ConvertConfig;
use crate::content::{ContentType, FieldType};
use crate::error::{SelectionError, SelectionResult};
use crate::list::{ElementType, SelectionArray, SelectionList, ValueKey};
use crate::node::SelectionNode;
use crate::property::{Properties, PropertyKey};
use crate::selection::Selection;
use crate::source::DataSource;
use selkit_expr::{EvalOptions, MaskSet};
use std::collections::HashSet;

/// Array names reported when an identifier array is missing
const GLOBAL_IDS: &str = "GlobalIds";
const PEDIGREE_IDS: &str = "PedigreeIds";
const POSITIONS: &str = "Positions";

/// Per-call conversion options
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Degrade to an empty node instead of failing on a missing array
    pub allow_missing_array: bool,
    /// Suppress the warning logged when a conversion degrades
    pub quiet: bool,
    /// Dataset arrays to read when converting to `Values`
    pub array_names: Vec<String>,
    /// Tolerance for `Locations` nodes without an `Epsilon` property
    pub location_epsilon: f64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            allow_missing_array: false,
            quiet: false,
            array_names: Vec::new(),
            location_epsilon: 1e-6,
        }
    }
}

impl From<&ConvertConfig> for ConvertOptions {
    fn from(config: &ConvertConfig) -> Self {
        Self {
            allow_missing_array: config.allow_missing_array,
            quiet: config.quiet,
            array_names: Vec::new(),
            location_epsilon: config.location_epsilon,
        }
    }
}

impl ConvertOptions {
    /// Builder-style setter for [`ConvertOptions::array_names`]
    pub fn with_array_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.array_names = names.into_iter().map(Into::into).collect();
        self
    }
}

fn missing(field: FieldType, array: &str) -> SelectionError {
    SelectionError::MissingConversionArray {
        field,
        array: array.to_string(),
    }
}

/// Resolve a node to the sorted indices of the entities it selects.
///
/// `Inverse(true)` complements the result over `0..element_count`.
pub fn resolve_indices(
    node: &SelectionNode,
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<Vec<usize>> {
    let field = node.field_type();
    let count = source.element_count(field);
    let mut selected = vec![false; count];

    match node.content_type() {
        ContentType::Indices => mark_indices(node, &mut selected),
        ContentType::GlobalIds => mark_global_ids(node, source, &mut selected)?,
        ContentType::PedigreeIds => mark_pedigree_ids(node, source, &mut selected)?,
        ContentType::Values => mark_values(node, source, &mut selected)?,
        ContentType::Thresholds => mark_thresholds(node, source, &mut selected)?,
        ContentType::Frustum => mark_frustum(node, source, &mut selected)?,
        ContentType::Locations => mark_locations(node, source, options, &mut selected)?,
        other @ (ContentType::Blocks
        | ContentType::BlockSelectors
        | ContentType::Query
        | ContentType::User) => {
            return Err(SelectionError::incompatible(
                "resolve",
                other,
                ContentType::Indices,
            ))
        }
    }

    let inverse = node.properties().inverse();
    Ok(selected
        .iter()
        .enumerate()
        .filter(|&(_, &hit)| hit != inverse)
        .map(|(i, _)| i)
        .collect())
}

/// Every scalar of every array in the list
fn listed_ids(list: &SelectionList) -> impl Iterator<Item = i64> + '_ {
    list.arrays()
        .iter()
        .flat_map(|a| (0..a.data().len()).filter_map(move |i| a.data().id_at(i)))
}

fn mark_indices(node: &SelectionNode, selected: &mut [bool]) {
    for id in listed_ids(node.selection_list()) {
        if let Some(slot) = usize::try_from(id).ok().and_then(|i| selected.get_mut(i)) {
            *slot = true;
        }
    }
}

fn mark_global_ids(
    node: &SelectionNode,
    source: &dyn DataSource,
    selected: &mut [bool],
) -> SelectionResult<()> {
    let field = node.field_type();
    let ids = source
        .global_ids(field)
        .ok_or_else(|| missing(field, GLOBAL_IDS))?;
    let wanted: HashSet<i64> = listed_ids(node.selection_list()).collect();

    let components = ids.components();
    for (i, slot) in selected.iter_mut().enumerate() {
        if let Some(id) = ids.data().id_at(i * components) {
            *slot |= wanted.contains(&id);
        }
    }
    Ok(())
}

fn mark_pedigree_ids(
    node: &SelectionNode,
    source: &dyn DataSource,
    selected: &mut [bool],
) -> SelectionResult<()> {
    let field = node.field_type();
    let pedigree = source
        .pedigree_ids(field)
        .ok_or_else(|| missing(field, PEDIGREE_IDS))?;
    for array in node.selection_list().arrays() {
        mark_matching(array, pedigree, 0, selected)?;
    }
    Ok(())
}

fn mark_values(
    node: &SelectionNode,
    source: &dyn DataSource,
    selected: &mut [bool],
) -> SelectionResult<()> {
    let field = node.field_type();
    let component = component_of(node)?;
    for array in node.selection_list().arrays() {
        let name = array_name(array)?;
        let dataset = source.array(field, name).ok_or_else(|| missing(field, name))?;
        mark_matching(array, dataset, component, selected)?;
    }
    Ok(())
}

/// Mark entities whose value at `component` of `dataset` is listed in `wanted`
fn mark_matching(
    wanted: &SelectionArray,
    dataset: &SelectionArray,
    component: usize,
    selected: &mut [bool],
) -> SelectionResult<()> {
    if wanted.element_type() != dataset.element_type() {
        return Err(SelectionError::mismatch(format!(
            "cannot match {} values against {} array '{}'",
            wanted.element_type(),
            dataset.element_type(),
            dataset.name().unwrap_or("<unnamed>")
        )));
    }
    check_component(dataset, component)?;

    let keys: HashSet<ValueKey<'_>> = (0..wanted.data().len())
        .filter_map(|i| wanted.data().key_at(i))
        .collect();
    let stride = dataset.components();
    for (i, slot) in selected.iter_mut().enumerate() {
        if let Some(key) = dataset.data().key_at(i * stride + component) {
            *slot |= keys.contains(&key);
        }
    }
    Ok(())
}

fn mark_thresholds(
    node: &SelectionNode,
    source: &dyn DataSource,
    selected: &mut [bool],
) -> SelectionResult<()> {
    let field = node.field_type();
    let component = component_of(node)?;
    for array in node.selection_list().arrays() {
        let name = array_name(array)?;
        if array.components() != 2 || array.element_type() == ElementType::String {
            return Err(SelectionError::mismatch(format!(
                "threshold array '{}' must hold numeric (min, max) pairs",
                name
            )));
        }
        let dataset = source.array(field, name).ok_or_else(|| missing(field, name))?;
        if dataset.element_type() == ElementType::String {
            return Err(SelectionError::mismatch(format!(
                "cannot threshold string array '{}'",
                name
            )));
        }
        check_component(dataset, component)?;

        let ranges: Vec<(f64, f64)> = (0..array.tuple_count())
            .filter_map(|t| Some((array.data().f64_at(2 * t)?, array.data().f64_at(2 * t + 1)?)))
            .collect();
        let stride = dataset.components();
        for (i, slot) in selected.iter_mut().enumerate() {
            if let Some(v) = dataset.data().f64_at(i * stride + component) {
                *slot |= ranges.iter().any(|&(lo, hi)| lo <= v && v <= hi);
            }
        }
    }
    Ok(())
}

fn component_of(node: &SelectionNode) -> SelectionResult<usize> {
    let component = node.properties().component_number().unwrap_or(0);
    usize::try_from(component)
        .map_err(|_| SelectionError::mismatch(format!("invalid component number {}", component)))
}

fn check_component(dataset: &SelectionArray, component: usize) -> SelectionResult<()> {
    if component >= dataset.components() {
        return Err(SelectionError::mismatch(format!(
            "array '{}' has {} components, component {} requested",
            dataset.name().unwrap_or("<unnamed>"),
            dataset.components(),
            component
        )));
    }
    Ok(())
}

fn array_name(array: &SelectionArray) -> SelectionResult<&str> {
    array
        .name()
        .ok_or_else(|| SelectionError::mismatch("value arrays must be named"))
}

type Vec3 = [f64; 3];

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Corner indices of each face: left, right, bottom, top, near, far
const FRUSTUM_FACES: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [4, 5, 6, 7],
    [0, 1, 4, 5],
    [2, 3, 6, 7],
    [0, 2, 4, 6],
    [1, 3, 5, 7],
];

/// A half-space `dot(normal, p) >= offset`
#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: Vec3,
    offset: f64,
}

impl Plane {
    fn contains(&self, p: Vec3, tolerance: f64) -> bool {
        dot(self.normal, p) >= self.offset - tolerance
    }
}

/// Read eight corners from 3- or 4-component (homogeneous) tuples
fn frustum_corners(array: &SelectionArray) -> SelectionResult<[Vec3; 8]> {
    let components = array.components();
    if array.tuple_count() != 8
        || !(components == 3 || components == 4)
        || array.element_type() == ElementType::String
    {
        return Err(SelectionError::mismatch(
            "frustum needs 8 numeric corners of 3 or 4 components",
        ));
    }

    let data = array.data();
    let mut corners = [[0.0; 3]; 8];
    for (t, corner) in corners.iter_mut().enumerate() {
        let base = t * components;
        let w = match components {
            4 => data.f64_at(base + 3).filter(|w| *w != 0.0).unwrap_or(1.0),
            _ => 1.0,
        };
        for (axis, value) in corner.iter_mut().enumerate() {
            *value = data.f64_at(base + axis).unwrap_or(0.0) / w;
        }
    }
    Ok(corners)
}

/// Inward-facing planes of the hull of the eight corners
fn frustum_planes(corners: &[Vec3; 8]) -> SelectionResult<Vec<Plane>> {
    let mut centroid = [0.0; 3];
    for corner in corners {
        for axis in 0..3 {
            centroid[axis] += corner[axis] / 8.0;
        }
    }

    let mut planes = Vec::with_capacity(FRUSTUM_FACES.len());
    for face in FRUSTUM_FACES {
        let points = face.map(|i| corners[i]);
        // Largest triangle of the face, so one collapsed edge does not matter.
        let normal = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]]
            .iter()
            .map(|&[a, b, c]| cross(sub(points[b], points[a]), sub(points[c], points[a])))
            .max_by(|x, y| dot(*x, *x).total_cmp(&dot(*y, *y)))
            .unwrap_or([0.0; 3]);
        let length = dot(normal, normal).sqrt();
        if length == 0.0 || !length.is_finite() {
            return Err(SelectionError::mismatch("degenerate frustum face"));
        }

        let mut normal = normal.map(|v| v / length);
        let mut offset = dot(normal, points[0]);
        if dot(normal, centroid) < offset {
            normal = normal.map(|v| -v);
            offset = -offset;
        }
        planes.push(Plane { normal, offset });
    }
    Ok(planes)
}

fn mark_frustum(
    node: &SelectionNode,
    source: &dyn DataSource,
    selected: &mut [bool],
) -> SelectionResult<()> {
    let field = node.field_type();
    let array = match node.selection_list().array(0) {
        Some(array) => array,
        None => return Ok(()),
    };
    let planes = frustum_planes(&frustum_corners(array)?)?;
    let positions = source
        .positions(field)
        .ok_or_else(|| missing(field, POSITIONS))?;

    for (slot, &p) in selected.iter_mut().zip(positions) {
        let scale = p.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
        *slot |= planes.iter().all(|plane| plane.contains(p, 1e-12 * scale));
    }
    Ok(())
}

fn mark_locations(
    node: &SelectionNode,
    source: &dyn DataSource,
    options: &ConvertOptions,
    selected: &mut [bool],
) -> SelectionResult<()> {
    let field = node.field_type();
    let epsilon = node
        .properties()
        .epsilon()
        .unwrap_or(options.location_epsilon);

    let mut locations = Vec::new();
    for array in node.selection_list().arrays() {
        if array.components() != 3 || array.element_type() == ElementType::String {
            return Err(SelectionError::mismatch(
                "locations must be numeric 3-component tuples",
            ));
        }
        for t in 0..array.tuple_count() {
            let data = array.data();
            if let (Some(x), Some(y), Some(z)) = (
                data.f64_at(3 * t),
                data.f64_at(3 * t + 1),
                data.f64_at(3 * t + 2),
            ) {
                locations.push([x, y, z]);
            }
        }
    }
    if locations.is_empty() {
        return Ok(());
    }

    let positions = source
        .positions(field)
        .ok_or_else(|| missing(field, POSITIONS))?;
    let limit = epsilon * epsilon;
    for (slot, &p) in selected.iter_mut().zip(positions) {
        *slot |= locations.iter().any(|&q| {
            let d = sub(p, q);
            dot(d, d) <= limit
        });
    }
    Ok(())
}

/// Properties of `node` that survive conversion
fn carried_properties(node: &SelectionNode) -> Properties {
    node.properties()
        .iter()
        .filter(|p| {
            !matches!(
                p.key(),
                PropertyKey::Inverse | PropertyKey::Epsilon | PropertyKey::ComponentNumber
            )
        })
        .cloned()
        .collect()
}

/// Build the list of a `target` node from resolved indices
fn build_list(
    node: &SelectionNode,
    target: ContentType,
    indices: &[usize],
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<SelectionList> {
    let field = node.field_type();
    let gather = |array: &SelectionArray| -> SelectionResult<SelectionArray> {
        let data = array.data().gather(indices, array.components());
        let mut out = SelectionArray::tuples(data, array.components())?;
        out.set_name(array.name().map(str::to_string));
        Ok(out)
    };

    match target {
        ContentType::Indices => {
            let ids: Vec<i64> = indices.iter().filter_map(|&i| i64::try_from(i).ok()).collect();
            Ok(SelectionList::single(SelectionArray::ids(ids)))
        }
        ContentType::GlobalIds => {
            let ids = source
                .global_ids(field)
                .ok_or_else(|| missing(field, GLOBAL_IDS))?;
            Ok(SelectionList::single(gather(ids)?))
        }
        ContentType::PedigreeIds => {
            let ids = source
                .pedigree_ids(field)
                .ok_or_else(|| missing(field, PEDIGREE_IDS))?;
            Ok(SelectionList::single(gather(ids)?))
        }
        ContentType::Values => {
            let names: Vec<&str> = if !options.array_names.is_empty() {
                options.array_names.iter().map(String::as_str).collect()
            } else if matches!(
                node.content_type(),
                ContentType::Values | ContentType::Thresholds
            ) {
                node.selection_list().names().flatten().collect()
            } else {
                return Err(SelectionError::mismatch(
                    "no array names to convert values from",
                ));
            };

            let mut list = SelectionList::new();
            for name in names {
                let dataset = source.array(field, name).ok_or_else(|| missing(field, name))?;
                list.push(gather(dataset)?);
            }
            Ok(list)
        }
        other @ (ContentType::Frustum
        | ContentType::Locations
        | ContentType::Thresholds
        | ContentType::Blocks
        | ContentType::BlockSelectors
        | ContentType::Query
        | ContentType::User) => Err(SelectionError::incompatible(
            "convert",
            node.content_type(),
            other,
        )),
    }
}

fn convert_strict(
    node: &SelectionNode,
    target: ContentType,
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<SelectionNode> {
    let indices = resolve_indices(node, source, options)?;
    let list = build_list(node, target, &indices, source, options)?;

    let mut out = SelectionNode::new(target, node.field_type());
    out.set_selection_list(list);
    *out.properties_mut() = carried_properties(node);
    tracing::debug!(
        from = %node.content_type(),
        to = %target,
        field = %node.field_type(),
        selected = indices.len(),
        "converted selection node"
    );
    Ok(out)
}

/// Re-express `node` as a node of content type `target`.
///
/// A node that already has the target type and needs no resolution is
/// returned as a copy. With [`ConvertOptions::allow_missing_array`] a missing
/// dataset array yields an empty node of the target type.
pub fn convert_node(
    node: &SelectionNode,
    target: ContentType,
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<SelectionNode> {
    let same = node.content_type() == target
        && !node.properties().inverse()
        && (target != ContentType::Values || options.array_names.is_empty());
    if same {
        return Ok(node.clone());
    }

    match convert_strict(node, target, source, options) {
        Err(err) if err.is_missing_array() && options.allow_missing_array => {
            if !options.quiet {
                tracing::warn!(
                    from = %node.content_type(),
                    to = %target,
                    error = %err,
                    "conversion produced an empty selection"
                );
            }
            let mut out = SelectionNode::new(target, node.field_type());
            *out.properties_mut() = carried_properties(node);
            Ok(out)
        }
        result => result,
    }
}

/// Convert every node of `selection`, keeping names and expression
pub fn convert_selection(
    selection: &Selection,
    target: ContentType,
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<Selection> {
    let mut out = Selection::new();
    for (name, node) in selection.nodes() {
        out.set_node(name, convert_node(node, target, source, options)?);
    }
    out.set_expression(selection.expression());
    Ok(out)
}

/// Mask of one node over the entities of `field`
fn node_mask(
    node: &SelectionNode,
    field: FieldType,
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<Vec<bool>> {
    let count = source.element_count(field);
    let mut mask = vec![false; count];
    if node.field_type() != field {
        return Ok(mask);
    }

    let indices = match resolve_indices(node, source, options) {
        Ok(indices) => indices,
        Err(err) if err.is_missing_array() && options.allow_missing_array => {
            if !options.quiet {
                tracing::warn!(error = %err, "node selects nothing");
            }
            Vec::new()
        }
        Err(err) => return Err(err),
    };
    for i in indices {
        mask[i] = true;
    }
    Ok(mask)
}

/// Evaluate `selection` into one mask over the entities of `field`.
///
/// Each node is resolved to its own mask; nodes restricting another field
/// type select nothing. The masks are then combined by the expression.
pub fn selection_mask(
    selection: &Selection,
    field: FieldType,
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<Vec<bool>> {
    selection_mask_with(selection, field, source, options, &EvalOptions::default())
}

/// [`selection_mask`] with explicit evaluation options
pub fn selection_mask_with(
    selection: &Selection,
    field: FieldType,
    source: &dyn DataSource,
    options: &ConvertOptions,
    eval: &EvalOptions,
) -> SelectionResult<Vec<bool>> {
    if selection.node_count() == 0 {
        return Ok(vec![false; source.element_count(field)]);
    }

    let compiled = selkit_expr::compile(selection.expression())?;
    selection.validate_expression(&compiled)?;

    let mut masks = Vec::with_capacity(selection.node_count());
    for (name, node) in selection.nodes() {
        masks.push((name, node_mask(node, field, source, options)?));
    }
    let mut set = MaskSet::new();
    for (name, mask) in &masks {
        set.insert(*name, mask.as_slice());
    }
    selection.evaluate_compiled(&compiled, &set, eval)
}

/// Sorted indices of the entities of `field` that `selection` selects
pub fn selected_indices(
    selection: &Selection,
    field: FieldType,
    source: &dyn DataSource,
    options: &ConvertOptions,
) -> SelectionResult<Vec<usize>> {
    let mask = selection_mask(selection, field, source, options)?;
    Ok(selkit_expr::selected_indices(&mask))
}
