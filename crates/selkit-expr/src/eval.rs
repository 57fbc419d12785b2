//! Expression evaluation over named masks
//!
//! Evaluates compiled expressions element-wise against one mask per name.
//! Element `i` of the output depends only on element `i` of every input, so
//! large masks can be split into disjoint chunks.
//!
//! # Parallel Processing
//!
//! When the `parallel` feature is enabled, masks longer than
//! [`EvalOptions::parallel_min_len`] are evaluated with rayon, one chunk of
//! [`EvalOptions::chunk_len`] elements per task.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::ast::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Evaluation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Expression references unknown name: {0}")]
    UnknownNodeReference(String),

    #[error("Mask '{name}' has length {actual}, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Result type for evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// A per-element mask value: booleans and signed/unsigned bytes
pub trait MaskValue: Copy + Send + Sync {
    /// Whether the element is selected
    fn is_set(self) -> bool;
}

impl MaskValue for bool {
    fn is_set(self) -> bool {
        self
    }
}

impl MaskValue for i8 {
    fn is_set(self) -> bool {
        self != 0
    }
}

impl MaskValue for u8 {
    fn is_set(self) -> bool {
        self != 0
    }
}

/// Named, read-only input masks, all expected to share one length
#[derive(Debug, Clone)]
pub struct MaskSet<'a, M> {
    masks: Vec<(&'a str, &'a [M])>,
}

impl<'a, M> Default for MaskSet<'a, M> {
    fn default() -> Self {
        Self { masks: Vec::new() }
    }
}

impl<'a, M: MaskValue> MaskSet<'a, M> {
    /// Create an empty mask set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the mask for `name`
    pub fn insert(&mut self, name: &'a str, mask: &'a [M]) {
        match self.masks.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = mask,
            None => self.masks.push((name, mask)),
        }
    }

    /// Builder-style [`MaskSet::insert`]
    pub fn with(mut self, name: &'a str, mask: &'a [M]) -> Self {
        self.insert(name, mask);
        self
    }

    /// Get the mask for `name`
    pub fn get(&self, name: &str) -> Option<&'a [M]> {
        self.masks
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, mask)| *mask)
    }

    /// Whether a mask is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of masks
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Whether the set holds no masks
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Iterate over `(name, mask)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a [M])> + '_ {
        self.masks.iter().copied()
    }

    /// Common length of the masks, checking that they all agree
    pub fn common_len(&self) -> EvalResult<usize> {
        let mut iter = self.masks.iter();
        let expected = match iter.next() {
            Some((_, mask)) => mask.len(),
            None => return Ok(0),
        };
        for (name, mask) in iter {
            if mask.len() != expected {
                return Err(EvalError::LengthMismatch {
                    name: (*name).to_string(),
                    expected,
                    actual: mask.len(),
                });
            }
        }
        Ok(expected)
    }
}

/// Tuning knobs for evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOptions {
    /// Masks shorter than this are evaluated on the calling thread
    pub parallel_min_len: usize,
    /// Elements per parallel task
    pub chunk_len: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            parallel_min_len: 65_536,
            chunk_len: 8_192,
        }
    }
}

/// Check that every name in `compiled` has a mask, without reading any mask
pub fn validate_names<M: MaskValue>(
    compiled: &CompiledExpression,
    masks: &MaskSet<'_, M>,
) -> EvalResult<()> {
    match compiled
        .referenced_names()
        .find(|name| !masks.contains(name))
    {
        Some(missing) => Err(EvalError::UnknownNodeReference(missing.to_string())),
        None => Ok(()),
    }
}

/// Evaluate a compiled expression with default options
pub fn evaluate<M: MaskValue>(
    compiled: &CompiledExpression,
    masks: &MaskSet<'_, M>,
) -> EvalResult<Vec<bool>> {
    evaluate_with_options(compiled, masks, &EvalOptions::default())
}

/// Evaluate a compiled expression into one output mask
pub fn evaluate_with_options<M: MaskValue>(
    compiled: &CompiledExpression,
    masks: &MaskSet<'_, M>,
    options: &EvalOptions,
) -> EvalResult<Vec<bool>> {
    validate_names(compiled, masks)?;
    let len = masks.common_len()?;

    let program = Program::lower(compiled, masks);
    let mut out = vec![false; len];
    fill(&program, &mut out, options);
    Ok(out)
}

/// An expression with its leaves resolved to slices
enum Program<'a, M> {
    AnyOf(Vec<&'a [M]>),
    Tree(Node<'a, M>),
}

enum Node<'a, M> {
    Leaf(&'a [M]),
    Not(Box<Node<'a, M>>),
    And(Box<Node<'a, M>>, Box<Node<'a, M>>),
    Or(Box<Node<'a, M>>, Box<Node<'a, M>>),
    Xor(Box<Node<'a, M>>, Box<Node<'a, M>>),
}

impl<'a, M: MaskValue> Program<'a, M> {
    // Names were validated, so every leaf resolves
    fn lower(compiled: &CompiledExpression, masks: &MaskSet<'a, M>) -> Self {
        match compiled.kind() {
            CompiledKind::AnyMask => Program::AnyOf(masks.iter().map(|(_, m)| m).collect()),
            CompiledKind::Tree(tree) => Program::Tree(Node::lower(tree, masks)),
        }
    }

    fn at(&self, index: usize) -> bool {
        match self {
            Program::AnyOf(leaves) => leaves.iter().any(|leaf| leaf[index].is_set()),
            Program::Tree(node) => node.at(index),
        }
    }
}

impl<'a, M: MaskValue> Node<'a, M> {
    fn lower(expr: &MaskExpr, masks: &MaskSet<'a, M>) -> Self {
        match expr {
            MaskExpr::Name(name) => Node::Leaf(masks.get(name).unwrap_or(&[])),
            MaskExpr::Not(inner) => Node::Not(Box::new(Node::lower(inner, masks))),
            MaskExpr::And(l, r) => Node::And(
                Box::new(Node::lower(l, masks)),
                Box::new(Node::lower(r, masks)),
            ),
            MaskExpr::Or(l, r) => Node::Or(
                Box::new(Node::lower(l, masks)),
                Box::new(Node::lower(r, masks)),
            ),
            MaskExpr::Xor(l, r) => Node::Xor(
                Box::new(Node::lower(l, masks)),
                Box::new(Node::lower(r, masks)),
            ),
        }
    }

    fn at(&self, index: usize) -> bool {
        match self {
            Node::Leaf(mask) => mask.get(index).map_or(false, |&v| v.is_set()),
            Node::Not(inner) => !inner.at(index),
            Node::And(l, r) => l.at(index) & r.at(index),
            Node::Or(l, r) => l.at(index) | r.at(index),
            Node::Xor(l, r) => l.at(index) ^ r.at(index),
        }
    }
}

fn fill_range<M: MaskValue>(program: &Program<'_, M>, out: &mut [bool], offset: usize) {
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = program.at(offset + i);
    }
}

#[cfg(feature = "parallel")]
fn fill<M: MaskValue>(program: &Program<'_, M>, out: &mut [bool], options: &EvalOptions) {
    if out.len() < options.parallel_min_len || options.chunk_len == 0 {
        fill_range(program, out, 0);
        return;
    }

    let chunk_len = options.chunk_len;
    tracing::debug!(len = out.len(), chunk_len, "evaluating masks in parallel");
    out.par_chunks_mut(chunk_len)
        .enumerate()
        .for_each(|(chunk, slice)| fill_range(program, slice, chunk * chunk_len));
}

#[cfg(not(feature = "parallel"))]
fn fill<M: MaskValue>(program: &Program<'_, M>, out: &mut [bool], _options: &EvalOptions) {
    fill_range(program, out, 0);
}

/// Count the number of selected elements
pub fn count_selected(mask: &[bool]) -> usize {
    mask.iter().filter(|&&b| b).count()
}

/// Get indices of selected elements
pub fn selected_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &b)| if b { Some(i) } else { None })
        .collect()
}

/// Invert a selection mask
pub fn invert_mask(mask: &[bool]) -> Vec<bool> {
    mask.iter().map(|&b| !b).collect()
}
