//! Abstract Syntax Tree for truth-table expressions
//!
//! This module defines the tree produced by the parser and the compiled
//! form that the evaluator consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A truth-table expression over named masks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskExpr {
    /// Logical AND of two expressions
    And(Box<MaskExpr>, Box<MaskExpr>),

    /// Logical OR of two expressions
    Or(Box<MaskExpr>, Box<MaskExpr>),

    /// Logical XOR of two expressions
    Xor(Box<MaskExpr>, Box<MaskExpr>),

    /// Logical NOT of an expression
    Not(Box<MaskExpr>),

    /// Reference to a named mask
    Name(String),
}

impl MaskExpr {
    /// Create an AND expression
    pub fn and(left: MaskExpr, right: MaskExpr) -> Self {
        MaskExpr::And(Box::new(left), Box::new(right))
    }

    /// Create an OR expression
    pub fn or(left: MaskExpr, right: MaskExpr) -> Self {
        MaskExpr::Or(Box::new(left), Box::new(right))
    }

    /// Create an XOR expression
    pub fn xor(left: MaskExpr, right: MaskExpr) -> Self {
        MaskExpr::Xor(Box::new(left), Box::new(right))
    }

    /// Create a NOT expression
    pub fn not(expr: MaskExpr) -> Self {
        MaskExpr::Not(Box::new(expr))
    }

    /// Create a name reference
    pub fn name(name: impl Into<String>) -> Self {
        MaskExpr::Name(name.into())
    }

    /// Check if this is a bare name (no operators)
    pub fn is_atomic(&self) -> bool {
        matches!(self, MaskExpr::Name(_))
    }

    /// Collect every name referenced by the expression
    pub fn names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut BTreeSet<String>) {
        match self {
            MaskExpr::Name(name) => {
                out.insert(name.clone());
            }
            MaskExpr::Not(inner) => inner.collect_names(out),
            MaskExpr::And(l, r) | MaskExpr::Or(l, r) | MaskExpr::Xor(l, r) => {
                l.collect_names(out);
                r.collect_names(out);
            }
        }
    }

    /// Evaluate the tree for one index, resolving leaves through `leaf`
    pub fn evaluate_with<F>(&self, leaf: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        match self {
            MaskExpr::Name(name) => leaf(name),
            MaskExpr::Not(inner) => !inner.evaluate_with(leaf),
            MaskExpr::And(l, r) => l.evaluate_with(leaf) & r.evaluate_with(leaf),
            MaskExpr::Or(l, r) => l.evaluate_with(leaf) | r.evaluate_with(leaf),
            MaskExpr::Xor(l, r) => l.evaluate_with(leaf) ^ r.evaluate_with(leaf),
        }
    }
}

impl fmt::Display for MaskExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskExpr::Name(name) => write!(f, "{}", name),
            MaskExpr::Not(inner) if inner.is_atomic() => write!(f, "!{}", inner),
            MaskExpr::Not(inner) => write!(f, "!({})", inner),
            MaskExpr::And(l, r) => write!(f, "({} & {})", l, r),
            MaskExpr::Or(l, r) => write!(f, "({} | {})", l, r),
            MaskExpr::Xor(l, r) => write!(f, "({} ^ {})", l, r),
        }
    }
}

/// What a compiled expression evaluates to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompiledKind {
    /// The empty expression: OR across every supplied mask
    AnyMask,

    /// A parsed expression tree
    Tree(MaskExpr),
}

/// An expression parsed once and ready to be evaluated many times
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledExpression {
    source: String,
    kind: CompiledKind,
    names: BTreeSet<String>,
}

impl CompiledExpression {
    pub(crate) fn new(source: impl Into<String>, kind: CompiledKind) -> Self {
        let names = match &kind {
            CompiledKind::AnyMask => BTreeSet::new(),
            CompiledKind::Tree(tree) => tree.names(),
        };
        Self {
            source: source.into(),
            kind,
            names,
        }
    }

    /// The exact string this expression was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled form
    pub fn kind(&self) -> &CompiledKind {
        &self.kind
    }

    /// The parsed tree, or `None` for the empty expression
    pub fn tree(&self) -> Option<&MaskExpr> {
        match &self.kind {
            CompiledKind::AnyMask => None,
            CompiledKind::Tree(tree) => Some(tree),
        }
    }

    /// Whether this is the "OR of all masks" sentinel
    pub fn is_any_mask(&self) -> bool {
        matches!(self.kind, CompiledKind::AnyMask)
    }

    /// Names referenced by the expression, sorted
    pub fn referenced_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Whether `name` appears in the expression
    pub fn references(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_collected_once() {
        let expr = MaskExpr::or(
            MaskExpr::and(MaskExpr::name("A"), MaskExpr::name("B")),
            MaskExpr::not(MaskExpr::name("A")),
        );
        let names: Vec<_> = expr.names().into_iter().collect();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_evaluate_with_leaf_lookup() {
        let expr = MaskExpr::xor(MaskExpr::name("A"), MaskExpr::not(MaskExpr::name("B")));
        let leaf = |name: &str| name == "A";
        // A=true, B=false: true ^ true
        assert!(!expr.evaluate_with(&leaf));
    }

    #[test]
    fn test_display() {
        let expr = MaskExpr::and(MaskExpr::name("A"), MaskExpr::not(MaskExpr::name("B")));
        assert_eq!(expr.to_string(), "(A & !B)");
    }
}
