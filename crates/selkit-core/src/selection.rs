//! Named collections of selection nodes
//!
//! A [`Selection`] owns its nodes under unique names and carries the
//! truth-table expression that combines their masks. An empty expression
//! means "OR of every node".

use crate::error::{SelectionError, SelectionResult};
use crate::node::SelectionNode;
use selkit_expr::{CompiledExpression, EvalOptions, MaskSet, MaskValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node stored under its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedNode {
    pub name: String,
    pub node: SelectionNode,
}

/// A named collection of selection nodes plus the expression combining them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    nodes: Vec<NamedNode>,
    expression: String,
    #[serde(skip)]
    compiled: Option<CompiledExpression>,
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.expression == other.expression
    }
}

impl Selection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Name of the node at `index`, in insertion order
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.nodes.get(index).map(|n| n.name.as_str())
    }

    /// Node at `index`, in insertion order
    pub fn node_at(&self, index: usize) -> Option<&SelectionNode> {
        self.nodes.get(index).map(|n| &n.node)
    }

    /// Node registered under `name`
    pub fn node(&self, name: &str) -> Option<&SelectionNode> {
        self.position(name).map(|i| &self.nodes[i].node)
    }

    /// Mutable node registered under `name`
    pub fn node_mut(&mut self, name: &str) -> Option<&mut SelectionNode> {
        let index = self.position(name)?;
        Some(&mut self.nodes[index].node)
    }

    /// Whether a node is registered under `name`
    pub fn contains_node(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate over `(name, node)` pairs in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &SelectionNode)> {
        self.nodes.iter().map(|n| (n.name.as_str(), &n.node))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// First `node<k>` name not in use
    fn unused_name(&self) -> String {
        (0..)
            .map(|k| format!("node{}", k))
            .find(|name| !self.contains_node(name))
            .unwrap_or_default()
    }

    /// Add a node under a generated name and return the name
    pub fn add_node(&mut self, node: SelectionNode) -> String {
        let name = self.unused_name();
        self.nodes.push(NamedNode {
            name: name.clone(),
            node,
        });
        name
    }

    /// Add or replace the node under `name`, returning any replaced node
    pub fn set_node(
        &mut self,
        name: impl Into<String>,
        node: SelectionNode,
    ) -> Option<SelectionNode> {
        let name = name.into();
        match self.position(&name) {
            Some(index) => Some(std::mem::replace(&mut self.nodes[index].node, node)),
            None => {
                self.nodes.push(NamedNode { name, node });
                None
            }
        }
    }

    /// Remove the node under `name`
    pub fn remove_node(&mut self, name: &str) -> Option<SelectionNode> {
        let index = self.position(name)?;
        Some(self.nodes.remove(index).node)
    }

    /// Remove the node at `index`
    pub fn remove_node_at(&mut self, index: usize) -> Option<NamedNode> {
        if index < self.nodes.len() {
            Some(self.nodes.remove(index))
        } else {
            None
        }
    }

    pub fn remove_all_nodes(&mut self) {
        self.nodes.clear();
    }

    /// Remove every node and reset the expression
    pub fn initialize(&mut self) {
        self.nodes.clear();
        self.set_expression("");
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Set the expression; a different string drops the cached compilation
    pub fn set_expression(&mut self, expression: impl Into<String>) {
        let expression = expression.into();
        if expression != self.expression {
            self.compiled = None;
        }
        self.expression = expression;
    }

    /// Compile the current expression, reusing the cached result when the
    /// string has not changed
    pub fn compile(&mut self) -> SelectionResult<&CompiledExpression> {
        let compiled = match self.compiled.take() {
            Some(cached) if cached.source() == self.expression => cached,
            _ => selkit_expr::compile(&self.expression)?,
        };
        Ok(&*self.compiled.insert(compiled))
    }

    /// Check that every name in `compiled` is a node of this selection
    pub fn validate_expression(&self, compiled: &CompiledExpression) -> SelectionResult<()> {
        match compiled.referenced_names().find(|name| !self.contains_node(name)) {
            Some(missing) => Err(SelectionError::UnknownNodeReference(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Combine one mask per node into a single mask
    pub fn evaluate<M: MaskValue>(&self, masks: &MaskSet<'_, M>) -> SelectionResult<Vec<bool>> {
        self.evaluate_with_options(masks, &EvalOptions::default())
    }

    /// [`Selection::evaluate`] with explicit evaluation options
    pub fn evaluate_with_options<M: MaskValue>(
        &self,
        masks: &MaskSet<'_, M>,
        options: &EvalOptions,
    ) -> SelectionResult<Vec<bool>> {
        match &self.compiled {
            Some(compiled) if compiled.source() == self.expression => {
                self.evaluate_compiled(compiled, masks, options)
            }
            _ => {
                let compiled = selkit_expr::compile(&self.expression)?;
                self.evaluate_compiled(&compiled, masks, options)
            }
        }
    }

    /// Evaluate an explicitly compiled expression against this selection's nodes.
    ///
    /// Names are checked against the nodes before any mask is read. Every
    /// node the expression uses must have a mask; masks under names that are
    /// not nodes are ignored.
    pub fn evaluate_compiled<M: MaskValue>(
        &self,
        compiled: &CompiledExpression,
        masks: &MaskSet<'_, M>,
        options: &EvalOptions,
    ) -> SelectionResult<Vec<bool>> {
        self.validate_expression(compiled)?;

        let mut node_masks = MaskSet::new();
        for named in &self.nodes {
            match masks.iter().find(|(name, _)| *name == named.name) {
                Some((name, mask)) => node_masks.insert(name, mask),
                None if compiled.is_any_mask() || compiled.references(&named.name) => {
                    return Err(SelectionError::mismatch(format!(
                        "no mask supplied for node '{}'",
                        named.name
                    )))
                }
                None => {}
            }
        }

        Ok(selkit_expr::evaluate_with_options(
            compiled,
            &node_masks,
            options,
        )?)
    }

    /// Find the first node with fully equal properties to `node`
    fn matching(&self, node: &SelectionNode) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.node.equal_properties(node, true))
    }

    /// Merge every node of `other` into this selection.
    ///
    /// A node is unioned into the first node with fully equal properties, or
    /// added under a fresh name when none matches. Nodes of `other` that
    /// match each other but nothing here are merged into one added node, the
    /// same as calling [`Selection::union_node`] for each in turn. Nothing
    /// changes if any union would fail.
    pub fn union(&mut self, other: &Selection) -> SelectionResult<()> {
        let mut merges = Vec::new();
        let mut added: Vec<SelectionNode> = Vec::new();

        for theirs in &other.nodes {
            let node = &theirs.node;
            if let Some(index) = self.matching(node) {
                self.nodes[index].node.check_union(node)?;
                merges.push((index, node));
            } else if let Some(pending) = added
                .iter_mut()
                .find(|pending| pending.equal_properties(node, true))
            {
                pending.union_selection_list(node)?;
            } else {
                added.push(node.clone());
            }
        }

        for (index, node) in merges {
            self.nodes[index].node.union_selection_list(node)?;
        }
        for node in added {
            self.add_node(node);
        }
        Ok(())
    }

    /// Merge a single node into this selection
    pub fn union_node(&mut self, node: &SelectionNode) -> SelectionResult<()> {
        match self.matching(node) {
            Some(index) => self.nodes[index].node.union_selection_list(node),
            None => {
                self.add_node(node.clone());
                Ok(())
            }
        }
    }

    /// Subtract every node of `other` from the nodes with fully equal
    /// properties. Unmatched nodes are ignored. Nothing changes if any
    /// subtraction would fail.
    pub fn subtract(&mut self, other: &Selection) -> SelectionResult<()> {
        let mut plan = Vec::new();
        for theirs in &other.nodes {
            for (index, ours) in self.nodes.iter().enumerate() {
                if ours.node.equal_properties(&theirs.node, true) {
                    ours.node.check_subtract(&theirs.node)?;
                    plan.push((index, &theirs.node));
                }
            }
        }

        for (index, node) in plan {
            self.nodes[index].node.subtract_selection_list(node)?;
        }
        Ok(())
    }

    /// Subtract a single node from the nodes with fully equal properties
    pub fn subtract_node(&mut self, node: &SelectionNode) -> SelectionResult<()> {
        for ours in self.nodes.iter() {
            if ours.node.equal_properties(node, true) {
                ours.node.check_subtract(node)?;
            }
        }
        for ours in self.nodes.iter_mut() {
            if ours.node.equal_properties(node, true) {
                ours.node.subtract_selection_list(node)?;
            }
        }
        Ok(())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Expression: {:?}", self.expression)?;
        writeln!(f, "Number of nodes: {}", self.nodes.len())?;
        for named in &self.nodes {
            writeln!(f, "Node: {}", named.name)?;
            write!(f, "{}", named.node)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentType, FieldType};
    use crate::property::Property;

    fn indices(values: &[i64]) -> SelectionNode {
        SelectionNode::with_ids(ContentType::Indices, FieldType::Cell, values.to_vec())
    }

    #[test]
    fn test_add_node_generates_unused_names() {
        let mut selection = Selection::new();
        selection.set_node("node1", indices(&[1]));
        assert_eq!(selection.add_node(indices(&[0])), "node0");
        assert_eq!(selection.add_node(indices(&[2])), "node2");
        assert_eq!(selection.node_count(), 3);
        assert_eq!(selection.name_at(0), Some("node1"));
    }

    #[test]
    fn test_set_node_replaces() {
        let mut selection = Selection::new();
        assert!(selection.set_node("A", indices(&[1])).is_none());
        let old = selection.set_node("A", indices(&[2])).unwrap();
        assert_eq!(old.ids(), Some(&[1][..]));
        assert_eq!(selection.node_count(), 1);
        assert_eq!(selection.node("A").unwrap().ids(), Some(&[2][..]));
    }

    #[test]
    fn test_remove_nodes() {
        let mut selection = Selection::new();
        selection.add_node(indices(&[0]));
        selection.add_node(indices(&[1]));
        assert!(selection.remove_node("node0").is_some());
        assert!(selection.remove_node("node0").is_none());
        assert_eq!(selection.remove_node_at(0).unwrap().name, "node1");
        assert!(selection.remove_node_at(0).is_none());
    }

    #[test]
    fn test_initialize_clears_expression() {
        let mut selection = Selection::new();
        selection.add_node(indices(&[0]));
        selection.set_expression("node0");
        selection.initialize();
        assert_eq!(selection.node_count(), 0);
        assert_eq!(selection.expression(), "");
    }

    #[test]
    fn test_compile_is_cached_per_string() {
        let mut selection = Selection::new();
        selection.set_expression("A | B");
        assert_eq!(selection.compile().unwrap().source(), "A | B");
        selection.set_expression("A & B");
        assert_eq!(selection.compile().unwrap().source(), "A & B");
    }

    #[test]
    fn test_evaluate_ignores_extra_masks() {
        let mut selection = Selection::new();
        selection.set_node("A", indices(&[]));
        let a = [true, false];
        let stray = [true];
        let masks = MaskSet::new().with("A", &a).with("stray", &stray);
        assert_eq!(selection.evaluate(&masks).unwrap(), vec![true, false]);
    }

    #[test]
    fn test_empty_expression_needs_every_node_mask() {
        let mut selection = Selection::new();
        selection.set_node("A", indices(&[]));
        selection.set_node("B", indices(&[]));
        let a = [true];
        let masks = MaskSet::new().with("A", &a);
        assert!(matches!(
            selection.evaluate(&masks),
            Err(SelectionError::StructuralMismatch(_))
        ));
    }

    #[test]
    fn test_missing_mask_error_does_not_depend_on_expression() {
        let mut selection = Selection::new();
        selection.set_node("A", indices(&[]));
        selection.set_node("B", indices(&[]));
        let a = [true];
        let masks = MaskSet::new().with("A", &a);
        let expected = SelectionError::mismatch("no mask supplied for node 'B'");

        selection.set_expression("A & B");
        assert_eq!(selection.evaluate(&masks), Err(expected.clone()));
        selection.set_expression("");
        assert_eq!(selection.evaluate(&masks), Err(expected));

        selection.set_expression("A");
        assert_eq!(selection.evaluate(&masks).unwrap(), vec![true]);
    }

    #[test]
    fn test_union_merges_matching_and_adds_others() {
        let mut left = Selection::new();
        left.add_node(indices(&[1, 2]));

        let mut right = Selection::new();
        right.add_node(indices(&[2, 3]));
        right.add_node(indices(&[9]).with_property(Property::Inverse(true)));

        left.union(&right).unwrap();
        assert_eq!(left.node_count(), 2);
        assert_eq!(left.node("node0").unwrap().ids(), Some(&[1, 2, 3][..]));
        assert!(left.node("node1").unwrap().properties().inverse());
    }

    #[test]
    fn test_union_merges_unmatched_nodes_with_each_other() {
        let mut right = Selection::new();
        right.add_node(indices(&[1]));
        right.add_node(indices(&[2]));

        let mut batch = Selection::new();
        batch.union(&right).unwrap();
        assert_eq!(batch.node_count(), 1);
        assert_eq!(batch.node("node0").unwrap().ids(), Some(&[1, 2][..]));

        let mut one_by_one = Selection::new();
        for (_, node) in right.nodes() {
            one_by_one.union_node(node).unwrap();
        }
        assert_eq!(batch, one_by_one);
    }

    #[test]
    fn test_subtract_matching_nodes() {
        let mut left = Selection::new();
        left.add_node(indices(&[3, 1, 2]));
        left.add_node(
            SelectionNode::with_ids(ContentType::Indices, FieldType::Point, vec![1, 2]),
        );

        let mut right = Selection::new();
        right.add_node(indices(&[2]));

        left.subtract(&right).unwrap();
        assert_eq!(left.node("node0").unwrap().ids(), Some(&[1, 3][..]));
        assert_eq!(left.node("node1").unwrap().ids(), Some(&[1, 2][..]));
    }

    #[test]
    fn test_json_round_trip() {
        let mut selection = Selection::new();
        selection.add_node(indices(&[1, 2]).with_property(Property::ProcessId(4)));
        selection.set_expression("node0");

        let json = selection.to_json().unwrap();
        let restored = Selection::from_json(&json).unwrap();
        assert_eq!(restored, selection);
    }
}
