//! selkit-core - Selection nodes, set algebra and conversion
//!
//! This crate models data selections: typed criteria over the entities of a
//! dataset, combined by a boolean expression.
//!
//! # Key Components
//!
//! - **SelectionNode**: One criterion with content type, field type, list and properties
//! - **Selection**: Named nodes plus the expression combining their masks
//! - **Converter**: Re-expresses nodes in another content type against a [`DataSource`]
//! - **Config**: Evaluation and conversion defaults from TOML or JSON
//!
//! # Set Algebra
//!
//! - `union_selection_list` merges two nodes of the same content type
//! - `subtract_selection_list` removes ids, for GlobalIds, Indices and PedigreeIds
//! - Failed operations leave their operands unchanged
//!
//! # Examples
//!
//! ```
//! use selkit_core::{ContentType, FieldType, Selection, SelectionNode, MaskSet};
//!
//! let mut selection = Selection::new();
//! selection.set_node("hot", SelectionNode::with_ids(ContentType::Indices, FieldType::Cell, vec![0, 2]));
//! selection.set_node("wet", SelectionNode::with_ids(ContentType::Indices, FieldType::Cell, vec![2]));
//! selection.set_expression("hot & wet");
//!
//! let hot = [true, false, true];
//! let wet = [false, false, true];
//! let masks = MaskSet::new().with("hot", &hot).with("wet", &wet);
//! assert_eq!(selection.evaluate(&masks).unwrap(), vec![false, false, true]);
//! ```

pub mod config;
pub mod content;
pub mod convert;
pub mod error;
pub mod list;
pub mod node;
pub mod property;
pub mod selection;
pub mod source;

pub use config::{ConvertConfig, EvalConfig, SelkitConfig};
pub use content::*;
pub use convert::{
    convert_node, convert_selection, resolve_indices, selected_indices, selection_mask,
    selection_mask_with, ConvertOptions,
};
pub use error::{SelectionError, SelectionResult};
pub use list::*;
pub use node::SelectionNode;
pub use property::*;
pub use selection::{NamedNode, Selection};
pub use source::{DataSource, TableSource};

pub use selkit_expr::{
    compile, CompiledExpression, EvalOptions, MaskSet, MaskValue, ParseError,
};
