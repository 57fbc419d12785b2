//! selkit-expr - Truth-table expressions over named selection masks
//!
//! This crate parses and evaluates the small boolean language used to combine
//! per-entity selection masks into a single mask.
//!
//! # Expression Syntax
//!
//! - **Names**: `node0`, `A`, `cells.hot` refer to masks by name
//! - **Operators**: `!` (not), `&` (and), `^` (xor), `|` (or), tightest first
//! - **Grouping**: `A & (B | C)`
//! - **Empty expression**: OR of every supplied mask
//!
//! # Examples
//!
//! ```
//! use selkit_expr::{compile, evaluate, MaskSet};
//!
//! let a = [true, false, true];
//! let b = [false, false, true];
//! let masks = MaskSet::new().with("A", &a).with("B", &b);
//!
//! let compiled = compile("A & !B").unwrap();
//! assert_eq!(evaluate(&compiled, &masks).unwrap(), vec![true, false, false]);
//! ```

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::*;
pub use eval::*;
pub use parser::*;
