//! Error types for selkit-core
//!
//! Provides error handling for:
//! - Set algebra between selection nodes
//! - Expression evaluation over node masks
//! - Content-type conversion
//! - Configuration loading

use crate::content::{ContentType, FieldType};
use selkit_expr::{EvalError, ParseError};
use thiserror::Error;

/// Main error type for selection operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    /// Operation invoked across content types, or on an unsupported one
    #[error("Cannot {operation} {left} selection with {right} selection")]
    IncompatibleContentType {
        operation: &'static str,
        left: ContentType,
        right: ContentType,
    },

    /// Array count, element type or component count disagree
    #[error("Selection lists do not match: {0}")]
    StructuralMismatch(String),

    /// Expression names a node the selection does not have
    #[error("Expression references unknown node: {0}")]
    UnknownNodeReference(String),

    /// Expression failed to parse
    #[error("Malformed expression: {0}")]
    MalformedExpression(#[from] ParseError),

    /// Node masks differ in length
    #[error("Mask for node '{name}' has length {actual}, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Conversion needs a dataset array that does not exist
    #[error("Missing {field} array '{array}' required for conversion")]
    MissingConversionArray { field: FieldType, array: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<EvalError> for SelectionError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::UnknownNodeReference(name) => SelectionError::UnknownNodeReference(name),
            EvalError::LengthMismatch {
                name,
                expected,
                actual,
            } => SelectionError::LengthMismatch {
                name,
                expected,
                actual,
            },
        }
    }
}

impl SelectionError {
    pub(crate) fn incompatible(
        operation: &'static str,
        left: ContentType,
        right: ContentType,
    ) -> Self {
        SelectionError::IncompatibleContentType {
            operation,
            left,
            right,
        }
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        SelectionError::StructuralMismatch(message.into())
    }

    /// Whether a caller may recover by accepting an empty result
    pub fn is_missing_array(&self) -> bool {
        matches!(self, SelectionError::MissingConversionArray { .. })
    }
}

/// Result type alias for selection operations
pub type SelectionResult<T> = Result<T, SelectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_display() {
        let err = SelectionError::incompatible("union", ContentType::GlobalIds, ContentType::Values);
        assert_eq!(
            err.to_string(),
            "Cannot union GLOBALIDS selection with VALUES selection"
        );
    }

    #[test]
    fn test_eval_error_conversion() {
        let err: SelectionError = EvalError::UnknownNodeReference("node7".to_string()).into();
        assert_eq!(err, SelectionError::UnknownNodeReference("node7".to_string()));

        let err: SelectionError = EvalError::LengthMismatch {
            name: "b".to_string(),
            expected: 3,
            actual: 2,
        }
        .into();
        assert!(err.to_string().contains("length 2"));
    }

    #[test]
    fn test_missing_array_display() {
        let err = SelectionError::MissingConversionArray {
            field: FieldType::Point,
            array: "Temperature".to_string(),
        };
        assert!(err.is_missing_array());
        assert!(err.to_string().contains("POINT array 'Temperature'"));
    }
}
