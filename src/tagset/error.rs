//! Tagset error types

use thiserror::Error;

/// Errors raised by the tagset algebra and its text format
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TagsetError {
    /// Tagset text could not be parsed
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A tag declared numeric for ordering holds a non-numeric value
    #[error("Tag '{name}' is compared as a number but has value '{value}'")]
    NumberFormat { name: String, value: String },
}

/// Result type alias for tagset operations
pub type TagsetResult<T> = Result<T, TagsetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TagsetError::NumberFormat {
            name: "run".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Tag 'run' is compared as a number but has value 'abc'"
        );

        let err = TagsetError::Parse {
            offset: 3,
            message: "unexpected ','".to_string(),
        };
        assert_eq!(err.to_string(), "Parse error at offset 3: unexpected ','");
    }
}
