//! Identifier validation for SQL interpolation.
//!
//! Table and column names end up interpolated directly into trigger DDL
//! (SQLite cannot bind identifiers as parameters), so every identifier is
//! checked once, at descriptor construction, against a character allow
//! list and a reserved-word deny list. Values, by contrast, always travel
//! as bound parameters and are never validated here.
//!
//! # Examples
//!
//! ```
//! use table_audit_core::{ValidationError, validate_identifier};
//!
//! assert!(validate_identifier("single_pk").is_ok());
//! assert!(validate_identifier("_hidden2").is_ok());
//!
//! assert_eq!(
//!     validate_identifier(""),
//!     Err(ValidationError::EmptyIdentifier)
//! );
//! assert!(matches!(
//!     validate_identifier("x; DROP TABLE log"),
//!     Err(ValidationError::InvalidIdentifier(_))
//! ));
//! assert!(matches!(
//!     validate_identifier("select"),
//!     Err(ValidationError::ReservedWord(_))
//! ));
//! ```

use thiserror::Error;

/// Descriptor validation errors.
///
/// Each variant describes a specific structural problem found while
/// constructing a [`TableDescriptor`](crate::TableDescriptor). All are
/// fatal at construction time and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An identifier is empty.
    #[error("identifier cannot be empty")]
    EmptyIdentifier,
    /// An identifier contains characters outside the allow list, or does
    /// not start with a letter or underscore.
    #[error("invalid identifier '{0}': must start with a letter or underscore and contain only letters, digits, and underscores")]
    InvalidIdentifier(String),
    /// An identifier is an SQL reserved word.
    #[error("identifier '{0}' is a reserved SQL keyword")]
    ReservedWord(String),
    /// The same column appears twice in one descriptor list.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// A column appears in both the primary-key and other-column lists.
    #[error("column '{0}' appears in both primary_key_columns and other_columns")]
    OverlappingColumns(String),
    /// Both column lists are empty.
    #[error("table '{0}' has no columns")]
    NoColumns(String),
}

/// SQL keywords rejected as identifiers.
///
/// Deliberately conservative: covers the keywords that appear in the DDL
/// and DML this crate generates, where a bare-word identifier would make
/// the statement ambiguous or silently change its meaning.
const RESERVED_WORDS: &[&str] = &[
    "add", "all", "alter", "and", "as", "begin", "between", "by", "case", "check", "column",
    "commit", "constraint", "create", "default", "delete", "distinct", "drop", "each", "else",
    "end", "exists", "for", "foreign", "from", "group", "having", "in", "index", "insert", "into",
    "is", "join", "key", "like", "limit", "not", "null", "on", "or", "order", "primary",
    "references", "replace", "row", "select", "set", "table", "then", "transaction", "trigger",
    "union", "unique", "update", "values", "when", "where",
];

/// Validates a single table or column identifier.
///
/// Identifiers must be non-empty, start with an ASCII letter or
/// underscore, contain only ASCII letters, digits, and underscores, and
/// must not be SQL reserved words (case-insensitive).
///
/// # Errors
///
/// Returns the matching [`ValidationError`] variant on the first failed
/// check.
pub fn validate_identifier(identifier: &str) -> Result<(), ValidationError> {
    let mut chars = identifier.chars();
    match chars.next() {
        None => return Err(ValidationError::EmptyIdentifier),
        Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
            return Err(ValidationError::InvalidIdentifier(identifier.to_string()));
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidIdentifier(identifier.to_string()));
    }

    if RESERVED_WORDS
        .iter()
        .any(|word| identifier.eq_ignore_ascii_case(word))
    {
        return Err(ValidationError::ReservedWord(identifier.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("single_pk").is_ok());
        assert!(validate_identifier("id1").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("A_B_C").is_ok());
    }

    #[test]
    fn test_empty_identifier() {
        assert_eq!(validate_identifier(""), Err(ValidationError::EmptyIdentifier));
    }

    #[test]
    fn test_injection_shaped_identifiers() {
        for bad in [
            "x; DROP TABLE log",
            "x'--",
            "hello world",
            "tab-le",
            "quoted\"name",
            "semi;colon",
        ] {
            assert_eq!(
                validate_identifier(bad),
                Err(ValidationError::InvalidIdentifier(bad.to_string())),
                "expected rejection of {bad:?}"
            );
        }
    }

    #[test]
    fn test_leading_digit_rejected() {
        assert_eq!(
            validate_identifier("1st"),
            Err(ValidationError::InvalidIdentifier("1st".to_string()))
        );
    }

    #[test]
    fn test_reserved_words_rejected_case_insensitively() {
        assert_eq!(
            validate_identifier("select"),
            Err(ValidationError::ReservedWord("select".to_string()))
        );
        assert_eq!(
            validate_identifier("TABLE"),
            Err(ValidationError::ReservedWord("TABLE".to_string()))
        );
        assert_eq!(
            validate_identifier("Trigger"),
            Err(ValidationError::ReservedWord("Trigger".to_string()))
        );
    }

    #[test]
    fn test_non_ascii_rejected() {
        assert!(matches!(
            validate_identifier("tablé"),
            Err(ValidationError::InvalidIdentifier(_))
        ));
    }
}
