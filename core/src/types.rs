//! Table descriptor types for audit-trigger generation.
//!
//! A [`TableDescriptor`] is a static description of a table's key shape:
//! which columns form the primary key (possibly none, for rowid-only
//! tables) and which are ordinary data columns. Descriptors are validated
//! at construction and immutable afterwards, so every identifier that
//! later gets interpolated into trigger DDL has already passed the
//! allow-list check in [`validate`](crate::validate).

use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, validate_identifier};

/// Primary-key shape of a table.
///
/// Determines which columns populate the `new`/`old` objects in audit
/// JSON, and which conflict-resolution scenarios are applicable (a
/// rowid-only table has no uniqueness constraint to violate).
///
/// # Examples
///
/// ```
/// use table_audit_core::{KeyShape, TableDescriptor};
///
/// let table = TableDescriptor::new("compound_pk", ["id1", "id2"], ["value"]).unwrap();
/// assert_eq!(table.key_shape(), KeyShape::Composite);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyShape {
    /// No declared primary key; rows are identified only by rowid.
    RowidOnly,
    /// A single declared primary-key column.
    Single,
    /// Two or more primary-key columns.
    Composite,
}

/// Static description of a table to instrument with audit triggers.
///
/// Holds the table name, the ordered primary-key columns (empty for a
/// rowid-only table), and the ordered remaining columns. The audit JSON
/// written by generated triggers lists columns as
/// `primary_key_columns ++ other_columns` in descriptor order — that
/// ordering is a contract for deterministic, diffable output.
///
/// Descriptors are immutable value objects; construct one, then hand it
/// to the trigger generator.
///
/// # Examples
///
/// ```
/// use table_audit_core::TableDescriptor;
///
/// let table = TableDescriptor::new("single_pk", ["id"], ["value"]).unwrap();
/// assert_eq!(table.name(), "single_pk");
/// assert_eq!(table.columns().collect::<Vec<_>>(), vec!["id", "value"]);
///
/// // Identifiers are allow-listed; injection-shaped names are rejected.
/// assert!(TableDescriptor::new("t; DROP TABLE log", ["id"], ["value"]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTableDescriptor")]
pub struct TableDescriptor {
    table: String,
    primary_key_columns: Vec<String>,
    other_columns: Vec<String>,
}

/// Unvalidated mirror of [`TableDescriptor`] used during deserialization,
/// so descriptors from configuration or other untrusted input still pass
/// through identifier validation.
#[derive(Deserialize)]
struct RawTableDescriptor {
    table: String,
    #[serde(default)]
    primary_key_columns: Vec<String>,
    #[serde(default)]
    other_columns: Vec<String>,
}

impl TryFrom<RawTableDescriptor> for TableDescriptor {
    type Error = ValidationError;

    fn try_from(raw: RawTableDescriptor) -> Result<Self, Self::Error> {
        Self::new(raw.table, raw.primary_key_columns, raw.other_columns)
    }
}

impl TableDescriptor {
    /// Creates a validated descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if any identifier is empty, contains
    /// characters outside the allow list, or is an SQL reserved word; if
    /// a column appears twice (within either list or across the two
    /// lists); or if both column lists are empty.
    pub fn new<P, O>(
        table: impl Into<String>,
        primary_key_columns: P,
        other_columns: O,
    ) -> Result<Self, ValidationError>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let table = table.into();
        let primary_key_columns: Vec<String> =
            primary_key_columns.into_iter().map(Into::into).collect();
        let other_columns: Vec<String> = other_columns.into_iter().map(Into::into).collect();

        validate_identifier(&table)?;
        for column in primary_key_columns.iter().chain(&other_columns) {
            validate_identifier(column)?;
        }

        if primary_key_columns.is_empty() && other_columns.is_empty() {
            return Err(ValidationError::NoColumns(table));
        }

        let mut seen: Vec<&str> = Vec::new();
        for column in primary_key_columns.iter() {
            if seen.contains(&column.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.clone()));
            }
            seen.push(column.as_str());
        }
        for column in other_columns.iter() {
            if primary_key_columns.iter().any(|pk| pk == column) {
                return Err(ValidationError::OverlappingColumns(column.clone()));
            }
            if seen.contains(&column.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.clone()));
            }
            seen.push(column.as_str());
        }

        Ok(Self {
            table,
            primary_key_columns,
            other_columns,
        })
    }

    /// Creates a descriptor for a table with no declared primary key.
    ///
    /// Rows in such a table are identified only by their rowid; distinct
    /// rows with identical column values produce identical audit JSON.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn rowid_only<O>(table: impl Into<String>, other_columns: O) -> Result<Self, ValidationError>
    where
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self::new(table, Vec::<String>::new(), other_columns)
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.table
    }

    /// The declared primary-key columns, in declaration order.
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key_columns
    }

    /// The non-key columns, in declaration order.
    pub fn other_columns(&self) -> &[String] {
        &self.other_columns
    }

    /// Classifies the table's primary-key shape.
    pub fn key_shape(&self) -> KeyShape {
        match self.primary_key_columns.len() {
            0 => KeyShape::RowidOnly,
            1 => KeyShape::Single,
            _ => KeyShape::Composite,
        }
    }

    /// All columns in audit order: primary-key columns, then the rest.
    ///
    /// This is the column order used for the `new`/`old` objects in
    /// audit JSON.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.primary_key_columns
            .iter()
            .chain(&self.other_columns)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_all_three_shapes() {
        let no_pk = TableDescriptor::rowid_only("no_pk", ["value"]).unwrap();
        assert_eq!(no_pk.key_shape(), KeyShape::RowidOnly);

        let single = TableDescriptor::new("single_pk", ["id"], ["value"]).unwrap();
        assert_eq!(single.key_shape(), KeyShape::Single);

        let compound = TableDescriptor::new("compound_pk", ["id1", "id2"], ["value"]).unwrap();
        assert_eq!(compound.key_shape(), KeyShape::Composite);
    }

    #[test]
    fn test_columns_orders_keys_first() {
        let table = TableDescriptor::new("t1", ["id1", "id2"], ["b", "a"]).unwrap();
        assert_eq!(
            table.columns().collect::<Vec<_>>(),
            vec!["id1", "id2", "b", "a"]
        );
    }

    #[test]
    fn test_new_rejects_overlapping_columns() {
        let err = TableDescriptor::new("t1", ["id"], ["id", "value"]).unwrap_err();
        assert_eq!(err, ValidationError::OverlappingColumns("id".to_string()));
    }

    #[test]
    fn test_new_rejects_duplicates_within_a_list() {
        let err = TableDescriptor::new("t1", ["id", "id"], ["value"]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateColumn("id".to_string()));

        let err = TableDescriptor::rowid_only("t1", ["value", "value"]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateColumn("value".to_string()));
    }

    #[test]
    fn test_new_rejects_empty_column_set() {
        let err =
            TableDescriptor::new("t1", Vec::<String>::new(), Vec::<String>::new()).unwrap_err();
        assert_eq!(err, ValidationError::NoColumns("t1".to_string()));
    }

    #[test]
    fn test_descriptor_round_trips_through_json() {
        let table = TableDescriptor::new("single_pk", ["id"], ["value"]).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: TableDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_deserialization_revalidates_identifiers() {
        let json = r#"{"table": "t; DROP TABLE log", "other_columns": ["value"]}"#;
        assert!(serde_json::from_str::<TableDescriptor>(json).is_err());
    }
}
