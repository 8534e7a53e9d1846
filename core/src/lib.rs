//! Core types for schema-driven audit triggers.
//!
//! This crate defines the foundational types for describing tables to an
//! audit-trigger generator:
//!
//! - [`TableDescriptor`] — a table's name, primary-key columns, and other
//!   columns, validated at construction.
//! - [`KeyShape`] — rowid-only, single, or composite primary key.
//!
//! Validation ([`validate_identifier`]) enforces the identifier allow
//! list that makes direct interpolation of table and column names into
//! trigger DDL safe. SQLite cannot bind identifiers as parameters, so
//! this check at construction time is the injection boundary: once a
//! descriptor exists, every name it carries is known-safe.
//!
//! # Example
//!
//! ```
//! use table_audit_core::{KeyShape, TableDescriptor};
//!
//! let table = TableDescriptor::new("single_pk", ["id"], ["value"]).unwrap();
//! assert_eq!(table.key_shape(), KeyShape::Single);
//! assert_eq!(table.columns().collect::<Vec<_>>(), vec!["id", "value"]);
//!
//! assert!(TableDescriptor::new("bad name", ["id"], ["value"]).is_err());
//! ```

mod types;
mod validate;

pub use types::{KeyShape, TableDescriptor};
pub use validate::{ValidationError, validate_identifier};
