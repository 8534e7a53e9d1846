//! Error types for audit-trigger operations.
//!
//! Provides a unified error type covering database access, descriptor
//! validation, and audit-record decoding failures. Engine errors are
//! always propagated unmodified — retrying or masking a failed write
//! would hide the very effects audit logging exists to surface.

use thiserror::Error;

/// Errors that can occur during audit-trigger operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// SQLite database operation failure, propagated unmodified. A
    /// duplicate trigger name on re-installation surfaces here.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed [`TableDescriptor`](table_audit_core::TableDescriptor).
    #[error("validation error: {0}")]
    Validation(#[from] table_audit_core::ValidationError),

    /// The `details` column of an audit record did not hold the expected
    /// JSON shape.
    #[error("audit record decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Attempted to install audit triggers on the audit log table itself,
    /// which would recurse on every write.
    #[error("cannot install audit triggers on the '{0}' table: it is the audit log sink")]
    LogTableReserved(String),
}

/// Convenience alias for results with [`AuditError`].
pub type Result<T> = std::result::Result<T, AuditError>;
