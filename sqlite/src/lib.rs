//! Schema-driven audit triggers for SQLite.
//!
//! This crate turns a table description into six database triggers that
//! record every row mutation as structured JSON, and provides the
//! machinery to observe and verify what those triggers actually do —
//! including under conflict-resolution clauses (`INSERT OR IGNORE`,
//! `INSERT OR REPLACE`, `ON CONFLICT DO UPDATE`) that suppress or
//! reorder the obvious firing sequence.
//!
//! # Architecture
//!
//! - **`schema`** — the fixed-schema, append-only audit log table
//! - **`triggers`** — descriptor → six trigger definitions, and their
//!   installation
//! - **`recorder`** — run one statement, diff the log around it
//! - **`exerciser`** — the scripted scenario matrix that pins the
//!   engine's conflict-resolution trigger behavior
//!
//! # Quick start
//!
//! ```no_run
//! use rusqlite::Connection;
//! use rusqlite::types::Value;
//! use table_audit_core::TableDescriptor;
//! use table_audit_sqlite::{Recorder, create_log_table, install_triggers, prepare_connection};
//!
//! let conn = Connection::open("audited.db").unwrap();
//! prepare_connection(&conn).unwrap();
//! create_log_table(&conn).unwrap();
//!
//! let table = TableDescriptor::new("single_pk", ["id"], ["value"]).unwrap();
//! install_triggers(&conn, &table).unwrap();
//!
//! let recorder = Recorder::new(&conn);
//! let diff = recorder
//!     .run(
//!         "INSERT INTO single_pk (id, value) VALUES (?1, ?2)",
//!         &[Value::Integer(1), Value::Text("a".into())],
//!     )
//!     .unwrap();
//! assert_eq!(diff.trigger_sequence(), vec!["before insert", "after insert"]);
//! ```
//!
//! # Concurrency model
//!
//! Single connection, synchronous, blocking. [`Recorder::run`] diffs the
//! log by id range and is correct only single-writer;
//! [`Recorder::run_in_transaction`] holds a write lock across the diff
//! for concurrent contexts. See the module docs for details.

mod error;
mod exerciser;
mod recorder;
mod schema;
mod triggers;

pub use error::{AuditError, Result};
pub use exerciser::{
    Exerciser, Scenario, ScenarioOutcome, SequenceMismatch, demo_descriptors, scenario_matrix,
};
pub use recorder::{AuditAction, AuditDetails, AuditRecord, ExecutionDiff, Recorder};
pub use schema::{
    LOG_TABLE, create_log_table, generate_log_sql, log_table_exists, prepare_connection,
};
pub use triggers::{
    TriggerDefinition, TriggerOperation, TriggerTiming, generate_triggers, install_triggers,
};
