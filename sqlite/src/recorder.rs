//! Execution recording: run one statement, diff the audit log around it.
//!
//! The [`Recorder`] captures the maximum log `id` before a statement,
//! executes the statement exactly once, and returns the records the
//! statement's triggers appended — in `id` order, which is firing order,
//! since triggers execute synchronously as part of the originating
//! statement.
//!
//! The id-range diff is a single-writer convenience: it is correct only
//! while no other connection appends to the log between the baseline
//! read and the statement's completion. [`Recorder::run_in_transaction`]
//! is the opt-in substitution for concurrent contexts — it takes a write
//! lock for the duration of the diff instead of relying on that
//! assumption.
//!
//! The Recorder never retries. A failed statement propagates the engine
//! error unmodified and yields no diff; masking the failure would hide
//! the very effects audit logging exists to surface.

use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior, params_from_iter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::schema::LOG_TABLE;

/// The mutation kind recorded in an audit record's `details.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

/// Parsed view of an audit record's `details` JSON.
///
/// `new` holds the post-image and is present for inserts and updates;
/// `old` holds the pre-image and is present for updates and deletes.
/// Within each image, keys appear as primary-key columns then other
/// columns, in descriptor order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDetails {
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<serde_json::Map<String, serde_json::Value>>,
}

/// One row of the audit log.
///
/// `details` is kept as the JSON text exactly as the engine's
/// `json_object()` wrote it, preserving the column-order contract;
/// [`details`](Self::details) parses it on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Monotonically increasing log identity.
    pub id: i64,
    /// Human label of the firing trigger, e.g. `"before insert"`.
    pub trigger_name: String,
    /// The audited table.
    pub table_name: String,
    /// JSON document, see [`AuditDetails`].
    pub details: String,
}

impl AuditRecord {
    /// Parses the `details` JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Decode`](crate::AuditError::Decode) if the
    /// text does not match the expected shape — which would mean the log
    /// was written by something other than a generated trigger.
    pub fn details(&self) -> Result<AuditDetails> {
        Ok(serde_json::from_str(&self.details)?)
    }
}

/// Everything observed about one recorded statement execution.
///
/// Ephemeral and never persisted. `records` holds the audit records
/// whose `id` exceeds the pre-statement maximum, ascending.
#[derive(Debug, Clone)]
pub struct ExecutionDiff {
    /// The executed SQL text.
    pub statement: String,
    /// The bound parameter values (values only — identifiers are never
    /// bound).
    pub parameters: Vec<Value>,
    /// Newly appended audit records, in firing order.
    pub records: Vec<AuditRecord>,
    /// The engine's change count for the statement.
    pub rows_changed: usize,
}

impl ExecutionDiff {
    /// The trigger labels of the new records, in firing order.
    pub fn trigger_sequence(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|record| record.trigger_name.as_str())
            .collect()
    }
}

/// Wraps a connection to execute statements with audit-log diffing.
pub struct Recorder<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Recorder<'conn> {
    /// Creates a recorder over the given connection.
    ///
    /// The connection is expected to already have the log table (see
    /// [`create_log_table`](crate::create_log_table)).
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Executes one statement and returns the log diff around it.
    ///
    /// Single-writer convenience API: correct only while nothing else
    /// appends to the log between the baseline read and the statement's
    /// completion. Use [`run_in_transaction`](Self::run_in_transaction)
    /// when other connections may write concurrently.
    ///
    /// # Errors
    ///
    /// Any engine error is propagated unmodified and no diff is
    /// returned; a partial result must not be interpreted as valid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rusqlite::Connection;
    /// use rusqlite::types::Value;
    /// use table_audit_sqlite::Recorder;
    ///
    /// let conn = Connection::open_in_memory().unwrap();
    /// let recorder = Recorder::new(&conn);
    /// let diff = recorder
    ///     .run(
    ///         "INSERT INTO single_pk (id, value) VALUES (?1, ?2)",
    ///         &[Value::Integer(1), Value::Text("a".into())],
    ///     )
    ///     .unwrap();
    /// assert_eq!(diff.trigger_sequence(), vec!["before insert", "after insert"]);
    /// ```
    pub fn run(&self, sql: &str, params: &[Value]) -> Result<ExecutionDiff> {
        execute_and_diff(self.conn, sql, params)
    }

    /// Executes one statement and computes the diff inside a single
    /// IMMEDIATE transaction.
    ///
    /// The write lock held for the transaction's duration guarantees no
    /// other connection can append to the log between the baseline read
    /// and the after read — the strategy substitution for concurrent
    /// contexts. On error the transaction rolls back and the engine
    /// error propagates unmodified.
    pub fn run_in_transaction(&self, sql: &str, params: &[Value]) -> Result<ExecutionDiff> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let diff = execute_and_diff(&tx, sql, params)?;
        tx.commit()?;
        Ok(diff)
    }
}

fn execute_and_diff(conn: &Connection, sql: &str, params: &[Value]) -> Result<ExecutionDiff> {
    let baseline = max_log_id(conn)?;
    let rows_changed = conn.execute(sql, params_from_iter(params.iter()))?;
    let records = records_after(conn, baseline)?;
    debug!(
        baseline,
        new_records = records.len(),
        rows_changed,
        "recorded statement execution"
    );
    Ok(ExecutionDiff {
        statement: sql.to_string(),
        parameters: params.to_vec(),
        records,
        rows_changed,
    })
}

/// The current maximum log id, or 0 for an empty log.
fn max_log_id(conn: &Connection) -> Result<i64> {
    let max: Option<i64> =
        conn.query_row(&format!("SELECT MAX(id) FROM {LOG_TABLE}"), [], |row| {
            row.get(0)
        })?;
    Ok(max.unwrap_or(0))
}

/// All audit records with `id > baseline`, ascending.
fn records_after(conn: &Connection, baseline: i64) -> Result<Vec<AuditRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, trigger_name, table_name, details FROM {LOG_TABLE} WHERE id > ?1 ORDER BY id"
    ))?;
    let records = stmt
        .query_map([baseline], |row| {
            Ok(AuditRecord {
                id: row.get(0)?,
                trigger_name: row.get(1)?,
                table_name: row.get(2)?,
                details: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_parse_insert_shape() {
        let record = AuditRecord {
            id: 1,
            trigger_name: "before insert".to_string(),
            table_name: "single_pk".to_string(),
            details: r#"{"action":"insert","new":{"id":1,"value":"a"}}"#.to_string(),
        };
        let details = record.details().unwrap();
        assert_eq!(details.action, AuditAction::Insert);
        let new = details.new.unwrap();
        assert_eq!(
            new.keys().collect::<Vec<_>>(),
            vec!["id", "value"],
            "key order is the pk-then-other contract"
        );
        assert!(details.old.is_none());
    }

    #[test]
    fn test_details_parse_rejects_foreign_shape() {
        let record = AuditRecord {
            id: 1,
            trigger_name: "before insert".to_string(),
            table_name: "single_pk".to_string(),
            details: r#"{"verb":"insert"}"#.to_string(),
        };
        assert!(record.details().is_err());
    }
}
