//! The audit log sink: a single fixed-schema table.
//!
//! Every generated trigger, on every audited table, appends into the one
//! shared `log` table. The table is append-only by contract: nothing in
//! this crate mutates or deletes its rows, and callers that do are out of
//! contract. Rows are destroyed only by whole-database teardown.
//!
//! The log table itself must never be instrumented with audit triggers
//! (every append would recurse); [`install_triggers`](crate::install_triggers)
//! refuses descriptors that name it.

use rusqlite::Connection;

use crate::error::Result;

/// Name of the audit log table.
pub const LOG_TABLE: &str = "log";

/// Generates the DDL for the audit log table.
///
/// The schema is fixed: an integer identity `id` (SQLite assigns it
/// monotonically within a session), the firing trigger's human label, the
/// audited table's name, and the JSON `details` document. `id` order is
/// trigger firing order for a single statement, since triggers execute
/// synchronously as part of the originating statement.
pub fn generate_log_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {LOG_TABLE} (\n    \
            id INTEGER PRIMARY KEY,\n    \
            trigger_name TEXT,\n    \
            table_name TEXT,\n    \
            details TEXT\n\
        );"
    )
}

/// Creates the audit log table if it does not exist.
///
/// Must run before any trigger installation; the generated trigger
/// bodies reference the table by name.
pub fn create_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&generate_log_sql())?;
    Ok(())
}

/// Checks whether the audit log table exists.
pub fn log_table_exists(conn: &Connection) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
    let count: i64 = stmt.query_row([LOG_TABLE], |row| row.get(0))?;
    Ok(count > 0)
}

/// Applies the session pragmas the audit subsystem relies on.
///
/// `recursive_triggers` must be ON for the delete triggers fired by
/// `INSERT OR REPLACE` conflict resolution to be observable at all; with
/// the engine default (OFF) the replace-delete happens silently. This is
/// pinned engine behavior, exercised by the integration tests.
pub fn prepare_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;\n\
         PRAGMA recursive_triggers = ON;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_log_sql_shape() {
        let sql = generate_log_sql();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS log"));
        assert!(sql.contains("id INTEGER PRIMARY KEY"));
        assert!(sql.contains("trigger_name TEXT"));
        assert!(sql.contains("table_name TEXT"));
        assert!(sql.contains("details TEXT"));
    }

    #[test]
    fn test_create_log_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!log_table_exists(&conn).unwrap());

        create_log_table(&conn).unwrap();
        assert!(log_table_exists(&conn).unwrap());

        create_log_table(&conn).unwrap(); // IF NOT EXISTS, should not fail
        assert!(log_table_exists(&conn).unwrap());
    }

    #[test]
    fn test_prepare_connection_enables_recursive_triggers() {
        let conn = Connection::open_in_memory().unwrap();
        prepare_connection(&conn).unwrap();
        let on: i64 = conn
            .query_row("PRAGMA recursive_triggers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }
}
