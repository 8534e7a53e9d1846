//! Audit-trigger generation and installation.
//!
//! For one validated [`TableDescriptor`] the generator emits exactly six
//! trigger definitions — BEFORE and AFTER for each of INSERT, UPDATE, and
//! DELETE — whose bodies append one JSON row each to the audit log.
//! Generation is pure text assembly over already-validated identifiers
//! and cannot fail; installation surfaces engine errors (notably the
//! name collision raised by installing twice) unmodified.
//!
//! # Naming and body contract
//!
//! Trigger names follow `{table}_{b|a}{i|u|d}` (e.g. `single_pk_bi` for
//! BEFORE INSERT). Each body has the shape:
//!
//! ```sql
//! CREATE TRIGGER single_pk_bi BEFORE INSERT ON single_pk
//! FOR EACH ROW
//! BEGIN
//!   INSERT INTO log (trigger_name, table_name, details)
//!   VALUES ('before insert', 'single_pk',
//!           json_object('action', 'insert', 'new', json_object('id', NEW.id, 'value', NEW.value)));
//! END;
//! ```
//!
//! Insert bodies capture the post-image (`NEW`), delete bodies the
//! pre-image (`OLD`), update bodies both. Columns appear as primary-key
//! columns then other columns, in descriptor order.

use rusqlite::Connection;
use table_audit_core::TableDescriptor;
use tracing::debug;

use crate::error::{AuditError, Result};
use crate::schema::LOG_TABLE;

/// Whether a trigger fires before or after the row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerTiming {
    /// Fires before the row mutation takes effect.
    Before,
    /// Fires after the row mutation has taken effect.
    After,
}

impl TriggerTiming {
    /// SQL keyword for the timing clause.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
        }
    }

    /// Single-letter component of the generated trigger name.
    pub fn suffix(self) -> char {
        match self {
            Self::Before => 'b',
            Self::After => 'a',
        }
    }

    /// Lower-case word used in the logged trigger label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// The row mutation a trigger observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOperation {
    Insert,
    Update,
    Delete,
}

impl TriggerOperation {
    /// SQL keyword for the operation clause.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Single-letter component of the generated trigger name.
    pub fn suffix(self) -> char {
        match self {
            Self::Insert => 'i',
            Self::Update => 'u',
            Self::Delete => 'd',
        }
    }

    /// The `action` value recorded in audit JSON.
    pub fn action(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One generated trigger: identity plus executable DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDefinition {
    /// The audited table.
    pub table: String,
    /// BEFORE or AFTER.
    pub timing: TriggerTiming,
    /// INSERT, UPDATE, or DELETE.
    pub operation: TriggerOperation,
    /// Deterministic name, `{table}_{b|a}{i|u|d}`.
    pub name: String,
    /// The `CREATE TRIGGER` statement.
    pub sql: String,
}

/// The six (timing, operation) pairs, in emission order.
const TRIGGER_PAIRS: [(TriggerTiming, TriggerOperation); 6] = [
    (TriggerTiming::Before, TriggerOperation::Insert),
    (TriggerTiming::After, TriggerOperation::Insert),
    (TriggerTiming::Before, TriggerOperation::Update),
    (TriggerTiming::After, TriggerOperation::Update),
    (TriggerTiming::Before, TriggerOperation::Delete),
    (TriggerTiming::After, TriggerOperation::Delete),
];

/// Builds a `json_object(...)` expression over the descriptor's columns,
/// bound to the given row alias (`NEW` or `OLD`).
fn json_object_expr(table: &TableDescriptor, alias: &str) -> String {
    let pairs: Vec<String> = table
        .columns()
        .map(|col| format!("'{col}', {alias}.{col}"))
        .collect();
    format!("json_object({})", pairs.join(", "))
}

/// The full `details` expression for one operation.
fn details_expr(operation: TriggerOperation, new_expr: &str, old_expr: &str) -> String {
    match operation {
        TriggerOperation::Insert => {
            format!("json_object('action', 'insert', 'new', {new_expr})")
        }
        TriggerOperation::Update => {
            format!("json_object('action', 'update', 'new', {new_expr}, 'old', {old_expr})")
        }
        TriggerOperation::Delete => {
            format!("json_object('action', 'delete', 'old', {old_expr})")
        }
    }
}

/// Generates the six audit triggers for a table.
///
/// Pure text assembly: the descriptor's identifiers were validated at
/// construction, so interpolating them here is safe, and generation
/// itself cannot fail. The definitions are emitted in the fixed order
/// bi, ai, bu, au, bd, ad.
///
/// When the descriptor has no primary-key columns (rowid-only shape) the
/// JSON objects simply omit key fields; distinct rows with identical
/// values then produce identical audit JSON, distinguishable only by log
/// entry order. This is a documented limitation of that shape.
///
/// # Examples
///
/// ```
/// use table_audit_core::TableDescriptor;
/// use table_audit_sqlite::generate_triggers;
///
/// let table = TableDescriptor::new("single_pk", ["id"], ["value"]).unwrap();
/// let triggers = generate_triggers(&table);
///
/// assert_eq!(triggers.len(), 6);
/// assert_eq!(triggers[0].name, "single_pk_bi");
/// assert!(triggers[0].sql.contains("BEFORE INSERT ON single_pk"));
/// ```
pub fn generate_triggers(table: &TableDescriptor) -> Vec<TriggerDefinition> {
    let new_expr = json_object_expr(table, "NEW");
    let old_expr = json_object_expr(table, "OLD");

    TRIGGER_PAIRS
        .iter()
        .map(|&(timing, operation)| {
            let name = format!(
                "{}_{}{}",
                table.name(),
                timing.suffix(),
                operation.suffix()
            );
            let label = format!("{} {}", timing.label(), operation.action());
            let details = details_expr(operation, &new_expr, &old_expr);
            let sql = format!(
                "CREATE TRIGGER {name} {timing} {operation} ON {table}\n\
                 FOR EACH ROW\n\
                 BEGIN\n  \
                   INSERT INTO {log} (trigger_name, table_name, details)\n  \
                   VALUES ('{label}', '{table}', {details});\n\
                 END;",
                timing = timing.keyword(),
                operation = operation.keyword(),
                table = table.name(),
                log = LOG_TABLE,
            );
            TriggerDefinition {
                table: table.name().to_string(),
                timing,
                operation,
                name,
                sql,
            }
        })
        .collect()
}

/// Installs the six audit triggers for a table.
///
/// One-shot per table: a second installation collides on the trigger
/// names and surfaces the engine's error unmodified — no partial or
/// silent re-installation. The audit log table itself is refused.
///
/// # Errors
///
/// Returns [`AuditError::LogTableReserved`] for the log table, or the
/// propagated engine error (e.g. `trigger ... already exists`, or a
/// missing audited table).
pub fn install_triggers(conn: &Connection, table: &TableDescriptor) -> Result<()> {
    if table.name().eq_ignore_ascii_case(LOG_TABLE) {
        return Err(AuditError::LogTableReserved(table.name().to_string()));
    }

    for definition in generate_triggers(table) {
        conn.execute_batch(&definition.sql)?;
        debug!(
            trigger = %definition.name,
            table = %definition.table,
            "installed audit trigger"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pk() -> TableDescriptor {
        TableDescriptor::new("single_pk", ["id"], ["value"]).unwrap()
    }

    #[test]
    fn test_generates_exactly_six_with_deterministic_names() {
        let triggers = generate_triggers(&single_pk());
        let names: Vec<&str> = triggers.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "single_pk_bi",
                "single_pk_ai",
                "single_pk_bu",
                "single_pk_au",
                "single_pk_bd",
                "single_pk_ad"
            ]
        );
    }

    #[test]
    fn test_covers_all_timing_operation_pairs_without_duplicates() {
        let triggers = generate_triggers(&single_pk());
        let mut pairs: Vec<(TriggerTiming, TriggerOperation)> =
            triggers.iter().map(|t| (t.timing, t.operation)).collect();
        pairs.sort_by_key(|&(t, o)| (t.suffix(), o.suffix()));
        pairs.dedup();
        assert_eq!(pairs.len(), 6);
    }

    #[test]
    fn test_insert_body_captures_post_image_only() {
        let triggers = generate_triggers(&single_pk());
        let bi = &triggers[0];
        assert!(bi.sql.contains("'new', json_object('id', NEW.id, 'value', NEW.value)"));
        assert!(!bi.sql.contains("OLD."));
    }

    #[test]
    fn test_update_body_captures_both_images() {
        let triggers = generate_triggers(&single_pk());
        let bu = &triggers[2];
        assert!(bu.sql.contains("'new', json_object('id', NEW.id, 'value', NEW.value)"));
        assert!(bu.sql.contains("'old', json_object('id', OLD.id, 'value', OLD.value)"));
    }

    #[test]
    fn test_delete_body_captures_pre_image_only() {
        let triggers = generate_triggers(&single_pk());
        let bd = &triggers[4];
        assert!(bd.sql.contains("'old', json_object('id', OLD.id, 'value', OLD.value)"));
        assert!(!bd.sql.contains("NEW."));
    }

    #[test]
    fn test_composite_key_columns_precede_other_columns() {
        let table = TableDescriptor::new("compound_pk", ["id1", "id2"], ["value"]).unwrap();
        let triggers = generate_triggers(&table);
        assert!(triggers[0].sql.contains(
            "json_object('id1', NEW.id1, 'id2', NEW.id2, 'value', NEW.value)"
        ));
    }

    #[test]
    fn test_rowid_only_shape_omits_key_fields() {
        let table = TableDescriptor::rowid_only("no_pk", ["value"]).unwrap();
        let triggers = generate_triggers(&table);
        assert!(triggers[0].sql.contains("json_object('value', NEW.value)"));
        assert!(!triggers[0].sql.contains("'id',"));
    }

    #[test]
    fn test_install_refuses_log_table() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::create_log_table(&conn).unwrap();
        let descriptor = TableDescriptor::new("log", ["id"], ["details"]).unwrap();
        assert!(matches!(
            install_triggers(&conn, &descriptor),
            Err(AuditError::LogTableReserved(_))
        ));
    }
}
