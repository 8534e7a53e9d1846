//! Conflict-resolution exercising: a deterministic script that pins the
//! engine's trigger-firing behavior.
//!
//! The exerciser drives a fixed scenario matrix — plain inserts, `INSERT
//! OR IGNORE`, `INSERT OR REPLACE`, upserts, updates, and deletes —
//! across the three canonical key shapes (rowid-only, single, composite)
//! and compares each observed trigger sequence against an expected one.
//! The expectations are empirically pinned against SQLite, not assumed
//! from documentation; where a conflict clause suppresses or reorders
//! the "obvious" sequence, the pinned value records what the engine
//! actually does:
//!
//! - `INSERT OR IGNORE` on a conflicting key fires BEFORE INSERT only.
//!   The trigger runs ahead of the uniqueness check, and its log write
//!   is retained even though the row is skipped.
//! - `INSERT OR REPLACE` on a conflicting key fires
//!   `before insert, before delete, after delete, after insert`: the
//!   replace-delete happens inside constraint resolution, bracketed by
//!   the insert triggers — and it fires delete triggers at all only
//!   with `recursive_triggers` enabled.
//! - `INSERT ... ON CONFLICT DO UPDATE` on a conflicting key fires
//!   `before insert, before update, after update`. The redirected
//!   insert never completes, so AFTER INSERT stays silent.
//!
//! Conflict scenarios are inapplicable to the rowid-only shape, which
//! has no uniqueness constraint to violate; it is exercised with plain
//! mutations only.
//!
//! A divergence between observed and expected is a [`SequenceMismatch`]
//! — reported, not fatal — and means either the engine assumption or
//! the generator is wrong. Engine errors, by contrast, stop the run at
//! the first failing scenario.

use std::fmt;

use rusqlite::Connection;
use rusqlite::types::Value;
use table_audit_core::TableDescriptor;
use tracing::debug;

use crate::error::Result;
use crate::recorder::{AuditRecord, Recorder};
use crate::schema::{create_log_table, prepare_connection};
use crate::triggers::install_triggers;

const INSERT_PAIR: &[&str] = &["before insert", "after insert"];
const IGNORED_INSERT: &[&str] = &["before insert"];
const REPLACE_CONFLICT: &[&str] = &[
    "before insert",
    "before delete",
    "after delete",
    "after insert",
];
const UPSERT_CONFLICT: &[&str] = &["before insert", "before update", "after update"];
const UPDATE_PAIR: &[&str] = &["before update", "after update"];
const DELETE_PAIR: &[&str] = &["before delete", "after delete"];

/// One scripted statement with its pinned expected trigger sequence.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Short human label, e.g. `"insert or ignore, conflicting key (single_pk)"`.
    pub label: &'static str,
    /// The SQL text, with `?N` placeholders for values.
    pub statement: &'static str,
    /// Bound parameter values.
    pub parameters: Vec<Value>,
    /// The trigger labels expected to fire, in order.
    pub expected: &'static [&'static str],
}

/// The result of running one scenario through the recorder.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub label: &'static str,
    pub statement: String,
    pub parameters: Vec<Value>,
    /// Pinned expected trigger sequence.
    pub expected: Vec<String>,
    /// Trigger sequence actually observed.
    pub observed: Vec<String>,
    /// The newly appended audit records backing `observed`.
    pub records: Vec<AuditRecord>,
    /// Engine change count for the statement.
    pub rows_changed: usize,
}

impl ScenarioOutcome {
    /// Whether the observed sequence equals the pinned expectation.
    pub fn is_match(&self) -> bool {
        self.expected == self.observed
    }

    /// The mismatch report, if any.
    pub fn mismatch(&self) -> Option<SequenceMismatch> {
        if self.is_match() {
            None
        } else {
            Some(SequenceMismatch {
                label: self.label.to_string(),
                expected: self.expected.clone(),
                observed: self.observed.clone(),
            })
        }
    }
}

/// An observed trigger sequence that differs from the pinned expectation.
///
/// Reported rather than raised: the exerciser completes its matrix and
/// leaves the pass/fail decision to the caller. A mismatch means a
/// defect in either the engine assumption or the trigger generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMismatch {
    pub label: String,
    pub expected: Vec<String>,
    pub observed: Vec<String>,
}

impl fmt::Display for SequenceMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected [{}], observed [{}]",
            self.label,
            self.expected.join(", "),
            self.observed.join(", ")
        )
    }
}

/// Descriptors for the three demonstration tables, one per key shape.
pub fn demo_descriptors() -> Result<Vec<TableDescriptor>> {
    Ok(vec![
        TableDescriptor::rowid_only("no_pk", ["value"])?,
        TableDescriptor::new("single_pk", ["id"], ["value"])?,
        TableDescriptor::new("compound_pk", ["id1", "id2"], ["value"])?,
    ])
}

const DEMO_TABLES_SQL: &str = "\
CREATE TABLE no_pk (value TEXT);
CREATE TABLE single_pk (id INTEGER PRIMARY KEY, value TEXT);
CREATE TABLE compound_pk (id1 INTEGER, id2 INTEGER, value TEXT, PRIMARY KEY (id1, id2));";

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn int(value: i64) -> Value {
    Value::Integer(value)
}

/// The fixed scenario matrix, in execution order.
///
/// Later scenarios depend on the row state earlier ones leave behind
/// (e.g. the conflicting-key scenarios require the plain inserts to have
/// run), so the matrix is meaningful only as a whole, in order.
pub fn scenario_matrix() -> Vec<Scenario> {
    vec![
        // Plain inserts, one per key shape.
        Scenario {
            label: "plain insert (no_pk)",
            statement: "INSERT INTO no_pk (value) VALUES (?1)",
            parameters: vec![text("no_pk_value")],
            expected: INSERT_PAIR,
        },
        Scenario {
            label: "plain insert (single_pk)",
            statement: "INSERT INTO single_pk (id, value) VALUES (?1, ?2)",
            parameters: vec![int(1), text("single_pk_value")],
            expected: INSERT_PAIR,
        },
        Scenario {
            label: "plain insert (compound_pk)",
            statement: "INSERT INTO compound_pk (id1, id2, value) VALUES (?1, ?2, ?3)",
            parameters: vec![int(1), int(2), text("compound_pk_value")],
            expected: INSERT_PAIR,
        },
        // INSERT OR IGNORE: the conflicting row is skipped after its
        // BEFORE INSERT trigger has already logged.
        Scenario {
            label: "insert or ignore, conflicting key (single_pk)",
            statement: "INSERT OR IGNORE INTO single_pk (id, value) VALUES (?1, ?2)",
            parameters: vec![int(1), text("single_pk_value_ignored")],
            expected: IGNORED_INSERT,
        },
        Scenario {
            label: "insert or ignore, fresh key (single_pk)",
            statement: "INSERT OR IGNORE INTO single_pk (id, value) VALUES (?1, ?2)",
            parameters: vec![int(2), text("single_pk_value_not_ignored")],
            expected: INSERT_PAIR,
        },
        Scenario {
            label: "insert or ignore, conflicting key (compound_pk)",
            statement: "INSERT OR IGNORE INTO compound_pk (id1, id2, value) VALUES (?1, ?2, ?3)",
            parameters: vec![int(1), int(2), text("compound_pk_value_ignored")],
            expected: IGNORED_INSERT,
        },
        // INSERT OR REPLACE: delete-then-insert, bracketed by the insert
        // triggers; requires recursive_triggers for the delete pair.
        Scenario {
            label: "insert or replace, conflicting key (single_pk)",
            statement: "INSERT OR REPLACE INTO single_pk (id, value) VALUES (?1, ?2)",
            parameters: vec![int(1), text("single_pk_value_replaced")],
            expected: REPLACE_CONFLICT,
        },
        Scenario {
            label: "insert or replace, fresh key (single_pk)",
            statement: "INSERT OR REPLACE INTO single_pk (id, value) VALUES (?1, ?2)",
            parameters: vec![int(4), text("single_pk_value_fresh")],
            expected: INSERT_PAIR,
        },
        Scenario {
            label: "insert or replace, conflicting key (compound_pk)",
            statement: "INSERT OR REPLACE INTO compound_pk (id1, id2, value) VALUES (?1, ?2, ?3)",
            parameters: vec![int(1), int(2), text("compound_pk_value_replaced")],
            expected: REPLACE_CONFLICT,
        },
        // Upserts: the insert attempt is redirected to an update, so
        // AFTER INSERT never fires on conflict.
        Scenario {
            label: "upsert, conflicting key (single_pk)",
            statement: "INSERT INTO single_pk (id, value) VALUES (?1, ?2) \
                        ON CONFLICT(id) DO UPDATE SET value = ?3",
            parameters: vec![int(1), text("conflict_value"), text("updated_on_conflict")],
            expected: UPSERT_CONFLICT,
        },
        Scenario {
            label: "upsert, fresh key (single_pk)",
            statement: "INSERT INTO single_pk (id, value) VALUES (?1, ?2) \
                        ON CONFLICT(id) DO UPDATE SET value = ?3",
            parameters: vec![int(3), text("new_value"), text("this_wont_be_used")],
            expected: INSERT_PAIR,
        },
        Scenario {
            label: "upsert, conflicting key (compound_pk)",
            statement: "INSERT INTO compound_pk (id1, id2, value) VALUES (?1, ?2, ?3) \
                        ON CONFLICT(id1, id2) DO UPDATE SET value = ?4",
            parameters: vec![
                int(1),
                int(2),
                text("conflict_value"),
                text("compound_pk_value_upserted"),
            ],
            expected: UPSERT_CONFLICT,
        },
        // Plain updates.
        Scenario {
            label: "plain update (no_pk)",
            statement: "UPDATE no_pk SET value = ?1 WHERE rowid = ?2",
            parameters: vec![text("no_pk_value_updated"), int(1)],
            expected: UPDATE_PAIR,
        },
        Scenario {
            label: "plain update (single_pk)",
            statement: "UPDATE single_pk SET value = ?1 WHERE id = ?2",
            parameters: vec![text("single_pk_value_updated"), int(1)],
            expected: UPDATE_PAIR,
        },
        Scenario {
            label: "plain update (compound_pk)",
            statement: "UPDATE compound_pk SET value = ?1 WHERE id1 = ?2 AND id2 = ?3",
            parameters: vec![text("compound_pk_value_updated"), int(1), int(2)],
            expected: UPDATE_PAIR,
        },
        // Plain deletes.
        Scenario {
            label: "plain delete (no_pk)",
            statement: "DELETE FROM no_pk WHERE rowid = ?1",
            parameters: vec![int(1)],
            expected: DELETE_PAIR,
        },
        Scenario {
            label: "plain delete (single_pk)",
            statement: "DELETE FROM single_pk WHERE id = ?1",
            parameters: vec![int(1)],
            expected: DELETE_PAIR,
        },
        Scenario {
            label: "plain delete (compound_pk)",
            statement: "DELETE FROM compound_pk WHERE id1 = ?1 AND id2 = ?2",
            parameters: vec![int(1), int(2)],
            expected: DELETE_PAIR,
        },
    ]
}

/// Drives the scenario matrix against an instrumented database.
///
/// Construction borrows a connection; [`install`](Self::install) is the
/// one-shot `DESCRIBED → TRIGGERS_INSTALLED` transition (a second call
/// collides on trigger names, by design); [`run_all`](Self::run_all)
/// executes the matrix. An optional observer is invoked once per
/// completed scenario, so callers choose between console output,
/// structured logging, or silent assertion.
///
/// # Examples
///
/// ```no_run
/// use rusqlite::Connection;
/// use table_audit_sqlite::Exerciser;
///
/// let conn = Connection::open_in_memory().unwrap();
/// let mut exerciser = Exerciser::new(&conn)
///     .with_observer(|outcome| println!("{}: {}", outcome.label, outcome.is_match()));
/// exerciser.install().unwrap();
///
/// let outcomes = exerciser.run_all().unwrap();
/// assert!(outcomes.iter().all(|outcome| outcome.is_match()));
/// ```
pub struct Exerciser<'conn> {
    conn: &'conn Connection,
    observer: Option<Box<dyn FnMut(&ScenarioOutcome) + 'conn>>,
}

impl<'conn> Exerciser<'conn> {
    /// Creates an exerciser over the given connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            observer: None,
        }
    }

    /// Registers a callback invoked once per completed scenario.
    pub fn with_observer(mut self, observer: impl FnMut(&ScenarioOutcome) + 'conn) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Prepares the database: session pragmas, the audit log table, the
    /// three demonstration tables, and all eighteen audit triggers.
    ///
    /// One-shot: repeating it raises the engine's table/trigger
    /// name-collision error.
    pub fn install(&self) -> Result<()> {
        prepare_connection(self.conn)?;
        create_log_table(self.conn)?;
        self.conn.execute_batch(DEMO_TABLES_SQL)?;
        for descriptor in demo_descriptors()? {
            install_triggers(self.conn, &descriptor)?;
        }
        Ok(())
    }

    /// Runs the full scenario matrix, in order.
    ///
    /// Stops at the first engine error; sequence mismatches do not stop
    /// the run — they are carried in the returned outcomes.
    pub fn run_all(&mut self) -> Result<Vec<ScenarioOutcome>> {
        let recorder = Recorder::new(self.conn);
        let mut outcomes = Vec::new();

        for scenario in scenario_matrix() {
            let diff = recorder.run(scenario.statement, &scenario.parameters)?;
            let outcome = ScenarioOutcome {
                label: scenario.label,
                statement: diff.statement,
                parameters: diff.parameters,
                expected: scenario.expected.iter().map(ToString::to_string).collect(),
                observed: diff
                    .records
                    .iter()
                    .map(|record| record.trigger_name.clone())
                    .collect(),
                records: diff.records,
                rows_changed: diff.rows_changed,
            };
            debug!(
                scenario = outcome.label,
                matched = outcome.is_match(),
                "ran scenario"
            );
            if let Some(observer) = self.observer.as_mut() {
                observer(&outcome);
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_covers_all_shapes_and_conflict_clauses() {
        let matrix = scenario_matrix();
        for table in ["no_pk", "single_pk", "compound_pk"] {
            assert!(
                matrix.iter().any(|s| s.statement.contains(table)),
                "matrix misses {table}"
            );
        }
        assert!(matrix.iter().any(|s| s.statement.contains("OR IGNORE")));
        assert!(matrix.iter().any(|s| s.statement.contains("OR REPLACE")));
        assert!(matrix.iter().any(|s| s.statement.contains("ON CONFLICT")));
    }

    #[test]
    fn test_no_conflict_scenarios_target_rowid_only_shape() {
        // no_pk has no uniqueness constraint, so no conflict clause can
        // apply to it.
        for scenario in scenario_matrix() {
            if scenario.statement.contains("no_pk") {
                assert!(!scenario.statement.contains("OR IGNORE"));
                assert!(!scenario.statement.contains("OR REPLACE"));
                assert!(!scenario.statement.contains("ON CONFLICT"));
            }
        }
    }

    #[test]
    fn test_sequence_mismatch_display() {
        let mismatch = SequenceMismatch {
            label: "upsert, conflicting key (single_pk)".to_string(),
            expected: vec!["before insert".to_string(), "after insert".to_string()],
            observed: vec!["before insert".to_string()],
        };
        assert_eq!(
            mismatch.to_string(),
            "upsert, conflicting key (single_pk): expected [before insert, after insert], observed [before insert]"
        );
    }
}
