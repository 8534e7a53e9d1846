use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use rusqlite::types::Value;
use table_audit_core::TableDescriptor;
use table_audit_sqlite::{
    Exerciser, ScenarioOutcome, create_log_table, install_triggers, log_table_exists,
    prepare_connection,
};

#[derive(Debug, Parser)]
#[command(name = "table-audit")]
#[command(about = "Install and exercise SQLite audit triggers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the conflict-resolution scenario matrix and print every audit record.
    Exercise(ExerciseArgs),
    /// Install the six audit triggers on an existing table.
    Install(InstallArgs),
    /// Print recorded audit entries.
    Log(LogArgs),
}

#[derive(Debug, Args)]
struct ExerciseArgs {
    /// Database file path (defaults to an in-memory database).
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct InstallArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Table to instrument.
    #[arg(long)]
    table: String,
    /// Comma-separated primary-key columns (omit for a rowid-only table).
    #[arg(long)]
    pk: Option<String>,
    /// Comma-separated non-key columns.
    #[arg(long)]
    columns: Option<String>,
}

#[derive(Debug, Args)]
struct LogArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Only show entries for this audited table.
    #[arg(long)]
    table: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Exercise(args) => run_exercise(args),
        Command::Install(args) => run_install(args),
        Command::Log(args) => run_log(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_exercise(args: ExerciseArgs) -> Result<(), String> {
    let conn = open_connection(args.db.as_ref())?;

    let mut exerciser = Exerciser::new(&conn).with_observer(print_outcome);
    exerciser
        .install()
        .map_err(|e| format!("Failed to install demonstration tables: {e}"))?;

    let outcomes = exerciser
        .run_all()
        .map_err(|e| format!("Scenario execution failed: {e}"))?;

    let mismatches: Vec<String> = outcomes
        .iter()
        .filter_map(|outcome| outcome.mismatch())
        .map(|mismatch| mismatch.to_string())
        .collect();

    println!(
        "Ran {} scenario(s), {} mismatch(es).",
        outcomes.len(),
        mismatches.len()
    );

    if mismatches.is_empty() {
        Ok(())
    } else {
        for mismatch in &mismatches {
            eprintln!("mismatch: {mismatch}");
        }
        Err(format!(
            "{} trigger sequence(s) diverged from pinned engine behavior",
            mismatches.len()
        ))
    }
}

fn run_install(args: InstallArgs) -> Result<(), String> {
    let pk = parse_csv_list(args.pk);
    let columns = parse_csv_list(args.columns);

    let descriptor = TableDescriptor::new(&args.table, pk, columns)
        .map_err(|e| format!("Invalid table description: {e}"))?;

    let conn = Connection::open(&args.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))?;
    prepare_connection(&conn).map_err(|e| format!("Failed to prepare connection: {e}"))?;
    create_log_table(&conn).map_err(|e| format!("Failed to create audit log table: {e}"))?;
    install_triggers(&conn, &descriptor)
        .map_err(|e| format!("Failed to install triggers on '{}': {e}", args.table))?;

    println!(
        "Installed 6 audit triggers on '{}' in '{}':",
        args.table,
        args.db.display()
    );
    for definition in table_audit_sqlite::generate_triggers(&descriptor) {
        println!("  {}", definition.name);
    }
    Ok(())
}

fn run_log(args: LogArgs) -> Result<(), String> {
    let conn = Connection::open(&args.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))?;

    if !log_table_exists(&conn).map_err(|e| e.to_string())? {
        return Err(format!(
            "No audit log table in '{}'. Run 'table-audit install' first.",
            args.db.display()
        ));
    }

    let (sql, params): (&str, Vec<Value>) = match &args.table {
        Some(table) => (
            "SELECT id, trigger_name, table_name, details FROM log WHERE table_name = ?1 ORDER BY id",
            vec![Value::Text(table.clone())],
        ),
        None => (
            "SELECT id, trigger_name, table_name, details FROM log ORDER BY id",
            Vec::new(),
        ),
    };

    let mut stmt = conn.prepare(sql).map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(|e| e.to_string())?;

    let mut count = 0usize;
    for row in rows {
        let (id, trigger_name, table_name, details) = row.map_err(|e| e.to_string())?;
        println!("#{id} {trigger_name} on {table_name}:");
        println!("{}", indent(&pretty_details(&details), "    "));
        count += 1;
    }
    println!("{count} audit record(s).");
    Ok(())
}

/// Prints one scenario outcome in the statement-then-records format.
fn print_outcome(outcome: &ScenarioOutcome) {
    let params = format_parameters(&outcome.parameters);
    if params.is_empty() {
        println!("{}", outcome.statement);
    } else {
        println!("{} {}", outcome.statement, params);
    }
    for record in &outcome.records {
        println!("  {} on {}:", record.trigger_name, record.table_name);
        println!("{}", indent(&pretty_details(&record.details), "    "));
    }
    println!();
}

/// Re-renders a record's raw details JSON with pretty indentation.
///
/// Key order survives the round trip (`serde_json` is built with
/// `preserve_order`), keeping the pk-then-other column contract visible
/// in the output. Malformed text is printed as-is rather than dropped.
fn pretty_details(details: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(details) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| details.to_string()),
        Err(_) => details.to_string(),
    }
}

/// Prefixes every line of `text` with `prefix`.
fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders bound parameter values for display, e.g. `[1, "a"]`.
fn format_parameters(parameters: &[Value]) -> String {
    if parameters.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = parameters
        .iter()
        .map(|value| match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(r) => r.to_string(),
            Value::Text(t) => format!("{t:?}"),
            Value::Blob(b) => format!("<blob {} bytes>", b.len()),
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

fn parse_csv_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

fn open_connection(path: Option<&PathBuf>) -> Result<Connection, String> {
    match path {
        Some(path) => Connection::open(path)
            .map_err(|e| format!("Failed to open database '{}': {e}", path.display())),
        None => Connection::open_in_memory().map_err(|e| format!("Failed to open database: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{format_parameters, indent, parse_csv_list, pretty_details};
    use rusqlite::types::Value;

    #[test]
    fn test_parse_csv_list_trims_and_drops_empty() {
        let parsed = parse_csv_list(Some(" id1, id2, ,value ".to_string()));
        assert_eq!(parsed, vec!["id1", "id2", "value"]);
    }

    #[test]
    fn test_parse_csv_list_none_is_empty() {
        assert!(parse_csv_list(None).is_empty());
    }

    #[test]
    fn test_format_parameters() {
        assert_eq!(format_parameters(&[]), "");
        assert_eq!(
            format_parameters(&[Value::Integer(1), Value::Text("a".to_string()), Value::Null]),
            r#"[1, "a", NULL]"#
        );
    }

    #[test]
    fn test_indent_prefixes_every_line() {
        assert_eq!(indent("a\nb", "  "), "  a\n  b");
    }

    #[test]
    fn test_pretty_details_preserves_key_order() {
        let pretty = pretty_details(r#"{"action":"insert","new":{"id":1,"value":"a"}}"#);
        let action_at = pretty.find("\"action\"").unwrap();
        let id_at = pretty.find("\"id\"").unwrap();
        let value_at = pretty.find("\"value\"").unwrap();
        assert!(action_at < id_at && id_at < value_at);
    }

    #[test]
    fn test_pretty_details_passes_malformed_text_through() {
        assert_eq!(pretty_details("not json"), "not json");
    }
}
