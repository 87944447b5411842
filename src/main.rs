//! `sql5300`: a line-oriented REPL over one data directory.
//!
//! Usage: `sql5300 <writable_dir>`. Any line is parsed and executed as SQL;
//! `test` runs the self-test battery, `quit` exits.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use slotql::env::Environment;
use slotql::exec::{QueryResult, SQLExec};
use slotql::sql;
use slotql::value::Value;

#[derive(Parser)]
#[command(name = "sql5300")]
#[command(about = "A small page-oriented SQL storage engine")]
struct Cli {
    /// Writable directory holding the database's files
    dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let env = match Environment::open(&cli.dir) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Error: failed to open {}: {e}", cli.dir.display());
            std::process::exit(-1);
        }
    };

    let exec = SQLExec::new(env.catalog());
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("SQL> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "quit" => break,
            "test" => run_self_test(&exec),
            statement => run_statement(&exec, statement),
        }
    }
}

fn run_statement(exec: &SQLExec, line: &str) {
    match sql::parse(line).and_then(|stmt| exec.execute(&stmt)) {
        Ok(result) => print_result(&result),
        Err(e) => println!("Error: {e}"),
    }
}

fn print_result(result: &QueryResult) {
    println!("{}", result.message);
    if let (Some(columns), Some(rows)) = (&result.column_names, &result.rows) {
        println!("{}", columns.join(" | "));
        for row in rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| row.get(c).map(value_to_string).unwrap_or_default())
                .collect();
            println!("{}", cells.join(" | "));
        }
    }
}

fn value_to_string(value: &Value) -> String {
    value.to_string()
}

/// The self-test battery behind the REPL's `test` command: create, insert,
/// select, delete, drop, exercising every statement kind end-to-end.
fn run_self_test(exec: &SQLExec) {
    let script = [
        "CREATE TABLE foo (id INT, data TEXT)",
        "CREATE INDEX idx_id ON foo (id)",
        "INSERT INTO foo VALUES (1, 'hello')",
        "INSERT INTO foo VALUES (2, 'world')",
        "SELECT * FROM foo",
        "SELECT * FROM foo WHERE id = 2",
        "SHOW TABLES",
        "SHOW COLUMNS FROM foo",
        "DROP INDEX idx_id ON foo",
        "DELETE FROM foo WHERE id = 1",
        "SELECT * FROM foo",
        "DROP TABLE foo",
    ];

    let mut passed = 0;
    for statement in script {
        match sql::parse(statement).and_then(|stmt| exec.execute(&stmt)) {
            Ok(result) => {
                passed += 1;
                println!("ok: {statement} -> {}", result.message);
            }
            Err(e) => println!("FAILED: {statement} -> Error: {e}"),
        }
    }
    println!("self-test: {passed}/{} passed", script.len());
}
