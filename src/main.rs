use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;

use minisql::{MemoryCatalog, Session};

const DEMO_TABLE: &str =
    "CREATE TABLE users (id INT PRIMARY KEY, department TEXT, role TEXT, salary INT)";

const DEMO_ROWS: [&str; 6] = [
    "INSERT INTO users (id, department, role, salary) VALUES (1, 'Sales', 'Manager', 5000)",
    "INSERT INTO users (id, department, role, salary) VALUES (2, 'Sales', 'Rep', 3000)",
    "INSERT INTO users (id, department, role, salary) VALUES (3, 'Sales', 'Rep', null)",
    "INSERT INTO users (id, department, role, salary) VALUES (4, 'HR', 'Manager', 4500)",
    "INSERT INTO users (id, department, role, salary) VALUES (5, 'HR', 'Rep', undefined)",
    "INSERT INTO users (id, department, role, salary) VALUES (6, 'HR', null, 2900)",
];

#[derive(Parser)]
#[command(author, version, about = "minisql - an in-memory SQL table store")]
struct Cli {
    /// Create the `users` demo table and load its sample rows
    #[arg(long)]
    demo: bool,

    /// Run a statement and exit instead of starting the shell, may be repeated
    #[arg(short, long, value_name = "SQL")]
    execute: Vec<String>,

    /// Prompt shown by the interactive shell
    #[arg(long, default_value = "sql> ")]
    prompt: String,

    /// Log parsed statements and plans
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut session = Session::new(MemoryCatalog::new());
    if cli.demo {
        seed_demo(&mut session)?;
    }

    if !cli.execute.is_empty() {
        let failed = cli
            .execute
            .iter()
            .filter(|sql| !run_statement(&mut session, sql))
            .count();
        if failed > 0 {
            bail!("{} of {} statements failed", failed, cli.execute.len());
        }
        return Ok(());
    }

    run_shell(&mut session, &cli.prompt)
}

/// `RUST_LOG` decides the level, `--verbose` forces debug output
fn init_logger(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn seed_demo(session: &mut Session<MemoryCatalog>) -> Result<()> {
    session
        .execute(DEMO_TABLE)
        .context("creating demo table")?;
    for sql in DEMO_ROWS {
        session
            .execute(sql)
            .with_context(|| format!("loading demo row: {}", sql))?;
    }
    debug!("demo table loaded with {} rows", DEMO_ROWS.len());
    Ok(())
}

/// Prints the outcome of one statement, returns whether it succeeded
fn run_statement(session: &mut Session<MemoryCatalog>, sql: &str) -> bool {
    match session.execute(sql) {
        Ok(result) => {
            println!("{}", result);
            true
        }
        Err(err) => {
            println!("Error: {}", err);
            false
        }
    }
}

fn run_shell(session: &mut Session<MemoryCatalog>, prompt: &str) -> Result<()> {
    println!("minisql started. Type 'help' for assistance or 'exit' to quit.");

    let mut rl = Editor::<(), DefaultHistory>::new()?;
    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line.to_lowercase().as_str() {
                    "exit" | "quit" => {
                        println!("Goodbye!");
                        break;
                    }
                    "help" => print_help(),
                    "tables" => {
                        for name in session.catalog().table_names() {
                            println!("{}", name);
                        }
                    }
                    _ => {
                        run_statement(session, line);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("Statements:");
    println!("  CREATE TABLE <t> (<col> INT|TEXT|BOOLEAN [PRIMARY KEY], ...)");
    println!("  INSERT INTO <t> (<cols>) VALUES (<values>)");
    println!("  SELECT [DISTINCT] <cols> FROM <t> [[AS] a]");
    println!("      [[INNER|LEFT|RIGHT|FULL] JOIN <t> [[AS] b] ON a.x = b.y]...");
    println!("      [WHERE ...] [GROUP BY <cols>] [HAVING ...]");
    println!("      [ORDER BY <col> [ASC|DESC]] [LIMIT n] [OFFSET n]");
    println!("  UPDATE <t> SET <col> = <value>, ... [WHERE <col> = <value>]");
    println!("  DELETE FROM <t> WHERE <col> = <value>");
    println!();
    println!("Aggregates: COUNT(*), COUNT(col), SUM(col), AVG(col), MIN(col), MAX(col)");
    println!("Conditions: <col> =|>|<|>=|<= <value>, joined by AND or by OR");
    println!();
    println!("  tables  list the tables");
    println!("  help    show this message");
    println!("  exit    leave the shell");
}
