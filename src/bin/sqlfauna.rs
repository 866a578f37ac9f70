//! sqlfauna — run SQL against Fauna
//!
//! # Usage
//!
//! ```bash
//! # Show the FQL for a statement
//! sqlfauna "SELECT users.name FROM users WHERE users.age > 30" --dry-run
//!
//! # Execute with named parameters
//! sqlfauna "SELECT users.name FROM users WHERE users.age > %(age)s" --param age=30 --url fauna://SECRET@db.fauna.com
//!
//! # Try statements against a throwaway in-memory store
//! sqlfauna --memory "INSERT INTO users (name) VALUES ('Bob')" "SELECT * FROM users"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlfauna::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlfauna")]
#[command(version)]
#[command(about = "SQL in, FQL out: run ORM-style SQL against Fauna", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlfauna 'SELECT users.name FROM users' --dry-run
    sqlfauna 'SELECT users.name FROM users WHERE users.id = %(id)s' --param id=42
    sqlfauna --memory \"INSERT INTO users (name) VALUES ('Bob')\" 'SELECT * FROM users'")]
struct Cli {
    /// SQL statements, executed in order on one connection
    queries: Vec<String>,

    /// Named parameters for %(name)s placeholders
    #[arg(short, long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// Don't execute, just show the FQL
    #[arg(short, long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Connection URL (fauna://SECRET@host[:port])
    #[arg(long, env = "FAUNA_URL")]
    url: Option<String>,

    /// Access secret for the default endpoint
    #[arg(long, env = "FAUNA_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Execute against an empty in-memory store
    #[arg(long)]
    memory: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the query model and FQL of a statement
    Explain {
        /// The SQL statement to explain
        query: String,
    },
    /// Pretty-print a statement
    Fmt {
        query: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Explain { query }) => explain_query(query),
        Some(Commands::Fmt { query }) => {
            println!("{}", format_sql_query(query));
            Ok(())
        }
        None if cli.queries.is_empty() => {
            println!("{}", "sqlfauna — SQL dialect driver for Fauna".cyan().bold());
            println!();
            println!("Usage: sqlfauna <SQL>... [OPTIONS]");
            println!();
            println!("Try: sqlfauna --help");
            Ok(())
        }
        None => run(&cli).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let params = parse_params(&cli.params)?;

    let connection = if cli.dry_run {
        None
    } else if cli.memory {
        Some(Connection::with_transport(Arc::new(MemoryTransport::new())))
    } else {
        resolve_config(cli)?.map(connect).transpose()?
    };

    let Some(connection) = connection else {
        for query in &cli.queries {
            show_fql(query, &params)?;
        }
        if !cli.dry_run {
            println!();
            println!(
                "{}",
                "⚠ No connection. Use --url, --secret, --memory or set FAUNA_URL".yellow()
            );
        }
        return Ok(());
    };

    let mut cursor = connection.cursor();
    for query in &cli.queries {
        if cli.verbose {
            println!("{} {}", "Input:".dimmed(), query.yellow());
        }
        cursor
            .execute(query, &params)
            .await
            .with_context(|| format!("executing {}", query))?;
        match cursor.description() {
            Some(columns) => {
                let columns = columns.to_vec();
                let rows = cursor.fetch_all()?;
                format_output(&columns, &rows, &cli.format);
            }
            None if cursor.row_count() >= 0 => {
                println!("{} {} rows affected", "✓".green(), cursor.row_count());
                if let Some(id) = cursor.last_row_id() {
                    println!("  {} {}", "last id:".dimmed(), id.cyan());
                }
            }
            None => println!("{} done", "✓".green()),
        }
    }
    cursor.close();
    connection.close();
    Ok(())
}

/// `--url`, then `--secret`, then the config file.
fn resolve_config(cli: &Cli) -> anyhow::Result<Option<Config>> {
    if let Some(url) = &cli.url {
        return Ok(Some(Config::from_url(url)?));
    }
    if let Some(secret) = &cli.secret {
        return Ok(Some(Config::builder().secret(secret.as_str()).build()?));
    }
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    Ok(Some(config))
}

fn parse_params(raw: &[String]) -> anyhow::Result<Params> {
    let mut map = BTreeMap::new();
    for item in raw {
        let Some((name, value)) = item.split_once('=') else {
            bail!("parameter '{}' is not NAME=VALUE", item);
        };
        map.insert(name.to_string(), parse_param_value(value));
    }
    Ok(if map.is_empty() {
        Params::none()
    } else {
        Params::Named(map)
    })
}

// Try to parse as number or boolean, otherwise use as string
fn parse_param_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else {
        match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            _ => Value::String(raw.to_string()),
        }
    }
}

fn show_fql(query: &str, params: &Params) -> anyhow::Result<()> {
    let nodes = sqlfauna::driver::params::bind(query, params)?;
    let translation = translate(&sqlfauna::parser::build(&nodes)?)?;
    println!("{}", "FQL:".green().bold());
    println!("{}", translation.expr.to_string().white());
    println!("{}", "Wire:".green().bold());
    println!("{}", serde_json::to_string_pretty(&translation.expr.to_wire())?);
    Ok(())
}

fn format_output(columns: &[String], rows: &[Row], format: &OutputFormat) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            let objects: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .cloned()
                        .zip(row.iter().map(Value::to_json))
                        .collect()
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&objects).unwrap_or_default());
        }
        OutputFormat::Table => {
            let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
            for row in rows {
                for (i, val) in row.iter().enumerate() {
                    if let Some(w) = widths.get_mut(i) {
                        *w = (*w).max(val_to_string(val).len());
                    }
                }
            }

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in rows {
                let cells: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{:width$}", val_to_string(v), width = w))
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &Value) -> String {
    match val {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        Value::DateTime(dt) => dt.to_rfc3339(),
        other => other.to_string(),
    }
}

fn explain_query(query: &str) -> anyhow::Result<()> {
    println!("{}", "sqlfauna statement explanation".cyan().bold());
    println!();
    println!("{}", format_sql_query(query).yellow());
    println!();

    let model = parse(query)?;
    println!("{}", "Query model:".green().bold());
    println!("  {} {}", "Kind:".dimmed(), model.kind.to_string().cyan());
    println!("  {} {}", "Tables:".dimmed(), model.tables.join(", ").white());
    if !model.columns.is_empty() {
        println!("  {}", "Columns:".dimmed());
        for item in &model.columns {
            println!("    • {}", format!("{:?}", item).white());
        }
    }
    for join in &model.joins {
        println!(
            "  {} {:?} {} = {}",
            "Join:".dimmed(),
            join.kind,
            join.left.qualified().white(),
            join.right.qualified().white()
        );
    }
    if let Some(predicate) = &model.predicate {
        println!("  {} {:?}", "Where:".dimmed(), predicate);
    }
    for order in &model.order_by {
        println!("  {} {} {:?}", "Order:".dimmed(), order.column.qualified(), order.order);
    }

    let translation = translate(&model)?;
    println!();
    println!("{}", "FQL:".green().bold());
    println!("  {}", translation.expr.to_string().white());
    if !translation.shape.sort.is_empty() {
        println!(
            "  {} sorted client-side on {} key(s)",
            "Note:".dimmed(),
            translation.shape.sort.len()
        );
    }
    Ok(())
}
