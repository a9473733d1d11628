use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::{Map, Value as JsonValue};
use tracing::Level;

use sql_delay::prelude::*;

/// Push statements and queries through a delay thread against a `SQLite` database.
#[derive(Debug, Parser)]
#[command(name = "sql-delay", version, about)]
struct Args {
    /// Database path (`:memory:` for a throwaway database)
    #[arg(long, default_value = ":memory:")]
    db: String,

    /// JSON file with `SqliteOptions`; overrides --db
    #[arg(long)]
    config: Option<PathBuf>,

    /// Statement to execute; repeatable, run in order
    #[arg(long = "exec")]
    exec: Vec<String>,

    /// Wrap all --exec statements in one transaction
    #[arg(long)]
    transaction: bool,

    /// Prepared statement to run as INDEX:JSON_ARRAY, e.g. `0:[1,"name"]`; repeatable
    #[arg(long = "prepared")]
    prepared: Vec<String>,

    /// Query to run after the statements; repeatable, results printed as JSON
    #[arg(long = "query")]
    query: Vec<String>,

    /// Also log delay-thread lifecycle and batch progress to stderr
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sql-delay: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), SqlDelayError> {
    let opts = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|err| {
                SqlDelayError::ConfigError(format!("cannot read {}: {err}", path.display()))
            })?;
            SqliteOptions::from_json(&json)?
        }
        None => SqliteOptions::new(args.db.clone()),
    };
    let conn = SqliteConnection::open(&opts)?;
    let shared = SharedConnection::new(opts.db_path.clone(), conn);
    let queue = Arc::new(SqlResultQueue::new());

    {
        let delay = SqlDelayThread::spawn(shared, &DelayThreadConfig::default())?;

        if args.transaction {
            let mut tx = SqlTransaction::new();
            for sql in &args.exec {
                tx.delay_execute(SqlOperation::plain(sql.as_str()));
            }
            delay.enqueue(tx.into())?;
        } else {
            for sql in &args.exec {
                delay.enqueue(SqlOperation::plain(sql.as_str()))?;
            }
        }

        for spec in &args.prepared {
            let (index, params) = parse_prepared(spec)?;
            delay.enqueue(SqlOperation::prepared(index, params))?;
        }

        if !args.query.is_empty() {
            let mut holder = SqlQueryHolder::new();
            holder.set_query_slot_count(args.query.len());
            for (index, sql) in args.query.iter().enumerate() {
                holder.set_query(index, sql.as_str())?;
            }
            let queries = args.query.clone();
            let callback = QueryCallback::new(move |mut holder: SqlQueryHolder| {
                for (index, sql) in queries.iter().enumerate() {
                    print_result(sql, holder.get_result(index));
                }
            });
            holder.submit_async(callback, &delay, &queue)?;
        }
        // Dropping the delay thread waits for everything queued above.
    }

    queue.drain();
    Ok(())
}

fn parse_prepared(spec: &str) -> Result<(usize, StmtParams), SqlDelayError> {
    let (index, params) = spec.split_once(':').ok_or_else(|| {
        SqlDelayError::ParameterError(format!("expected INDEX:JSON_ARRAY, got `{spec}`"))
    })?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|err| SqlDelayError::ParameterError(format!("bad statement index: {err}")))?;
    let values: Vec<JsonValue> = serde_json::from_str(params)
        .map_err(|err| SqlDelayError::ParameterError(format!("bad parameter list: {err}")))?;
    Ok((
        index,
        values.into_iter().map(RowValues::from).collect::<Vec<_>>().into(),
    ))
}

fn print_result(sql: &str, result: Option<&QueryResult>) {
    let Some(result) = result else {
        println!("{}", serde_json::json!({ "query": sql, "error": "query failed" }));
        return;
    };
    let rows: Vec<JsonValue> = result
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (name, value) in row.column_names.iter().zip(&row.values) {
                object.insert(name.clone(), to_json(value));
            }
            JsonValue::Object(object)
        })
        .collect();
    println!("{}", serde_json::json!({ "query": sql, "rows": rows }));
}

fn to_json(value: &RowValues) -> JsonValue {
    match value {
        RowValues::Int(i) => JsonValue::from(*i),
        RowValues::Float(f) => JsonValue::from(*f),
        RowValues::Text(s) => JsonValue::from(s.as_str()),
        RowValues::Bool(b) => JsonValue::from(*b),
        RowValues::Timestamp(dt) => JsonValue::from(dt.to_string()),
        RowValues::Null => JsonValue::Null,
        RowValues::JSON(json) => json.clone(),
        RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
    }
}
