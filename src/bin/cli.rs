//! dynatable CLI
//!
//! Command-line access to a table kept in a local snapshot file.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use dynatable::{
    Config, Key, LocalStorage, QueryOptions, Record, Result, Table, TableError, TableSchema,
    TracingObserver, Value,
};
use tracing_subscriber::{fmt, EnvFilter};

/// dynatable CLI
#[derive(Parser, Debug)]
#[command(name = "dynatable")]
#[command(about = "Ordered, paginated access to a partition/sort-key table")]
#[command(version)]
struct Args {
    /// Snapshot file holding the tables (defaults to $DYNATABLE_SNAPSHOT)
    #[arg(short, long)]
    snapshot: Option<String>,

    /// Table name
    #[arg(short, long)]
    table: String,

    /// Partition key field
    #[arg(short, long, default_value = "id")]
    partition_key: String,

    /// Sort key field
    #[arg(short = 'k', long)]
    sort_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a record by key
    Get {
        /// Key as a JSON object, e.g. '{"id": "a"}'
        key: String,
    },

    /// Store a complete record
    Put {
        /// Record as a JSON object
        record: String,
    },

    /// Delete a record by key
    Delete {
        /// Key as a JSON object
        key: String,
    },

    /// Query records by partition key
    Query {
        /// Key fragment as a JSON object
        key: String,

        /// Descending sort-key order
        #[arg(short, long)]
        reverse: bool,

        /// Records per page
        #[arg(short, long)]
        limit: Option<usize>,

        /// Page token from a previous call
        #[arg(long)]
        page_token: Option<String>,

        /// Follow page tokens until the end
        #[arg(short, long)]
        all: bool,
    },

    /// Read the whole table
    Scan {
        /// Records per page
        #[arg(short, long)]
        limit: Option<usize>,

        /// Page token from a previous call
        #[arg(long)]
        page_token: Option<String>,
    },

    /// Count records in the table
    Count,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dynatable=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(path) = &args.snapshot {
        config.snapshot_path = Some(path.into());
    }
    config.validate()?;
    if config.snapshot_path.is_none() {
        tracing::warn!("No snapshot file configured; changes will not be kept");
    }

    let mut schema = TableSchema::new(&args.table, &args.partition_key);
    if let Some(sort_key) = &args.sort_key {
        schema = schema.with_sort_key(sort_key);
    }

    let storage = Arc::new(LocalStorage::open(&config));
    let table = Table::new(storage, schema).with_observer(Arc::new(TracingObserver));

    match args.command {
        Commands::Get { key } => {
            let record = table.get(&parse_key(&key)?)?;
            print_json(&record.map(Value::Map).unwrap_or(Value::Null));
        }
        Commands::Put { record } => {
            let record = table.create(parse_record(&record)?)?;
            print_json(&Value::Map(record));
        }
        Commands::Delete { key } => {
            let old = table.delete(&parse_key(&key)?)?;
            print_json(&old.map(Value::Map).unwrap_or(Value::Null));
        }
        Commands::Query {
            key,
            reverse,
            limit,
            page_token,
            all,
        } => {
            let key = parse_key(&key)?;
            let mut options = QueryOptions::new();
            options.reverse = reverse;
            options.limit = limit;

            if all {
                for record in table.get_all(&key, options) {
                    print_json(&Value::Map(record?));
                }
            } else {
                let page = table.get_many(&key, options, page_token.as_deref())?;
                print_page(page.records, page.next_page_token);
            }
        }
        Commands::Scan { limit, page_token } => {
            let page = table.scan(limit, page_token.as_deref())?;
            print_page(page.records, page.next_page_token);
        }
        Commands::Count => {
            println!("{}", table.item_count()?);
        }
    }
    Ok(())
}

fn parse_record(text: &str) -> Result<Record> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    match Value::from_json(json)? {
        Value::Map(record) => Ok(record),
        other => Err(TableError::Serialization(format!(
            "expected a JSON object, got {}",
            other.kind()
        ))),
    }
}

fn parse_key(text: &str) -> Result<Key> {
    parse_record(text).map(Key::from)
}

fn print_json(value: &Value) {
    println!("{}", value.to_json());
}

fn print_page(records: Vec<Record>, next_page_token: Option<String>) {
    for record in records {
        print_json(&Value::Map(record));
    }
    if let Some(token) = next_page_token {
        println!("next_page_token: {}", token);
    }
}
