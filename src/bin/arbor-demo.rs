//! arbor-demo - seeds an in-memory tree and runs a query against it

use anyhow::Context;
use arbordb::core::event_callback;
use arbordb::{init, Database, DataSnapshot, EventKind, Value};
use clap::Parser;
use serde_json::json;

#[derive(Parser)]
#[command(name = "arbor-demo")]
#[command(about = "ArborDB demo - query a seeded in-memory tree", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Child key to filter on
    #[arg(short, long, default_value = "age")]
    key: String,

    /// Filter operator, e.g. ">=", "between", "like"
    #[arg(short, long, default_value = ">=")]
    op: String,

    /// Filter operand, parsed as JSON (falls back to a plain string)
    #[arg(short, long, default_value = "30")]
    value: String,

    /// Sort key (ascending unless --desc is given)
    #[arg(long)]
    order: Option<String>,

    #[arg(long)]
    desc: bool,

    /// Maximum number of results (0 = all)
    #[arg(short, long, default_value_t = 0)]
    take: usize,

    /// Print every event seen on the seeded collection
    #[arg(long)]
    watch: bool,
}

fn operand(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

async fn seed(db: &Database) -> arbordb::Result<()> {
    let people = db.reference("people");
    for person in [
        json!({"name": "Ann", "age": 31, "city": "Ghent"}),
        json!({"name": "Bob", "age": 25, "city": "Bruges"}),
        json!({"name": "Cleo", "age": 42, "city": "Ghent"}),
        json!({"name": "Dirk", "age": 38, "city": "Antwerp"}),
        json!({"name": "Eve", "age": 19, "city": "Leuven"}),
    ] {
        people.push_with(Value::from(person)).await?;
    }
    Ok(())
}

fn print_snapshot(snap: &DataSnapshot) {
    let json = arbordb::transport::serialize(snap.val()).val;
    println!("  {} = {}", snap.reference().path(), json);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = init(cli.config.as_deref()).context("failed to initialize")?;
    let db = Database::open(config).context("failed to open database")?;

    if cli.watch {
        db.reference("people")
            .on(
                EventKind::ChildAdded,
                Some(event_callback(|snap| {
                    println!("child_added:");
                    print_snapshot(snap);
                })),
            )
            .await?;
    }
    seed(&db).await?;

    let mut query = db
        .query("people")
        .filter(&cli.key, cli.op.as_str(), operand(&cli.value))?;
    if let Some(key) = &cli.order {
        query = query.order(key, !cli.desc)?;
    }
    if cli.take > 0 {
        query = query.take(cli.take)?;
    }

    let results = query.get().await?;
    println!(
        "{} {} {} matched {} of 5 people:",
        cli.key,
        cli.op,
        cli.value,
        results.len()
    );
    for snap in &results {
        print_snapshot(snap);
    }
    Ok(())
}
