//! Inspect and edit the persisted clipboard history
//!
//! Usage:
//!     clip-history [--config PATH] [--db PATH] [-v] <COMMAND>
//!
//! The database defaults to `storage.path` from the config file, or
//! `<data dir>/clip/history.db`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clip::config::Config;
use clip::database::Database;
use clip::models::Entry;
use clip::HistoryStore;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clip-history")]
#[command(version, about = "Clipboard history store", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// History database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show history, most recent first
    List {
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Case-insensitive substring search
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Record a value (reads stdin when TEXT is omitted)
    Add { text: Option<String> },
    /// Delete an unlocked entry
    Remove { id: i64 },
    /// Toggle the lock on an entry
    Lock { id: i64 },
    /// Toggle a single-character tag on an entry
    Tag { id: i64, tag: char },
    /// Delete every unlocked entry
    Clear,
    /// Entry counts and database size
    Stats,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("clip={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    let db_path = args.db.clone().unwrap_or_else(|| config.storage.resolved_path());
    let database = Database::open(&db_path)
        .with_context(|| format!("Failed to open history database: {}", db_path.display()))?;
    let db_size = database.database_size().unwrap_or(0);

    let mut store =
        HistoryStore::from_config(Box::new(database), &config).context("Failed to attach history store")?;
    let width = config.display.characters;

    match args.command {
        Command::List { limit, json } => {
            let entries = match limit {
                Some(limit) => store.recent(limit),
                None => store.get_list(),
            };
            print_entries(&entries, json, width)?;
        }
        Command::Search { query, json } => {
            print_entries(&store.search(&query), json, width)?;
        }
        Command::Add { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
                    buf
                }
            };
            let text = config.trim_mode.apply(&text).to_string();
            let mut entry = Entry::new_text(text);
            if !store.prepend(&mut entry) {
                bail!("Value was not recorded");
            }
            println!("{}", entry.id.unwrap_or_default());
        }
        Command::Remove { id } => {
            let entry = lookup(&store, id)?;
            if !store.remove(&entry) {
                bail!("Entry {} could not be removed (locked?)", id);
            }
        }
        Command::Lock { id } => {
            let mut entry = lookup(&store, id)?;
            if !store.toggle_lock(&mut entry) {
                bail!("Failed to toggle lock on entry {}", id);
            }
            println!("{}", if entry.locked { "locked" } else { "unlocked" });
        }
        Command::Tag { id, tag } => {
            let mut entry = lookup(&store, id)?;
            entry.tag = if entry.has_tag(tag) { None } else { Some(tag) };
            if !store.update(&mut entry) {
                bail!("Tag '{}' could not be applied to entry {}", tag, id);
            }
        }
        Command::Clear => {
            if !store.clear() {
                bail!("Failed to clear history");
            }
        }
        Command::Stats => {
            let entries = store.get_list();
            let locked = entries.iter().filter(|e| e.locked).count();
            let tagged = entries.iter().filter(|e| e.tag.is_some()).count();
            println!("database:  {}", db_path.display());
            println!("entries:   {} / {}", entries.len(), store.capacity());
            println!("locked:    {}", locked);
            println!("tagged:    {}", tagged);
            println!("size:      {} bytes", db_size);
        }
    }

    store.close();
    Ok(())
}

fn lookup(store: &HistoryStore, id: i64) -> Result<Entry> {
    store.find(id).with_context(|| format!("No history entry with id {}", id))
}

fn print_entries(entries: &[Entry], json: bool, width: usize) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    for entry in entries {
        let flags = format!(
            "{}{}{}",
            if entry.locked { 'L' } else { '-' },
            if entry.masked { 'M' } else { '-' },
            entry.tag.unwrap_or('-'),
        );
        println!(
            "{:>6} {:>4} {} {}",
            entry.id.unwrap_or_default(),
            entry.usage_count,
            flags,
            entry.display_text(width)
        );
    }
    Ok(())
}
