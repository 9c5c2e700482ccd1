//! chainreduce CLI — inspect engine defaults and replay event files.
//!
//! Usage:
//! ```bash
//! chainreduce info
//! chainreduce replay events.json
//! ```

use std::env;
use std::process;
use std::sync::Arc;

use chainreduce_core::{ReduceConfig, ReduceService};
use chainreduce_entities::balance::{balance_router, BalanceEvent};
use chainreduce_storage::MemoryEntityStore;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "info" => cmd_info(),
        "replay" => {
            if args.len() < 3 {
                eprintln!("replay requires a path to an events JSON file");
                process::exit(1);
            }
            if let Err(err) = cmd_replay(&args[2]) {
                eprintln!("replay failed: {err}");
                process::exit(1);
            }
        }
        "version" | "--version" | "-V" => {
            println!("chainreduce {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("chainreduce {}", env!("CARGO_PKG_VERSION"));
    println!("Reorg-safe entity reduction engine for blockchain indexers\n");
    println!("USAGE:");
    println!("    chainreduce <COMMAND>\n");
    println!("COMMANDS:");
    println!("    info            Show chainreduce configuration info");
    println!("    replay <file>   Fold a JSON array of balance events and print the results");
    println!("    version         Print version");
    println!("    help            Print this help");
}

fn cmd_info() {
    let config = ReduceConfig::default();
    println!("chainreduce v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default confirmation depth: {} blocks", config.confirmation_depth);
    println!("  Default retained-event cap: {} per entity", config.max_retained_events);
    println!("  Default optimistic save attempts: {}", config.max_save_attempts);
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
    println!("  Entity families: balance, item, ownership, collection, order, auction");
}

fn cmd_replay(path: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let events: Vec<BalanceEvent> = serde_json::from_str(&raw)?;

    let config = ReduceConfig::default();
    let service = ReduceService::new(
        balance_router(&config),
        Arc::new(MemoryEntityStore::new()),
        config,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let balances = runtime.block_on(service.handle_batch(&events))?;

    println!("Replayed {} events into {} balances:", events.len(), balances.len());
    for balance in balances {
        println!(
            "  {}  balance={}  allowance={}  version={}{}",
            balance.id,
            balance.balance,
            balance.allowance,
            balance.version,
            if balance.deleted { "  (deleted)" } else { "" }
        );
    }
    Ok(())
}
