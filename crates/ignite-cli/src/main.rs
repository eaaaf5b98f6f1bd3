//! ignite-cli — a thin command-line client over `ignite-client`.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_ADDR: &str = "127.0.0.1:10800";

fn print_usage() {
    println!("Usage: ignite-cli [--addr <host:port>] <command>");
    println!();
    println!("Key/Value");
    println!("  put <cache> <key> <value>      Put a value into a cache");
    println!("  get <cache> <key>               Read a value from a cache");
    println!();
    println!("SQL");
    println!("  sql <cache> <table> <query>     Run a table-qualified SQL query");
    println!();
    println!("Cluster");
    println!("  cluster-state                   Show the cluster's active state");
    println!("  cluster-state <state>           Set it (inactive, active, active-read-only)");
    println!();
    println!(
        "Options:\n  --addr <host:port>              Node address (default: {})",
        DEFAULT_ADDR
    );
    println!();
    println!("Examples:");
    println!("  ignite-cli put people 1 Alice");
    println!("  ignite-cli get people 1");
    println!("  ignite-cli sql people Person \"select * from Person\"");
    println!("  ignite-cli cluster-state active");
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut addr = DEFAULT_ADDR.to_owned();
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--addr" {
            i += 1;
            addr = args.get(i).context("--addr requires a value")?.clone();
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    match remaining_refs.as_slice() {
        ["put", cache, key, value] => cmd::put::run(&addr, cache, key, value),
        ["get", cache, key] => cmd::get::run(&addr, cache, key),
        ["sql", cache, table, query] => cmd::sql::run(&addr, cache, table, query),
        ["cluster-state"] => cmd::cluster_state::run(&addr, None),
        ["cluster-state", state] => cmd::cluster_state::run(&addr, Some(state)),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
