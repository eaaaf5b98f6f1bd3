//! `get <cache> <key>`.

use anyhow::Result;

use super::client::{connect, parse_value, print_value};

pub fn run(addr: &str, cache: &str, key: &str) -> Result<()> {
    let client = connect(addr)?;
    match client.cache::<(), ()>(cache).get(parse_value(key))? {
        Some(value) => print_value(&value),
        None => println!("(not found)"),
    }
    Ok(())
}
