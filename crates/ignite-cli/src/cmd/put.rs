//! `put <cache> <key> <value>`.

use anyhow::Result;

use super::client::{connect, parse_value};

pub fn run(addr: &str, cache: &str, key: &str, value: &str) -> Result<()> {
    let client = connect(addr)?;
    client.cache::<(), ()>(cache).put(parse_value(key), parse_value(value))?;
    println!("OK");
    Ok(())
}
