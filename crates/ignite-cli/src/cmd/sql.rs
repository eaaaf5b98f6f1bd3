//! `sql <cache> <table> <query...>`.

use anyhow::Result;

use ignite_client::request::sql::SqlQuery;

use super::client::{connect, print_value};

pub fn run(addr: &str, cache: &str, table: &str, query: &str) -> Result<()> {
    let client = connect(addr)?;
    let mut cursor = client.cache::<(), ()>(cache).query_sql(&SqlQuery::new(table, query))?;

    let mut rows = 0;
    while let Some((key, value)) = cursor.next()? {
        print!("key=");
        print_value(&key);
        print!("  value=");
        print_value(&value);
        rows += 1;
    }
    cursor.close()?;
    println!("({rows} row(s))");
    Ok(())
}
