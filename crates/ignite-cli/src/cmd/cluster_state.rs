//! `cluster-state [new-state]`.

use anyhow::{bail, Result};

use ignite_client::request::cluster::ClusterState;

use super::client::connect;

pub fn run(addr: &str, new_state: Option<&str>) -> Result<()> {
    let client = connect(addr)?;

    let Some(new_state) = new_state else {
        println!("{:?}", client.cluster_state()?);
        return Ok(());
    };

    let state = match new_state.to_ascii_lowercase().as_str() {
        "inactive" => ClusterState::Inactive,
        "active" => ClusterState::Active,
        "active-read-only" | "active_read_only" => ClusterState::ActiveReadOnly,
        other => bail!("unknown cluster state: {other} (expected inactive, active, active-read-only)"),
    };
    client.set_cluster_state(state)?;
    println!("OK");
    Ok(())
}
