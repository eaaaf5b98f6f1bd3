//! Async cluster administration, mirroring `crate::request::cluster`.

use crate::error::Result;
use crate::frame::{self, op_code};

use super::super::connection::Connection;
use super::super::dispatch::{self, AsClusterError};

pub use crate::request::cluster::ClusterState;

pub async fn get_state(connection: &Connection) -> Result<ClusterState> {
    let body = frame::request_header(op_code::CLUSTER_GET_STATE, connection.next_query_id());
    let mut stream = dispatch::round_trip::<AsClusterError>(connection, frame::finish_request(body)).await?;
    from_wire(stream.read_i32_le()?)
}

pub async fn change_state(connection: &Connection, state: ClusterState) -> Result<()> {
    let mut body = frame::request_header(op_code::CLUSTER_CHANGE_STATE, connection.next_query_id());
    body.write_i32_le(state as i32);
    dispatch::round_trip::<AsClusterError>(connection, frame::finish_request(body)).await?;
    Ok(())
}

fn from_wire(v: i32) -> Result<ClusterState> {
    match v {
        0 => Ok(ClusterState::Inactive),
        1 => Ok(ClusterState::Active),
        2 => Ok(ClusterState::ActiveReadOnly),
        other => Err(crate::error::IgniteError::ProtocolViolation(format!("unknown cluster state {other}"))),
    }
}
