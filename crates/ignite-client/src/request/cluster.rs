//! Cluster administration: read and change the cluster's active state.

use crate::connection::Connection;
use crate::dispatch::{self, AsClusterError};
use crate::error::Result;
use crate::frame::{self, op_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Inactive = 0,
    Active = 1,
    ActiveReadOnly = 2,
}

impl ClusterState {
    fn from_wire(v: i32) -> Result<Self> {
        match v {
            0 => Ok(Self::Inactive),
            1 => Ok(Self::Active),
            2 => Ok(Self::ActiveReadOnly),
            other => Err(crate::error::IgniteError::ProtocolViolation(format!("unknown cluster state {other}"))),
        }
    }
}

pub fn get_state(connection: &Connection) -> Result<ClusterState> {
    let body = frame::request_header(op_code::CLUSTER_GET_STATE, connection.next_query_id());
    let mut stream = dispatch::round_trip::<AsClusterError>(connection, frame::finish_request(body))?;
    ClusterState::from_wire(stream.read_i32_le()?)
}

pub fn change_state(connection: &Connection, state: ClusterState) -> Result<()> {
    let mut body = frame::request_header(op_code::CLUSTER_CHANGE_STATE, connection.next_query_id());
    body.write_i32_le(state as i32);
    dispatch::round_trip::<AsClusterError>(connection, frame::finish_request(body))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_state_rejects_unknown_wire_values() {
        assert!(ClusterState::from_wire(99).is_err());
        assert_eq!(ClusterState::from_wire(1).unwrap(), ClusterState::Active);
    }
}
