//! Core error types for sysgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of building and querying a [`SystemGraph`](crate::SystemGraph).

use crate::id::{ContainerId, MemberId, NodeId};
use thiserror::Error;

/// Core errors produced by the sysgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node index was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A container ID was not found in the container tree.
    #[error("container not found: ContainerId({id})", id = id.0)]
    ContainerNotFound { id: ContainerId },

    /// A member ID was not found, or names a member of the wrong kind.
    #[error("member not found: MemberId({id})", id = id.0)]
    MemberNotFound { id: MemberId },

    /// A node has no port with the given name or index.
    #[error("node {node} has no port '{port}'")]
    PortNotFound { node: NodeId, port: String },

    /// A connection failed validation.
    #[error("invalid connection: {reason}")]
    InvalidConnection { reason: String },

    /// A structural invariant of the graph was violated.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}
