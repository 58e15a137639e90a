//! Connection edges between node ports.
//!
//! Value connections carry data from an output to an input and form a DAG
//! per evaluation. Flow connections sequence statements and may branch and
//! merge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    Value,
    Flow,
}

/// Edge weight in the graph: which port on each endpoint is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Output port index on the source node.
    pub from_port: u16,
    /// Input port index on the target node.
    pub to_port: u16,
    pub kind: ConnectionKind,
}

impl Connection {
    pub fn value(from_port: u16, to_port: u16) -> Self {
        Connection {
            from_port,
            to_port,
            kind: ConnectionKind::Value,
        }
    }

    pub fn flow(from_port: u16, to_port: u16) -> Self {
        Connection {
            from_port,
            to_port,
            kind: ConnectionKind::Flow,
        }
    }

    pub fn is_value(&self) -> bool {
        self.kind == ConnectionKind::Value
    }

    pub fn is_flow(&self) -> bool {
        self.kind == ConnectionKind::Flow
    }
}
