//! Ports: typed attachment points on nodes.
//!
//! A node's ports are fixed when the node is added to the graph and are
//! addressed by position ([`PortRef`]). Value ports carry a type and an access
//! mode; flow ports carry control sequencing only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::types::TypeRef;

/// Names treated as a node's primary value output.
pub const PRIMARY_OUTPUT_NAMES: [&str; 2] = ["Out", "Output"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// Whether a value port may be used as an assignment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortAccess {
    ReadOnly,
    ReadWrite,
}

/// Flow or value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    /// Control sequencing.
    Flow,
    /// A typed value. `ty` is `None` while the type is unassigned.
    Value {
        ty: Option<TypeRef>,
        access: PortAccess,
    },
}

/// A declared port on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDef {
    pub name: String,
    pub direction: PortDirection,
    pub kind: PortKind,
}

impl PortDef {
    pub fn flow_in(name: impl Into<String>) -> Self {
        PortDef {
            name: name.into(),
            direction: PortDirection::Input,
            kind: PortKind::Flow,
        }
    }

    pub fn flow_out(name: impl Into<String>) -> Self {
        PortDef {
            name: name.into(),
            direction: PortDirection::Output,
            kind: PortKind::Flow,
        }
    }

    pub fn value_in(name: impl Into<String>, ty: Option<TypeRef>) -> Self {
        PortDef {
            name: name.into(),
            direction: PortDirection::Input,
            kind: PortKind::Value {
                ty,
                access: PortAccess::ReadOnly,
            },
        }
    }

    pub fn value_out(name: impl Into<String>, ty: Option<TypeRef>, access: PortAccess) -> Self {
        PortDef {
            name: name.into(),
            direction: PortDirection::Output,
            kind: PortKind::Value { ty, access },
        }
    }

    pub fn is_flow(&self) -> bool {
        matches!(self.kind, PortKind::Flow)
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, PortKind::Value { .. })
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }

    /// The declared value type, if this is a typed value port.
    pub fn value_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            PortKind::Value { ty, .. } => ty.as_ref(),
            PortKind::Flow => None,
        }
    }

    /// Returns `true` for a value port that accepts writes.
    pub fn is_writable(&self) -> bool {
        matches!(
            self.kind,
            PortKind::Value {
                access: PortAccess::ReadWrite,
                ..
            }
        )
    }

    /// Returns `true` if this is the node's main value output.
    pub fn is_primary_output(&self) -> bool {
        self.is_output() && self.is_value() && PRIMARY_OUTPUT_NAMES.contains(&self.name.as_str())
    }
}

/// Address of a single port: node plus port position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub port: u16,
}

impl PortRef {
    pub fn new(node: NodeId, port: u16) -> Self {
        PortRef { node, port }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}
