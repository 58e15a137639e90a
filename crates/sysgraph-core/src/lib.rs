//! Graph model for entity/component system graphs.
//!
//! A [`SystemGraph`] holds nodes, typed ports and the connections between
//! them, plus the members (functions, properties, variables) and settings of
//! the unit it compiles to. The model is inert: it validates shape on
//! construction and answers queries, and the compiler in `sysgraph-codegen`
//! walks it without mutating it.

pub mod container;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod member;
pub mod node;
pub mod port;
pub mod query;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use container::{ContainerKind, ContainerTree};
pub use edge::{Connection, ConnectionKind};
pub use error::CoreError;
pub use graph::SystemGraph;
pub use id::{ContainerId, EdgeId, MemberId, NodeId};
pub use member::{GraphFunction, GraphProperty, GraphVariable, Member, Parameter};
pub use node::{
    port_names, BinaryOp, ExternalMember, LifecycleEvent, MemberInvoke, MemberTarget, Node,
    NodeKind,
};
pub use port::{PortAccess, PortDef, PortDirection, PortKind, PortRef};
pub use query::{
    Discipline, EntityIndexKind, ForeachSpec, ItemAccess, JobChunkSpec, JobEntitySpec,
    JobVariable, QueryFilters, QueryItem,
};
pub use settings::{GraphSettings, TypeModifier, UnitFlavor};
pub use types::{LiteralValue, TypeClass, TypeRef};
