//! SystemGraph: the node/port/connection model handed to the compiler.
//!
//! [`SystemGraph`] is the single entry point for constructing and querying a
//! graph. Nodes and connections live in a petgraph `StableGraph` so IDs stay
//! valid across removals; members and containers live in dense side tables
//! indexed by their IDs. All mutations go through builder methods that
//! validate ports and connection shape, so the compiler can rely on:
//!
//! - every connection links an output to an input of the same kind,
//! - a value input has at most one incoming connection,
//! - every node's container and every member reference exists.
//!
//! Query methods return results sorted by ID so traversals are deterministic.

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::container::{ContainerKind, ContainerTree};
use crate::edge::{Connection, ConnectionKind};
use crate::error::CoreError;
use crate::id::{ContainerId, EdgeId, MemberId, NodeId};
use crate::member::{GraphFunction, GraphProperty, GraphVariable, Member, Parameter};
use crate::node::{Node, NodeKind};
use crate::port::{PortDef, PortRef};
use crate::settings::GraphSettings;
use crate::types::TypeRef;

/// The graph of one compilation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemGraph {
    graph: StableGraph<Node, Connection, Directed, u32>,
    containers: ContainerTree,
    /// Indexed by `MemberId`.
    members: Vec<Member>,
    /// Unit-level configuration; read-only to the compiler.
    pub settings: GraphSettings,
}

impl SystemGraph {
    /// Creates an empty graph with only the root container.
    pub fn new(settings: GraphSettings) -> Self {
        SystemGraph {
            graph: StableGraph::new(),
            containers: ContainerTree::new(),
            members: Vec::new(),
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Returns a read-only reference to the underlying petgraph.
    pub fn graph(&self) -> &StableGraph<Node, Connection, Directed, u32> {
        &self.graph
    }

    pub fn containers(&self) -> &ContainerTree {
        &self.containers
    }

    pub fn root_container(&self) -> ContainerId {
        self.containers.root_id()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(id.0 as usize)
    }

    /// Iterates `(id, member)` pairs in declaration order.
    pub fn indexed_members(&self) -> impl Iterator<Item = (MemberId, &Member)> {
        self.members
            .iter()
            .enumerate()
            .map(|(i, m)| (MemberId(i as u32), m))
    }

    pub fn function(&self, id: MemberId) -> Option<&GraphFunction> {
        self.member(id).and_then(Member::as_function)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id.into())
    }

    /// Like [`node`](Self::node) but returns an error for missing nodes.
    pub fn require_node(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.node(id).ok_or(CoreError::NodeNotFound { id })
    }

    /// All node IDs in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.graph.node_indices().map(NodeId::from).collect();
        ids.sort();
        ids
    }

    /// Nodes placed directly in `container`, ascending.
    pub fn nodes_in(&self, container: ContainerId) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|n| n.container == container))
            .collect()
    }

    /// Nodes whose kind satisfies `pred`, ascending.
    pub fn find_nodes(&self, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|n| pred(&n.kind)))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // -----------------------------------------------------------------------
    // Member methods
    // -----------------------------------------------------------------------

    /// Declares a function and creates the container for its body.
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<Parameter>,
        return_type: Option<TypeRef>,
        is_static: bool,
    ) -> Result<MemberId, CoreError> {
        let id = MemberId(self.members.len() as u32);
        let container = self
            .containers
            .add_container(ContainerKind::Function(id), self.containers.root_id())?;
        self.members.push(Member::Function(GraphFunction {
            name: name.into(),
            params,
            return_type,
            is_static,
            container,
            entry: None,
        }));
        Ok(id)
    }

    pub fn add_variable(&mut self, variable: GraphVariable) -> MemberId {
        let id = MemberId(self.members.len() as u32);
        self.members.push(Member::Variable(variable));
        id
    }

    /// Declares a property. A backing member must be a variable.
    pub fn add_property(&mut self, property: GraphProperty) -> Result<MemberId, CoreError> {
        if let Some(backing) = property.backing {
            if self.member(backing).and_then(Member::as_variable).is_none() {
                return Err(CoreError::MemberNotFound { id: backing });
            }
        }
        let id = MemberId(self.members.len() as u32);
        self.members.push(Member::Property(property));
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Node methods
    // -----------------------------------------------------------------------

    /// Adds a node to `container`, computing its ports from `kind`.
    ///
    /// A `FunctionEntry` node becomes the entry of its function; a function
    /// may have only one. An executor may only reference a job node.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        container: ContainerId,
    ) -> Result<NodeId, CoreError> {
        if !self.containers.contains(container) {
            return Err(CoreError::ContainerNotFound { id: container });
        }

        let job_kind = match &kind {
            NodeKind::JobExecutor { job: Some(job), .. } => {
                let job_node = self.require_node(*job)?;
                if !job_node.kind.is_job() {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("executor references node {job}, which is not a job"),
                    });
                }
                Some(&job_node.kind)
            }
            _ => None,
        };
        let ports = kind.ports(&self.members, job_kind)?;

        if let NodeKind::FunctionEntry { function } = &kind {
            let func = self
                .function(*function)
                .ok_or(CoreError::MemberNotFound { id: *function })?;
            if func.entry.is_some() {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("function '{}' already has an entry node", func.name),
                });
            }
        }

        let function_entry = match &kind {
            NodeKind::FunctionEntry { function } => Some(*function),
            _ => None,
        };

        let idx = self.graph.add_node(Node::new(name, kind, container, ports));
        let id = NodeId::from(idx);

        if let Some(function) = function_entry {
            if let Some(Member::Function(func)) = self.members.get_mut(function.0 as usize) {
                func.entry = Some(id);
            }
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Port and connection methods
    // -----------------------------------------------------------------------

    /// Resolves a port by name.
    pub fn port_ref(&self, node: NodeId, name: &str) -> Result<PortRef, CoreError> {
        let port = self
            .require_node(node)?
            .port_index(name)
            .ok_or_else(|| CoreError::PortNotFound {
                node,
                port: name.to_string(),
            })?;
        Ok(PortRef::new(node, port))
    }

    pub fn port(&self, port: PortRef) -> Option<&PortDef> {
        self.node(port.node).and_then(|n| n.port(port.port))
    }

    /// Connects two ports by name.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> Result<EdgeId, CoreError> {
        let from = self.port_ref(from, from_port)?;
        let to = self.port_ref(to, to_port)?;
        self.connect_ports(from, to)
    }

    /// Connects an output port to an input port.
    ///
    /// Both ports must exist, have matching kinds, and point the right way.
    /// A value input that is already connected is rejected.
    pub fn connect_ports(&mut self, from: PortRef, to: PortRef) -> Result<EdgeId, CoreError> {
        let source = self.port(from).ok_or_else(|| CoreError::PortNotFound {
            node: from.node,
            port: from.port.to_string(),
        })?;
        let target = self.port(to).ok_or_else(|| CoreError::PortNotFound {
            node: to.node,
            port: to.port.to_string(),
        })?;

        if !source.is_output() || !target.is_input() {
            return Err(CoreError::InvalidConnection {
                reason: format!(
                    "connection must run from an output to an input ('{}' -> '{}')",
                    source.name, target.name
                ),
            });
        }
        let kind = match (source.is_flow(), target.is_flow()) {
            (true, true) => ConnectionKind::Flow,
            (false, false) => ConnectionKind::Value,
            _ => {
                return Err(CoreError::InvalidConnection {
                    reason: format!(
                        "cannot connect flow and value ports ('{}' -> '{}')",
                        source.name, target.name
                    ),
                })
            }
        };
        if kind == ConnectionKind::Value {
            if from.node == to.node {
                return Err(CoreError::InvalidConnection {
                    reason: format!("node {} cannot feed its own input", from.node),
                });
            }
            if self.source_of(to).is_some() {
                return Err(CoreError::InvalidConnection {
                    reason: format!(
                        "value input '{}' on node {} is already connected",
                        target.name, to.node
                    ),
                });
            }
        }

        let weight = Connection {
            from_port: from.port,
            to_port: to.port,
            kind,
        };
        let idx = self.graph.add_edge(from.node.into(), to.node.into(), weight);
        Ok(EdgeId::from(idx))
    }

    /// Removes a connection, returning its weight.
    pub fn disconnect(&mut self, id: EdgeId) -> Result<Connection, CoreError> {
        let idx: EdgeIndex<u32> = id.into();
        self.graph
            .remove_edge(idx)
            .ok_or_else(|| CoreError::InvalidConnection {
                reason: format!("connection not found: EdgeId({})", id.0),
            })
    }

    /// The output port feeding `input`, if connected.
    pub fn source_of(&self, input: PortRef) -> Option<PortRef> {
        let idx: NodeIndex<u32> = input.node.into();
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().to_port == input.port)
            .map(|e| PortRef::new(NodeId::from(e.source()), e.weight().from_port))
            .min()
    }

    /// All sources feeding `input`, ascending. Flow inputs may have several.
    pub fn sources_of(&self, input: PortRef) -> Vec<PortRef> {
        let idx: NodeIndex<u32> = input.node.into();
        let mut sources: Vec<PortRef> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().to_port == input.port)
            .map(|e| PortRef::new(NodeId::from(e.source()), e.weight().from_port))
            .collect();
        sources.sort();
        sources
    }

    /// Input ports fed by `output`, ascending.
    pub fn targets_of(&self, output: PortRef) -> Vec<PortRef> {
        let idx: NodeIndex<u32> = output.node.into();
        let mut targets: Vec<PortRef> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().from_port == output.port)
            .map(|e| PortRef::new(NodeId::from(e.target()), e.weight().to_port))
            .collect();
        targets.sort();
        targets
    }

    /// Returns `true` if any connection touches `port`.
    pub fn is_connected(&self, port: PortRef) -> bool {
        match self.port(port) {
            Some(def) if def.is_input() => !self.sources_of(port).is_empty(),
            Some(_) => !self.targets_of(port).is_empty(),
            None => false,
        }
    }

    /// Connected inputs of `node` as `(input, source)` pairs, by port index.
    pub fn incoming(&self, node: NodeId) -> Vec<(PortRef, PortRef)> {
        let idx: NodeIndex<u32> = node.into();
        let mut pairs: Vec<(PortRef, PortRef)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| {
                (
                    PortRef::new(node, e.weight().to_port),
                    PortRef::new(NodeId::from(e.source()), e.weight().from_port),
                )
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Connected outputs of `node` as `(output, target)` pairs, by port index.
    pub fn outgoing(&self, node: NodeId) -> Vec<(PortRef, PortRef)> {
        let idx: NodeIndex<u32> = node.into();
        let mut pairs: Vec<(PortRef, PortRef)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| {
                (
                    PortRef::new(node, e.weight().from_port),
                    PortRef::new(NodeId::from(e.target()), e.weight().to_port),
                )
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Executors referencing `job`, ascending.
    pub fn executors_of(&self, job: NodeId) -> Vec<NodeId> {
        self.find_nodes(|kind| {
            matches!(kind, NodeKind::JobExecutor { job: Some(j), .. } if *j == job)
        })
    }
}
