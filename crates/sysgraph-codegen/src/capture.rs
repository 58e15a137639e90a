//! Dependency analysis for boundary nodes.
//!
//! A boundary node's body is generated into a synthesized type, so every
//! value the body reads from outside must be captured as a field. The
//! analysis splits the graph around the boundary:
//!
//! - **before**: everything the boundary depends on, found by walking all
//!   incoming connections backwards. These nodes run before the job is
//!   constructed, so their outputs can be captured.
//! - **after**: the body. Starts at the nodes wired to the body port and
//!   follows flow outputs plus any pure value producer the body reads,
//!   since those can be recomputed inside the job.
//!
//! A value read in **after** whose producer is in **before** is a crossing.
//! Crossings are keyed by source port so consumers of the same value share
//! one field. Any other outside producer is unavailable in the job and is
//! reported at the consumer.

use std::collections::{BTreeSet, VecDeque};

use indexmap::IndexMap;
use petgraph::visit::{Dfs, Reversed};
use sysgraph_core::{Member, MemberId, MemberTarget, NodeId, NodeKind, PortRef, SystemGraph};
use tracing::debug;

use crate::error::CodegenError;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryAnalysis {
    pub boundary: NodeId,
    pub body: PortRef,
    pub before: BTreeSet<NodeId>,
    pub after: BTreeSet<NodeId>,
    /// Source port to the consumer inputs reading it, in first-use order.
    pub crossings: IndexMap<PortRef, Vec<PortRef>>,
    /// `(consumer, source)` pairs whose source cannot reach the job.
    pub unavailable: Vec<(PortRef, PortRef)>,
    /// Instance variables the body reads, including property backing fields.
    pub members: BTreeSet<MemberId>,
    /// Instance properties the body reads, copied into the job.
    pub properties: BTreeSet<MemberId>,
    /// Instance functions called by the body, copied into the job.
    pub functions: BTreeSet<MemberId>,
}

/// Splits the graph around `boundary`, whose body hangs off `body`.
pub fn analyze_boundary(
    graph: &SystemGraph,
    boundary: NodeId,
    body: PortRef,
) -> Result<BoundaryAnalysis, CodegenError> {
    let entries = graph.targets_of(body);
    if entries.is_empty() {
        return Err(CodegenError::MissingBoundaryBody { node: boundary });
    }

    let before = upstream_of(graph, boundary);

    let mut after = BTreeSet::new();
    let mut queue: VecDeque<NodeId> = entries.iter().map(|p| p.node).collect();
    while let Some(id) = queue.pop_front() {
        if id == boundary || before.contains(&id) || !after.insert(id) {
            continue;
        }
        let Some(node) = graph.node(id) else { continue };
        for (output, target) in graph.outgoing(id) {
            if node.port(output.port).is_some_and(|p| p.is_flow()) {
                queue.push_back(target.node);
            }
        }
        for (input, source) in graph.incoming(id) {
            if !node.port(input.port).is_some_and(|p| p.is_value()) {
                continue;
            }
            let pure = graph.node(source.node).is_some_and(|n| n.is_pure_value());
            if pure && source.node != boundary && !before.contains(&source.node) {
                queue.push_back(source.node);
            }
        }
    }

    let mut crossings: IndexMap<PortRef, Vec<PortRef>> = IndexMap::new();
    let mut unavailable = Vec::new();
    for &id in &after {
        let Some(node) = graph.node(id) else { continue };
        for (input, source) in graph.incoming(id) {
            if !node.port(input.port).is_some_and(|p| p.is_value()) {
                continue;
            }
            if source.node == boundary || after.contains(&source.node) {
                continue;
            }
            if before.contains(&source.node) {
                crossings.entry(source).or_default().push(input);
            } else {
                unavailable.push((input, source));
            }
        }
    }

    let referenced = referenced_members(graph, &after);

    debug!(
        boundary = %boundary,
        before = before.len(),
        after = after.len(),
        crossings = crossings.len(),
        "analyzed boundary"
    );

    Ok(BoundaryAnalysis {
        boundary,
        body,
        before,
        after,
        crossings,
        unavailable,
        members: referenced.variables,
        properties: referenced.properties,
        functions: referenced.functions,
    })
}

/// Every node with a path into `boundary`, excluding the boundary.
fn upstream_of(graph: &SystemGraph, boundary: NodeId) -> BTreeSet<NodeId> {
    let g = graph.graph();
    let reversed = Reversed(g);
    let mut dfs = Dfs::new(reversed, boundary.into());
    let mut before = BTreeSet::new();
    while let Some(idx) = dfs.next(reversed) {
        before.insert(NodeId::from(idx));
    }
    before.remove(&boundary);
    before
}

#[derive(Default)]
struct Referenced {
    variables: BTreeSet<MemberId>,
    properties: BTreeSet<MemberId>,
    functions: BTreeSet<MemberId>,
}

/// Instance members reached from `nodes`, following calls into the bodies
/// of instance functions.
fn referenced_members(graph: &SystemGraph, nodes: &BTreeSet<NodeId>) -> Referenced {
    let mut found = Referenced::default();
    let mut pending: Vec<NodeId> = nodes.iter().copied().collect();
    while let Some(id) = pending.pop() {
        let Some(NodeKind::Member { target }) = graph.node(id).map(|n| &n.kind) else {
            continue;
        };
        let member = |m: &MemberId| graph.member(*m).filter(|member| !member.is_static());
        match target {
            MemberTarget::Variable(m) => {
                if member(m).is_some() {
                    found.variables.insert(*m);
                }
            }
            MemberTarget::Property(m) => {
                let Some(Member::Property(prop)) = member(m) else {
                    continue;
                };
                found.properties.insert(*m);
                if let Some(backing) = prop.backing.filter(|b| member(b).is_some()) {
                    found.variables.insert(backing);
                }
            }
            MemberTarget::Function(m) => {
                let Some(Member::Function(func)) = member(m) else {
                    continue;
                };
                if found.functions.insert(*m) {
                    pending.extend(graph.nodes_in(func.container));
                }
            }
            MemberTarget::External(_) => {}
        }
    }
    found
}
