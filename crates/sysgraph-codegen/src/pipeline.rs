//! The registration pipeline.
//!
//! Phases run breadth-first across every participating node, in node id
//! order: pre-initialize, initialize, post-initialize, then entry generation.
//! The post-generation queue is drained last; a step may queue further
//! steps, which run after everything already queued.

use indexmap::IndexMap;
use sysgraph_check::DiagnosticKind;
use sysgraph_core::NodeId;
use tracing::debug;

use crate::context::CompileContext;
use crate::error::CodegenError;
use crate::nodes::{self, Capabilities, Capability};
use crate::system;

/// Capability tags of every node in the graph.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    tags: IndexMap<NodeId, Capabilities>,
}

impl CapabilityRegistry {
    pub fn build(graph: &sysgraph_core::SystemGraph) -> Self {
        let mut ids = graph.node_ids();
        ids.sort();
        let tags = ids
            .into_iter()
            .map(|id| (id, nodes::capabilities(graph, id)))
            .collect();
        CapabilityRegistry { tags }
    }

    /// Nodes carrying `capability`, in id order.
    pub fn with(&self, capability: Capability) -> Vec<NodeId> {
        self.tags
            .iter()
            .filter(|(_, tags)| tags.contains(&capability))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn has(&self, node: NodeId, capability: Capability) -> bool {
        self.tags
            .get(&node)
            .is_some_and(|tags| tags.contains(&capability))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

type Phase = for<'a, 'g> fn(&'a mut CompileContext<'g>, NodeId) -> Result<(), CodegenError>;

/// Runs every phase over the graph. Structural errors propagate; everything
/// else is reported to the context's analyzer.
pub(crate) fn run(ctx: &mut CompileContext<'_>) -> Result<(), CodegenError> {
    let registry = CapabilityRegistry::build(ctx.graph);
    system::pre_initialize(ctx)?;

    let phases: [(&str, Capability, Phase); 4] = [
        ("pre-initialize", Capability::PreInitialize, nodes::pre_initialize),
        ("initialize", Capability::Initialize, nodes::initialize),
        ("post-initialize", Capability::PostInitialize, nodes::post_initialize),
        ("entry", Capability::Entry, nodes::generate_entry),
    ];
    for (label, capability, phase) in phases {
        let participants = registry.with(capability);
        debug!(phase = label, nodes = participants.len(), "running phase");
        for node in participants {
            phase(ctx, node)?;
        }
    }

    drain_post_generation(ctx)
}

fn drain_post_generation(ctx: &mut CompileContext<'_>) -> Result<(), CodegenError> {
    let mut steps = 0usize;
    while let Some(step) = ctx.next_post_generation() {
        steps += 1;
        match (step.run)(ctx) {
            Ok(more) => {
                for next in more {
                    ctx.push_post_generation(next);
                }
            }
            Err(err) if err.is_structural() && step.nested.is_some() => {
                if let Some(node) = step.nested {
                    ctx.report(
                        node,
                        DiagnosticKind::NestedUnitFailed {
                            reason: err.to_string(),
                        },
                    );
                    ctx.failed.insert(node);
                }
            }
            Err(err) => return Err(err),
        }
    }
    debug!(steps, "post-generation drained");
    Ok(())
}
