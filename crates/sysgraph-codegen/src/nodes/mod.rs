//! Per-kind node behavior.
//!
//! Each node kind satisfies a set of [`Capability`] tags. The pipeline asks
//! [`capabilities`] once per node and then dispatches each phase only to the
//! nodes carrying the matching tag. Generation itself is demand-driven: flow
//! code through [`flow_code`], value expressions through [`value_code`].

mod entities;
mod events;
mod flow;
mod foreach;
mod jobs;
mod values;

use smallvec::SmallVec;
use sysgraph_check::DiagnosticKind;
use sysgraph_core::{MemberInvoke, MemberTarget, NodeId, NodeKind, PortRef, SystemGraph};

use crate::context::CompileContext;
use crate::emit;
use crate::error::CodegenError;

/// What a node takes part in during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Reserves names and claims a boundary before anything is named.
    PreInitialize,
    /// Names ports and registers their thunks.
    Initialize,
    /// Cross-node analysis once every name exists.
    PostInitialize,
    /// Starts generation of a method body.
    Entry,
    /// Emits statements when reached by flow.
    FlowCode,
    /// Produces an expression when one of its outputs is read.
    ValueCode,
    /// Compiles its body into a synthesized type.
    Boundary,
}

pub type Capabilities = SmallVec<[Capability; 4]>;

/// Capability tags for `node`.
pub fn capabilities(graph: &SystemGraph, node: NodeId) -> Capabilities {
    use Capability::*;
    let Some(n) = graph.node(node) else {
        return Capabilities::new();
    };
    let tags: &[Capability] = match &n.kind {
        NodeKind::Event(_) | NodeKind::FunctionEntry { .. } => &[Initialize, Entry],
        NodeKind::Return | NodeKind::SetValue | NodeKind::Branch => &[FlowCode],
        NodeKind::Local { .. } => &[Initialize, FlowCode],
        NodeKind::Literal { .. } | NodeKind::Operator { .. } => &[ValueCode],
        NodeKind::Member { target } => {
            if is_void_call(graph, target) {
                &[FlowCode]
            } else {
                &[ValueCode]
            }
        }
        NodeKind::EntitiesForeach(spec) if spec.run.is_deferred() => {
            &[PreInitialize, Initialize, PostInitialize, FlowCode, Boundary]
        }
        NodeKind::EntitiesForeach(_) => &[Initialize, FlowCode],
        NodeKind::JobEntity(_) | NodeKind::JobChunk(_) => {
            &[PreInitialize, Initialize, PostInitialize, Boundary]
        }
        NodeKind::JobExecutor { .. } => &[Initialize, FlowCode],
        NodeKind::CreateEntity
        | NodeKind::DestroyEntity
        | NodeKind::SetComponent { .. }
        | NodeKind::SetComponentEnabled { .. } => &[Initialize, FlowCode],
        NodeKind::GetComponent { .. } => &[Initialize, ValueCode],
    };
    tags.iter().copied().collect()
}

/// Void calls sit in the flow; everything else is an expression.
fn is_void_call(graph: &SystemGraph, target: &MemberTarget) -> bool {
    match target {
        MemberTarget::Function(id) => graph
            .function(*id)
            .is_some_and(|f| f.return_type.is_none()),
        MemberTarget::External(ext) => matches!(
            ext.invoke,
            MemberInvoke::Method { returns: None, .. }
        ),
        MemberTarget::Property(_) | MemberTarget::Variable(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Phase dispatch
// ---------------------------------------------------------------------------

pub(crate) fn pre_initialize(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    match &graph.require_node(node)?.kind {
        NodeKind::EntitiesForeach(_) => foreach::pre_initialize(ctx, node),
        NodeKind::JobEntity(_) | NodeKind::JobChunk(_) => jobs::pre_initialize(ctx, node),
        _ => Ok(()),
    }
}

pub(crate) fn initialize(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    match &graph.require_node(node)?.kind {
        NodeKind::Event(event) => events::initialize(ctx, node, *event),
        NodeKind::FunctionEntry { function } => events::initialize_function(ctx, node, *function),
        NodeKind::Local { name, .. } => flow::initialize_local(ctx, node, name),
        NodeKind::EntitiesForeach(spec) => foreach::initialize(ctx, node, spec),
        NodeKind::JobEntity(_) | NodeKind::JobChunk(_) => jobs::initialize(ctx, node),
        NodeKind::JobExecutor { .. } => jobs::initialize_executor(ctx, node),
        NodeKind::CreateEntity
        | NodeKind::DestroyEntity
        | NodeKind::SetComponent { .. }
        | NodeKind::SetComponentEnabled { .. }
        | NodeKind::GetComponent { .. } => entities::initialize(ctx, node),
        _ => Ok(()),
    }
}

pub(crate) fn post_initialize(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    if ctx.failed.contains(&node) || !ctx.boundaries.contains_key(&node) {
        return Ok(());
    }
    crate::job::build_descriptor(ctx, node)?;
    crate::job::schedule_synthesis(ctx, node);
    Ok(())
}

pub(crate) fn generate_entry(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    match &graph.require_node(node)?.kind {
        NodeKind::Event(event) => events::generate(ctx, node, *event),
        NodeKind::FunctionEntry { function } => events::generate_function(ctx, node, *function),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Statements for a node reached by flow, followed by whatever its flow
/// outputs lead to.
pub(crate) fn flow_code(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    let graph = ctx.graph;
    match &graph.require_node(node)?.kind {
        NodeKind::Return => flow::return_code(ctx, node),
        NodeKind::SetValue => flow::set_value(ctx, node),
        NodeKind::Branch => flow::branch(ctx, node),
        NodeKind::Local { ty, .. } => flow::local(ctx, node, ty),
        NodeKind::Member { target } => values::call_statement(ctx, node, target),
        NodeKind::EntitiesForeach(spec) => foreach::flow_code(ctx, node, spec),
        NodeKind::JobExecutor { run_with, job } => jobs::executor_flow(ctx, node, *run_with, *job),
        NodeKind::CreateEntity => entities::create(ctx, node),
        NodeKind::DestroyEntity => entities::destroy(ctx, node),
        NodeKind::SetComponent { .. } => entities::set_component(ctx, node),
        NodeKind::SetComponentEnabled { component } => {
            entities::set_enabled(ctx, node, component.as_ref())
        }
        _ => Ok(String::new()),
    }
}

/// Expression for `output` when no thunk was registered for it.
pub(crate) fn value_code(ctx: &mut CompileContext<'_>, output: PortRef) -> Result<String, CodegenError> {
    let graph = ctx.graph;
    match &graph.require_node(output.node)?.kind {
        NodeKind::Literal { value } => Ok(emit::literal(value)),
        NodeKind::Operator { op, .. } => values::operator(ctx, output.node, *op),
        NodeKind::Member { target } => values::member_value(ctx, output.node, target),
        NodeKind::GetComponent { component } => {
            entities::get_component(ctx, output.node, component.as_ref())
        }
        _ => {
            let port = graph
                .port(output)
                .map_or_else(|| output.to_string(), |p| p.name.clone());
            ctx.report(output.node, DiagnosticKind::UnresolvedValue { port: port.clone() });
            Ok(emit::placeholder(&port))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgraph_core::{
        Discipline, ExternalMember, ForeachSpec, GraphSettings, LifecycleEvent, TypeRef,
    };

    #[test]
    fn deferred_foreach_is_a_boundary() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        let run = g
            .add_node(
                "Inline",
                NodeKind::EntitiesForeach(ForeachSpec::new(vec![], Discipline::Run)),
                root,
            )
            .unwrap();
        let deferred = g
            .add_node(
                "Job",
                NodeKind::EntitiesForeach(ForeachSpec::new(vec![], Discipline::Schedule)),
                root,
            )
            .unwrap();
        assert!(!capabilities(&g, run).contains(&Capability::Boundary));
        let tags = capabilities(&g, deferred);
        assert!(tags.contains(&Capability::Boundary));
        assert!(tags.contains(&Capability::PreInitialize));
    }

    #[test]
    fn void_calls_are_flow() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        let log = g
            .add_node(
                "Log",
                NodeKind::Member {
                    target: MemberTarget::External(ExternalMember::static_method(
                        TypeRef::reference("Debug"),
                        "Log",
                        vec![("message".into(), TypeRef::reference("string"))],
                        None,
                    )),
                },
                root,
            )
            .unwrap();
        let length = g
            .add_node(
                "Length",
                NodeKind::Member {
                    target: MemberTarget::External(ExternalMember::static_method(
                        TypeRef::reference("math"),
                        "length",
                        vec![("v".into(), TypeRef::value_struct("float3"))],
                        Some(TypeRef::float()),
                    )),
                },
                root,
            )
            .unwrap();
        let update = g
            .add_node("Update", NodeKind::Event(LifecycleEvent::Update), root)
            .unwrap();
        assert_eq!(capabilities(&g, log).as_slice(), &[Capability::FlowCode]);
        assert_eq!(capabilities(&g, length).as_slice(), &[Capability::ValueCode]);
        assert!(capabilities(&g, update).contains(&Capability::Entry));
        assert!(capabilities(&g, NodeId(99)).is_empty());
    }
}
