//! User-declared jobs and their executors.

use sysgraph_check::DiagnosticKind;
use sysgraph_core::node::port_names as pn;
use sysgraph_core::{Discipline, NodeId, NodeKind, PortRef};
use tracing::debug;

use crate::capture::analyze_boundary;
use crate::context::CompileContext;
use crate::emit;
use crate::error::CodegenError;
use crate::generate;
use crate::job::{self, JobContract};
use crate::symbols::{type_name, variable_name, SymbolKey};

/// Analyzes the body hanging off `body` and claims it for `node`. A body
/// that cannot be compiled drops the job type but not the unit.
pub(super) fn claim_boundary(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    body: &str,
) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let body = graph.port_ref(node, body)?;
    match analyze_boundary(graph, node, body) {
        Ok(analysis) => {
            ctx.register_boundary(analysis);
            Ok(())
        }
        Err(err) if err.is_structural() => {
            ctx.report(
                node,
                DiagnosticKind::NestedUnitFailed {
                    reason: err.to_string(),
                },
            );
            ctx.failed.insert(node);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Names every value output of a boundary node after its port. Inside the
/// job these are parameters or fields and read the same in any context.
pub(super) fn name_outputs(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let n = graph.require_node(node)?;
    for (index, port) in n.indexed_ports() {
        if !(port.is_value() && port.is_output()) {
            continue;
        }
        let port_ref = PortRef::new(node, index);
        let name = ctx
            .symbols
            .register(SymbolKey::Port(port_ref), &variable_name(&port.name));
        ctx.set_fixed(port_ref, name);
    }
    Ok(())
}

pub(super) fn pre_initialize(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let n = graph.require_node(node)?;
    ctx.symbols
        .register(SymbolKey::Node { node, role: "type" }, &type_name(&n.name));
    claim_boundary(ctx, node, pn::EXECUTE)
}

pub(super) fn initialize(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    name_outputs(ctx, node)
}

pub(super) fn initialize_executor(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let (run_with, job) = match &graph.require_node(node)?.kind {
        NodeKind::JobExecutor { run_with, job } => (*run_with, *job),
        _ => return Ok(()),
    };
    let job_type = job.and_then(|job| ctx.symbols.get(&SymbolKey::Node { node: job, role: "type" }));
    if let Some(job_type) = job_type {
        let hint = variable_name(job_type);
        ctx.symbols
            .register(SymbolKey::Node { node, role: "job" }, &hint);
    }

    let handle = graph.port_ref(node, pn::JOB_HANDLE)?;
    if graph.is_connected(handle) {
        if run_with == Discipline::Run {
            ctx.report(node, DiagnosticKind::RunHasNoJobHandle);
            ctx.set_fixed(handle, "default(JobHandle)");
        } else {
            let name = ctx.symbols.register(SymbolKey::Port(handle), pn::JOB_HANDLE);
            ctx.set_fixed(handle, name);
        }
    }
    Ok(())
}

/// Constructs the job from the executor's inputs and runs or schedules it.
pub(super) fn executor_flow(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    run_with: Discipline,
    job: Option<NodeId>,
) -> Result<String, CodegenError> {
    let Some(desc) = job.and_then(|job| ctx.jobs.get(&job)).cloned() else {
        return generate::follow(ctx, node, pn::EXIT);
    };

    let query = generate::optional_input(ctx, node, pn::QUERY)?;
    if desc.contract == JobContract::Chunk && query.is_none() {
        ctx.report(node, DiagnosticKind::QueryRequired);
    }
    let instance = ctx
        .symbols
        .register(SymbolKey::Node { node, role: "job" }, &variable_name(&desc.type_name));
    let fields = job::construction_fields(ctx, &desc, Some(node))?;
    let construct = emit::declare_variable(
        None,
        &instance,
        Some(&emit::new_object(&desc.type_name, &fields)),
    );

    let mut args: Vec<String> = query.into_iter().collect();
    if run_with.is_deferred() {
        args.extend(generate::optional_input(ctx, node, pn::DEPENDS_ON)?);
    }
    if run_with.is_parallel() {
        args.extend(generate::optional_input(ctx, node, pn::CHUNK_BASE_ENTITY_INDICES)?);
    }
    let call = emit::invoke(Some(&instance), run_with.method_name(), &[], &args);

    let handle = ctx.graph.port_ref(node, pn::JOB_HANDLE)?;
    let run = match ctx.symbols.get(&SymbolKey::Port(handle)) {
        Some(name) if run_with.is_deferred() => emit::declare_variable(None, name, Some(&call)),
        _ => emit::statement(&call),
    };
    debug!(node = %node, job = %desc.type_name, method = run_with.method_name(), "executor");
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([construct, run, next]))
}
