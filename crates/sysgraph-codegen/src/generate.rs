//! Expression and statement generation over the graph.
//!
//! Values are pulled: a consumer asks for the expression feeding one of its
//! inputs, which resolves through (in order) a capture redirect, the
//! source's registered thunk, or the source node's own value code. Flow is
//! pushed: a flow output generates every node it is wired to, in target
//! order. Nodes reached twice are generated at each reach; a node reached
//! again while it is still being generated closes a cycle, which is cut.

use sysgraph_check::DiagnosticKind;
use sysgraph_core::{NodeId, PortRef};

use crate::context::{AccessContext, CompileContext, Scope};
use crate::emit;
use crate::error::CodegenError;
use crate::nodes;

fn port_label(ctx: &CompileContext<'_>, port: PortRef) -> String {
    ctx.graph
        .port(port)
        .map_or_else(|| port.to_string(), |p| p.name.clone())
}

/// Expression feeding `input`, in the current access context.
pub(crate) fn input_value(
    ctx: &mut CompileContext<'_>,
    input: PortRef,
) -> Result<String, CodegenError> {
    if let Some(field) = ctx.redirect_for(input) {
        return Ok(field);
    }
    if matches!(ctx.state.scope, Scope::Job(_)) && ctx.is_unavailable(input) {
        return Ok(emit::placeholder(&port_label(ctx, input)));
    }
    match ctx.graph.source_of(input) {
        Some(source) => output_value(ctx, source),
        None => {
            let port = port_label(ctx, input);
            ctx.report(input.node, DiagnosticKind::UnresolvedValue { port: port.clone() });
            Ok(emit::placeholder(&port))
        }
    }
}

/// Expression for an output port, in the current access context.
pub(crate) fn output_value(
    ctx: &mut CompileContext<'_>,
    output: PortRef,
) -> Result<String, CodegenError> {
    if let Some(thunk) = ctx.thunk(output) {
        return Ok(thunk(&ctx.state));
    }
    nodes::value_code(ctx, output)
}

pub(crate) fn with_read<'g, R>(
    ctx: &mut CompileContext<'g>,
    f: impl FnOnce(&mut CompileContext<'g>) -> R,
) -> R {
    ctx.with_access(AccessContext::Read, f)
}

/// Reads the input named `port` on `node`.
pub(crate) fn read_input(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    port: &str,
) -> Result<String, CodegenError> {
    let input = ctx.graph.port_ref(node, port)?;
    ctx.with_access(AccessContext::Read, |ctx| input_value(ctx, input))
}

/// Resolves the input named `port` as an assignment target.
pub(crate) fn target_input(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    port: &str,
) -> Result<String, CodegenError> {
    let input = ctx.graph.port_ref(node, port)?;
    ctx.with_access(AccessContext::Set, |ctx| input_value(ctx, input))
}

/// Reads `port` if the node has it and it is connected.
pub(crate) fn optional_input(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    port: &str,
) -> Result<Option<String>, CodegenError> {
    let Ok(input) = ctx.graph.port_ref(node, port) else {
        return Ok(None);
    };
    if ctx.graph.source_of(input).is_none() && ctx.redirect_for(input).is_none() {
        return Ok(None);
    }
    read_input(ctx, node, port).map(Some)
}

/// Statements for everything wired to the flow output `output`.
pub(crate) fn flow(ctx: &mut CompileContext<'_>, output: PortRef) -> Result<String, CodegenError> {
    let mut parts = Vec::new();
    for target in ctx.graph.targets_of(output) {
        parts.push(node_flow(ctx, target.node)?);
    }
    Ok(emit::join_statements(parts))
}

/// Statements for the flow output named `port` on `node`.
pub(crate) fn follow(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    port: &str,
) -> Result<String, CodegenError> {
    let output = ctx.graph.port_ref(node, port)?;
    flow(ctx, output)
}

/// Statements for `node` and whatever follows it.
pub(crate) fn node_flow(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    if !ctx.enter_flow(node) {
        ctx.report(node, DiagnosticKind::FlowCycle { node });
        return Ok(String::new());
    }
    let result = nodes::flow_code(ctx, node);
    ctx.leave_flow();
    result
}
