//! Entry points: lifecycle events and graph function entries.

use sysgraph_core::node::port_names as pn;
use sysgraph_core::{LifecycleEvent, MemberId, NodeId};
use tracing::debug;

use crate::context::{CompileContext, Handle};
use crate::error::CodegenError;
use crate::generate;
use crate::symbols::SymbolKey;

const TIME_PRIORITY: i32 = -900;

pub(super) fn initialize(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    event: LifecycleEvent,
) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let state = graph.port_ref(node, pn::STATE)?;
    ctx.set_fixed(state, ctx.state_name());

    if event != LifecycleEvent::Update {
        return Ok(());
    }
    for (port_name, expression) in [
        (pn::DELTA_TIME, "SystemAPI.Time.DeltaTime"),
        (pn::ELAPSED_TIME, "SystemAPI.Time.ElapsedTime"),
    ] {
        let port = graph.port_ref(node, port_name)?;
        if !graph.is_connected(port) {
            continue;
        }
        let name = ctx.symbols.register(SymbolKey::Port(port), port_name);
        ctx.method_mut(event.method_name())?
            .add_code(TIME_PRIORITY, format!("var {name} = {expression};"));
        ctx.set_fixed(port, name);
    }

    let manager = graph.port_ref(node, pn::ENTITY_MANAGER)?;
    if graph.is_connected(manager) {
        let name = ctx.root_handle(Handle::EntityManager)?;
        ctx.set_fixed(manager, name);
    }
    Ok(())
}

pub(super) fn generate(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    event: LifecycleEvent,
) -> Result<(), CodegenError> {
    let body = generate::follow(ctx, node, pn::EXIT)?;
    debug!(node = %node, method = event.method_name(), "generated event body");
    ctx.method_mut(event.method_name())?.add_code(0, body);
    Ok(())
}

/// Parameters of a graph function read as the names its method declares.
pub(super) fn initialize_function(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    function: MemberId,
) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let Some(func) = graph.function(function) else {
        return Ok(());
    };
    for (index, param) in func.params.iter().enumerate() {
        let Ok(index) = u16::try_from(index) else { break };
        let port = graph.port_ref(node, &param.name)?;
        if let Some(name) = ctx.symbols.get(&SymbolKey::Param(function, index)) {
            let name = name.to_string();
            ctx.set_fixed(port, name);
        }
    }
    Ok(())
}

pub(super) fn generate_function(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    function: MemberId,
) -> Result<(), CodegenError> {
    // Only the entry a function points at owns its body.
    if ctx.graph.function(function).and_then(|f| f.entry) != Some(node) {
        return Ok(());
    }
    let method = ctx
        .symbols
        .get(&SymbolKey::Member(function))
        .ok_or_else(|| CodegenError::InvalidGraph(format!("function {function} was never named")))?
        .to_string();
    let body = ctx.with_function(method.clone(), |ctx| generate::follow(ctx, node, pn::EXIT))?;
    ctx.method_mut(&method)?.add_code(0, body);
    Ok(())
}
