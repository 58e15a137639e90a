//! Structural changes through the command buffer, and component reads.
//!
//! In the system's own methods these go through the unit-wide handles. Inside
//! a job they go through the job's capture fields: the command buffer (a
//! parallel writer taking a sort key when the job is parallel) and one
//! component lookup per read component type. Graph function bodies resolve
//! their handles when generated, since they land in their own method.

use sysgraph_core::node::port_names as pn;
use sysgraph_core::{NodeId, NodeKind, TypeRef};

use crate::context::{CompileContext, Handle, Scope};
use crate::emit;
use crate::error::CodegenError;
use crate::generate;
use crate::job::CaptureOwner;
use crate::symbols::SymbolKey;

/// Declares the handles a node outside any job will use, so they exist
/// before the update method body is generated.
pub(super) fn initialize(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let kind = &graph.require_node(node)?.kind;
    if matches!(kind, NodeKind::CreateEntity) {
        let port = graph.port_ref(node, pn::ENTITY)?;
        let name = ctx.symbols.register(SymbolKey::Port(port), pn::ENTITY);
        ctx.set_fixed(port, name);
    }
    let in_function = graph
        .containers()
        .enclosing_function(graph.require_node(node)?.container)
        .is_some();
    if in_function || ctx.owner_of(node).is_some() {
        return Ok(());
    }
    let handle = match kind {
        NodeKind::GetComponent { .. } => Handle::EntityManager,
        _ => Handle::CommandBuffer,
    };
    ctx.root_handle(handle)?;
    Ok(())
}

/// The command buffer expression and the sort key, if calls need one.
fn command_buffer(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
) -> Result<(String, Option<String>), CodegenError> {
    if let Scope::Job(boundary) = ctx.state.scope {
        if let Some(desc) = ctx.jobs.get(&boundary) {
            if let Some(field) = desc.field(&CaptureOwner::CommandBuffer) {
                return Ok((field.name.clone(), desc.sort_key.clone()));
            }
        }
    }
    Ok((ctx.handle(node, Handle::CommandBuffer)?, None))
}

fn buffer_call(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    method: &str,
    generics: &[String],
    args: Vec<String>,
) -> Result<String, CodegenError> {
    let (buffer, sort_key) = command_buffer(ctx, node)?;
    let args: Vec<String> = sort_key.into_iter().chain(args).collect();
    Ok(emit::invoke(Some(&buffer), method, generics, &args))
}

fn component_name(component: Option<&TypeRef>) -> String {
    component.map_or_else(|| "object".to_string(), |c| c.name.clone())
}

pub(super) fn create(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    let port = ctx.graph.port_ref(node, pn::ENTITY)?;
    let name = ctx.symbols.register(SymbolKey::Port(port), pn::ENTITY);
    let call = buffer_call(ctx, node, "CreateEntity", &[], Vec::new())?;
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([
        emit::declare_variable(None, &name, Some(&call)),
        next,
    ]))
}

pub(super) fn destroy(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    let entity = generate::read_input(ctx, node, pn::ENTITY)?;
    let call = buffer_call(ctx, node, "DestroyEntity", &[], vec![entity])?;
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([emit::statement(&call), next]))
}

pub(super) fn set_component(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    let entity = generate::read_input(ctx, node, pn::ENTITY)?;
    let value = generate::read_input(ctx, node, pn::COMPONENT)?;
    let call = buffer_call(ctx, node, "SetComponent", &[], vec![entity, value])?;
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([emit::statement(&call), next]))
}

pub(super) fn set_enabled(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    component: Option<&TypeRef>,
) -> Result<String, CodegenError> {
    let entity = generate::read_input(ctx, node, pn::ENTITY)?;
    let value = generate::read_input(ctx, node, pn::VALUE)?;
    let call = buffer_call(
        ctx,
        node,
        "SetComponentEnabled",
        &[component_name(component)],
        vec![entity, value],
    )?;
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([emit::statement(&call), next]))
}

pub(super) fn get_component(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    component: Option<&TypeRef>,
) -> Result<String, CodegenError> {
    let ty = component_name(component);
    let entity = generate::read_input(ctx, node, pn::ENTITY)?;
    if let Scope::Job(boundary) = ctx.state.scope {
        let lookup = ctx
            .jobs
            .get(&boundary)
            .and_then(|desc| desc.field(&CaptureOwner::Lookup(ty.clone())));
        if let Some(field) = lookup {
            return Ok(format!("{}[{entity}]", field.name));
        }
    }
    let manager = ctx.handle(node, Handle::EntityManager)?;
    Ok(emit::invoke(
        Some(&manager),
        "GetComponentData",
        &[ty],
        &[entity],
    ))
}
