//! Statements: locals, assignments, branches and returns.

use sysgraph_core::node::port_names as pn;
use sysgraph_core::{NodeId, TypeRef};

use crate::context::CompileContext;
use crate::emit;
use crate::error::CodegenError;
use crate::generate;
use crate::symbols::{variable_name, SymbolKey};

pub(super) fn initialize_local(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    name: &str,
) -> Result<(), CodegenError> {
    let out = ctx.graph.port_ref(node, pn::OUT)?;
    let name = ctx.symbols.register(SymbolKey::Port(out), &variable_name(name));
    ctx.set_fixed(out, name);
    Ok(())
}

pub(super) fn local(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    ty: &TypeRef,
) -> Result<String, CodegenError> {
    let out = ctx.graph.port_ref(node, pn::OUT)?;
    let name = ctx
        .symbols
        .get(&SymbolKey::Port(out))
        .map(str::to_string)
        .ok_or_else(|| CodegenError::InvalidGraph(format!("local {node} was never named")))?;
    let declaration = match generate::optional_input(ctx, node, pn::VALUE)? {
        Some(value) => emit::declare_variable(None, &name, Some(&value)),
        None => emit::declare_variable(Some(&ty.name), &name, Some("default")),
    };
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([declaration, next]))
}

pub(super) fn set_value(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    let target = generate::target_input(ctx, node, pn::TARGET)?;
    let value = generate::read_input(ctx, node, pn::VALUE)?;
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([emit::assign(&target, &value), next]))
}

pub(super) fn branch(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    let condition = generate::read_input(ctx, node, pn::CONDITION)?;
    let then = generate::follow(ctx, node, pn::TRUE)?;
    let otherwise = generate::follow(ctx, node, pn::FALSE)?;
    let unit = ctx.indent_unit();
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([
        emit::if_else(&condition, &then, &otherwise, &unit),
        next,
    ]))
}

pub(super) fn return_code(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<String, CodegenError> {
    Ok(match generate::optional_input(ctx, node, pn::VALUE)? {
        Some(value) => format!("return {value};"),
        None => "return;".to_string(),
    })
}
