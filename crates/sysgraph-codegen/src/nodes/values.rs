//! Operators and member access.

use sysgraph_core::node::port_names as pn;
use sysgraph_core::{
    BinaryOp, ExternalMember, MemberId, MemberInvoke, MemberTarget, NodeId, SystemGraph,
};

use crate::context::{CompileContext, Scope};
use crate::emit;
use crate::error::CodegenError;
use crate::generate;
use crate::job;
use crate::symbols::SymbolKey;

pub(super) fn operator(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    op: BinaryOp,
) -> Result<String, CodegenError> {
    let a = generate::read_input(ctx, node, pn::A)?;
    let b = generate::read_input(ctx, node, pn::B)?;
    Ok(format!("({a} {} {b})", op.symbol()))
}

fn member_name(ctx: &CompileContext<'_>, member: MemberId) -> Result<String, CodegenError> {
    ctx.symbols
        .get(&SymbolKey::Member(member))
        .map(str::to_string)
        .ok_or_else(|| CodegenError::InvalidGraph(format!("member {member} was never named")))
}

/// Static members are reached through the unit's type from inside a job.
fn qualify(ctx: &CompileContext<'_>, member: MemberId, name: String) -> String {
    let is_static = ctx.graph.member(member).is_some_and(|m| m.is_static());
    match (ctx.state.scope, ctx.symbols.get(&SymbolKey::Unit("type"))) {
        (Scope::Job(_), Some(unit)) if is_static => format!("{unit}.{name}"),
        _ => name,
    }
}

fn call_arguments(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    params: &[String],
) -> Result<Vec<String>, CodegenError> {
    params
        .iter()
        .map(|param| generate::read_input(ctx, node, param))
        .collect()
}

fn param_names(graph: &SystemGraph, target: &MemberTarget) -> Vec<String> {
    match target {
        MemberTarget::Function(id) => graph
            .function(*id)
            .map(|f| f.params.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default(),
        MemberTarget::External(ExternalMember {
            invoke: MemberInvoke::Method { params, .. },
            ..
        }) => params.iter().map(|(name, _)| name.clone()).collect(),
        _ => Vec::new(),
    }
}

/// The expression a member node stands for: an access or a call.
pub(super) fn member_value(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    target: &MemberTarget,
) -> Result<String, CodegenError> {
    let graph = ctx.graph;
    match target {
        MemberTarget::Variable(id) | MemberTarget::Property(id) => {
            let name = member_name(ctx, *id)?;
            Ok(qualify(ctx, *id, name))
        }
        MemberTarget::Function(id) => {
            let name = member_name(ctx, *id)?;
            let mut args = call_arguments(ctx, node, &param_names(graph, target))?;
            args.extend(job::forwarded_sort_key(ctx, *id));
            let callee = qualify(ctx, *id, name);
            Ok(emit::invoke(None, &callee, &[], &args))
        }
        MemberTarget::External(ext) => {
            // The instance keeps the caller's access so `a.ValueRW.Field = x`
            // writes through the binding.
            let prefix = match &ext.instance {
                Some(_) => {
                    let input = graph.port_ref(node, pn::INSTANCE)?;
                    Some(generate::input_value(ctx, input)?)
                }
                None => ext.owner.as_ref().map(|o| o.name.clone()),
            };
            match &ext.invoke {
                MemberInvoke::Field { .. } | MemberInvoke::Property { .. } => Ok(match prefix {
                    Some(prefix) => format!("{prefix}.{}", ext.name),
                    None => ext.name.clone(),
                }),
                MemberInvoke::Method { .. } => {
                    let args = call_arguments(ctx, node, &param_names(graph, target))?;
                    let generics: Vec<String> =
                        ext.generic_args.iter().map(|t| t.name.clone()).collect();
                    Ok(emit::invoke(prefix.as_deref(), &ext.name, &generics, &args))
                }
            }
        }
    }
}

/// A void call as a statement, followed by its exit flow.
pub(super) fn call_statement(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    target: &MemberTarget,
) -> Result<String, CodegenError> {
    let call = member_value(ctx, node, target)?;
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([emit::statement(&call), next]))
}
