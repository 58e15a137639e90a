//! Entities foreach: an inline `SystemAPI.Query` loop when run immediately,
//! a synthesized `IJobEntity` when deferred.

use std::rc::Rc;

use sysgraph_core::node::port_names as pn;
use sysgraph_core::{ForeachSpec, ItemAccess, NodeId, QueryFilters, TypeRef};

use crate::context::{AccessContext, CompileContext};
use crate::emit;
use crate::error::CodegenError;
use crate::generate;
use crate::job;
use crate::symbols::{type_name, variable_name, SymbolKey};

use super::jobs;

pub(super) fn pre_initialize(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let n = graph.require_node(node)?;
    ctx.symbols.register(
        SymbolKey::Node { node, role: "type" },
        &type_name(&format!("{}Job", n.name)),
    );
    jobs::claim_boundary(ctx, node, pn::BODY)
}

pub(super) fn initialize(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    spec: &ForeachSpec,
) -> Result<(), CodegenError> {
    if spec.run.is_deferred() {
        jobs::name_outputs(ctx, node)?;
        if let Some(ty) = ctx.symbols.get(&SymbolKey::Node { node, role: "type" }) {
            let hint = variable_name(ty);
            ctx.symbols.register(SymbolKey::Node { node, role: "job" }, &hint);
        }
        return Ok(());
    }

    let graph = ctx.graph;
    if spec.entity_access {
        let port = graph.port_ref(node, pn::ENTITY)?;
        let name = ctx.symbols.register(SymbolKey::Port(port), pn::ENTITY);
        ctx.set_fixed(port, name);
    }
    // Bindings are `RefRW`/`RefRO` wrappers; the accessor is picked per use.
    for item in &spec.items {
        let port = graph.port_ref(node, &item.name)?;
        let name = ctx
            .symbols
            .register(SymbolKey::Port(port), &variable_name(&item.name));
        match item.access {
            ItemAccess::ReadWrite => ctx.set_thunk(
                port,
                Rc::new(move |state| match state.access {
                    AccessContext::Read => format!("{name}.ValueRO"),
                    AccessContext::Set => format!("{name}.ValueRW"),
                }),
            ),
            ItemAccess::ReadOnly => ctx.set_fixed(port, format!("{name}.ValueRO")),
            ItemAccess::Value => ctx.set_fixed(port, name),
        }
    }
    Ok(())
}

pub(super) fn flow_code(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    spec: &ForeachSpec,
) -> Result<String, CodegenError> {
    let current = if spec.run.is_deferred() {
        schedule(ctx, node, spec)?
    } else {
        inline_loop(ctx, node, spec)?
    };
    let next = generate::follow(ctx, node, pn::EXIT)?;
    Ok(emit::join_statements([current, next]))
}

fn query_type(item_ty: Option<&TypeRef>, access: ItemAccess) -> String {
    let ty = item_ty.map_or("object", |t| t.name.as_str());
    match access {
        ItemAccess::ReadWrite => format!("RefRW<{ty}>"),
        ItemAccess::ReadOnly => format!("RefRO<{ty}>"),
        ItemAccess::Value => ty.to_string(),
    }
}

fn filter_calls(filters: &QueryFilters) -> Vec<String> {
    let names = |types: &[TypeRef]| -> Vec<String> { types.iter().map(|t| t.name.clone()).collect() };
    let mut calls = Vec::new();
    for (method, types) in [
        ("WithAll", &filters.with_all),
        ("WithAny", &filters.with_any),
        ("WithNone", &filters.with_none),
        ("WithChangeFilter", &filters.with_change_filter),
    ] {
        if !types.is_empty() {
            calls.push(format!("{}()", emit::generic(method, &names(types.as_slice()))));
        }
    }
    if !filters.options.is_empty() {
        let options: Vec<String> = filters
            .options
            .iter()
            .map(|o| format!("EntityQueryOptions.{o}"))
            .collect();
        calls.push(format!("WithOptions({})", options.join(" | ")));
    }
    calls
}

fn inline_loop(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    spec: &ForeachSpec,
) -> Result<String, CodegenError> {
    let graph = ctx.graph;
    let types: Vec<String> = spec
        .items
        .iter()
        .map(|i| query_type(i.ty.as_ref(), i.access))
        .collect();
    let mut query = format!("SystemAPI.{}()", emit::generic("Query", &types));
    for call in filter_calls(&spec.filters) {
        query.push('.');
        query.push_str(&call);
    }
    for index in 0..spec.filters.with_shared_component.len() {
        let value = generate::read_input(ctx, node, &format!("sharedFilter{index}"))?;
        query.push_str(&format!(".WithSharedComponentFilter({value})"));
    }

    let mut bindings = Vec::new();
    for item in &spec.items {
        let port = graph.port_ref(node, &item.name)?;
        bindings.extend(ctx.symbols.get(&SymbolKey::Port(port)).map(str::to_string));
    }
    if spec.entity_access {
        query.push_str(".WithEntityAccess()");
        let port = graph.port_ref(node, pn::ENTITY)?;
        bindings.extend(ctx.symbols.get(&SymbolKey::Port(port)).map(str::to_string));
    }
    let binding = match bindings.as_slice() {
        [single] => format!("var {single}"),
        many => format!("var ({})", many.join(", ")),
    };

    let body = generate::follow(ctx, node, pn::BODY)?;
    let unit = ctx.indent_unit();
    Ok(emit::block(&format!("foreach ({binding} in {query})"), &body, &unit))
}

/// Constructs the synthesized job and schedules it.
fn schedule(
    ctx: &mut CompileContext<'_>,
    node: NodeId,
    spec: &ForeachSpec,
) -> Result<String, CodegenError> {
    let Some(desc) = ctx.jobs.get(&node).cloned() else {
        return Ok(String::new());
    };
    let instance = ctx
        .symbols
        .register(SymbolKey::Node { node, role: "job" }, &variable_name(&desc.type_name));
    let fields = job::construction_fields(ctx, &desc, None)?;
    let construct = emit::declare_variable(
        None,
        &instance,
        Some(&emit::new_object(&desc.type_name, &fields)),
    );
    let run = emit::statement(&emit::invoke(Some(&instance), spec.run.method_name(), &[], &[]));
    Ok(emit::join_statements([construct, run]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_types_follow_access() {
        let a = TypeRef::component("A");
        assert_eq!(query_type(Some(&a), ItemAccess::ReadWrite), "RefRW<A>");
        assert_eq!(query_type(Some(&a), ItemAccess::ReadOnly), "RefRO<A>");
        assert_eq!(
            query_type(Some(&TypeRef::aspect("MoveAspect")), ItemAccess::Value),
            "MoveAspect"
        );
        assert_eq!(query_type(None, ItemAccess::ReadOnly), "RefRO<object>");
    }

    #[test]
    fn filters_become_chained_calls() {
        let filters = QueryFilters {
            with_all: vec![TypeRef::component("Player")],
            with_none: vec![TypeRef::component("Dead")],
            options: vec!["IncludeDisabledEntities".into()],
            ..QueryFilters::default()
        };
        assert_eq!(
            filter_calls(&filters),
            vec![
                "WithAll<Player>()".to_string(),
                "WithNone<Dead>()".to_string(),
                "WithOptions(EntityQueryOptions.IncludeDisabledEntities)".to_string(),
            ]
        );
    }
}
