//! The compiled unit's own declaration.
//!
//! [`pre_initialize`] runs before any node: it names the unit and its
//! members, declares the lifecycle methods nodes will write into and turns
//! graph variables, properties and functions into declarations. [`render`]
//! assembles the final text once every method body and nested type exists.

use sysgraph_check::{DiagnosticKind, DiagnosticOwner};
use sysgraph_core::node::port_names as pn;
use sysgraph_core::{LifecycleEvent, Member, MemberId, NodeKind, UnitFlavor};
use tracing::debug;

use crate::class::{
    ClassData, FieldData, MethodData, ParamData, PropertyBody, PropertyData, RefKind, TypeKind,
};
use crate::context::{CompileContext, Scope};
use crate::emit;
use crate::error::CodegenError;
use crate::generate;
use crate::job;
use crate::symbols::{type_name, variable_name, SymbolKey};

/// Names the generated code uses itself and nodes must never be given.
const RESERVED_NAMES: &[&str] = &[
    "state",
    "Execute",
    "OnCreate",
    "OnUpdate",
    "OnDestroy",
    "OnStartRunning",
    "OnStopRunning",
    "CheckedStateRef",
    "SystemAPI",
];

const REQUIRE_PRIORITY: i32 = -2000;
const DEFAULT_PRIORITY: i32 = -500;

const BURST: &str = "BurstCompile";

pub(crate) fn pre_initialize(ctx: &mut CompileContext<'_>) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let settings = &graph.settings;
    for name in RESERVED_NAMES {
        ctx.symbols.reserve(name);
    }
    ctx.usings.extend(settings.usings.iter().cloned());
    let unit_name = ctx
        .symbols
        .register(SymbolKey::Unit("type"), &type_name(&settings.name));

    let events: Vec<LifecycleEvent> = graph
        .find_nodes(|k| matches!(k, NodeKind::Event(_)))
        .into_iter()
        .filter_map(|id| match graph.node(id).map(|n| &n.kind) {
            Some(NodeKind::Event(event)) => Some(*event),
            _ => None,
        })
        .collect();
    let start_stop = events.iter().any(|e| e.is_start_stop());
    let lifecycle: Vec<LifecycleEvent> = LifecycleEvent::ALL
        .into_iter()
        .filter(|e| !e.is_start_stop() || events.contains(e))
        .collect();

    let burst = ctx.burst_enabled();
    match settings.flavor {
        UnitFlavor::UnmanagedSystem => {
            let mut unit = ClassData::new(unit_name, TypeKind::Struct, "public partial");
            if burst {
                unit.attributes.push(BURST.into());
            }
            unit.bases.push("ISystem".into());
            if start_stop {
                unit.bases.push("ISystemStartStop".into());
            }
            ctx.unit = unit;
            for event in lifecycle {
                let mut method = MethodData::new(event.method_name(), "public", "void");
                method
                    .params
                    .push(ParamData::new("state", "SystemState", RefKind::Ref));
                if burst {
                    method.attributes.push(BURST.into());
                }
                ctx.methods.insert(event.method_name().into(), method);
            }
        }
        UnitFlavor::ManagedSystem => {
            let mut unit = ClassData::new(unit_name, TypeKind::Class, "public partial");
            unit.bases.push("SystemBase".into());
            ctx.unit = unit;
            for event in lifecycle {
                let method = MethodData::new(event.method_name(), "protected override", "void");
                ctx.methods.insert(event.method_name().into(), method);
            }
        }
        UnitFlavor::Aspect => {
            let modifier = settings.modifier;
            let mut modifiers = String::from("public");
            if modifier.read_only {
                modifiers.push_str(" readonly");
            }
            if modifier.partial {
                modifiers.push_str(" partial");
            }
            let kind = if modifier.is_struct {
                TypeKind::Struct
            } else {
                TypeKind::Class
            };
            let mut unit = ClassData::new(unit_name, kind, modifiers);
            unit.bases.push("IAspect".into());
            ctx.unit = unit;
        }
    }

    if let Some(create) = ctx.methods.get_mut(LifecycleEvent::Create.method_name()) {
        for ty in &settings.required_for_update {
            let call = match settings.flavor {
                UnitFlavor::ManagedSystem => format!("RequireForUpdate<{}>();", ty.name),
                _ => format!("state.RequireForUpdate<{}>();", ty.name),
            };
            create.add_code(REQUIRE_PRIORITY, call);
        }
    }

    name_members(ctx);
    declare_members(ctx)?;
    debug!(unit = %ctx.unit.name, methods = ctx.methods.len(), "declared unit");
    Ok(())
}

/// Binds every member and function parameter to its identifier before any
/// declaration refers to another.
fn name_members(ctx: &mut CompileContext<'_>) {
    let graph = ctx.graph;
    for (id, member) in graph.indexed_members() {
        ctx.symbols.register(SymbolKey::Member(id), member.name());
        if let Member::Function(func) = member {
            for (index, param) in func.params.iter().enumerate() {
                let Ok(index) = u16::try_from(index) else { break };
                ctx.symbols
                    .register(SymbolKey::Param(id, index), &variable_name(&param.name));
            }
        }
    }
}

fn member_modifiers(is_static: bool) -> String {
    if is_static {
        "public static".to_string()
    } else {
        "public".to_string()
    }
}

fn declare_members(ctx: &mut CompileContext<'_>) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    for (id, member) in graph.indexed_members() {
        let name = ctx
            .symbols
            .get(&SymbolKey::Member(id))
            .map(str::to_string)
            .unwrap_or_default();
        match member {
            Member::Variable(var) => {
                let mut modifiers = member_modifiers(var.is_static);
                if var.read_only {
                    modifiers.push_str(" readonly");
                }
                let mut field = FieldData::public(name.clone(), var.ty.name.clone());
                field.modifiers = modifiers;
                if let Some(default) = &var.default {
                    let value = emit::literal(default);
                    let create = LifecycleEvent::Create.method_name();
                    // Struct systems cannot initialize instance fields inline.
                    if var.is_static
                        || ctx.unit.kind == TypeKind::Class
                        || !ctx.methods.contains_key(create)
                    {
                        field.initializer = Some(value);
                    } else {
                        ctx.method_mut(create)?
                            .add_code(DEFAULT_PRIORITY, emit::assign(&name, &value));
                    }
                }
                ctx.unit.fields.push(field);
            }
            Member::Property(_) => {
                if let Some(property) = property_data(ctx, id) {
                    ctx.unit.properties.push(property);
                }
            }
            Member::Function(func) => {
                if func.entry.is_none() {
                    ctx.report_owner(
                        DiagnosticOwner::Member(id),
                        DiagnosticKind::FunctionWithoutEntry {
                            name: func.name.clone(),
                        },
                    );
                }
                let method = function_method(ctx, id, false)?;
                ctx.methods.insert(name, method);
            }
        }
    }
    Ok(())
}

/// Declares graph property `id`, either over its backing variable or as an
/// auto property.
pub(crate) fn property_data(ctx: &CompileContext<'_>, id: MemberId) -> Option<PropertyData> {
    let graph = ctx.graph;
    let prop = graph.member(id).and_then(Member::as_property)?;
    let name = ctx.symbols.get(&SymbolKey::Member(id))?.to_string();
    let body = match prop.backing {
        Some(backing) => PropertyBody::Backed {
            field: ctx
                .symbols
                .get(&SymbolKey::Member(backing))
                .map(str::to_string)
                .unwrap_or_default(),
            read_only: graph
                .member(backing)
                .and_then(Member::as_variable)
                .is_some_and(|v| v.read_only),
        },
        None => PropertyBody::Auto,
    };
    Some(PropertyData {
        name,
        ty: prop.ty.name.clone(),
        modifiers: member_modifiers(prop.is_static),
        body,
    })
}

/// Declares graph function `id`. Inside a job the copy is an instance
/// method and its body is generated on the spot; in the unit the body is
/// filled when its entry node is generated.
pub(crate) fn function_method(
    ctx: &mut CompileContext<'_>,
    id: MemberId,
    in_job: bool,
) -> Result<MethodData, CodegenError> {
    let graph = ctx.graph;
    let func = graph
        .function(id)
        .ok_or_else(|| CodegenError::InvalidGraph(format!("member {id} is not a function")))?;
    let name = ctx
        .symbols
        .get(&SymbolKey::Member(id))
        .map(str::to_string)
        .ok_or_else(|| CodegenError::InvalidGraph(format!("function {id} was never named")))?;
    let modifiers = member_modifiers(func.is_static && !in_job);
    let return_type = func.return_type.as_ref().map_or("void", |t| t.name.as_str());
    let mut method = MethodData::new(name, modifiers, return_type);
    for (index, param) in func.params.iter().enumerate() {
        let Ok(index) = u16::try_from(index) else { break };
        let param_name = ctx
            .symbols
            .get(&SymbolKey::Param(id, index))
            .map_or_else(|| variable_name(&param.name), str::to_string);
        method
            .params
            .push(ParamData::new(param_name, param.ty.name.clone(), RefKind::None));
    }
    if in_job && matches!(ctx.state.scope, Scope::Job(_)) {
        if let Some(sort_key) = job::forwarded_sort_key(ctx, id) {
            method
                .params
                .push(ParamData::new(sort_key, "int", RefKind::None));
        }
        if let Some(entry) = func.entry {
            let body = generate::follow(ctx, entry, pn::EXIT)?;
            method.add_code(0, body);
        }
    }
    Ok(method)
}

/// The unit's source text: usings, then the declaration, wrapped in its
/// namespace when one is set.
pub(crate) fn render(ctx: &CompileContext<'_>) -> String {
    let unit_indent = ctx.indent_unit();
    let mut unit = ctx.unit.clone();
    unit.methods = ctx.methods.values().cloned().collect();
    unit.nested = ctx.nested.clone();
    let mut declaration = unit.render(&unit_indent);
    if let Some(namespace) = &ctx.graph.settings.namespace {
        declaration = emit::block(&format!("namespace {namespace}"), &declaration, &unit_indent);
    }

    let usings: Vec<String> = ctx.usings.iter().map(|u| format!("using {u};")).collect();
    let mut out = String::new();
    if !usings.is_empty() {
        out.push_str(&usings.join("\n"));
        out.push_str("\n\n");
    }
    out.push_str(&declaration);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompileOptions;
    use sysgraph_core::{
        GraphProperty, GraphSettings, GraphVariable, LiteralValue, SystemGraph, TypeRef,
    };

    fn declared(g: &SystemGraph, options: &CompileOptions) -> String {
        let mut ctx = CompileContext::new(g, options);
        pre_initialize(&mut ctx).unwrap();
        render(&ctx)
    }

    #[test]
    fn unmanaged_system_shape() {
        let mut settings = GraphSettings::new("Move System");
        settings.required_for_update = vec![TypeRef::component("Speed")];
        let g = SystemGraph::new(settings);
        let text = declared(&g, &CompileOptions::default());
        assert!(text.starts_with("using Unity.Burst;\n"));
        assert!(text.contains("[BurstCompile]\npublic partial struct MoveSystem : ISystem {"));
        assert!(text.contains("public void OnUpdate(ref SystemState state) {"));
        assert!(text.contains("state.RequireForUpdate<Speed>();"));
        assert!(!text.contains("OnStartRunning"));
    }

    #[test]
    fn debug_script_drops_burst() {
        let g = SystemGraph::new(GraphSettings::new("S"));
        let options = CompileOptions {
            debug_script: true,
            ..CompileOptions::default()
        };
        assert!(!declared(&g, &options).contains("[BurstCompile]"));
    }

    #[test]
    fn managed_system_overrides() {
        let mut settings = GraphSettings::new("S");
        settings.flavor = UnitFlavor::ManagedSystem;
        settings.required_for_update = vec![TypeRef::component("Speed")];
        let g = SystemGraph::new(settings);
        let text = declared(&g, &CompileOptions::default());
        assert!(text.contains("public partial class S : SystemBase {"));
        assert!(text.contains("protected override void OnUpdate() {"));
        assert!(text.contains("    RequireForUpdate<Speed>();"));
    }

    #[test]
    fn aspect_has_fields_only() {
        let mut settings = GraphSettings::new("MoveAspect");
        settings.flavor = UnitFlavor::Aspect;
        settings.modifier.read_only = true;
        let mut g = SystemGraph::new(settings);
        let mut var = GraphVariable::new("transform", TypeRef::value_struct("RefRW<LocalTransform>"));
        var.read_only = true;
        g.add_variable(var);
        let text = declared(&g, &CompileOptions::default());
        assert!(text.contains("public readonly partial struct MoveAspect : IAspect {"));
        assert!(text.contains("public readonly RefRW<LocalTransform> transform;"));
        assert!(!text.contains("void"));
    }

    #[test]
    fn struct_defaults_are_assigned_in_on_create() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let mut speed = GraphVariable::new("speed", TypeRef::float());
        speed.default = Some(LiteralValue::Float(2.0));
        let speed = g.add_variable(speed);
        let mut limit = GraphVariable::new("limit", TypeRef::int());
        limit.default = Some(LiteralValue::Int(3));
        limit.is_static = true;
        g.add_variable(limit);
        g.add_property(GraphProperty {
            name: "Speed".into(),
            ty: TypeRef::float(),
            is_static: false,
            backing: Some(speed),
        })
        .unwrap();
        let text = declared(&g, &CompileOptions::default());
        assert!(text.contains("public float speed;"));
        assert!(text.contains("public static int limit = 3;"));
        assert!(text.contains("speed = 2.0f;"));
        assert!(text.contains("public float Speed { get => speed; set => speed = value; }"));
    }

    #[test]
    fn functions_without_entry_are_reported() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        g.add_function("Helper", vec![], Some(TypeRef::int()), true)
            .unwrap();
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&g, &options);
        pre_initialize(&mut ctx).unwrap();
        assert!(ctx.methods.contains_key("Helper"));
        assert_eq!(ctx.analyzer.len(), 1);
        assert!(render(&ctx).contains("public static int Helper() {"));
    }

    #[test]
    fn namespace_wraps_declaration() {
        let mut settings = GraphSettings::new("S");
        settings.namespace = Some("Game.Systems".into());
        settings.usings.clear();
        let g = SystemGraph::new(settings);
        let text = declared(&g, &CompileOptions::default());
        assert!(text.starts_with("namespace Game.Systems {\n    [BurstCompile]\n"));
    }
}
