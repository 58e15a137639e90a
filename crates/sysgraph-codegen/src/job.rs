//! Job descriptors and the synthesis of job types.
//!
//! A [`JobDescriptor`] is built for every boundary node during
//! post-initialization, once all port names exist. It fixes the job's type
//! name, the parameters of its `Execute` method and its capture fields.
//! The type itself is rendered by a post-generation step, after the body
//! can be generated with redirects in place.

use sysgraph_check::DiagnosticKind;
use sysgraph_core::node::port_names as pn;
use sysgraph_core::{
    Discipline, ItemAccess, JobVariable, Member, MemberId, MemberTarget, NodeId, NodeKind,
    PortRef, QueryFilters, QueryItem, SystemGraph, TypeRef,
};
use tracing::debug;

use crate::capture::BoundaryAnalysis;
use crate::class::{ClassData, FieldData, MethodData, ParamData, RefKind, TypeKind};
use crate::context::{CompileContext, Handle, PostGeneration, Scope};
use crate::emit;
use crate::error::CodegenError;
use crate::generate;
use crate::symbols::{variable_name, SymbolKey};
use crate::system;

const READ_ONLY_ATTRIBUTE: &str = "Unity.Collections.ReadOnly";

/// The job interface a synthesized type implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobContract {
    Entity,
    Chunk,
}

impl JobContract {
    pub fn interface(self) -> &'static str {
        match self {
            JobContract::Entity => "IJobEntity",
            JobContract::Chunk => "IJobChunk",
        }
    }
}

/// What a capture field stands for; fields are unique per owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOwner {
    Port(PortRef),
    Member(MemberId),
    /// An auto property, set through the copied property declaration.
    Property(MemberId),
    Variable(usize),
    CommandBuffer,
    Lookup(String),
}

/// Where the field's value comes from when the job is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// An output computed before the job runs.
    Port(PortRef),
    /// A fixed expression in the constructing method.
    Expression(String),
    /// The executor input for job variable `index`.
    JobVariable(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureField {
    pub name: String,
    pub ty: String,
    pub mutable: bool,
    pub owner: CaptureOwner,
    pub source: CaptureSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub node: NodeId,
    pub type_name: String,
    pub contract: JobContract,
    pub discipline: Discipline,
    pub burst: bool,
    /// Query attributes such as `WithAll(typeof(T))`.
    pub attributes: Vec<String>,
    pub params: Vec<ParamData>,
    pub fields: Vec<CaptureField>,
    /// Sort key for parallel command buffer calls.
    pub sort_key: Option<String>,
    pub properties: Vec<MemberId>,
    pub functions: Vec<MemberId>,
    pub body: PortRef,
}

impl JobDescriptor {
    pub fn field(&self, owner: &CaptureOwner) -> Option<&CaptureField> {
        self.fields.iter().find(|f| &f.owner == owner)
    }

    fn push_field(&mut self, field: CaptureField) {
        if self.field(&field.owner).is_none() {
            self.fields.push(field);
        }
    }
}

/// The sort key a call to instance function `function` passes on while
/// generating inside a parallel job that copies it.
pub(crate) fn forwarded_sort_key(ctx: &CompileContext<'_>, function: MemberId) -> Option<String> {
    let Scope::Job(boundary) = ctx.state.scope else {
        return None;
    };
    let desc = ctx.jobs.get(&boundary)?;
    if !desc.functions.contains(&function) {
        return None;
    }
    desc.sort_key.clone()
}

/// The discipline a user-declared job is compiled for: the most permissive
/// among its executors, `Schedule` when it has none.
pub fn job_discipline(graph: &SystemGraph, job: NodeId) -> Discipline {
    graph
        .executors_of(job)
        .into_iter()
        .filter_map(|e| match graph.node(e).map(|n| &n.kind) {
            Some(NodeKind::JobExecutor { run_with, .. }) => Some(*run_with),
            _ => None,
        })
        .max()
        .unwrap_or(Discipline::Schedule)
}

/// Best-effort type of an output port. Operators without a declared type
/// take the type of their first typed operand.
pub fn infer_type(graph: &SystemGraph, port: PortRef) -> Option<TypeRef> {
    let def = graph.port(port)?;
    if let Some(ty) = def.value_type() {
        return Some(ty.clone());
    }
    match &graph.node(port.node)?.kind {
        NodeKind::Operator { .. } => [pn::A, pn::B].iter().find_map(|name| {
            let input = graph.port_ref(port.node, name).ok()?;
            infer_type(graph, graph.source_of(input)?)
        }),
        _ => None,
    }
}

fn item_param(ctx: &CompileContext<'_>, node: NodeId, item: &QueryItem) -> Option<ParamData> {
    let port = ctx.graph.port_ref(node, &item.name).ok()?;
    let name = ctx.symbols.get(&SymbolKey::Port(port))?.to_string();
    let ty = item.ty.as_ref().map_or("object", |t| t.name.as_str());
    let ref_kind = match item.access {
        ItemAccess::ReadWrite => RefKind::Ref,
        ItemAccess::ReadOnly => RefKind::In,
        ItemAccess::Value => RefKind::None,
    };
    Some(ParamData::new(name, ty, ref_kind))
}

fn port_param(
    ctx: &CompileContext<'_>,
    node: NodeId,
    port: &str,
    ty: &str,
    ref_kind: RefKind,
) -> Option<ParamData> {
    let port = ctx.graph.port_ref(node, port).ok()?;
    let name = ctx.symbols.get(&SymbolKey::Port(port))?;
    Some(ParamData::new(name, ty, ref_kind))
}

fn filter_attributes(filters: &QueryFilters) -> Vec<String> {
    let names = |types: &[TypeRef]| -> Vec<String> { types.iter().map(|t| t.name.clone()).collect() };
    let mut attributes = Vec::new();
    for (attribute, types) in [
        ("WithAll", &filters.with_all),
        ("WithAny", &filters.with_any),
        ("WithNone", &filters.with_none),
        ("WithChangeFilter", &filters.with_change_filter),
    ] {
        if !types.is_empty() {
            attributes.push(format!("{attribute}({})", emit::type_of_list(&names(types.as_slice()))));
        }
    }
    if !filters.options.is_empty() {
        let options: Vec<String> = filters
            .options
            .iter()
            .map(|o| format!("EntityQueryOptions.{o}"))
            .collect();
        attributes.push(format!("WithOptions({})", options.join(" | ")));
    }
    attributes
}

/// Builds the descriptor for `node` from its analysis. Redirects consumers
/// of crossing values to the capture fields.
pub(crate) fn build_descriptor(ctx: &mut CompileContext<'_>, node: NodeId) -> Result<(), CodegenError> {
    let graph = ctx.graph;
    let Some(analysis) = ctx.boundaries.get(&node).cloned() else {
        return Ok(());
    };
    let type_name = ctx
        .symbols
        .get(&SymbolKey::Node { node, role: "type" })
        .ok_or_else(|| CodegenError::InvalidGraph(format!("job {node} has no type name")))?
        .to_string();

    let kind = &graph.require_node(node)?.kind;
    let no_variables: &[JobVariable] = &[];
    let mut params = Vec::new();
    let (contract, discipline, burst, attributes, variables) = match kind {
        NodeKind::EntitiesForeach(spec) => {
            params.extend(spec.items.iter().filter_map(|i| item_param(ctx, node, i)));
            if spec.entity_access {
                params.extend(port_param(ctx, node, pn::ENTITY, "Entity", RefKind::None));
            }
            (
                JobContract::Entity,
                spec.run,
                spec.burst,
                filter_attributes(&spec.filters),
                no_variables,
            )
        }
        NodeKind::JobEntity(spec) => {
            params.extend(spec.items.iter().filter_map(|i| item_param(ctx, node, i)));
            if spec.entity_access {
                params.extend(port_param(ctx, node, pn::ENTITY, "Entity", RefKind::None));
            }
            if spec.index.in_query() {
                params.extend(
                    port_param(ctx, node, pn::ENTITY_INDEX_IN_QUERY, "int", RefKind::None)
                        .map(|p| p.with_attribute("EntityIndexInQuery")),
                );
            }
            if spec.index.in_chunk() {
                params.extend(
                    port_param(ctx, node, pn::ENTITY_INDEX_IN_CHUNK, "int", RefKind::None)
                        .map(|p| p.with_attribute("EntityIndexInChunk")),
                );
            }
            (
                JobContract::Entity,
                job_discipline(graph, node),
                spec.burst,
                filter_attributes(&spec.filters),
                &spec.variables[..],
            )
        }
        NodeKind::JobChunk(spec) => {
            params.extend(port_param(ctx, node, pn::CHUNK, "ArchetypeChunk", RefKind::In));
            params.extend(port_param(ctx, node, pn::UNFILTERED_CHUNK_INDEX, "int", RefKind::None));
            params.extend(port_param(ctx, node, pn::USE_ENABLED_MASK, "bool", RefKind::None));
            params.extend(port_param(ctx, node, pn::CHUNK_ENABLED_MASK, "v128", RefKind::In));
            ctx.usings.insert("Unity.Burst.Intrinsics".into());
            (
                JobContract::Chunk,
                job_discipline(graph, node),
                spec.burst,
                Vec::new(),
                &spec.variables[..],
            )
        }
        _ => {
            return Err(CodegenError::InvalidGraph(format!(
                "node {node} is not a boundary"
            )))
        }
    };

    let mut desc = JobDescriptor {
        node,
        type_name,
        contract,
        discipline,
        burst,
        attributes,
        params,
        fields: Vec::new(),
        sort_key: None,
        properties: analysis.properties.iter().copied().collect(),
        functions: analysis.functions.iter().copied().collect(),
        body: analysis.body,
    };

    for (index, variable) in variables.iter().enumerate() {
        let Ok(port) = graph.port_ref(node, &variable.name) else { continue };
        let name = ctx
            .symbols
            .register(SymbolKey::Port(port), &variable_name(&variable.name));
        desc.push_field(CaptureField {
            name,
            ty: variable.ty.name.clone(),
            mutable: variable.mutable,
            owner: CaptureOwner::Variable(index),
            source: CaptureSource::JobVariable(index),
        });
    }

    for (source, consumers) in &analysis.crossings {
        let Some(def) = graph.port(*source) else { continue };
        let from_event = matches!(
            graph.node(source.node).map(|n| &n.kind),
            Some(NodeKind::Event(_))
        );
        if from_event && (def.name == pn::STATE || def.name == pn::ENTITY_MANAGER) {
            for consumer in consumers {
                ctx.report(
                    consumer.node,
                    DiagnosticKind::NotCapturable {
                        port: def.name.clone(),
                    },
                );
                ctx.mark_unavailable(*consumer);
            }
            continue;
        }
        let name = match ctx.symbols.get(&SymbolKey::Port(*source)) {
            Some(existing) => existing.to_string(),
            None => {
                let hint = match graph.node(source.node) {
                    Some(n) if def.is_primary_output() => n.name.clone(),
                    _ => def.name.clone(),
                };
                ctx.symbols.register(
                    SymbolKey::Capture {
                        boundary: node,
                        source: *source,
                    },
                    &variable_name(&hint),
                )
            }
        };
        let ty = match infer_type(graph, *source) {
            Some(ty) => ty.name,
            None => {
                ctx.report(node, DiagnosticKind::UnknownCaptureType { name: name.clone() });
                "object".to_string()
            }
        };
        for consumer in consumers {
            ctx.redirect(*consumer, node, name.clone());
        }
        desc.push_field(CaptureField {
            name,
            ty,
            mutable: false,
            owner: CaptureOwner::Port(*source),
            source: CaptureSource::Port(*source),
        });
    }

    for (consumer, source) in &analysis.unavailable {
        let port = graph
            .port(*source)
            .map_or_else(|| source.to_string(), |p| p.name.clone());
        ctx.report(consumer.node, DiagnosticKind::ValueUnavailableInJob { port });
        ctx.mark_unavailable(*consumer);
    }

    for member in &analysis.members {
        let (Some(name), Some(ty)) = (
            ctx.symbols.get(&SymbolKey::Member(*member)),
            graph.member(*member).and_then(|m| m.value_type()),
        ) else {
            continue;
        };
        let name = name.to_string();
        desc.push_field(CaptureField {
            name: name.clone(),
            ty: ty.name.clone(),
            mutable: false,
            owner: CaptureOwner::Member(*member),
            source: CaptureSource::Expression(name),
        });
    }

    for property in &analysis.properties {
        let Some(Member::Property(prop)) = graph.member(*property) else { continue };
        if !prop.is_auto() {
            continue;
        }
        let Some(name) = ctx.symbols.get(&SymbolKey::Member(*property)) else { continue };
        let name = name.to_string();
        desc.push_field(CaptureField {
            name: name.clone(),
            ty: prop.ty.name.clone(),
            mutable: false,
            owner: CaptureOwner::Property(*property),
            source: CaptureSource::Expression(name),
        });
    }

    // Copied functions run inside the job too.
    let mut generated = analysis.after.clone();
    for function in &analysis.functions {
        if let Some(func) = graph.function(*function) {
            generated.extend(graph.nodes_in(func.container));
        }
    }

    let mut needs_buffer = false;
    for id in &generated {
        match graph.node(*id).map(|n| &n.kind) {
            Some(
                NodeKind::CreateEntity
                | NodeKind::DestroyEntity
                | NodeKind::SetComponent { .. }
                | NodeKind::SetComponentEnabled { .. },
            ) => needs_buffer = true,
            Some(NodeKind::GetComponent {
                component: Some(component),
            }) => {
                let owner = CaptureOwner::Lookup(component.name.clone());
                if desc.field(&owner).is_none() {
                    let name = ctx
                        .symbols
                        .generate_new_name(&variable_name(&format!("{}Lookup", component.name)));
                    desc.push_field(CaptureField {
                        name,
                        ty: format!("ComponentLookup<{}>", component.name),
                        mutable: false,
                        owner,
                        source: CaptureSource::Expression(format!(
                            "SystemAPI.GetComponentLookup<{}>(true)",
                            component.name
                        )),
                    });
                }
            }
            Some(NodeKind::SetValue) => {
                if let Some(name) = captured_target(ctx, &analysis, &desc, *id) {
                    ctx.report(*id, DiagnosticKind::WriteToCapture { name });
                }
            }
            _ => {}
        }
    }

    if needs_buffer {
        let root = ctx.root_handle(Handle::CommandBuffer)?;
        let (ty, init) = if discipline.is_parallel() {
            (
                "EntityCommandBuffer.ParallelWriter".to_string(),
                format!("{root}.AsParallelWriter()"),
            )
        } else {
            ("EntityCommandBuffer".to_string(), root.clone())
        };
        desc.push_field(CaptureField {
            name: root,
            ty,
            mutable: true,
            owner: CaptureOwner::CommandBuffer,
            source: CaptureSource::Expression(init),
        });
        if discipline.is_parallel() {
            desc.sort_key = match contract {
                JobContract::Entity => {
                    let name = ctx
                        .symbols
                        .register(SymbolKey::Node { node, role: "sortKey" }, "sortKey");
                    desc.params.push(
                        ParamData::new(name.clone(), "int", RefKind::None)
                            .with_attribute("ChunkIndexInQuery"),
                    );
                    Some(name)
                }
                JobContract::Chunk => graph
                    .port_ref(node, pn::UNFILTERED_CHUNK_INDEX)
                    .ok()
                    .and_then(|p| ctx.symbols.get(&SymbolKey::Port(p)))
                    .map(str::to_string),
            };
        }
    }

    debug!(
        node = %node,
        job = %desc.type_name,
        fields = desc.fields.len(),
        "built job descriptor"
    );
    ctx.jobs.insert(node, desc);
    Ok(())
}

/// The captured value an assignment in the job body targets, if any.
/// Captures are copies, so the write never reaches the system.
fn captured_target(
    ctx: &CompileContext<'_>,
    analysis: &BoundaryAnalysis,
    desc: &JobDescriptor,
    node: NodeId,
) -> Option<String> {
    let graph = ctx.graph;
    let target = graph.port_ref(node, pn::TARGET).ok()?;
    let source = graph.source_of(target)?;
    if analysis.crossings.contains_key(&source) {
        return desc
            .field(&CaptureOwner::Port(source))
            .map(|f| f.name.clone());
    }
    match &graph.node(source.node)?.kind {
        NodeKind::Member {
            target: MemberTarget::Variable(member) | MemberTarget::Property(member),
        } if analysis.members.contains(member) || analysis.properties.contains(member) => ctx
            .symbols
            .get(&SymbolKey::Member(*member))
            .map(str::to_string),
        _ => None,
    }
}

/// Queues the post-generation step that renders the job type of `node`.
pub(crate) fn schedule_synthesis(ctx: &mut CompileContext<'_>, node: NodeId) {
    ctx.push_post_generation(PostGeneration {
        nested: Some(node),
        run: Box::new(move |ctx| synthesize(ctx, node)),
    });
}

/// Field initializers for constructing the job, in field order. Job
/// variables are read from `executor` and skipped when unassigned.
pub(crate) fn construction_fields(
    ctx: &mut CompileContext<'_>,
    desc: &JobDescriptor,
    executor: Option<NodeId>,
) -> Result<Vec<(String, String)>, CodegenError> {
    let graph = ctx.graph;
    let variables = graph.require_node(desc.node)?.kind.job_variables();
    let mut fields = Vec::new();
    for field in &desc.fields {
        let value = match &field.source {
            CaptureSource::Port(source) => {
                generate::with_read(ctx, |ctx| generate::output_value(ctx, *source))?
            }
            CaptureSource::Expression(expression) => expression.clone(),
            CaptureSource::JobVariable(index) => {
                let (Some(executor), Some(variable)) = (executor, variables.get(*index)) else {
                    continue;
                };
                match generate::optional_input(ctx, executor, &variable.name)? {
                    Some(value) => value,
                    None => continue,
                }
            }
        };
        fields.push((field.name.clone(), value));
    }
    Ok(fields)
}

fn synthesize<'g>(
    ctx: &mut CompileContext<'g>,
    node: NodeId,
) -> Result<Vec<PostGeneration<'g>>, CodegenError> {
    let desc = ctx
        .jobs
        .get(&node)
        .cloned()
        .ok_or_else(|| CodegenError::InvalidGraph(format!("job {node} was never described")))?;
    let body = ctx.with_scope(Scope::Job(node), |ctx| generate::flow(ctx, desc.body))?;

    let modifiers = match desc.contract {
        JobContract::Entity => "public partial",
        JobContract::Chunk => "public",
    };
    let mut class = ClassData::new(desc.type_name.clone(), TypeKind::Struct, modifiers);
    if desc.burst && ctx.burst_enabled() {
        class.attributes.push("BurstCompile".into());
    }
    class.attributes.extend(desc.attributes.iter().cloned());
    class.bases.push(desc.contract.interface().into());

    let parallel = desc.discipline.is_parallel();
    for field in &desc.fields {
        if matches!(field.owner, CaptureOwner::Property(_)) {
            continue;
        }
        let mut data = FieldData::public(field.name.clone(), field.ty.clone());
        if parallel && !field.mutable {
            data.attributes.push(READ_ONLY_ATTRIBUTE.into());
        }
        class.fields.push(data);
    }

    for property in &desc.properties {
        class.properties.extend(system::property_data(ctx, *property));
    }

    let mut execute = MethodData::new("Execute", "public", "void");
    execute.params = desc.params.clone();
    execute.add_code(0, body);
    class.methods.push(execute);

    for function in &desc.functions {
        let method = ctx.with_scope(Scope::Job(node), |ctx| {
            system::function_method(ctx, *function, true)
        })?;
        class.methods.push(method);
    }

    let unit = ctx.indent_unit();
    let mut text = class.render(&unit);
    if ctx.options.traceability {
        let title = ctx.graph.node(node).map_or("", |n| n.name.as_str());
        text = emit::wrap_with_information(&text, node, title);
    }
    debug!(node = %node, job = %desc.type_name, "synthesized job type");
    ctx.nested.push(text);
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgraph_core::{
        BinaryOp, GraphSettings, JobEntitySpec, LifecycleEvent, LiteralValue,
    };

    #[test]
    fn discipline_is_most_permissive_executor() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        let job = g
            .add_node("Move", NodeKind::JobEntity(JobEntitySpec::new(vec![])), root)
            .unwrap();
        assert_eq!(job_discipline(&g, job), Discipline::Schedule);
        for run_with in [Discipline::Run, Discipline::ScheduleParallel] {
            g.add_node(
                "Exec",
                NodeKind::JobExecutor {
                    run_with,
                    job: Some(job),
                },
                root,
            )
            .unwrap();
        }
        assert_eq!(job_discipline(&g, job), Discipline::ScheduleParallel);
    }

    #[test]
    fn operator_type_is_inferred_from_operands() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        let _ = g
            .add_node("Update", NodeKind::Event(LifecycleEvent::Update), root)
            .unwrap();
        let one = g
            .add_node(
                "one",
                NodeKind::Literal {
                    value: LiteralValue::Float(1.0),
                },
                root,
            )
            .unwrap();
        let add = g
            .add_node(
                "sum",
                NodeKind::Operator {
                    op: BinaryOp::Add,
                    ty: None,
                },
                root,
            )
            .unwrap();
        let out = g.port_ref(add, "Out").unwrap();
        assert_eq!(infer_type(&g, out), None);
        g.connect(one, "Out", add, "b").unwrap();
        assert_eq!(infer_type(&g, out), Some(TypeRef::float()));
    }

    #[test]
    fn filters_become_attributes() {
        let filters = QueryFilters {
            with_all: vec![TypeRef::component("Player")],
            with_none: vec![TypeRef::component("Dead"), TypeRef::component("Frozen")],
            options: vec!["IncludeDisabledEntities".into()],
            ..QueryFilters::default()
        };
        assert_eq!(
            filter_attributes(&filters),
            vec![
                "WithAll(typeof(Player))".to_string(),
                "WithNone(typeof(Dead), typeof(Frozen))".to_string(),
                "WithOptions(EntityQueryOptions.IncludeDisabledEntities)".to_string(),
            ]
        );
    }
}
