//! Graph nodes and their port layouts.
//!
//! A [`Node`] wraps a [`NodeKind`] with its display name, owning container and
//! the ports computed for that kind when the node was added. Port layouts are
//! derived here in one place so the graph, analyzers and code generator agree
//! on names and positions.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::CoreError;
use crate::id::{ContainerId, MemberId, NodeId};
use crate::member::Member;
use crate::port::{PortAccess, PortDef};
use crate::query::{Discipline, ForeachSpec, JobChunkSpec, JobEntitySpec, JobVariable};
use crate::types::{LiteralValue, TypeRef};

/// Port names shared between node layouts and their consumers.
pub mod port_names {
    pub const ENTER: &str = "enter";
    pub const EXIT: &str = "exit";
    pub const BODY: &str = "body";
    pub const EXECUTE: &str = "execute";
    pub const OUT: &str = "Out";
    pub const VALUE: &str = "value";
    pub const TARGET: &str = "target";
    pub const CONDITION: &str = "condition";
    pub const TRUE: &str = "true";
    pub const FALSE: &str = "false";
    pub const ENTITY: &str = "entity";
    pub const COMPONENT: &str = "component";
    pub const INSTANCE: &str = "instance";
    pub const STATE: &str = "state";
    pub const DELTA_TIME: &str = "deltaTime";
    pub const ELAPSED_TIME: &str = "elapsedTime";
    pub const ENTITY_MANAGER: &str = "entityManager";
    pub const ENTITY_INDEX_IN_QUERY: &str = "entityIndexInQuery";
    pub const ENTITY_INDEX_IN_CHUNK: &str = "entityIndexInChunk";
    pub const CHUNK: &str = "chunk";
    pub const UNFILTERED_CHUNK_INDEX: &str = "unfilteredChunkIndex";
    pub const USE_ENABLED_MASK: &str = "useEnabledMask";
    pub const CHUNK_ENABLED_MASK: &str = "chunkEnabledMask";
    pub const QUERY: &str = "query";
    pub const DEPENDS_ON: &str = "dependsOn";
    pub const CHUNK_BASE_ENTITY_INDICES: &str = "chunkBaseEntityIndices";
    pub const JOB_HANDLE: &str = "jobHandle";
    pub const A: &str = "a";
    pub const B: &str = "b";
}

use port_names as pn;

/// Port list storage. Most nodes have four ports or fewer.
pub type Ports = SmallVec<[PortDef; 4]>;

/// System lifecycle callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Create,
    Update,
    Destroy,
    StartRunning,
    StopRunning,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 5] = [
        LifecycleEvent::Create,
        LifecycleEvent::Update,
        LifecycleEvent::Destroy,
        LifecycleEvent::StartRunning,
        LifecycleEvent::StopRunning,
    ];

    /// Name of the generated method.
    pub fn method_name(self) -> &'static str {
        match self {
            LifecycleEvent::Create => "OnCreate",
            LifecycleEvent::Update => "OnUpdate",
            LifecycleEvent::Destroy => "OnDestroy",
            LifecycleEvent::StartRunning => "OnStartRunning",
            LifecycleEvent::StopRunning => "OnStopRunning",
        }
    }

    /// Start/stop callbacks need the `ISystemStartStop` contract.
    pub fn is_start_stop(self) -> bool {
        matches!(self, LifecycleEvent::StartRunning | LifecycleEvent::StopRunning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Comparison and logical operators always produce `bool`.
    pub fn is_boolean(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }
}

/// How an external member is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberInvoke {
    Field { ty: TypeRef, read_only: bool },
    Property { ty: TypeRef, read_only: bool },
    Method {
        params: Vec<(String, TypeRef)>,
        /// `None` for `void`: the node becomes a flow statement.
        returns: Option<TypeRef>,
    },
}

/// A member of a type outside the graph, e.g. `SystemAPI.Time` or
/// `math.length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMember {
    /// Declaring type for static access. Ignored when `instance` is set.
    pub owner: Option<TypeRef>,
    /// Instance type; adds an `instance` value input.
    pub instance: Option<TypeRef>,
    pub name: String,
    pub generic_args: Vec<TypeRef>,
    pub invoke: MemberInvoke,
}

impl ExternalMember {
    /// `Owner.name(params)` static method.
    pub fn static_method(
        owner: TypeRef,
        name: impl Into<String>,
        params: Vec<(String, TypeRef)>,
        returns: Option<TypeRef>,
    ) -> Self {
        ExternalMember {
            owner: Some(owner),
            instance: None,
            name: name.into(),
            generic_args: Vec::new(),
            invoke: MemberInvoke::Method { params, returns },
        }
    }

    /// `instance.name` field access.
    pub fn instance_field(instance: TypeRef, name: impl Into<String>, ty: TypeRef) -> Self {
        ExternalMember {
            owner: None,
            instance: Some(instance),
            name: name.into(),
            generic_args: Vec::new(),
            invoke: MemberInvoke::Field {
                ty,
                read_only: false,
            },
        }
    }

    /// Returns `true` when the static owner is the named type.
    pub fn is_owned_by(&self, type_name: &str) -> bool {
        self.instance.is_none() && self.owner.as_ref().is_some_and(|o| o.name == type_name)
    }
}

/// What a member node reads or calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberTarget {
    Function(MemberId),
    Property(MemberId),
    Variable(MemberId),
    External(ExternalMember),
}

/// The behavior of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Lifecycle entry point of a system.
    Event(LifecycleEvent),
    /// Entry point of a graph function body.
    FunctionEntry { function: MemberId },
    Return,
    Literal { value: LiteralValue },
    Operator { op: BinaryOp, ty: Option<TypeRef> },
    Member { target: MemberTarget },
    /// `target = value;`
    SetValue,
    /// Declares a local variable.
    Local { name: String, ty: TypeRef },
    Branch,
    /// Iterate entities matching a query, inline or as a synthesized job.
    EntitiesForeach(ForeachSpec),
    /// Declares an `IJobEntity`; its body hangs off the `execute` port.
    JobEntity(JobEntitySpec),
    /// Declares an `IJobChunk`; its body hangs off the `execute` port.
    JobChunk(JobChunkSpec),
    /// Constructs and runs/schedules a job node.
    JobExecutor {
        run_with: Discipline,
        job: Option<NodeId>,
    },
    CreateEntity,
    DestroyEntity,
    GetComponent { component: Option<TypeRef> },
    SetComponent { component: Option<TypeRef> },
    SetComponentEnabled { component: Option<TypeRef> },
}

impl NodeKind {
    /// Returns `true` for the user-declared job types.
    pub fn is_job(&self) -> bool {
        matches!(self, NodeKind::JobEntity(_) | NodeKind::JobChunk(_))
    }

    /// Variables declared by a job node; empty for anything else.
    pub fn job_variables(&self) -> &[JobVariable] {
        match self {
            NodeKind::JobEntity(spec) => &spec.variables,
            NodeKind::JobChunk(spec) => &spec.variables,
            _ => &[],
        }
    }

    /// Computes the port layout for this kind.
    ///
    /// `members` resolves graph member references; `job` is the kind of the
    /// job referenced by an executor, if any.
    pub fn ports(&self, members: &[Member], job: Option<&NodeKind>) -> Result<Ports, CoreError> {
        let mut ports = Ports::new();
        match self {
            NodeKind::Event(event) => {
                ports.push(PortDef::flow_out(pn::EXIT));
                ports.push(PortDef::value_out(
                    pn::STATE,
                    Some(TypeRef::value_struct("SystemState")),
                    PortAccess::ReadWrite,
                ));
                if *event == LifecycleEvent::Update {
                    ports.push(PortDef::value_out(
                        pn::DELTA_TIME,
                        Some(TypeRef::float()),
                        PortAccess::ReadOnly,
                    ));
                    ports.push(PortDef::value_out(
                        pn::ELAPSED_TIME,
                        Some(TypeRef::double()),
                        PortAccess::ReadOnly,
                    ));
                    ports.push(PortDef::value_out(
                        pn::ENTITY_MANAGER,
                        Some(TypeRef::value_struct("EntityManager")),
                        PortAccess::ReadOnly,
                    ));
                }
            }
            NodeKind::FunctionEntry { function } => {
                let func = members
                    .get(function.0 as usize)
                    .and_then(Member::as_function)
                    .ok_or(CoreError::MemberNotFound { id: *function })?;
                ports.push(PortDef::flow_out(pn::EXIT));
                for param in &func.params {
                    ports.push(PortDef::value_out(
                        param.name.clone(),
                        Some(param.ty.clone()),
                        PortAccess::ReadWrite,
                    ));
                }
            }
            NodeKind::Return => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(pn::VALUE, None));
            }
            NodeKind::Literal { value } => {
                ports.push(PortDef::value_out(
                    pn::OUT,
                    Some(value.type_ref()),
                    PortAccess::ReadOnly,
                ));
            }
            NodeKind::Operator { op, ty } => {
                ports.push(PortDef::value_in(pn::A, ty.clone()));
                ports.push(PortDef::value_in(pn::B, ty.clone()));
                let out = if op.is_boolean() {
                    Some(TypeRef::bool())
                } else {
                    ty.clone()
                };
                ports.push(PortDef::value_out(pn::OUT, out, PortAccess::ReadOnly));
            }
            NodeKind::Member { target } => member_ports(target, members, &mut ports)?,
            NodeKind::SetValue => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(pn::TARGET, None));
                ports.push(PortDef::value_in(pn::VALUE, None));
                ports.push(PortDef::flow_out(pn::EXIT));
            }
            NodeKind::Local { ty, .. } => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(pn::VALUE, Some(ty.clone())));
                ports.push(PortDef::flow_out(pn::EXIT));
                ports.push(PortDef::value_out(
                    pn::OUT,
                    Some(ty.clone()),
                    PortAccess::ReadWrite,
                ));
            }
            NodeKind::Branch => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(pn::CONDITION, Some(TypeRef::bool())));
                ports.push(PortDef::flow_out(pn::TRUE));
                ports.push(PortDef::flow_out(pn::FALSE));
                ports.push(PortDef::flow_out(pn::EXIT));
            }
            NodeKind::EntitiesForeach(spec) => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::flow_out(pn::BODY));
                ports.push(PortDef::flow_out(pn::EXIT));
                for (i, shared) in spec.filters.with_shared_component.iter().enumerate() {
                    ports.push(PortDef::value_in(
                        format!("sharedFilter{i}"),
                        Some(shared.clone()),
                    ));
                }
                if spec.entity_access {
                    ports.push(entity_out());
                }
                for item in &spec.items {
                    ports.push(PortDef::value_out(
                        item.name.clone(),
                        item.ty.clone(),
                        item.access.port_access(),
                    ));
                }
            }
            NodeKind::JobEntity(spec) => {
                ports.push(PortDef::flow_out(pn::EXECUTE));
                if spec.entity_access {
                    ports.push(entity_out());
                }
                if spec.index.in_query() {
                    ports.push(int_out(pn::ENTITY_INDEX_IN_QUERY));
                }
                if spec.index.in_chunk() {
                    ports.push(int_out(pn::ENTITY_INDEX_IN_CHUNK));
                }
                for item in &spec.items {
                    ports.push(PortDef::value_out(
                        item.name.clone(),
                        item.ty.clone(),
                        item.access.port_access(),
                    ));
                }
                variable_ports(&spec.variables, &mut ports);
            }
            NodeKind::JobChunk(spec) => {
                ports.push(PortDef::flow_out(pn::EXECUTE));
                ports.push(PortDef::value_out(
                    pn::CHUNK,
                    Some(TypeRef::value_struct("ArchetypeChunk")),
                    PortAccess::ReadOnly,
                ));
                ports.push(int_out(pn::UNFILTERED_CHUNK_INDEX));
                ports.push(PortDef::value_out(
                    pn::USE_ENABLED_MASK,
                    Some(TypeRef::bool()),
                    PortAccess::ReadOnly,
                ));
                ports.push(PortDef::value_out(
                    pn::CHUNK_ENABLED_MASK,
                    Some(TypeRef::value_struct("v128")),
                    PortAccess::ReadOnly,
                ));
                variable_ports(&spec.variables, &mut ports);
            }
            NodeKind::JobExecutor { run_with, .. } => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(
                    pn::QUERY,
                    Some(TypeRef::reference("EntityQuery")),
                ));
                ports.push(PortDef::value_in(
                    pn::DEPENDS_ON,
                    Some(TypeRef::value_struct("JobHandle")),
                ));
                if run_with.is_parallel() {
                    ports.push(PortDef::value_in(
                        pn::CHUNK_BASE_ENTITY_INDICES,
                        Some(TypeRef::value_struct("NativeArray<int>")),
                    ));
                }
                ports.push(PortDef::flow_out(pn::EXIT));
                ports.push(PortDef::value_out(
                    pn::JOB_HANDLE,
                    Some(TypeRef::value_struct("JobHandle")),
                    PortAccess::ReadOnly,
                ));
                for variable in job.map(NodeKind::job_variables).unwrap_or_default() {
                    ports.push(PortDef::value_in(
                        variable.name.clone(),
                        Some(variable.ty.clone()),
                    ));
                }
            }
            NodeKind::CreateEntity => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::flow_out(pn::EXIT));
                ports.push(entity_out());
            }
            NodeKind::DestroyEntity => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(pn::ENTITY, Some(TypeRef::entity())));
                ports.push(PortDef::flow_out(pn::EXIT));
            }
            NodeKind::GetComponent { component } => {
                ports.push(PortDef::value_in(pn::ENTITY, Some(TypeRef::entity())));
                ports.push(PortDef::value_out(
                    pn::OUT,
                    component.clone(),
                    PortAccess::ReadOnly,
                ));
            }
            NodeKind::SetComponent { component } => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(pn::ENTITY, Some(TypeRef::entity())));
                ports.push(PortDef::value_in(pn::COMPONENT, component.clone()));
                ports.push(PortDef::flow_out(pn::EXIT));
            }
            NodeKind::SetComponentEnabled { .. } => {
                ports.push(PortDef::flow_in(pn::ENTER));
                ports.push(PortDef::value_in(pn::ENTITY, Some(TypeRef::entity())));
                ports.push(PortDef::value_in(pn::VALUE, Some(TypeRef::bool())));
                ports.push(PortDef::flow_out(pn::EXIT));
            }
        }
        Ok(ports)
    }
}

fn entity_out() -> PortDef {
    PortDef::value_out(pn::ENTITY, Some(TypeRef::entity()), PortAccess::ReadOnly)
}

fn int_out(name: &str) -> PortDef {
    PortDef::value_out(name, Some(TypeRef::int()), PortAccess::ReadOnly)
}

fn variable_ports(variables: &[JobVariable], ports: &mut Ports) {
    for variable in variables {
        let access = if variable.mutable {
            PortAccess::ReadWrite
        } else {
            PortAccess::ReadOnly
        };
        ports.push(PortDef::value_out(
            variable.name.clone(),
            Some(variable.ty.clone()),
            access,
        ));
    }
}

fn member_ports(
    target: &MemberTarget,
    members: &[Member],
    ports: &mut Ports,
) -> Result<(), CoreError> {
    let lookup = |id: &MemberId| {
        members
            .get(id.0 as usize)
            .ok_or(CoreError::MemberNotFound { id: *id })
    };
    match target {
        MemberTarget::Function(id) => {
            let func = lookup(id)?
                .as_function()
                .ok_or(CoreError::MemberNotFound { id: *id })?;
            let params: Vec<(String, TypeRef)> = func
                .params
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect();
            call_ports(&params, func.return_type.as_ref(), ports);
        }
        MemberTarget::Property(id) => {
            let prop = lookup(id)?
                .as_property()
                .ok_or(CoreError::MemberNotFound { id: *id })?;
            ports.push(PortDef::value_out(
                pn::OUT,
                Some(prop.ty.clone()),
                PortAccess::ReadWrite,
            ));
        }
        MemberTarget::Variable(id) => {
            let var = lookup(id)?
                .as_variable()
                .ok_or(CoreError::MemberNotFound { id: *id })?;
            let access = if var.read_only {
                PortAccess::ReadOnly
            } else {
                PortAccess::ReadWrite
            };
            ports.push(PortDef::value_out(pn::OUT, Some(var.ty.clone()), access));
        }
        MemberTarget::External(ext) => {
            if let Some(instance) = &ext.instance {
                ports.push(PortDef::value_in(pn::INSTANCE, Some(instance.clone())));
            }
            match &ext.invoke {
                MemberInvoke::Field { ty, read_only } | MemberInvoke::Property { ty, read_only } => {
                    let access = if *read_only {
                        PortAccess::ReadOnly
                    } else {
                        PortAccess::ReadWrite
                    };
                    ports.push(PortDef::value_out(pn::OUT, Some(ty.clone()), access));
                }
                MemberInvoke::Method { params, returns } => {
                    call_ports(params, returns.as_ref(), ports);
                }
            }
        }
    }
    Ok(())
}

/// Void calls are statements (flow in/out); others are expressions.
fn call_ports(params: &[(String, TypeRef)], returns: Option<&TypeRef>, ports: &mut Ports) {
    if returns.is_none() {
        ports.push(PortDef::flow_in(pn::ENTER));
    }
    for (name, ty) in params {
        ports.push(PortDef::value_in(name.clone(), Some(ty.clone())));
    }
    match returns {
        Some(ty) => ports.push(PortDef::value_out(
            pn::OUT,
            Some(ty.clone()),
            PortAccess::ReadOnly,
        )),
        None => ports.push(PortDef::flow_out(pn::EXIT)),
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node in the system graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Display name; the default hint for generated identifiers.
    pub name: String,
    pub kind: NodeKind,
    /// Which container owns this node.
    pub container: ContainerId,
    pub ports: Ports,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind, container: ContainerId, ports: Ports) -> Self {
        Node {
            name: name.into(),
            kind,
            container,
            ports,
        }
    }

    pub fn port(&self, index: u16) -> Option<&PortDef> {
        self.ports.get(index as usize)
    }

    /// Position of the port named `name`.
    pub fn port_index(&self, name: &str) -> Option<u16> {
        self.ports
            .iter()
            .position(|p| p.name == name)
            .map(|i| i as u16)
    }

    /// Iterates `(index, port)` pairs.
    pub fn indexed_ports(&self) -> impl Iterator<Item = (u16, &PortDef)> {
        self.ports.iter().enumerate().map(|(i, p)| (i as u16, p))
    }

    /// A node with no flow ports only produces values.
    pub fn is_pure_value(&self) -> bool {
        !self.ports.iter().any(PortDef::is_flow)
    }

    pub fn has_flow_input(&self) -> bool {
        self.ports.iter().any(|p| p.is_flow() && p.is_input())
    }
}
