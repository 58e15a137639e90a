//! Entity query declarations shared by foreach and job nodes.
//!
//! A query names the components each matched entity is bound with
//! ([`QueryItem`]) plus filters that narrow the match without binding
//! anything ([`QueryFilters`]).

use serde::{Deserialize, Serialize};

use crate::port::PortAccess;
use crate::types::TypeRef;

/// How an iterated element is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemAccess {
    /// `RefRO<T>` when iterating, `in T` in a job.
    ReadOnly,
    /// `RefRW<T>` when iterating, `ref T` in a job.
    ReadWrite,
    /// Bound by value: aspects and other non-component types.
    Value,
}

impl ItemAccess {
    pub fn port_access(self) -> PortAccess {
        match self {
            ItemAccess::ReadWrite => PortAccess::ReadWrite,
            ItemAccess::ReadOnly | ItemAccess::Value => PortAccess::ReadOnly,
        }
    }

    /// Component access items must name a component type.
    pub fn requires_component(self) -> bool {
        !matches!(self, ItemAccess::Value)
    }
}

/// One bound element of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryItem {
    /// Port name; also the hint for the generated parameter name.
    pub name: String,
    /// `None` while unassigned.
    pub ty: Option<TypeRef>,
    pub access: ItemAccess,
}

impl QueryItem {
    pub fn new(name: impl Into<String>, ty: TypeRef, access: ItemAccess) -> Self {
        QueryItem {
            name: name.into(),
            ty: Some(ty),
            access,
        }
    }

    pub fn read_only(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ty, ItemAccess::ReadOnly)
    }

    pub fn read_write(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ty, ItemAccess::ReadWrite)
    }

    pub fn value(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ty, ItemAccess::Value)
    }
}

/// Non-binding query filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    pub with_all: Vec<TypeRef>,
    pub with_any: Vec<TypeRef>,
    pub with_none: Vec<TypeRef>,
    pub with_change_filter: Vec<TypeRef>,
    /// Each entry adds a value input supplying the shared component value.
    pub with_shared_component: Vec<TypeRef>,
    /// `EntityQueryOptions` member names, e.g. `IncludeDisabledEntities`.
    pub options: Vec<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.with_all.is_empty()
            && self.with_any.is_empty()
            && self.with_none.is_empty()
            && self.with_change_filter.is_empty()
            && self.with_shared_component.is_empty()
            && self.options.is_empty()
    }
}

/// Execution discipline for a job or iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Discipline {
    /// Immediate, on the calling thread.
    Run,
    /// Deferred, single worker.
    Schedule,
    /// Deferred, data-parallel across chunks.
    ScheduleParallel,
}

impl Discipline {
    pub fn is_deferred(self) -> bool {
        !matches!(self, Discipline::Run)
    }

    pub fn is_parallel(self) -> bool {
        matches!(self, Discipline::ScheduleParallel)
    }

    /// Name of the scheduling method on the job.
    pub fn method_name(self) -> &'static str {
        match self {
            Discipline::Run => "Run",
            Discipline::Schedule => "Schedule",
            Discipline::ScheduleParallel => "ScheduleParallel",
        }
    }
}

/// Which index parameters an `IJobEntity` receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityIndexKind {
    #[default]
    None,
    /// `[EntityIndexInQuery] int`.
    Entity,
    /// `[EntityIndexInChunk] int`.
    Chunk,
    ChunkAndEntity,
}

impl EntityIndexKind {
    pub fn in_query(self) -> bool {
        matches!(self, EntityIndexKind::Entity | EntityIndexKind::ChunkAndEntity)
    }

    pub fn in_chunk(self) -> bool {
        matches!(self, EntityIndexKind::Chunk | EntityIndexKind::ChunkAndEntity)
    }
}

/// A field declared on a job and assigned by its executors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobVariable {
    pub name: String,
    pub ty: TypeRef,
    /// Writable from the job body. Read-only otherwise.
    pub mutable: bool,
}

impl JobVariable {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        JobVariable {
            name: name.into(),
            ty,
            mutable: false,
        }
    }
}

/// Configuration of an entities foreach node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeachSpec {
    pub items: Vec<QueryItem>,
    pub filters: QueryFilters,
    pub run: Discipline,
    /// Bind the current entity as an extra output.
    pub entity_access: bool,
    /// `[BurstCompile]` on the synthesized job when deferred.
    pub burst: bool,
}

impl ForeachSpec {
    pub fn new(items: Vec<QueryItem>, run: Discipline) -> Self {
        ForeachSpec {
            items,
            filters: QueryFilters::default(),
            run,
            entity_access: false,
            burst: true,
        }
    }
}

/// Configuration of a user-declared `IJobEntity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntitySpec {
    pub items: Vec<QueryItem>,
    pub filters: QueryFilters,
    pub index: EntityIndexKind,
    pub entity_access: bool,
    pub variables: Vec<JobVariable>,
    pub burst: bool,
}

impl JobEntitySpec {
    pub fn new(items: Vec<QueryItem>) -> Self {
        JobEntitySpec {
            items,
            filters: QueryFilters::default(),
            index: EntityIndexKind::None,
            entity_access: false,
            variables: Vec::new(),
            burst: true,
        }
    }
}

/// Configuration of a user-declared `IJobChunk`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobChunkSpec {
    pub variables: Vec<JobVariable>,
    pub burst: bool,
}
