//! The state threaded through every phase of one compilation.
//!
//! A [`CompileContext`] is created per unit and dropped when the unit is
//! rendered. It owns the symbol table, the port thunks registered during
//! initialization, the boundary analyses and job descriptors, the methods
//! being filled, and the post-generation queue.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use sysgraph_check::{DiagnosticKind, DiagnosticOwner, ErrorAnalyzer};
use sysgraph_core::{NodeId, PortRef, SystemGraph, UnitFlavor};
use tracing::warn;

use crate::capture::BoundaryAnalysis;
use crate::class::{ClassData, MethodData, TypeKind};
use crate::error::CodegenError;
use crate::job::JobDescriptor;
use crate::symbols::{SymbolKey, SymbolTable};
use crate::CompileOptions;

/// Deferred expression for an output port, evaluated per use site.
pub(crate) type PortThunk = Rc<dyn Fn(&GenerationState) -> String>;

/// Whether the expression being generated is read or assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessContext {
    Read,
    Set,
}

/// Which type the code being generated lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Root,
    /// The synthesized type of a boundary node.
    Job(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationState {
    pub access: AccessContext,
    pub scope: Scope,
}

/// Unit-wide handles shared by every node that needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    CommandBuffer,
    EntityManager,
}

impl Handle {
    pub fn key(self) -> SymbolKey {
        match self {
            Handle::CommandBuffer => SymbolKey::Unit("ecb"),
            Handle::EntityManager => SymbolKey::Unit("entityManager"),
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Handle::CommandBuffer => "ecb",
            Handle::EntityManager => "entityManager",
        }
    }

    fn initializer(self, state: &str) -> String {
        match self {
            Handle::CommandBuffer => format!(
                "SystemAPI.GetSingleton<EndSimulationEntityCommandBufferSystem.Singleton>().CreateCommandBuffer({state}.WorldUnmanaged)"
            ),
            Handle::EntityManager => format!("{state}.EntityManager"),
        }
    }

    fn priority(self) -> i32 {
        match self {
            Handle::CommandBuffer => -1000,
            Handle::EntityManager => -999,
        }
    }
}

/// Name of the update method handles are declared in.
pub const UPDATE_METHOD: &str = "OnUpdate";

/// A queued post-generation step. Steps may return further steps, which
/// run after everything already queued.
pub(crate) struct PostGeneration<'g> {
    /// The boundary whose synthesized type this step builds. Structural
    /// errors in such a step drop that type instead of the unit.
    pub nested: Option<NodeId>,
    #[allow(clippy::type_complexity)]
    pub run: Box<
        dyn FnOnce(&mut CompileContext<'g>) -> Result<Vec<PostGeneration<'g>>, CodegenError> + 'g,
    >,
}

pub(crate) struct CompileContext<'g> {
    pub graph: &'g SystemGraph,
    pub options: &'g CompileOptions,
    pub symbols: SymbolTable,
    pub analyzer: ErrorAnalyzer,
    pub state: GenerationState,
    /// The unit's own declaration. Methods live in `methods` until render.
    pub unit: ClassData,
    pub methods: IndexMap<String, MethodData>,
    pub usings: IndexSet<String>,
    pub boundaries: IndexMap<NodeId, BoundaryAnalysis>,
    pub jobs: IndexMap<NodeId, JobDescriptor>,
    /// Boundaries whose synthesized type was dropped.
    pub failed: BTreeSet<NodeId>,
    /// Rendered nested types, in completion order.
    pub nested: Vec<String>,
    owners: HashMap<NodeId, NodeId>,
    thunks: HashMap<PortRef, PortThunk>,
    redirects: HashMap<PortRef, (NodeId, String)>,
    unavailable: HashSet<PortRef>,
    handles: IndexMap<Handle, String>,
    /// Unit-level graph function whose body is being generated.
    function: Option<String>,
    function_handles: HashSet<(String, Handle)>,
    post_generation: VecDeque<PostGeneration<'g>>,
    flow_stack: Vec<NodeId>,
}

impl<'g> CompileContext<'g> {
    pub fn new(graph: &'g SystemGraph, options: &'g CompileOptions) -> Self {
        CompileContext {
            graph,
            options,
            symbols: SymbolTable::new(),
            analyzer: ErrorAnalyzer::new(),
            state: GenerationState {
                access: AccessContext::Read,
                scope: Scope::Root,
            },
            unit: ClassData::new(graph.settings.name.clone(), TypeKind::Struct, "public partial"),
            methods: IndexMap::new(),
            usings: IndexSet::new(),
            boundaries: IndexMap::new(),
            jobs: IndexMap::new(),
            failed: BTreeSet::new(),
            nested: Vec::new(),
            owners: HashMap::new(),
            thunks: HashMap::new(),
            redirects: HashMap::new(),
            unavailable: HashSet::new(),
            handles: IndexMap::new(),
            function: None,
            function_handles: HashSet::new(),
            post_generation: VecDeque::new(),
            flow_stack: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn indent_unit(&self) -> String {
        " ".repeat(self.options.indent)
    }

    /// Expression for the system state inside lifecycle methods.
    pub fn state_name(&self) -> &'static str {
        match self.graph.settings.flavor {
            UnitFlavor::ManagedSystem => "CheckedStateRef",
            _ => "state",
        }
    }

    /// `[BurstCompile]` is emitted only when enabled and not debugging.
    pub fn burst_enabled(&self) -> bool {
        self.graph.settings.burst_compile && !self.options.debug_script
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    pub fn report(&mut self, node: NodeId, kind: DiagnosticKind) {
        warn!(node = %node, "{kind}");
        self.analyzer.report_node(node, kind);
    }

    pub fn report_owner(&mut self, owner: DiagnosticOwner, kind: DiagnosticKind) {
        warn!(owner = %owner, "{kind}");
        self.analyzer.report(owner, kind);
    }

    // -----------------------------------------------------------------------
    // Ports
    // -----------------------------------------------------------------------

    pub fn set_thunk(&mut self, port: PortRef, thunk: PortThunk) {
        self.thunks.insert(port, thunk);
    }

    /// Registers an output whose expression is the same in every context.
    pub fn set_fixed(&mut self, port: PortRef, expression: impl Into<String>) {
        let expression = expression.into();
        self.set_thunk(port, Rc::new(move |_| expression.clone()));
    }

    pub fn thunk(&self, port: PortRef) -> Option<PortThunk> {
        self.thunks.get(&port).cloned()
    }

    /// Makes `consumer` read `field` while generating inside `boundary`.
    pub fn redirect(&mut self, consumer: PortRef, boundary: NodeId, field: String) {
        self.redirects.insert(consumer, (boundary, field));
    }

    pub fn redirect_for(&self, consumer: PortRef) -> Option<String> {
        match (self.redirects.get(&consumer), self.state.scope) {
            (Some((boundary, field)), Scope::Job(current)) if *boundary == current => {
                Some(field.clone())
            }
            _ => None,
        }
    }

    pub fn mark_unavailable(&mut self, consumer: PortRef) {
        self.unavailable.insert(consumer);
    }

    pub fn is_unavailable(&self, consumer: PortRef) -> bool {
        self.unavailable.contains(&consumer)
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Stores the analysis and claims its body nodes for `boundary`. A node
    /// reachable from two boundaries belongs to the first one registered.
    pub fn register_boundary(&mut self, analysis: BoundaryAnalysis) {
        for node in &analysis.after {
            self.owners.entry(*node).or_insert(analysis.boundary);
        }
        self.boundaries.insert(analysis.boundary, analysis);
    }

    /// The boundary whose synthesized type `node` is generated into.
    pub fn owner_of(&self, node: NodeId) -> Option<NodeId> {
        self.owners.get(&node).copied()
    }

    // -----------------------------------------------------------------------
    // Methods and handles
    // -----------------------------------------------------------------------

    pub fn method_mut(&mut self, name: &str) -> Result<&mut MethodData, CodegenError> {
        self.methods
            .get_mut(name)
            .ok_or_else(|| CodegenError::MissingEntryPoint {
                method: name.to_string(),
            })
    }

    /// Resolves a unit-wide handle, declaring it at the top of the update
    /// method the first time it is requested.
    pub fn root_handle(&mut self, handle: Handle) -> Result<String, CodegenError> {
        if let Some(name) = self.handles.get(&handle) {
            return Ok(name.clone());
        }
        if !self.methods.contains_key(UPDATE_METHOD) {
            return Err(CodegenError::MissingEntryPoint {
                method: UPDATE_METHOD.to_string(),
            });
        }
        let name = self.symbols.register(handle.key(), handle.hint());
        let declaration = format!("var {name} = {};", handle.initializer(self.state_name()));
        self.method_mut(UPDATE_METHOD)?
            .add_code(handle.priority(), declaration);
        self.handles.insert(handle, name.clone());
        Ok(name)
    }

    /// Resolves `handle` for code generated at the unit level. Inside a
    /// graph function of a managed system the handle is declared at the top
    /// of that function; unmanaged functions have no system state to build
    /// one from, which is reported against `node`.
    pub fn handle(&mut self, node: NodeId, handle: Handle) -> Result<String, CodegenError> {
        let Some(method) = self.function.clone() else {
            return self.root_handle(handle);
        };
        let name = self.symbols.register(handle.key(), handle.hint());
        if !self.function_handles.insert((method.clone(), handle)) {
            return Ok(name);
        }
        if self.graph.settings.flavor == UnitFlavor::ManagedSystem {
            let declaration = format!("var {name} = {};", handle.initializer(self.state_name()));
            self.method_mut(&method)?
                .add_code(handle.priority(), declaration);
        } else {
            self.report(node, DiagnosticKind::HandleOutsideUpdate { method });
        }
        Ok(name)
    }

    // -----------------------------------------------------------------------
    // Generation state
    // -----------------------------------------------------------------------

    /// Runs `f` while generating the body of unit-level function `method`.
    pub fn with_function<R>(&mut self, method: String, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.function.replace(method);
        let result = f(self);
        self.function = saved;
        result
    }

    pub fn with_access<R>(&mut self, access: AccessContext, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.state.access;
        self.state.access = access;
        let result = f(self);
        self.state.access = saved;
        result
    }

    pub fn with_scope<R>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.state;
        self.state = GenerationState {
            access: AccessContext::Read,
            scope,
        };
        let result = f(self);
        self.state = saved;
        result
    }

    /// Pushes `node` on the flow stack; `false` if it is already on it.
    pub fn enter_flow(&mut self, node: NodeId) -> bool {
        if self.flow_stack.contains(&node) {
            return false;
        }
        self.flow_stack.push(node);
        true
    }

    pub fn leave_flow(&mut self) {
        self.flow_stack.pop();
    }

    // -----------------------------------------------------------------------
    // Post-generation queue
    // -----------------------------------------------------------------------

    pub fn push_post_generation(&mut self, step: PostGeneration<'g>) {
        self.post_generation.push_back(step);
    }

    pub fn next_post_generation(&mut self) -> Option<PostGeneration<'g>> {
        self.post_generation.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgraph_core::{GraphSettings, LifecycleEvent, NodeKind};

    fn system_with_update() -> SystemGraph {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        g.add_node("Update", NodeKind::Event(LifecycleEvent::Update), root)
            .unwrap();
        g
    }

    #[test]
    fn handles_are_declared_once() {
        let g = system_with_update();
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&g, &options);
        ctx.methods.insert(
            UPDATE_METHOD.into(),
            MethodData::new(UPDATE_METHOD, "public", "void"),
        );
        let first = ctx.root_handle(Handle::CommandBuffer).unwrap();
        let second = ctx.root_handle(Handle::CommandBuffer).unwrap();
        assert_eq!(first, "ecb");
        assert_eq!(first, second);
        let body = ctx.methods[UPDATE_METHOD].body();
        assert_eq!(body.matches("CreateCommandBuffer").count(), 1);
        assert!(body.contains("(state.WorldUnmanaged)"));
    }

    #[test]
    fn missing_update_method_is_structural() {
        let g = system_with_update();
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&g, &options);
        let err = ctx.root_handle(Handle::EntityManager).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn managed_function_declares_its_own_handle() {
        let mut settings = GraphSettings::new("S");
        settings.flavor = UnitFlavor::ManagedSystem;
        let g = SystemGraph::new(settings);
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&g, &options);
        ctx.methods
            .insert("Spawn".into(), MethodData::new("Spawn", "public", "void"));
        let name = ctx
            .with_function("Spawn".into(), |ctx| {
                ctx.handle(NodeId(1), Handle::CommandBuffer)?;
                ctx.handle(NodeId(2), Handle::CommandBuffer)
            })
            .unwrap();
        assert_eq!(name, "ecb");
        let body = ctx.methods["Spawn"].body();
        assert_eq!(body.matches("var ecb = ").count(), 1);
        assert!(body.contains("(CheckedStateRef.WorldUnmanaged)"));
        assert!(ctx.analyzer.is_empty());
    }

    #[test]
    fn unmanaged_function_handle_is_reported_once() {
        let g = system_with_update();
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&g, &options);
        ctx.methods
            .insert("Spawn".into(), MethodData::new("Spawn", "public", "void"));
        ctx.with_function("Spawn".into(), |ctx| {
            ctx.handle(NodeId(1), Handle::CommandBuffer)?;
            ctx.handle(NodeId(2), Handle::CommandBuffer)
        })
        .unwrap();
        assert_eq!(
            ctx.analyzer.diagnostics()[..],
            [sysgraph_check::Diagnostic::new(
                DiagnosticOwner::Node(NodeId(1)),
                DiagnosticKind::HandleOutsideUpdate {
                    method: "Spawn".into()
                },
            )]
        );
        assert!(ctx.methods["Spawn"].body().is_empty());
    }

    #[test]
    fn access_is_restored() {
        let g = system_with_update();
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&g, &options);
        let inner = ctx.with_access(AccessContext::Set, |ctx| ctx.state.access);
        assert_eq!(inner, AccessContext::Set);
        assert_eq!(ctx.state.access, AccessContext::Read);
    }

    #[test]
    fn redirects_apply_only_inside_their_boundary() {
        let g = system_with_update();
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&g, &options);
        let consumer = PortRef::new(NodeId(5), 1);
        ctx.redirect(consumer, NodeId(2), "x".into());
        assert_eq!(ctx.redirect_for(consumer), None);
        let inside = ctx.with_scope(Scope::Job(NodeId(2)), |ctx| ctx.redirect_for(consumer));
        assert_eq!(inside.as_deref(), Some("x"));
        let other = ctx.with_scope(Scope::Job(NodeId(3)), |ctx| ctx.redirect_for(consumer));
        assert_eq!(other, None);
    }
}
