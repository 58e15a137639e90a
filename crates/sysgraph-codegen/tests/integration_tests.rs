//! End-to-end tests for the source generation pipeline.
//!
//! Each test builds a system graph through the `SystemGraph` builder API,
//! compiles it via `sysgraph_codegen::compile()`, and inspects the generated
//! text and diagnostics.
//!
//! Tests cover:
//! - Deferred entity loops synthesized as `IJobEntity` structs
//! - Capture inference for values crossing into a job
//! - Inline `SystemAPI.Query` loops and read/write access
//! - User-declared jobs, executors and command buffers
//! - Graph functions and properties used from job bodies
//! - Assignments to captured values
//! - Determinism, fingerprints, batch isolation and writing to disk

use sysgraph_check::DiagnosticKind;
use sysgraph_codegen::{compile, compile_batch, write_unit, CodegenError, CompileOptions, CompiledUnit};
use sysgraph_core::{
    BinaryOp, Discipline, ForeachSpec, GraphProperty, GraphSettings, GraphVariable, JobEntitySpec,
    LifecycleEvent, LiteralValue, MemberId, MemberTarget, NodeId, NodeKind, Parameter, QueryItem,
    SystemGraph, TypeRef, UnitFlavor,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn system(name: &str) -> SystemGraph {
    SystemGraph::new(GraphSettings::new(name))
}

fn add(g: &mut SystemGraph, name: &str, kind: NodeKind) -> NodeId {
    let root = g.root_container();
    g.add_node(name, kind, root).unwrap()
}

fn update(g: &mut SystemGraph) -> NodeId {
    add(g, "Update", NodeKind::Event(LifecycleEvent::Update))
}

fn literal(g: &mut SystemGraph, value: i64) -> NodeId {
    add(
        g,
        "literal",
        NodeKind::Literal {
            value: LiteralValue::Int(value),
        },
    )
}

fn local(g: &mut SystemGraph, name: &str) -> NodeId {
    add(
        g,
        name,
        NodeKind::Local {
            name: name.into(),
            ty: TypeRef::int(),
        },
    )
}

fn foreach(g: &mut SystemGraph, run: Discipline) -> NodeId {
    add(
        g,
        "Foreach",
        NodeKind::EntitiesForeach(ForeachSpec::new(
            vec![QueryItem::read_write("a", TypeRef::component("A"))],
            run,
        )),
    )
}

/// `a = <value>` wired as the foreach body; returns the set node.
fn assign_item(g: &mut SystemGraph, foreach: NodeId) -> NodeId {
    let set = add(g, "Set", NodeKind::SetValue);
    g.connect(foreach, "body", set, "enter").unwrap();
    g.connect(foreach, "a", set, "target").unwrap();
    set
}

/// Declares `int Twice(int v) => v + v`.
fn twice_function(g: &mut SystemGraph, is_static: bool) -> MemberId {
    let twice = g
        .add_function(
            "Twice",
            vec![Parameter::new("v", TypeRef::int())],
            Some(TypeRef::int()),
            is_static,
        )
        .unwrap();
    let body = g.function(twice).unwrap().container;
    let entry = g
        .add_node("Twice", NodeKind::FunctionEntry { function: twice }, body)
        .unwrap();
    let sum = g
        .add_node(
            "sum",
            NodeKind::Operator {
                op: BinaryOp::Add,
                ty: Some(TypeRef::int()),
            },
            body,
        )
        .unwrap();
    let ret = g.add_node("Return", NodeKind::Return, body).unwrap();
    g.connect(entry, "v", sum, "a").unwrap();
    g.connect(entry, "v", sum, "b").unwrap();
    g.connect(entry, "exit", ret, "enter").unwrap();
    g.connect(sum, "Out", ret, "value").unwrap();
    twice
}

/// Declares `void Spawn()` whose body creates an entity.
fn spawn_function(g: &mut SystemGraph) -> MemberId {
    let spawn = g.add_function("Spawn", vec![], None, false).unwrap();
    let body = g.function(spawn).unwrap().container;
    let entry = g
        .add_node("Spawn", NodeKind::FunctionEntry { function: spawn }, body)
        .unwrap();
    let create = g.add_node("Create", NodeKind::CreateEntity, body).unwrap();
    g.connect(entry, "exit", create, "enter").unwrap();
    spawn
}

fn member(g: &mut SystemGraph, name: &str, target: MemberTarget) -> NodeId {
    add(g, name, NodeKind::Member { target })
}

/// Foreach scheduled from the update event, with `a = <value>` as its body.
fn foreach_assigning(g: &mut SystemGraph, run: Discipline, value: NodeId) -> NodeId {
    let ev = update(g);
    let each = foreach(g, run);
    g.connect(ev, "exit", each, "enter").unwrap();
    let set = assign_item(g, each);
    g.connect(value, "Out", set, "value").unwrap();
    each
}

fn compile_ok(g: &SystemGraph) -> CompiledUnit {
    compile(g, &CompileOptions::default()).expect("compilation should succeed")
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

// ---------------------------------------------------------------------------
// Deferred entity loops
// ---------------------------------------------------------------------------

#[test]
fn scheduled_foreach_becomes_job_entity() {
    let mut g = system("Mover");
    let ev = update(&mut g);
    let each = foreach(&mut g, Discipline::Schedule);
    g.connect(ev, "exit", each, "enter").unwrap();
    let set = assign_item(&mut g, each);
    let five = literal(&mut g, 5);
    g.connect(five, "Out", set, "value").unwrap();

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(!unit.has_errors(), "{:?}", unit.diagnostics);
    assert!(src.contains("public partial struct ForeachJob : IJobEntity"));
    assert!(src.contains("public void Execute(ref A a)"));
    assert!(src.contains("a = 5;"));
    assert!(src.contains("var foreachJob = new ForeachJob();"));
    assert!(src.contains("foreachJob.Schedule();"));
    // Nothing crosses into the job, so it has no fields.
    assert!(!src.contains("public int"));
}

#[test]
fn local_read_in_parallel_job_is_captured() {
    let mut g = system("Mover");
    let ev = update(&mut g);
    let x = local(&mut g, "x");
    let each = foreach(&mut g, Discipline::ScheduleParallel);
    g.connect(ev, "exit", x, "enter").unwrap();
    g.connect(x, "exit", each, "enter").unwrap();
    let set = assign_item(&mut g, each);
    g.connect(x, "Out", set, "value").unwrap();

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(src.contains("int x = default;"));
    assert!(src.contains("[Unity.Collections.ReadOnly] public int x;"));
    assert!(src.contains("new ForeachJob { x = x }"));
    assert!(src.contains("foreachJob.ScheduleParallel();"));
    assert!(src.contains("a = x;"));
}

#[test]
fn shared_capture_becomes_one_field() {
    let mut g = system("Mover");
    let ev = update(&mut g);
    let x = local(&mut g, "x");
    let each = foreach(&mut g, Discipline::Schedule);
    g.connect(ev, "exit", x, "enter").unwrap();
    g.connect(x, "exit", each, "enter").unwrap();
    let sum = add(
        &mut g,
        "sum",
        NodeKind::Operator {
            op: BinaryOp::Add,
            ty: None,
        },
    );
    g.connect(x, "Out", sum, "a").unwrap();
    g.connect(x, "Out", sum, "b").unwrap();
    let set = assign_item(&mut g, each);
    g.connect(sum, "Out", set, "value").unwrap();

    let unit = compile_ok(&g);
    assert_eq!(count(&unit.source, "public int x;"), 1);
    assert!(unit.source.contains("a = (x + x);"));
    // Schedule is not parallel, so captures carry no read-only attribute.
    assert!(!unit.source.contains("Unity.Collections.ReadOnly"));
}

#[test]
fn foreach_without_body_drops_only_the_job() {
    let mut g = system("Mover");
    let ev = update(&mut g);
    let each = foreach(&mut g, Discipline::Schedule);
    g.connect(ev, "exit", each, "enter").unwrap();

    let unit = compile_ok(&g);
    assert!(unit.has_errors());
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::NestedUnitFailed { .. })));
    assert!(!unit.source.contains("IJobEntity"));
    assert!(unit.source.contains("public partial struct Mover : ISystem"));
}

// ---------------------------------------------------------------------------
// Inline loops
// ---------------------------------------------------------------------------

#[test]
fn run_foreach_is_an_inline_query() {
    let mut g = system("Mover");
    let ev = update(&mut g);
    let each = foreach(&mut g, Discipline::Run);
    g.connect(ev, "exit", each, "enter").unwrap();
    let set = assign_item(&mut g, each);
    g.connect(each, "a", set, "value").unwrap();

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(src.contains("foreach (var a in SystemAPI.Query<RefRW<A>>())"));
    assert!(src.contains("a.ValueRW = a.ValueRO;"));
    assert!(!src.contains("IJobEntity"));
}

// ---------------------------------------------------------------------------
// Declared jobs
// ---------------------------------------------------------------------------

#[test]
fn parallel_job_writes_through_parallel_command_buffer() {
    let mut g = system("Spawner");
    let ev = update(&mut g);
    let job = add(
        &mut g,
        "Spawn",
        NodeKind::JobEntity(JobEntitySpec::new(vec![QueryItem::read_only(
            "a",
            TypeRef::component("A"),
        )])),
    );
    let create = add(&mut g, "Create", NodeKind::CreateEntity);
    g.connect(job, "execute", create, "enter").unwrap();
    let exec = add(
        &mut g,
        "Exec",
        NodeKind::JobExecutor {
            run_with: Discipline::ScheduleParallel,
            job: Some(job),
        },
    );
    g.connect(ev, "exit", exec, "enter").unwrap();

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(src.contains("public partial struct Spawn : IJobEntity"));
    assert!(src.contains("public EntityCommandBuffer.ParallelWriter ecb;"));
    assert!(src.contains("[ChunkIndexInQuery] int sortKey"));
    assert!(src.contains("ecb.CreateEntity(sortKey)"));
    assert!(src.contains("ecb = ecb.AsParallelWriter()"));
    assert!(src.contains("spawn.ScheduleParallel();"));
    assert_eq!(count(src, "var ecb = "), 1);
}

#[test]
fn run_executor_reports_unusable_job_handle() {
    let mut g = system("Runner");
    let ev = update(&mut g);
    let job = add(
        &mut g,
        "Tick",
        NodeKind::JobEntity(JobEntitySpec::new(vec![QueryItem::read_write(
            "a",
            TypeRef::component("A"),
        )])),
    );
    let set = add(&mut g, "Set", NodeKind::SetValue);
    g.connect(job, "execute", set, "enter").unwrap();
    g.connect(job, "a", set, "target").unwrap();
    let one = literal(&mut g, 1);
    g.connect(one, "Out", set, "value").unwrap();
    let exec = add(
        &mut g,
        "Exec",
        NodeKind::JobExecutor {
            run_with: Discipline::Run,
            job: Some(job),
        },
    );
    g.connect(ev, "exit", exec, "enter").unwrap();
    let x = local(&mut g, "handle");
    g.connect(exec, "exit", x, "enter").unwrap();
    g.connect(exec, "jobHandle", x, "value").unwrap();

    let unit = compile_ok(&g);
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::RunHasNoJobHandle && !d.is_error()));
    assert!(unit.source.contains("tick.Run();"));
    assert!(unit.source.contains("var handle = default(JobHandle);"));
}

// ---------------------------------------------------------------------------
// Members used from jobs
// ---------------------------------------------------------------------------

#[test]
fn instance_function_is_copied_into_job() {
    let mut g = system("Mover");
    let twice = twice_function(&mut g, false);
    let call = member(&mut g, "Twice", MemberTarget::Function(twice));
    let five = literal(&mut g, 5);
    g.connect(five, "Out", call, "v").unwrap();
    foreach_assigning(&mut g, Discipline::Schedule, call);

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(!unit.has_errors(), "{:?}", unit.diagnostics);
    assert!(src.contains("a = Twice(5);"));
    // One declaration on the system, one copy inside the job.
    assert_eq!(count(src, "public int Twice(int v)"), 2);
    assert_eq!(count(src, "return (v + v);"), 2);
    assert!(!src.contains("static int Twice"));
    let job = &src[src.find("IJobEntity").unwrap()..];
    assert!(job.contains("public int Twice(int v)"));
}

#[test]
fn static_function_is_qualified_in_job() {
    let mut g = system("Mover");
    let twice = twice_function(&mut g, true);
    let call = member(&mut g, "Twice", MemberTarget::Function(twice));
    let five = literal(&mut g, 5);
    g.connect(five, "Out", call, "v").unwrap();
    foreach_assigning(&mut g, Discipline::Schedule, call);

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(!unit.has_errors(), "{:?}", unit.diagnostics);
    assert!(src.contains("a = Mover.Twice(5);"));
    assert!(src.contains("public static int Twice(int v)"));
    assert_eq!(count(src, "int Twice(int v)"), 1);
}

#[test]
fn function_called_from_parallel_job_uses_the_job_buffer() {
    let mut g = system("Spawner");
    let spawn = spawn_function(&mut g);
    let ev = update(&mut g);
    let each = foreach(&mut g, Discipline::ScheduleParallel);
    g.connect(ev, "exit", each, "enter").unwrap();
    let call = member(&mut g, "Spawn", MemberTarget::Function(spawn));
    g.connect(each, "body", call, "enter").unwrap();

    let unit = compile_ok(&g);
    let src = &unit.source;
    let job = &src[src.find("IJobEntity").unwrap()..];
    assert!(job.contains("public EntityCommandBuffer.ParallelWriter ecb;"));
    assert!(job.contains("[ChunkIndexInQuery] int sortKey"));
    assert!(job.contains("Spawn(sortKey);"));
    assert!(job.contains("public void Spawn(int sortKey)"));
    assert!(job.contains("var entity = ecb.CreateEntity(sortKey);"));
    assert!(src.contains("new ForeachJob { ecb = ecb.AsParallelWriter() }"));
    // The system's own copy cannot reach a command buffer.
    assert!(unit.diagnostics.iter().any(|d| d.is_error()
        && d.kind
            == DiagnosticKind::HandleOutsideUpdate {
                method: "Spawn".into()
            }));
}

#[test]
fn managed_function_declares_its_own_command_buffer() {
    let mut settings = GraphSettings::new("Spawner");
    settings.flavor = UnitFlavor::ManagedSystem;
    let mut g = SystemGraph::new(settings);
    let spawn = spawn_function(&mut g);
    let ev = update(&mut g);
    let call = member(&mut g, "Spawn", MemberTarget::Function(spawn));
    g.connect(ev, "exit", call, "enter").unwrap();

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(!unit.has_errors(), "{:?}", unit.diagnostics);
    assert_eq!(count(src, "var ecb = "), 1);
    let spawn_body = &src[src.find("public void Spawn()").unwrap()..];
    assert!(spawn_body.contains("CreateCommandBuffer(CheckedStateRef.WorldUnmanaged);"));
    assert!(spawn_body.contains("var entity = ecb.CreateEntity();"));
    assert!(src.contains("    Spawn();"));
}

#[test]
fn auto_property_is_copied_into_job() {
    let mut g = system("Mover");
    let speed = g
        .add_property(GraphProperty {
            name: "Speed".into(),
            ty: TypeRef::int(),
            is_static: false,
            backing: None,
        })
        .unwrap();
    let read = member(&mut g, "Speed", MemberTarget::Property(speed));
    foreach_assigning(&mut g, Discipline::ScheduleParallel, read);

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert!(!unit.has_errors(), "{:?}", unit.diagnostics);
    assert_eq!(count(src, "public int Speed { get; set; }"), 2);
    assert!(!src.contains("public int Speed;"));
    assert!(src.contains("new ForeachJob { Speed = Speed }"));
    assert!(src.contains("a = Speed;"));
}

#[test]
fn backed_property_captures_its_variable() {
    let mut g = system("Mover");
    let field = g.add_variable(GraphVariable::new("speed", TypeRef::int()));
    let speed = g
        .add_property(GraphProperty {
            name: "Speed".into(),
            ty: TypeRef::int(),
            is_static: false,
            backing: Some(field),
        })
        .unwrap();
    let read = member(&mut g, "Speed", MemberTarget::Property(speed));
    foreach_assigning(&mut g, Discipline::Schedule, read);

    let unit = compile_ok(&g);
    let src = &unit.source;
    assert_eq!(
        count(src, "public int Speed { get => speed; set => speed = value; }"),
        2
    );
    assert_eq!(count(src, "public int speed;"), 2);
    assert!(src.contains("new ForeachJob { speed = speed }"));
}

#[test]
fn write_to_captured_member_is_reported() {
    let mut g = system("Counter");
    let count_var = g.add_variable(GraphVariable::new("count", TypeRef::int()));
    let ev = update(&mut g);
    let each = foreach(&mut g, Discipline::ScheduleParallel);
    g.connect(ev, "exit", each, "enter").unwrap();
    let target = member(&mut g, "count", MemberTarget::Variable(count_var));
    let set = add(&mut g, "Set", NodeKind::SetValue);
    g.connect(each, "body", set, "enter").unwrap();
    g.connect(target, "Out", set, "target").unwrap();
    let one = literal(&mut g, 1);
    g.connect(one, "Out", set, "value").unwrap();

    let unit = compile_ok(&g);
    let reported: Vec<_> = unit
        .diagnostics
        .iter()
        .filter(|d| matches!(d.kind, DiagnosticKind::WriteToCapture { .. }))
        .collect();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].is_error());
    assert_eq!(
        reported[0].kind,
        DiagnosticKind::WriteToCapture {
            name: "count".into()
        }
    );
}

#[test]
fn write_to_captured_local_is_reported() {
    let mut g = system("Mover");
    let ev = update(&mut g);
    let x = local(&mut g, "x");
    let each = foreach(&mut g, Discipline::Schedule);
    g.connect(ev, "exit", x, "enter").unwrap();
    g.connect(x, "exit", each, "enter").unwrap();
    let set = add(&mut g, "Set", NodeKind::SetValue);
    g.connect(each, "body", set, "enter").unwrap();
    g.connect(x, "Out", set, "target").unwrap();
    let one = literal(&mut g, 1);
    g.connect(one, "Out", set, "value").unwrap();

    let unit = compile_ok(&g);
    assert!(unit
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::WriteToCapture { name: "x".into() }));
}

#[test]
fn writes_to_job_bindings_are_not_reported() {
    let mut g = system("Mover");
    let five = literal(&mut g, 5);
    foreach_assigning(&mut g, Discipline::ScheduleParallel, five);

    let unit = compile_ok(&g);
    assert!(!unit
        .diagnostics
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::WriteToCapture { .. })));
}

// ---------------------------------------------------------------------------
// Unit-level behavior
// ---------------------------------------------------------------------------

#[test]
fn compilation_is_deterministic() {
    let build = || {
        let mut g = system("Mover");
        let ev = update(&mut g);
        let x = local(&mut g, "x");
        let each = foreach(&mut g, Discipline::ScheduleParallel);
        g.connect(ev, "exit", x, "enter").unwrap();
        g.connect(x, "exit", each, "enter").unwrap();
        let set = assign_item(&mut g, each);
        g.connect(x, "Out", set, "value").unwrap();
        g
    };
    let first = compile_ok(&build());
    let second = compile_ok(&build());
    assert_eq!(first.source, second.source);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.fingerprint, sysgraph_codegen::fingerprint(&first.source));
}

#[test]
fn aspect_with_entity_operations_fails() {
    let mut settings = GraphSettings::new("MoveAspect");
    settings.flavor = UnitFlavor::Aspect;
    let mut g = SystemGraph::new(settings);
    add(&mut g, "Create", NodeKind::CreateEntity);

    let err = compile(&g, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::MissingEntryPoint { ref method } if method == "OnUpdate"));
}

#[test]
fn batch_units_are_isolated() {
    let mut settings = GraphSettings::new("Broken");
    settings.flavor = UnitFlavor::Aspect;
    let mut broken = SystemGraph::new(settings);
    add(&mut broken, "Create", NodeKind::CreateEntity);

    let mut first = system("First");
    update(&mut first);
    let second = system("Second");

    let results = compile_batch(&[first, broken, second], &CompileOptions::default());
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().name, "First");
    assert!(results[1].is_err());
    let second = results[2].as_ref().unwrap();
    assert_eq!(second.name, "Second");
    assert!(!second.source.contains("First"));
}

#[test]
fn debug_script_strips_burst() {
    let mut g = system("Mover");
    let ev = update(&mut g);
    let each = foreach(&mut g, Discipline::Schedule);
    g.connect(ev, "exit", each, "enter").unwrap();
    let set = assign_item(&mut g, each);
    let five = literal(&mut g, 5);
    g.connect(five, "Out", set, "value").unwrap();

    let options = CompileOptions {
        debug_script: true,
        ..CompileOptions::default()
    };
    let unit = compile(&g, &options).unwrap();
    assert!(!unit.source.contains("BurstCompile"));
    assert!(unit.source.contains("IJobEntity"));
}

#[test]
fn compiled_unit_is_written_once() {
    let mut g = system("Mover");
    update(&mut g);
    let unit = compile_ok(&g);

    let temp_dir = tempfile::tempdir().unwrap();
    let (path, changed) = write_unit(&unit, temp_dir.path()).unwrap();
    assert!(changed);
    assert_eq!(path.file_name().unwrap(), "Mover.cs");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), unit.source);

    let again = compile_ok(&g);
    let (_, changed) = write_unit(&again, temp_dir.path()).unwrap();
    assert!(!changed);
}
