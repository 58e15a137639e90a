//! Rules for entity operations, SystemAPI usage and assignments.

use sysgraph_core::node::port_names as pn;
use sysgraph_core::{MemberTarget, NodeId, NodeKind, SystemGraph};

use crate::diagnostics::{DiagnosticKind, ErrorAnalyzer};

pub(crate) fn check(graph: &SystemGraph, analyzer: &mut ErrorAnalyzer) {
    for id in graph.node_ids() {
        let Some(node) = graph.node(id) else { continue };
        match &node.kind {
            NodeKind::Member {
                target: MemberTarget::External(ext),
            } if ext.is_owned_by("SystemAPI") => check_system_api(graph, id, analyzer),
            NodeKind::SetComponent { component } => {
                match component {
                    None => analyzer.report_node(id, DiagnosticKind::UnassignedComponent),
                    Some(ty) if !ty.is_value_type() => analyzer.report_node(
                        id,
                        DiagnosticKind::ComponentNotValueType {
                            ty: ty.name.clone(),
                        },
                    ),
                    Some(_) => {}
                }
                require_input(graph, id, pn::ENTITY, analyzer);
            }
            NodeKind::SetComponentEnabled { component } | NodeKind::GetComponent { component } => {
                if component.is_none() {
                    analyzer.report_node(id, DiagnosticKind::UnassignedComponent);
                }
                require_input(graph, id, pn::ENTITY, analyzer);
            }
            NodeKind::DestroyEntity => require_input(graph, id, pn::ENTITY, analyzer),
            NodeKind::JobExecutor { job: None, .. } => {
                analyzer.report_node(id, DiagnosticKind::MissingJobReference)
            }
            NodeKind::SetValue => check_assignment(graph, id, analyzer),
            _ => {}
        }
    }
}

fn check_system_api(graph: &SystemGraph, id: NodeId, analyzer: &mut ErrorAnalyzer) {
    if !graph.settings.is_system() {
        analyzer.report_node(id, DiagnosticKind::SystemApiOutsideSystem);
        return;
    }
    let in_static = graph
        .node(id)
        .and_then(|n| graph.containers().enclosing_function(n.container))
        .and_then(|f| graph.function(f))
        .is_some_and(|f| f.is_static);
    if in_static {
        analyzer.report_node(id, DiagnosticKind::SystemApiInStaticFunction);
    }
}

fn check_assignment(graph: &SystemGraph, id: NodeId, analyzer: &mut ErrorAnalyzer) {
    let Ok(target) = graph.port_ref(id, pn::TARGET) else {
        return;
    };
    match graph.source_of(target).and_then(|src| graph.port(src)) {
        Some(port) if !port.is_writable() => analyzer.report_node(
            id,
            DiagnosticKind::WriteToReadOnly {
                port: port.name.clone(),
            },
        ),
        Some(_) => {}
        None => analyzer.report_node(
            id,
            DiagnosticKind::UnassignedInput {
                port: pn::TARGET.into(),
            },
        ),
    }
}

fn require_input(graph: &SystemGraph, id: NodeId, port: &str, analyzer: &mut ErrorAnalyzer) {
    if let Ok(input) = graph.port_ref(id, port) {
        if graph.source_of(input).is_none() {
            analyzer.report_node(id, DiagnosticKind::UnassignedInput { port: port.into() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgraph_core::{
        Discipline, ExternalMember, ForeachSpec, GraphSettings, LifecycleEvent, LiteralValue,
        QueryItem, TypeClass, TypeRef, UnitFlavor,
    };

    fn run(graph: &SystemGraph) -> Vec<DiagnosticKind> {
        let mut analyzer = ErrorAnalyzer::new();
        check(graph, &mut analyzer);
        analyzer.into_diagnostics().into_iter().map(|d| d.kind).collect()
    }

    fn system_api_time() -> NodeKind {
        NodeKind::Member {
            target: MemberTarget::External(ExternalMember::static_method(
                TypeRef::reference("SystemAPI"),
                "GetSingleton",
                vec![],
                Some(TypeRef::component("Config")),
            )),
        }
    }

    #[test]
    fn system_api_outside_system_is_reported() {
        let mut settings = GraphSettings::new("MoveAspect");
        settings.flavor = UnitFlavor::Aspect;
        let mut g = SystemGraph::new(settings);
        let root = g.root_container();
        g.add_node("api", system_api_time(), root).unwrap();
        assert_eq!(run(&g), vec![DiagnosticKind::SystemApiOutsideSystem]);
    }

    #[test]
    fn system_api_in_static_function_is_reported() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let f = g.add_function("Helper", vec![], None, true).unwrap();
        let container = g.function(f).unwrap().container;
        g.add_node("api", system_api_time(), container).unwrap();
        assert_eq!(run(&g), vec![DiagnosticKind::SystemApiInStaticFunction]);
    }

    #[test]
    fn system_api_in_instance_function_is_fine() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let f = g.add_function("Helper", vec![], None, false).unwrap();
        let container = g.function(f).unwrap().container;
        g.add_node("api", system_api_time(), container).unwrap();
        assert!(run(&g).is_empty());
    }

    #[test]
    fn set_component_requires_value_type() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        let ev = g
            .add_node("Update", NodeKind::Event(LifecycleEvent::Update), root)
            .unwrap();
        let create = g.add_node("Create", NodeKind::CreateEntity, root).unwrap();
        let set = g
            .add_node(
                "Set",
                NodeKind::SetComponent {
                    component: Some(TypeRef::new("Camera", TypeClass::ManagedComponent)),
                },
                root,
            )
            .unwrap();
        g.connect(ev, "exit", create, "enter").unwrap();
        g.connect(create, "exit", set, "enter").unwrap();
        g.connect(create, "entity", set, "entity").unwrap();
        assert_eq!(
            run(&g),
            vec![DiagnosticKind::ComponentNotValueType {
                ty: "Camera".into()
            }]
        );
    }

    #[test]
    fn unassigned_component_and_entity_reported() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        g.add_node(
            "Enable",
            NodeKind::SetComponentEnabled { component: None },
            root,
        )
        .unwrap();
        assert_eq!(
            run(&g),
            vec![
                DiagnosticKind::UnassignedComponent,
                DiagnosticKind::UnassignedInput {
                    port: "entity".into()
                }
            ]
        );
    }

    #[test]
    fn executor_without_job_reported() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        g.add_node(
            "Exec",
            NodeKind::JobExecutor {
                run_with: Discipline::Schedule,
                job: None,
            },
            root,
        )
        .unwrap();
        assert_eq!(run(&g), vec![DiagnosticKind::MissingJobReference]);
    }

    #[test]
    fn assignment_to_read_only_item_reported() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        let foreach = g
            .add_node(
                "Foreach",
                NodeKind::EntitiesForeach(ForeachSpec::new(
                    vec![QueryItem::read_only("speed", TypeRef::component("Speed"))],
                    Discipline::Run,
                )),
                root,
            )
            .unwrap();
        let set = g.add_node("Set", NodeKind::SetValue, root).unwrap();
        let five = g
            .add_node(
                "five",
                NodeKind::Literal {
                    value: LiteralValue::Int(5),
                },
                root,
            )
            .unwrap();
        g.connect(foreach, "body", set, "enter").unwrap();
        g.connect(foreach, "speed", set, "target").unwrap();
        g.connect(five, "Out", set, "value").unwrap();
        assert_eq!(
            run(&g),
            vec![DiagnosticKind::WriteToReadOnly {
                port: "speed".into()
            }]
        );
    }

    #[test]
    fn unconnected_assignment_target_reported() {
        let mut g = SystemGraph::new(GraphSettings::new("S"));
        let root = g.root_container();
        g.add_node("Set", NodeKind::SetValue, root).unwrap();
        assert_eq!(
            run(&g),
            vec![DiagnosticKind::UnassignedInput {
                port: "target".into()
            }]
        );
    }
}
