//! Rules for query declarations on foreach and job nodes.

use std::collections::HashSet;

use sysgraph_core::{NodeId, NodeKind, QueryFilters, QueryItem, SystemGraph};

use crate::diagnostics::{DiagnosticKind, ErrorAnalyzer};

pub(crate) fn check(graph: &SystemGraph, analyzer: &mut ErrorAnalyzer) {
    for id in graph.node_ids() {
        let Some(node) = graph.node(id) else { continue };
        match &node.kind {
            NodeKind::EntitiesForeach(spec) => {
                if spec.items.is_empty() {
                    analyzer.report_node(id, DiagnosticKind::EmptyQuery);
                }
                check_items(id, &spec.items, analyzer);
                if spec.run.is_deferred() {
                    check_deferred_filters(id, &spec.filters, analyzer);
                }
            }
            NodeKind::JobEntity(spec) => {
                if spec.items.is_empty() && !spec.entity_access {
                    analyzer.report_node(id, DiagnosticKind::EmptyQuery);
                }
                check_items(id, &spec.items, analyzer);
                check_deferred_filters(id, &spec.filters, analyzer);
            }
            _ => {}
        }
    }
}

fn check_items(id: NodeId, items: &[QueryItem], analyzer: &mut ErrorAnalyzer) {
    let mut seen = HashSet::new();
    for item in items {
        let Some(ty) = &item.ty else {
            analyzer.report_node(
                id,
                DiagnosticKind::UnassignedQueryType {
                    item: item.name.clone(),
                },
            );
            continue;
        };
        if item.access.requires_component() && !ty.is_component() {
            analyzer.report_node(
                id,
                DiagnosticKind::NotAComponent {
                    item: item.name.clone(),
                    ty: ty.name.clone(),
                },
            );
        }
        if !seen.insert(ty.name.as_str()) {
            analyzer.report_node(
                id,
                DiagnosticKind::DuplicateQueryComponent {
                    ty: ty.name.clone(),
                },
            );
        }
    }
}

/// Job structs express filters as attributes, which cannot carry a shared
/// component value.
fn check_deferred_filters(id: NodeId, filters: &QueryFilters, analyzer: &mut ErrorAnalyzer) {
    if !filters.with_shared_component.is_empty() {
        analyzer.report_node(id, DiagnosticKind::SharedFilterNotSupported);
    }
}
