//! Rules for aspect units.
//!
//! An aspect must be a `readonly partial struct` whose fields are read-only
//! references into entity data: `RefRO<T>`, `RefRW<T>`, the enabled-ref
//! variants, `DynamicBuffer<T>`, other aspects, or a single `Entity`.

use sysgraph_core::{Member, SystemGraph, TypeClass, TypeRef, UnitFlavor};

use crate::diagnostics::{DiagnosticKind, DiagnosticOwner, ErrorAnalyzer};

const SUPPORTED_WRAPPERS: [&str; 5] = [
    "RefRO<",
    "RefRW<",
    "EnabledRefRO<",
    "EnabledRefRW<",
    "DynamicBuffer<",
];

fn is_supported(ty: &TypeRef) -> bool {
    matches!(ty.class, TypeClass::Entity | TypeClass::Aspect)
        || SUPPORTED_WRAPPERS.iter().any(|w| ty.name.starts_with(w))
}

pub(crate) fn check(graph: &SystemGraph, analyzer: &mut ErrorAnalyzer) {
    if graph.settings.flavor != UnitFlavor::Aspect {
        return;
    }
    let modifier = graph.settings.modifier;
    if !modifier.is_struct {
        analyzer.report(DiagnosticOwner::Graph, DiagnosticKind::AspectNotStruct);
    }
    if !modifier.read_only {
        analyzer.report(DiagnosticOwner::Graph, DiagnosticKind::AspectNotReadOnly);
    }
    if !modifier.partial {
        analyzer.report(DiagnosticOwner::Graph, DiagnosticKind::AspectNotPartial);
    }

    let mut variables = 0;
    let mut entities = 0;
    for (id, member) in graph.indexed_members() {
        let owner = DiagnosticOwner::Member(id);
        match member {
            Member::Variable(var) => {
                variables += 1;
                if !var.read_only {
                    analyzer.report(
                        owner,
                        DiagnosticKind::AspectVariableNotReadOnly {
                            name: var.name.clone(),
                        },
                    );
                }
                if !is_supported(&var.ty) {
                    analyzer.report(
                        owner,
                        DiagnosticKind::UnsupportedAspectVariable {
                            name: var.name.clone(),
                            ty: var.ty.name.clone(),
                        },
                    );
                }
                if var.ty.class == TypeClass::Entity {
                    entities += 1;
                    if entities == 2 {
                        analyzer.report(owner, DiagnosticKind::MultipleAspectEntities);
                    }
                }
            }
            Member::Property(prop) if prop.is_auto() => analyzer.report(
                owner,
                DiagnosticKind::AspectAutoProperty {
                    name: prop.name.clone(),
                },
            ),
            _ => {}
        }
    }
    if variables == 0 {
        analyzer.report(DiagnosticOwner::Graph, DiagnosticKind::AspectWithoutVariables);
    }
}
