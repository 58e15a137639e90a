//! Top-level compilation: analysis -> pipeline -> render.
//!
//! [`compile`] runs the authoring analyzers, then the registration pipeline,
//! and renders the unit. Each call builds and drops its own
//! [`CompileContext`], so no state leaks between units. [`compile_batch`]
//! compiles several graphs and keeps their results apart: one unit failing
//! never stops its siblings.

use std::time::Instant;

use sysgraph_core::SystemGraph;
use tracing::{debug, info};

use crate::context::CompileContext;
use crate::error::CodegenError;
use crate::{pipeline, system, CompileOptions, CompiledUnit};

/// Compiles one graph to source text.
///
/// Authoring diagnostics never fail the compilation unless
/// `options.deny_errors` is set; they are returned on the unit. Structural
/// errors (a lifecycle method that does not exist for this unit flavor)
/// abort it.
pub fn compile(graph: &SystemGraph, options: &CompileOptions) -> Result<CompiledUnit, CodegenError> {
    let start = Instant::now();
    let mut ctx = CompileContext::new(graph, options);

    sysgraph_check::analyze_into(graph, &mut ctx.analyzer);
    if options.deny_errors && ctx.analyzer.has_errors() {
        return Err(CodegenError::AnalysisFailed(ctx.analyzer.into_diagnostics()));
    }

    pipeline::run(&mut ctx)?;
    let source = system::render(&ctx);
    let fingerprint = fingerprint(&source);
    let diagnostics = ctx.analyzer.into_diagnostics();
    let compilation_time_ms = start.elapsed().as_millis() as u64;

    info!(
        unit = %graph.settings.name,
        bytes = source.len(),
        diagnostics = diagnostics.len(),
        compilation_time_ms,
        "compiled unit"
    );

    Ok(CompiledUnit {
        name: graph.settings.name.clone(),
        source,
        fingerprint,
        diagnostics,
        compilation_time_ms,
    })
}

/// Compiles every graph independently, in order.
pub fn compile_batch(
    graphs: &[SystemGraph],
    options: &CompileOptions,
) -> Vec<Result<CompiledUnit, CodegenError>> {
    graphs
        .iter()
        .map(|graph| {
            let result = compile(graph, options);
            if let Err(err) = &result {
                debug!(unit = %graph.settings.name, error = %err, "unit failed");
            }
            result
        })
        .collect()
}

/// Hex blake3 hash of the generated text.
pub fn fingerprint(source: &str) -> String {
    blake3::hash(source.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgraph_core::{Discipline, ForeachSpec, GraphSettings, NodeKind, UnitFlavor};

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint("struct A {}");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint("struct A {}"));
        assert_ne!(a, fingerprint("struct B {}"));
    }

    #[test]
    fn empty_system_compiles() {
        let g = SystemGraph::new(GraphSettings::new("Empty"));
        let unit = compile(&g, &CompileOptions::default()).unwrap();
        assert_eq!(unit.name, "Empty");
        assert!(unit.diagnostics.is_empty());
        assert!(unit.source.contains("public partial struct Empty : ISystem {"));
        assert_eq!(unit.fingerprint, fingerprint(&unit.source));
    }

    #[test]
    fn deny_errors_stops_before_generation() {
        let mut settings = GraphSettings::new("S");
        settings.flavor = UnitFlavor::Aspect;
        let g = SystemGraph::new(settings);
        let lenient = compile(&g, &CompileOptions::default()).unwrap();
        assert!(lenient.has_errors());

        let strict = CompileOptions {
            deny_errors: true,
            ..CompileOptions::default()
        };
        match compile(&g, &strict) {
            Err(CodegenError::AnalysisFailed(diagnostics)) => assert!(!diagnostics.is_empty()),
            other => panic!("expected analysis failure, got {other:?}"),
        }
    }

    #[test]
    fn batch_keeps_units_apart() {
        let good = SystemGraph::new(GraphSettings::new("Good"));
        let mut settings = GraphSettings::new("Bad");
        settings.flavor = UnitFlavor::Aspect;
        let mut bad = SystemGraph::new(settings);
        let root = bad.root_container();
        bad.add_node(
            "Foreach",
            NodeKind::EntitiesForeach(ForeachSpec::new(vec![], Discipline::Run)),
            root,
        )
        .unwrap();
        bad.add_node("Create", NodeKind::CreateEntity, root).unwrap();

        let results = compile_batch(&[good, bad], &CompileOptions::default());
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CodegenError::MissingEntryPoint { .. })
        ));
    }
}
