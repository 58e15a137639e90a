//! Authoring analysis for system graphs.
//!
//! [`analyze_graph`] runs every rule set over a graph and returns the
//! diagnostics it found. Analysis is pure: it reads the graph and never
//! fails. The same [`ErrorAnalyzer`] collector is used by the code generator
//! for problems it only discovers while generating.

pub mod diagnostics;
mod rules;

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticOwner, ErrorAnalyzer, Severity};

use sysgraph_core::SystemGraph;

/// Runs all rule sets over `graph`, reporting into `analyzer`.
pub fn analyze_into(graph: &SystemGraph, analyzer: &mut ErrorAnalyzer) {
    rules::aspect::check(graph, analyzer);
    rules::query::check(graph, analyzer);
    rules::entities::check(graph, analyzer);
}

/// Runs all rule sets over `graph` and returns the collected diagnostics.
pub fn analyze_graph(graph: &SystemGraph) -> Vec<Diagnostic> {
    let mut analyzer = ErrorAnalyzer::new();
    analyze_into(graph, &mut analyzer);
    analyzer.into_diagnostics()
}
