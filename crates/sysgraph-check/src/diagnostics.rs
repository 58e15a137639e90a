//! Authoring diagnostics and the collector they are reported to.
//!
//! [`DiagnosticKind`] enumerates every problem the analyzers and the code
//! generator can report; its `Display` text is the user-facing message.
//! A [`Diagnostic`] pins a kind to an owner (node, member or the whole graph)
//! with a severity. Reporting never stops compilation.

use std::fmt;

use serde::{Deserialize, Serialize};
use sysgraph_core::id::{MemberId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// What a diagnostic is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticOwner {
    Graph,
    Node(NodeId),
    Member(MemberId),
}

impl fmt::Display for DiagnosticOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticOwner::Graph => f.write_str("graph"),
            DiagnosticOwner::Node(id) => write!(f, "node {id}"),
            DiagnosticOwner::Member(id) => write!(f, "member {id}"),
        }
    }
}

/// Every problem the toolchain reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DiagnosticKind {
    // -- entities ----------------------------------------------------------
    #[error("SystemAPI member use is not permitted outside of a system type")]
    SystemApiOutsideSystem,

    #[error("SystemAPI member use is not permitted in a static function")]
    SystemApiInStaticFunction,

    #[error("Component must be assigned to Value Type ( struct ), got '{ty}'")]
    ComponentNotValueType { ty: String },

    #[error("component type is not assigned")]
    UnassignedComponent,

    #[error("no job is referenced by this executor")]
    MissingJobReference,

    #[error("cannot assign to read-only value '{port}'")]
    WriteToReadOnly { port: String },

    #[error("input '{port}' is not assigned")]
    UnassignedInput { port: String },

    // -- queries -----------------------------------------------------------
    #[error("query item '{item}' has no type assigned")]
    UnassignedQueryType { item: String },

    #[error("query item '{item}' must be a component type for read-only or read-write access, got '{ty}'")]
    NotAComponent { item: String, ty: String },

    #[error("component '{ty}' is declared more than once in the query")]
    DuplicateQueryComponent { ty: String },

    #[error("the query binds nothing; declare at least one item")]
    EmptyQuery,

    #[error("shared component filters are only supported when iterating immediately")]
    SharedFilterNotSupported,

    // -- aspects -----------------------------------------------------------
    #[error("an aspect must be a struct")]
    AspectNotStruct,

    #[error("an aspect must be read-only")]
    AspectNotReadOnly,

    #[error("an aspect must be partial")]
    AspectNotPartial,

    #[error("an aspect must declare at least one variable")]
    AspectWithoutVariables,

    #[error("aspect variable '{name}' must be read-only")]
    AspectVariableNotReadOnly { name: String },

    #[error("aspect variable '{name}' has unsupported type '{ty}'")]
    UnsupportedAspectVariable { name: String, ty: String },

    #[error("an aspect may declare at most one Entity variable")]
    MultipleAspectEntities,

    #[error("aspect property '{name}' must not be an auto property")]
    AspectAutoProperty { name: String },

    // -- code generation ---------------------------------------------------
    #[error("'{port}' has no value to read")]
    UnresolvedValue { port: String },

    #[error("'{port}' is produced outside the job and cannot be captured; pass it in through a job variable")]
    ValueUnavailableInJob { port: String },

    #[error("type of captured value '{name}' could not be inferred")]
    UnknownCaptureType { name: String },

    #[error("flow re-enters node {node}; the loop was cut")]
    FlowCycle { node: NodeId },

    #[error("'{port}' cannot be captured into a job")]
    NotCapturable { port: String },

    #[error("'{name}' is copied into the job by value; the assignment is lost when the job completes")]
    WriteToCapture { name: String },

    #[error("function '{method}' uses the command buffer or entity manager, which only exist in OnUpdate; call it from a job instead")]
    HandleOutsideUpdate { method: String },

    #[error("IJobChunk executors need a query")]
    QueryRequired,

    #[error("Run does not produce a job handle")]
    RunHasNoJobHandle,

    #[error("function '{name}' has no entry node; an empty body was generated")]
    FunctionWithoutEntry { name: String },

    #[error("synthesized type omitted: {reason}")]
    NestedUnitFailed { reason: String },
}

impl DiagnosticKind {
    /// Severity used when the kind is reported without an explicit one.
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::RunHasNoJobHandle
            | DiagnosticKind::UnknownCaptureType { .. }
            | DiagnosticKind::FunctionWithoutEntry { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub owner: DiagnosticOwner,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(owner: DiagnosticOwner, kind: DiagnosticKind) -> Self {
        Diagnostic {
            severity: kind.default_severity(),
            owner,
            kind,
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.owner, self.kind)
    }
}

/// Collects diagnostics in report order.
#[derive(Debug, Default, Clone)]
pub struct ErrorAnalyzer {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `kind` against `owner` with its default severity.
    pub fn report(&mut self, owner: DiagnosticOwner, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic::new(owner, kind));
    }

    pub fn report_with(&mut self, severity: Severity, owner: DiagnosticOwner, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic {
            severity,
            owner,
            kind,
        });
    }

    pub fn report_node(&mut self, node: NodeId, kind: DiagnosticKind) {
        self.report(DiagnosticOwner::Node(node), kind);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_come_from_kind() {
        let diag = Diagnostic::new(
            DiagnosticOwner::Node(NodeId(4)),
            DiagnosticKind::ComponentNotValueType {
                ty: "Camera".into(),
            },
        );
        assert_eq!(
            diag.message(),
            "Component must be assigned to Value Type ( struct ), got 'Camera'"
        );
        assert_eq!(
            diag.to_string(),
            "error [node 4]: Component must be assigned to Value Type ( struct ), got 'Camera'"
        );
    }

    #[test]
    fn default_severities() {
        assert_eq!(
            DiagnosticKind::RunHasNoJobHandle.default_severity(),
            Severity::Warning
        );
        assert_eq!(
            DiagnosticKind::SystemApiOutsideSystem.default_severity(),
            Severity::Error
        );
        assert_eq!(
            DiagnosticKind::WriteToCapture { name: "count".into() }.default_severity(),
            Severity::Error
        );
    }

    #[test]
    fn analyzer_collects_in_order() {
        let mut analyzer = ErrorAnalyzer::new();
        assert!(analyzer.is_empty());
        analyzer.report_with(
            Severity::Info,
            DiagnosticOwner::Graph,
            DiagnosticKind::EmptyQuery,
        );
        assert!(!analyzer.has_errors());
        analyzer.report_node(NodeId(1), DiagnosticKind::MissingJobReference);
        assert!(analyzer.has_errors());
        assert_eq!(analyzer.len(), 2);
        let all = analyzer.into_diagnostics();
        assert_eq!(all[0].severity, Severity::Info);
        assert_eq!(all[1].owner, DiagnosticOwner::Node(NodeId(1)));
    }

    #[test]
    fn serde_roundtrip() {
        let diag = Diagnostic::new(
            DiagnosticOwner::Member(MemberId(2)),
            DiagnosticKind::AspectVariableNotReadOnly {
                name: "transform".into(),
            },
        );
        let json = serde_json::to_string(&diag).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(diag, back);
    }
}
