//! Codegen error types.
//!
//! Only structural problems are errors. Authoring problems are reported as
//! diagnostics on the compiled unit and never surface here.

use sysgraph_core::{CoreError, NodeId};

/// Errors that abort compilation of a unit.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// A lifecycle method the generator must write into does not exist.
    #[error("required method '{method}' does not exist on the unit")]
    MissingEntryPoint { method: String },

    /// A boundary node has nothing connected to its body port.
    #[error("boundary node {node} has no body connected")]
    MissingBoundaryBody { node: NodeId },

    /// Graph structure issue preventing compilation.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Filesystem I/O error while writing generated sources.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Analysis reported errors and the caller asked to stop on them.
    #[error("analysis failed with {} error(s)", .0.len())]
    AnalysisFailed(Vec<sysgraph_check::Diagnostic>),
}

impl CodegenError {
    /// Structural errors fail the unit they occur in. A structural error
    /// raised while synthesizing a nested type only drops that type.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CodegenError::MissingEntryPoint { .. } | CodegenError::MissingBoundaryBody { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_classification() {
        assert!(CodegenError::MissingEntryPoint {
            method: "OnUpdate".into()
        }
        .is_structural());
        assert!(CodegenError::MissingBoundaryBody { node: NodeId(3) }.is_structural());
        assert!(!CodegenError::InvalidGraph("x".into()).is_structural());
    }

    #[test]
    fn messages() {
        let err = CodegenError::MissingEntryPoint {
            method: "OnUpdate".into(),
        };
        assert_eq!(
            err.to_string(),
            "required method 'OnUpdate' does not exist on the unit"
        );
        let err = CodegenError::from(CoreError::NodeNotFound { id: NodeId(9) });
        assert!(matches!(err, CodegenError::Core(_)));
    }
}
