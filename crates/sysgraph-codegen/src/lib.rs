//! Source generation for ECS system graphs.
//!
//! This crate lowers a [`sysgraph_core::SystemGraph`] into the source text of
//! one Unity DOTS unit: an unmanaged `ISystem`, a managed `SystemBase`, or an
//! `IAspect`. Entity loops and declared jobs in the graph become nested job
//! structs whose fields are inferred from what their bodies capture.
//!
//! # Modules
//!
//! - [`compiler`] -- entry points: [`compile`] and [`compile_batch`]
//! - [`pipeline`] -- capability registry and the phased registration run
//! - [`context`] -- per-unit compile state, handles and generation scope
//! - [`capture`] -- boundary analysis: which values a job body captures
//! - [`job`] -- job descriptors and nested job type synthesis
//! - [`nodes`] -- per-node-kind code generation
//! - [`system`] -- the unit declaration, its members and rendering
//! - [`output`] -- writing generated units to disk
//! - [`error`] -- structural error types

pub mod capture;
pub mod class;
pub mod compiler;
pub mod context;
pub mod emit;
pub mod error;
pub mod generate;
pub mod job;
pub mod nodes;
pub mod output;
pub mod pipeline;
pub mod symbols;
pub mod system;

pub use compiler::{compile, compile_batch, fingerprint};
pub use error::CodegenError;
pub use nodes::{Capabilities, Capability};
pub use output::write_unit;
pub use pipeline::CapabilityRegistry;

use serde::{Deserialize, Serialize};
use sysgraph_check::Diagnostic;

/// Options controlling source generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Omit `[BurstCompile]` everywhere so the output can be stepped through
    /// in a managed debugger.
    pub debug_script: bool,

    /// Wrap synthesized nested types with begin/end comments naming the node
    /// that produced them.
    pub traceability: bool,

    /// Spaces per indentation level.
    pub indent: usize,

    /// Fail with [`CodegenError::AnalysisFailed`] instead of generating when
    /// analysis reports errors.
    pub deny_errors: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            debug_script: false,
            traceability: true,
            indent: 4,
            deny_errors: false,
        }
    }
}

/// A compiled unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledUnit {
    /// Unit name; also the file stem when written.
    pub name: String,

    /// Generated source text.
    pub source: String,

    /// Hex blake3 hash of `source`.
    pub fingerprint: String,

    /// Everything analysis and generation reported, in report order.
    pub diagnostics: Vec<Diagnostic>,

    /// Time taken for compilation in milliseconds.
    pub compilation_time_ms: u64,
}

impl CompiledUnit {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}
