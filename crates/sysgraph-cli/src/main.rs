//! System graph compiler CLI.
//!
//! Provides the `sysgraph` binary with subcommands for working with system
//! graphs saved as JSON: `compile` generates one unit, `check` runs the
//! authoring analysis only, and `batch` compiles several graphs into a
//! directory.
//!
//! Exit codes: 0 = success, 1 = diagnostics with errors, 2 = structural
//! failure, 3 = I/O or parse error. A batch exits with the worst code of its
//! units.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sysgraph_check::Diagnostic;
use sysgraph_codegen::{CodegenError, CompileOptions};
use sysgraph_core::SystemGraph;

/// Entity/component system graph compiler.
#[derive(Parser)]
#[command(name = "sysgraph", about = "ECS system graph compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the generating subcommands.
#[derive(clap::Args, Clone, Copy)]
struct GenerateArgs {
    /// Omit Burst attributes for managed debugging.
    #[arg(long)]
    debug_script: bool,

    /// Do not annotate generated code with node comments.
    #[arg(long)]
    no_traceability: bool,

    /// Refuse to generate when analysis reports errors.
    #[arg(long)]
    deny_errors: bool,

    /// Spaces per indentation level.
    #[arg(long, default_value_t = 4)]
    indent: usize,
}

impl GenerateArgs {
    fn options(self) -> CompileOptions {
        CompileOptions {
            debug_script: self.debug_script,
            traceability: !self.no_traceability,
            indent: self.indent,
            deny_errors: self.deny_errors,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile one graph to source text.
    Compile {
        /// Path to the graph JSON file.
        graph: PathBuf,

        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        args: GenerateArgs,
    },

    /// Analyze a graph and print its diagnostics as JSON.
    Check {
        /// Path to the graph JSON file.
        graph: PathBuf,
    },

    /// Compile several graphs into a directory, one file per unit.
    Batch {
        /// Paths to graph JSON files.
        #[arg(required = true)]
        graphs: Vec<PathBuf>,

        /// Output directory.
        #[arg(long, default_value = "./Generated")]
        out_dir: PathBuf,

        #[command(flatten)]
        args: GenerateArgs,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Compile {
            graph,
            output,
            args,
        } => run_compile(&graph, output.as_deref(), &args.options()),
        Commands::Check { graph } => run_check(&graph),
        Commands::Batch {
            graphs,
            out_dir,
            args,
        } => run_batch(&graphs, &out_dir, &args.options()),
    };
    process::exit(exit_code);
}

/// Load a graph saved as JSON.
fn load_graph(path: &Path) -> Result<SystemGraph, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("failed to parse '{}': {}", path.display(), e))
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("  - {}", diagnostic);
    }
}

/// Exit code for a compilation error.
fn error_code(err: &CodegenError) -> i32 {
    match err {
        CodegenError::AnalysisFailed(diagnostics) => {
            eprintln!("Analysis failed with {} diagnostic(s):", diagnostics.len());
            print_diagnostics(diagnostics);
            1
        }
        CodegenError::IoError(e) => {
            eprintln!("I/O error: {}", e);
            3
        }
        e => {
            eprintln!("Compilation error: {}", e);
            2
        }
    }
}

/// Execute the compile subcommand.
fn run_compile(graph_path: &Path, output: Option<&Path>, options: &CompileOptions) -> i32 {
    let graph = match load_graph(graph_path) {
        Ok(g) => g,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 3;
        }
    };

    let unit = match sysgraph_codegen::compile(&graph, options) {
        Ok(unit) => unit,
        Err(e) => return error_code(&e),
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &unit.source) {
                eprintln!("Error: failed to write '{}': {}", path.display(), e);
                return 3;
            }
            info!(unit = %unit.name, path = %path.display(), "wrote unit");
        }
        None => print!("{}", unit.source),
    }

    if unit.has_errors() {
        eprintln!("{} reported errors:", unit.name);
        print_diagnostics(&unit.diagnostics);
        return 1;
    }
    if !unit.diagnostics.is_empty() {
        print_diagnostics(&unit.diagnostics);
    }
    0
}

/// Execute the check subcommand.
fn run_check(graph_path: &Path) -> i32 {
    let graph = match load_graph(graph_path) {
        Ok(g) => g,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 3;
        }
    };
    let diagnostics = sysgraph_check::analyze_graph(&graph);
    let json = serde_json::to_string_pretty(&diagnostics)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize diagnostics: {}\"}}", e));
    println!("{}", json);
    if diagnostics.iter().any(Diagnostic::is_error) {
        1
    } else {
        0
    }
}

/// Execute the batch subcommand.
fn run_batch(graph_paths: &[PathBuf], out_dir: &Path, options: &CompileOptions) -> i32 {
    let mut graphs = Vec::new();
    let mut worst = 0;
    for path in graph_paths {
        match load_graph(path) {
            Ok(g) => graphs.push(g),
            Err(msg) => {
                eprintln!("Error: {}", msg);
                worst = 3;
            }
        }
    }

    for result in sysgraph_codegen::compile_batch(&graphs, options) {
        let code = match result {
            Ok(unit) => match sysgraph_codegen::write_unit(&unit, out_dir) {
                Ok((path, changed)) => {
                    info!(unit = %unit.name, path = %path.display(), changed, "batch unit");
                    if unit.has_errors() {
                        eprintln!("{} reported errors:", unit.name);
                        print_diagnostics(&unit.diagnostics);
                        1
                    } else {
                        0
                    }
                }
                Err(e) => error_code(&e),
            },
            Err(e) => error_code(&e),
        };
        worst = worst.max(code);
    }
    worst
}
