//! The Rye compiler.
//!
//! A whole-program compiler for the Rye language: a statically-typed,
//! class-based language with generics, generators, list comprehensions,
//! first-class function values, operator overloading, and boxed
//! primitive semantics. The compiler consumes parse trees (produced by
//! an external parser and exchanged as `.ast.json` documents) and emits
//! one textual LLVM-style IR document for an external toolchain to
//! assemble and link.
//!
//! Pipeline: parse trees → [`builder`] (desugaring) → [`semantics`]
//! (resolution, typing, monomorphization discovery) → [`codegen`]
//! (textual IR emission).

pub mod ast;
pub mod builder;
pub mod codegen;
pub mod corelib;
pub mod diagnostics;
pub mod semantics;

use std::path::{Path, PathBuf};

use crate::builder::{AstBuilder, TmpIdents, TupleRegistry};
use crate::diagnostics::DiagnosticResult;

/// Compilation options for the Rye compiler.
///
/// A plain options structure keeps the compiler API separate from CLI
/// argument parsing: callers construct options explicitly rather than
/// having the compiler discover project structure.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Path to the parse-tree document of the root module.
    pub src_file: PathBuf,
    /// Override for the output path; defaults to the input with an
    /// `.ll` extension.
    pub out_path: Option<PathBuf>,
}

impl CompileOptions {
    pub fn new(src_file: impl Into<PathBuf>) -> Self {
        CompileOptions {
            src_file: src_file.into(),
            out_path: None,
        }
    }
}

/// Compiles a set of parse-tree modules (the synthesized core modules
/// are prepended) into one IR document.
pub fn compile_parse_trees(modules: &[rye_ast::Module]) -> DiagnosticResult<String> {
    let mut program = ast::Program::new();
    let mut tmp = TmpIdents::new();
    let mut tuples = TupleRegistry::new();

    let core = corelib::core_modules();
    for module in core.iter().chain(modules.iter()) {
        let file_name = format!("{}.rye", module.name);
        let mut builder = AstBuilder::new(&mut program, file_name, &mut tmp, &mut tuples);
        builder.build_module(module)?;
    }

    let core_classes = semantics::analyze(&mut program)?;
    codegen::generate(&program, core_classes)
}

/// Compiles one parse-tree document from disk and writes the IR file.
/// Returns the output path.
pub fn compile(options: CompileOptions) -> anyhow::Result<PathBuf> {
    let source = std::fs::read_to_string(&options.src_file)?;
    let module: rye_ast::Module = serde_json::from_str(&source)?;

    let ir = match compile_parse_trees(std::slice::from_ref(&module)) {
        Ok(ir) => ir,
        Err(diagnostic) => {
            diagnostics::emit_diagnostic(&diagnostic);
            anyhow::bail!("compilation failed: {}", diagnostic);
        }
    };

    let out_path = options
        .out_path
        .unwrap_or_else(|| default_out_path(&options.src_file));
    std::fs::write(&out_path, ir)?;
    Ok(out_path)
}

fn default_out_path(src: &Path) -> PathBuf {
    let mut out = src.to_path_buf();
    // Documents usually arrive as `<name>.ast.json`; strip both layers.
    if let Some(stem) = out.file_stem().map(|s| s.to_os_string()) {
        out.set_file_name(stem);
        if out.extension().is_some_and(|e| e == "ast") {
            let stem = out.file_stem().map(|s| s.to_os_string());
            if let Some(stem) = stem {
                out.set_file_name(stem);
            }
        }
    }
    out.set_extension("ll");
    out
}
