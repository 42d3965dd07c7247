//! Tern: a whole-program ahead-of-time compiler for a small statically
//! typed imperative language.
//!
//! [`compile_file`] runs the full pipeline — resolve, parse (folded into
//! resolution), analyze, generate IR, build CFGs, optimize, and emit
//! both backends — and hands back a [`CompilationResult`] carrying every
//! stage's output so a caller (the CLI, or a dump request) can inspect
//! any of them without re-running earlier stages.
//!
//! The two backends compile straight from the AST and [`SemanticResult`]
//! rather than from the IR, so they're unaffected by anything the
//! optimizer does; the IR/CFG/optimizer pipeline exists to produce the
//! pedagogical dumps in [`dump`], not to feed code generation.

pub mod ast;
pub mod backend_c;
pub mod backend_stack;
pub mod cfg;
pub mod dump;
pub mod ir;
pub mod lexer;
pub mod optimize;
pub mod parser;
pub mod resolver;
pub mod semantic;
pub mod types;

use ast::Program;
use cfg::Cfg;
use ir::IrFunction;
use resolver::{Resolver, ResolveError};
use semantic::SemanticResult;
use std::path::Path;
use tern_core::Diagnostic;

#[derive(Debug)]
pub enum CompileError {
    Resolve(ResolveError),
    Semantic(Diagnostic),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Resolve(e) => write!(f, "{}", e),
            CompileError::Semantic(d) => write!(f, "{}", d),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ResolveError> for CompileError {
    fn from(e: ResolveError) -> Self {
        CompileError::Resolve(e)
    }
}

/// Every artifact the pipeline produces for one program. A failed
/// resolve or a fatal semantic error short-circuits before this is ever
/// built — everything it holds is validated. `warnings` collects both
/// the resolver's (currently: none raised) and the analyzer's
/// non-fatal diagnostics.
#[derive(Debug)]
pub struct CompilationResult {
    pub program: Program,
    pub semantic: SemanticResult,
    pub ir: Vec<IrFunction>,
    pub cfgs: Vec<Cfg>,
    pub optimized_cfgs: Vec<Cfg>,
    pub c_source: String,
    pub stack_listing: String,
    pub warnings: Vec<Diagnostic>,
}

pub fn compile_file(entry: &Path) -> Result<CompilationResult, CompileError> {
    let program = Resolver::new().resolve_entry(entry)?;
    compile_program(program)
}

pub fn compile_source(source: &str) -> Result<CompilationResult, CompileError> {
    let tokens = lexer::Lexer::new(source).tokenize().map_err(CompileError::Semantic)?;
    let program = parser::Parser::new(tokens.tokens).parse().map_err(|errors| {
        CompileError::Semantic(errors.diagnostics().first().cloned().expect("parse failure carries at least one diagnostic"))
    })?;
    compile_program(program)
}

fn compile_program(program: Program) -> Result<CompilationResult, CompileError> {
    let semantic = semantic::analyze(&program).map_err(CompileError::Semantic)?;

    let ir = ir::generate(&program, &semantic);
    let cfgs: Vec<Cfg> = ir.iter().map(cfg::build).collect();
    let optimized_cfgs: Vec<Cfg> = cfgs.iter().cloned().map(optimize::optimize).collect();

    // A program that passed semantic analysis carries a complete function/
    // composite table, so the C backend's internal lookups cannot fail;
    // a `CodeGenError` here would mean the two stages disagree about the
    // program, which is a bug in the compiler, not in the input.
    let c_source = backend_c::generate(&program, &semantic).expect("semantically valid program rejected by the C backend");
    let stack_listing = backend_stack::generate(&program, &semantic);

    let warnings = semantic.warnings.clone();

    Ok(CompilationResult { program, semantic, ir, cfgs, optimized_cfgs, c_source, stack_listing, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_source_produces_every_artifact() {
        let result = compile_source("begin int x = 1 + 2; print(x); end").unwrap();
        assert!(!result.ir.is_empty());
        assert!(!result.cfgs.is_empty());
        assert_eq!(result.cfgs.len(), result.optimized_cfgs.len());
        assert!(result.c_source.contains("int main(void)"));
        assert!(result.stack_listing.contains("LABEL __main__"));
    }

    #[test]
    fn fatal_semantic_error_short_circuits_before_codegen() {
        let err = compile_source("begin print(missing); end").unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)));
    }
}
