//! Multi-module import resolution
//!
//! Loads the entry module and every module it (transitively) imports,
//! parsing each exactly once, detecting import cycles, and merging the
//! result into a single [`Program`]: dependency declarations in
//! reverse-topological order (leaves first), followed by the entry
//! module's own declarations and its top-level statements.

use crate::ast::Program;
use crate::lexer::Lexer;
use crate::parser::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tern_core::{AggregateError, Diagnostic, DiagnosticCode, Span};

#[derive(Debug)]
pub enum ResolveError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, errors: AggregateError },
    Fatal { path: PathBuf, diagnostic: Diagnostic },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Io { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            ResolveError::Parse { path, errors } => write!(f, "{}: {}", path.display(), errors),
            ResolveError::Fatal { path, diagnostic } => write!(f, "{}: {}", path.display(), diagnostic),
        }
    }
}

impl std::error::Error for ResolveError {}

struct Unit {
    program: Program,
}

pub struct Resolver {
    visiting: Vec<PathBuf>,
    units: HashMap<PathBuf, Unit>,
    /// Post-order completion sequence: dependencies land before their
    /// importer, which is exactly "leaves first".
    order: Vec<PathBuf>,
    pub warnings: Vec<Diagnostic>,
    default_extension: String,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            visiting: Vec::new(),
            units: HashMap::new(),
            order: Vec::new(),
            warnings: Vec::new(),
            default_extension: "tern".to_string(),
        }
    }

    pub fn resolve_entry(mut self, entry: &Path) -> Result<Program, ResolveError> {
        if let Some(ext) = entry.extension().and_then(|e| e.to_str()) {
            self.default_extension = ext.to_string();
        }
        let entry = entry.to_path_buf();
        self.visit(entry.clone(), true)?;

        let mut merged = Program::new();
        for path in &self.order {
            if *path == entry {
                continue;
            }
            let unit = self.units.get(path).expect("completed module recorded");
            merged.type_decls.extend(unit.program.type_decls.iter().cloned());
            merged.functions.extend(unit.program.functions.iter().cloned());
        }
        let entry_unit = self.units.remove(&entry).expect("entry module recorded");
        merged.type_decls.extend(entry_unit.program.type_decls);
        merged.functions.extend(entry_unit.program.functions);
        merged.imports = entry_unit.program.imports;
        merged.statements = entry_unit.program.statements;
        Ok(merged)
    }

    fn visit(&mut self, path: PathBuf, is_entry: bool) -> Result<(), ResolveError> {
        if self.units.contains_key(&path) {
            return Ok(());
        }
        if let Some(pos) = self.visiting.iter().position(|p| p == &path) {
            let mut chain: Vec<String> = self.visiting[pos..]
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(path.display().to_string());
            return Err(ResolveError::Fatal {
                path: path.clone(),
                diagnostic: Diagnostic::error(
                    DiagnosticCode::CircularImport,
                    format!("Circular import: {}", chain.join(" -> ")),
                    Span::new(1, 1),
                ),
            });
        }

        self.visiting.push(path.clone());

        let source = std::fs::read_to_string(&path).map_err(|source| ResolveError::Io {
            path: path.clone(),
            source,
        })?;
        let lexed = Lexer::new(&source).tokenize().map_err(|d| ResolveError::Parse {
            path: path.clone(),
            errors: AggregateError::new(vec![d]),
        })?;
        self.warnings.extend(lexed.warnings);
        let program = Parser::new(lexed.tokens).parse().map_err(|errors| ResolveError::Parse {
            path: path.clone(),
            errors,
        })?;

        if !is_entry && !program.statements.is_empty() {
            return Err(ResolveError::Fatal {
                path: path.clone(),
                diagnostic: Diagnostic::error(
                    DiagnosticCode::ModuleHasMain,
                    format!(
                        "Module `{}` is imported but contains a begin/end main section; only the entry module may.",
                        path.display()
                    ),
                    Span::new(1, 1),
                ),
            });
        }

        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let mut deps = Vec::new();
        for import in &program.imports {
            let dep_path = self.resolve_import_path(&dir, &import.path, import.span)?;
            deps.push(dep_path);
        }
        for dep in deps {
            self.visit(dep, false)?;
        }

        self.visiting.pop();
        self.units.insert(path.clone(), Unit { program });
        self.order.push(path);
        Ok(())
    }

    fn resolve_import_path(&self, dir: &Path, raw: &str, span: Span) -> Result<PathBuf, ResolveError> {
        let mut candidate = PathBuf::from(raw);
        if candidate.is_relative() {
            candidate = dir.join(candidate);
        }
        if candidate.extension().is_none() {
            candidate.set_extension(&self.default_extension);
        }
        if !candidate.exists() {
            return Err(ResolveError::Fatal {
                path: dir.to_path_buf(),
                diagnostic: Diagnostic::error(
                    DiagnosticCode::MissingImport,
                    format!("Cannot find imported module `{}`.", raw),
                    span,
                ),
            });
        }
        Ok(candidate)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn merges_dependency_before_entry_in_leaves_first_order() {
        let dir = tempdir().unwrap();
        let dep_path = dir.path().join("mathlib.tern");
        let mut dep = std::fs::File::create(&dep_path).unwrap();
        writeln!(dep, "func twice(int a) -> int {{ return a * 2; }} begin end").unwrap();

        let entry_path = dir.path().join("main.tern");
        let mut entry = std::fs::File::create(&entry_path).unwrap();
        writeln!(entry, "import \"mathlib\"; begin print(twice(3)); end").unwrap();

        let merged = Resolver::new().resolve_entry(&entry_path).unwrap();
        assert_eq!(merged.functions.len(), 1);
        assert_eq!(merged.functions[0].name, "twice");
        assert_eq!(merged.statements.len(), 1);
    }

    #[test]
    fn detects_circular_import() {
        let dir = tempdir().unwrap();
        let a_path = dir.path().join("a.tern");
        let b_path = dir.path().join("b.tern");
        std::fs::write(&a_path, "import \"b\"; begin end").unwrap();
        std::fs::write(&b_path, "import \"a\"; begin end").unwrap();

        let err = Resolver::new().resolve_entry(&a_path).unwrap_err();
        match err {
            ResolveError::Fatal { diagnostic, .. } => {
                assert_eq!(diagnostic.code, DiagnosticCode::CircularImport);
            }
            other => panic!("expected a circular-import fatal, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_entry_module_with_main_section() {
        let dir = tempdir().unwrap();
        let dep_path = dir.path().join("dep.tern");
        std::fs::write(&dep_path, "begin print(1); end").unwrap();
        let entry_path = dir.path().join("main.tern");
        std::fs::write(&entry_path, "import \"dep\"; begin end").unwrap();

        let err = Resolver::new().resolve_entry(&entry_path).unwrap_err();
        match err {
            ResolveError::Fatal { diagnostic, .. } => {
                assert_eq!(diagnostic.code, DiagnosticCode::ModuleHasMain);
            }
            other => panic!("expected module_has_main fatal, got {:?}", other),
        }
    }

    #[test]
    fn missing_import_is_fatal() {
        let dir = tempdir().unwrap();
        let entry_path = dir.path().join("main.tern");
        std::fs::write(&entry_path, "import \"nope\"; begin end").unwrap();

        let err = Resolver::new().resolve_entry(&entry_path).unwrap_err();
        match err {
            ResolveError::Fatal { diagnostic, .. } => {
                assert_eq!(diagnostic.code, DiagnosticCode::MissingImport);
            }
            other => panic!("expected missing_import fatal, got {:?}", other),
        }
    }
}
