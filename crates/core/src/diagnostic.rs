//! Diagnostics: errors, warnings, and the aggregate-error wrapper
//!
//! Two failure kinds exist across the pipeline: a single fatal
//! [`Diagnostic`] that aborts the current stage, and an [`AggregateError`]
//! raised by a stage (the parser) that performs recovery and wants to
//! report every fault it found. Warnings never abort anything; callers
//! collect them in a `Vec<Diagnostic>` with `Severity::Warning`.

use crate::span::Span;
use std::fmt;

/// Stable diagnostic identifiers, one per failure/warning kind the
/// compiler can report. `Display` renders the exact snake_case string so
/// downstream tooling can match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    UnknownChar,
    UnterminatedString,
    ExpectedStart,
    ExpectedEnd,
    MissingSemicolon,
    MissingLparen,
    MissingRparen,
    MissingLbrace,
    MissingRbrace,
    InvalidStatement,
    InvalidExpression,
    UnexpectedToken,
    UndeclaredVariable,
    RedeclaredVariable,
    TypeMismatch,
    InvalidCondition,
    ReturnType,
    UndeclaredFunction,
    ArityMismatch,
    InvalidParams,
    InvalidFunction,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    UnknownType,
    InvalidLvalue,
    ArrayInitNotSupported,
    DuplicateDefault,
    InvalidCaseLabel,
    DuplicateCase,
    MissingImport,
    CircularImport,
    ModuleHasMain,

    // Warnings
    UnusedVariable,
    MissingReturn,
    ConstantCondition,
    UnreachableCode,
    /// Not part of spec.md's stable list; added so the lexer can flag a
    /// legacy keyword spelling without a separate Linter component.
    LegacyKeyword,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnknownChar => "unknown_char",
            DiagnosticCode::UnterminatedString => "unterminated_string",
            DiagnosticCode::ExpectedStart => "expected_start",
            DiagnosticCode::ExpectedEnd => "expected_end",
            DiagnosticCode::MissingSemicolon => "missing_semicolon",
            DiagnosticCode::MissingLparen => "missing_lparen",
            DiagnosticCode::MissingRparen => "missing_rparen",
            DiagnosticCode::MissingLbrace => "missing_lbrace",
            DiagnosticCode::MissingRbrace => "missing_rbrace",
            DiagnosticCode::InvalidStatement => "invalid_statement",
            DiagnosticCode::InvalidExpression => "invalid_expression",
            DiagnosticCode::UnexpectedToken => "unexpected_token",
            DiagnosticCode::UndeclaredVariable => "undeclared_variable",
            DiagnosticCode::RedeclaredVariable => "redeclared_variable",
            DiagnosticCode::TypeMismatch => "type_mismatch",
            DiagnosticCode::InvalidCondition => "invalid_condition",
            DiagnosticCode::ReturnType => "return_type",
            DiagnosticCode::UndeclaredFunction => "undeclared_function",
            DiagnosticCode::ArityMismatch => "arity_mismatch",
            DiagnosticCode::InvalidParams => "invalid_params",
            DiagnosticCode::InvalidFunction => "invalid_function",
            DiagnosticCode::BreakOutsideLoop => "break_outside_loop",
            DiagnosticCode::ContinueOutsideLoop => "continue_outside_loop",
            DiagnosticCode::UnknownType => "unknown_type",
            DiagnosticCode::InvalidLvalue => "invalid_lvalue",
            DiagnosticCode::ArrayInitNotSupported => "array_init_not_supported",
            DiagnosticCode::DuplicateDefault => "duplicate_default",
            DiagnosticCode::InvalidCaseLabel => "invalid_case_label",
            DiagnosticCode::DuplicateCase => "duplicate_case",
            DiagnosticCode::MissingImport => "missing_import",
            DiagnosticCode::CircularImport => "circular_import",
            DiagnosticCode::ModuleHasMain => "module_has_main",
            DiagnosticCode::UnusedVariable => "unused_variable",
            DiagnosticCode::MissingReturn => "missing_return",
            DiagnosticCode::ConstantCondition => "constant_condition",
            DiagnosticCode::UnreachableCode => "unreachable_code",
            DiagnosticCode::LegacyKeyword => "legacy_keyword",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic: a stable code, a human-readable technical
/// message, and the span it was raised at.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            code,
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    /// Render as `path:line:col [code] message`, followed by a one-line
    /// source frame with a caret under the column when `source` is given.
    pub fn pretty(&self, path: &str, source: Option<&str>) -> String {
        let severity = match self.severity {
            Severity::Error => "",
            Severity::Warning => "warning:",
        };
        let header = format!(
            "{}:{}:{} [{}{}] {}",
            path,
            self.span.line,
            self.span.column,
            severity,
            self.code,
            self.message
        );
        match source.and_then(|s| source_frame(s, self.span)) {
            Some(frame) => format!("{}\n{}", header, frame),
            None => header,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}] {}", self.span.line, self.span.column, self.code, self.message)
    }
}

impl std::error::Error for Diagnostic {}

fn source_frame(source: &str, span: Span) -> Option<String> {
    let line = source.lines().nth((span.line.checked_sub(1)?) as usize)?;
    let caret_pos = span.column.max(1) as usize;
    let caret_line = format!("{}^", " ".repeat(caret_pos - 1));
    Some(format!("  | {}\n  | {}", line, caret_line))
}

/// A collection of fatal diagnostics raised together by a stage that
/// performed recovery (currently only the parser). The caller may
/// pretty-print each in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateError(pub Vec<Diagnostic>);

impl AggregateError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        AggregateError(diagnostics)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn pretty(&self, path: &str, source: Option<&str>) -> String {
        self.0
            .iter()
            .map(|d| d.pretty(path, source))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_includes_source_frame() {
        let diag = Diagnostic::error(
            DiagnosticCode::UndeclaredVariable,
            "Variable `scor` is not declared. Did you mean `score`?",
            Span::new(3, 7),
        );
        let source = "int score = 1;\nprint(score);\nprint(scor);\n";
        let rendered = diag.pretty("main.tern", Some(source));
        assert!(rendered.contains("main.tern:3:7 [undeclared_variable]"));
        assert!(rendered.contains("print(scor);"));
        assert!(rendered.contains("^"));
    }

    #[test]
    fn aggregate_display_joins_each_diagnostic() {
        let agg = AggregateError::new(vec![
            Diagnostic::error(DiagnosticCode::MissingSemicolon, "missing ;", Span::new(1, 5)),
            Diagnostic::error(DiagnosticCode::MissingSemicolon, "missing ;", Span::new(2, 5)),
        ]);
        let text = format!("{}", agg);
        assert_eq!(text.lines().count(), 2);
    }
}
