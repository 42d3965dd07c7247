//! C backend: compiles directly from the AST and [`SemanticResult`],
//! bypassing the IR/CFG/optimizer pipeline entirely — that pipeline only
//! feeds the textual dumps in [`crate::dump`].
//!
//! Control flow translates one-to-one (`if`/`while`/`for`/`do-while`/
//! `switch`/`break`/`continue` map directly onto their C counterparts);
//! the only real work is picking a `printf` format per `print` argument
//! from the expression-type map, mapping the closed type vocabulary onto
//! C types/typedefs, and re-escaping string literals for a C compiler
//! instead of this crate's own lexer.

use crate::ast::*;
use crate::semantic::SemanticResult;
use crate::types::Type;
use std::fmt::Write as _;

#[derive(Debug)]
pub enum CodeGenError {
    Logic(String),
    Format(std::fmt::Error),
}

impl std::fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeGenError::Logic(s) => write!(f, "{}", s),
            CodeGenError::Format(e) => write!(f, "C code generation error: {}", e),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::Format(e)
    }
}

pub fn generate(program: &Program, semantic: &SemanticResult) -> Result<String, CodeGenError> {
    Generator { program, semantic }.emit()
}

struct Generator<'p> {
    program: &'p Program,
    semantic: &'p SemanticResult,
}

impl<'p> Generator<'p> {
    fn emit(&self) -> Result<String, CodeGenError> {
        let mut out = String::new();
        writeln!(out, "#include <stdio.h>")?;
        writeln!(out, "#include <string.h>")?;
        writeln!(out)?;

        if program_calls(self.program, "input") || program_calls(self.program, "bata") {
            writeln!(out, "static int read_int_helper(void) {{")?;
            writeln!(out, "    int value;")?;
            writeln!(out, "    scanf(\"%d\", &value);")?;
            writeln!(out, "    return value;")?;
            writeln!(out, "}}")?;
            writeln!(out)?;
        }

        self.emit_typedefs(&mut out)?;
        self.emit_forward_decls(&mut out)?;

        for function in &self.program.functions {
            self.emit_function(&mut out, function)?;
            writeln!(out)?;
        }

        writeln!(out, "int main(void) {{")?;
        for stmt in &self.program.statements {
            self.emit_stmt(&mut out, stmt, 1)?;
        }
        writeln!(out, "    return 0;")?;
        writeln!(out, "}}")?;
        Ok(out)
    }

    fn emit_typedefs(&self, out: &mut String) -> Result<(), CodeGenError> {
        // Composites are emitted in declaration order so a later struct
        // that embeds an earlier one by value sees a complete type.
        for decl in &self.program.type_decls {
            writeln!(out, "typedef struct {{")?;
            let composite = self.semantic.composites.get(&decl.name).ok_or_else(|| {
                CodeGenError::Logic(format!("composite `{}` missing from semantic result", decl.name))
            })?;
            for (name, ty) in &composite.fields {
                writeln!(out, "    {};", c_field(ty, name))?;
            }
            writeln!(out, "}} {};", decl.name)?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn emit_forward_decls(&self, out: &mut String) -> Result<(), CodeGenError> {
        for function in &self.program.functions {
            writeln!(out, "{};", self.function_signature(function)?)?;
        }
        if !self.program.functions.is_empty() {
            writeln!(out)?;
        }
        Ok(())
    }

    fn function_signature(&self, function: &FunctionDecl) -> Result<String, CodeGenError> {
        let sig = self.semantic.functions.get(&function.name).ok_or_else(|| {
            CodeGenError::Logic(format!("function `{}` missing from semantic result", function.name))
        })?;
        let params: Vec<String> = sig.params.iter().map(|(name, ty)| c_field(ty, name)).collect();
        Ok(format!("{} {}({})", c_type(&sig.return_type), function.name, params.join(", ")))
    }

    fn emit_function(&self, out: &mut String, function: &FunctionDecl) -> Result<(), CodeGenError> {
        writeln!(out, "{} {{", self.function_signature(function)?)?;
        for stmt in &function.body {
            self.emit_stmt(out, stmt, 1)?;
        }
        writeln!(out, "}}")?;
        Ok(())
    }

    fn emit_stmt(&self, out: &mut String, stmt: &Stmt, depth: usize) -> Result<(), CodeGenError> {
        let pad = indent(depth);
        match stmt {
            Stmt::VarDecl { spec, name, init, .. } => {
                let ty = self.type_of_spec(spec)?;
                match init {
                    Some(expr) => writeln!(out, "{}{} = {};", pad, c_field(&ty, name), self.emit_expr(expr)?)?,
                    None => writeln!(out, "{}{};", pad, c_field(&ty, name))?,
                }
            }
            Stmt::Assign { target, value, .. } => {
                writeln!(out, "{}{} = {};", pad, self.emit_expr(target)?, self.emit_expr(value)?)?;
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                writeln!(out, "{}if ({}) {{", pad, self.emit_expr(cond)?)?;
                for s in then_branch {
                    self.emit_stmt(out, s, depth + 1)?;
                }
                match else_branch {
                    Some(body) => {
                        writeln!(out, "{}}} else {{", pad)?;
                        for s in body {
                            self.emit_stmt(out, s, depth + 1)?;
                        }
                        writeln!(out, "{}}}", pad)?;
                    }
                    None => writeln!(out, "{}}}", pad)?,
                }
            }
            Stmt::While { cond, body, .. } => {
                writeln!(out, "{}while ({}) {{", pad, self.emit_expr(cond)?)?;
                for s in body {
                    self.emit_stmt(out, s, depth + 1)?;
                }
                writeln!(out, "{}}}", pad)?;
            }
            Stmt::For { init, cond, post, body, .. } => {
                let init_str = match init {
                    Some(stmt) => self.emit_for_clause(stmt)?,
                    None => String::new(),
                };
                let cond_str = match cond {
                    Some(expr) => self.emit_expr(expr)?,
                    None => String::new(),
                };
                let post_str = match post {
                    Some(stmt) => self.emit_for_clause(stmt)?,
                    None => String::new(),
                };
                writeln!(out, "{}for ({}; {}; {}) {{", pad, init_str, cond_str, post_str)?;
                for s in body {
                    self.emit_stmt(out, s, depth + 1)?;
                }
                writeln!(out, "{}}}", pad)?;
            }
            Stmt::DoWhile { body, cond, .. } => {
                writeln!(out, "{}do {{", pad)?;
                for s in body {
                    self.emit_stmt(out, s, depth + 1)?;
                }
                writeln!(out, "{}}} while ({});", pad, self.emit_expr(cond)?)?;
            }
            Stmt::Switch { cond, cases, default, .. } => {
                writeln!(out, "{}switch ({}) {{", pad, self.emit_expr(cond)?)?;
                for case in cases {
                    writeln!(out, "{}case {}: {{", pad, self.emit_expr(&case.label)?)?;
                    for s in &case.body {
                        self.emit_stmt(out, s, depth + 1)?;
                    }
                    writeln!(out, "{}break;", indent(depth + 1))?;
                    writeln!(out, "{}}}", pad)?;
                }
                if let Some(default_body) = default {
                    writeln!(out, "{}default: {{", pad)?;
                    for s in default_body {
                        self.emit_stmt(out, s, depth + 1)?;
                    }
                    writeln!(out, "{}break;", indent(depth + 1))?;
                    writeln!(out, "{}}}", pad)?;
                }
                writeln!(out, "{}}}", pad)?;
            }
            Stmt::Break(_) => writeln!(out, "{}break;", pad)?,
            Stmt::Continue(_) => writeln!(out, "{}continue;", pad)?,
            Stmt::Print(expr, _) => {
                let ty = self.expr_type(expr)?;
                let fmt = printf_format(&ty);
                writeln!(out, "{}printf(\"{}\\n\", {});", pad, fmt, self.emit_expr(expr)?)?;
            }
            Stmt::Return(value, _) => match value {
                Some(expr) => writeln!(out, "{}return {};", pad, self.emit_expr(expr)?)?,
                None => writeln!(out, "{}return 0;", pad)?,
            },
            Stmt::ExprStmt(expr, _) => writeln!(out, "{}{};", pad, self.emit_expr(expr)?)?,
            Stmt::Block(stmts, _) => {
                writeln!(out, "{}{{", pad)?;
                for s in stmts {
                    self.emit_stmt(out, s, depth + 1)?;
                }
                writeln!(out, "{}}}", pad)?;
            }
        }
        Ok(())
    }

    /// `for`'s init/post clauses render without the statement's own
    /// trailing `;` — the `for (...; ...; ...)` header supplies it.
    fn emit_for_clause(&self, stmt: &Stmt) -> Result<String, CodeGenError> {
        match stmt {
            Stmt::VarDecl { spec, name, init, .. } => {
                let ty = self.type_of_spec(spec)?;
                match init {
                    Some(expr) => Ok(format!("{} = {}", c_field(&ty, name), self.emit_expr(expr)?)),
                    None => Ok(c_field(&ty, name)),
                }
            }
            Stmt::Assign { target, value, .. } => Ok(format!("{} = {}", self.emit_expr(target)?, self.emit_expr(value)?)),
            Stmt::ExprStmt(expr, _) => self.emit_expr(expr),
            other => Err(CodeGenError::Logic(format!("unsupported for-loop clause: {:?}", other))),
        }
    }

    fn emit_expr(&self, expr: &Expr) -> Result<String, CodeGenError> {
        Ok(match expr {
            Expr::IntLiteral { value, .. } => value.to_string(),
            Expr::FloatLiteral { value, .. } => format!("{:?}", value),
            Expr::BoolLiteral { value, .. } => (if *value { "1" } else { "0" }).to_string(),
            Expr::StringLiteral { value, .. } => c_quote(value),
            Expr::Identifier { name, .. } => name.clone(),
            Expr::Unary { op, operand, .. } => {
                let sym = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                format!("({}{})", sym, self.emit_expr(operand)?)
            }
            Expr::Binary { op, left, right, .. } => {
                format!("({} {} {})", self.emit_expr(left)?, op.symbol(), self.emit_expr(right)?)
            }
            Expr::Call { callee, args, .. } if callee == "max" => {
                let a = self.emit_expr(&args[0])?;
                let b = self.emit_expr(&args[1])?;
                format!("(({a}) > ({b}) ? ({a}) : ({b}))")
            }
            Expr::Call { callee, args, .. } if callee == "len" => {
                let arg_ty = self.expr_type(&args[0])?;
                let a = self.emit_expr(&args[0])?;
                match arg_ty {
                    Type::Text => format!("((int)strlen({a}))"),
                    Type::Array(..) => format!("((int)(sizeof({a})/sizeof({a}[0])))"),
                    _ => "0".to_string(),
                }
            }
            Expr::Call { callee, .. } if callee == "input" || callee == "bata" => "read_int_helper()".to_string(),
            Expr::Call { callee, args, .. } => {
                let rendered: Vec<String> = args.iter().map(|a| self.emit_expr(a)).collect::<Result<_, _>>()?;
                format!("{}({})", callee, rendered.join(", "))
            }
            Expr::Index { base, index, .. } => format!("{}[{}]", self.emit_expr(base)?, self.emit_expr(index)?),
            Expr::Member { base, field, .. } => format!("{}.{}", self.emit_expr(base)?, field),
            Expr::Cast { type_name, expr: inner, .. } => format!("(({}){})", c_primitive(type_name), self.emit_expr(inner)?),
        })
    }

    fn type_of_spec(&self, spec: &TypeSpec) -> Result<Type, CodeGenError> {
        resolve_named_type(&spec.type_name, &self.semantic.composites)
            .map(|base| match spec.array_size {
                Some(n) => Type::Array(Box::new(base), n),
                None => base,
            })
            .ok_or_else(|| CodeGenError::Logic(format!("unknown type `{}`", spec.type_name)))
    }

    fn expr_type(&self, expr: &Expr) -> Result<Type, CodeGenError> {
        self.semantic
            .expr_types
            .get(&expr.id())
            .cloned()
            .ok_or_else(|| CodeGenError::Logic("expression missing from semantic type map".to_string()))
    }
}

fn resolve_named_type(
    name: &str,
    composites: &std::collections::HashMap<String, crate::types::CompositeType>,
) -> Option<Type> {
    if let Some(rest) = name.strip_prefix("struct ") {
        return composites.get(rest).map(|_| Type::Struct(rest.to_string()));
    }
    if let Some(rest) = name.strip_prefix("class ") {
        return composites.get(rest).map(|_| Type::Class(rest.to_string()));
    }
    match name {
        "int" => Some(Type::Int),
        "float" => Some(Type::Float),
        "bool" => Some(Type::Bool),
        "text" => Some(Type::Text),
        "void" => Some(Type::Void),
        other => composites.get(other).map(|c| match c.kind {
            CompositeKind::Struct => Type::Struct(c.name.clone()),
            CompositeKind::Class => Type::Class(c.name.clone()),
        }),
    }
}

/// Maps the closed type vocabulary onto C types. Arrays and text render
/// through their element/char form; structs and classes through their
/// typedef name.
fn c_type(ty: &Type) -> String {
    match ty {
        Type::Int | Type::Bool => "int".to_string(),
        Type::Float => "double".to_string(),
        Type::Text => "char*".to_string(),
        Type::Void => "void".to_string(),
        Type::Struct(name) | Type::Class(name) => name.clone(),
        Type::Array(elem, _) => c_type(elem),
    }
}

fn c_primitive(name: &str) -> &'static str {
    match name {
        "int" => "int",
        "float" => "double",
        "bool" => "int",
        "text" => "char*",
        _ => "int",
    }
}

/// A declaration `TYPE name` in C syntax, handling the array-size
/// suffix (`int scores[4]`, not `int[4] scores`).
fn c_field(ty: &Type, name: &str) -> String {
    match ty {
        Type::Array(elem, n) => format!("{} {}[{}]", c_type(elem), name, n),
        other => format!("{} {}", c_type(other), name),
    }
}

fn printf_format(ty: &Type) -> &'static str {
    match ty {
        Type::Int | Type::Bool => "%d",
        Type::Float => "%g",
        Type::Text => "%s",
        Type::Void | Type::Struct(_) | Type::Class(_) | Type::Array(..) => "%d",
    }
}

fn c_quote(s: &str) -> String {
    let mut out = String::from("\"");
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn program_calls(program: &Program, target: &str) -> bool {
    program.functions.iter().any(|f| stmts_call(&f.body, target))
        || stmts_call(&program.statements, target)
}

fn stmts_call(stmts: &[Stmt], target: &str) -> bool {
    stmts.iter().any(|s| stmt_calls(s, target))
}

fn stmt_calls(stmt: &Stmt, target: &str) -> bool {
    match stmt {
        Stmt::VarDecl { init, .. } => init.as_ref().is_some_and(|e| expr_calls(e, target)),
        Stmt::Assign { target: t, value, .. } => expr_calls(t, target) || expr_calls(value, target),
        Stmt::If { cond, then_branch, else_branch, .. } => {
            expr_calls(cond, target)
                || stmts_call(then_branch, target)
                || else_branch.as_ref().is_some_and(|b| stmts_call(b, target))
        }
        Stmt::While { cond, body, .. } => expr_calls(cond, target) || stmts_call(body, target),
        Stmt::For { init, cond, post, body, .. } => {
            init.as_ref().is_some_and(|s| stmt_calls(s, target))
                || cond.as_ref().is_some_and(|e| expr_calls(e, target))
                || post.as_ref().is_some_and(|s| stmt_calls(s, target))
                || stmts_call(body, target)
        }
        Stmt::DoWhile { body, cond, .. } => stmts_call(body, target) || expr_calls(cond, target),
        Stmt::Switch { cond, cases, default, .. } => {
            expr_calls(cond, target)
                || cases.iter().any(|c| expr_calls(&c.label, target) || stmts_call(&c.body, target))
                || default.as_ref().is_some_and(|b| stmts_call(b, target))
        }
        Stmt::Break(_) | Stmt::Continue(_) => false,
        Stmt::Print(e, _) => expr_calls(e, target),
        Stmt::Return(value, _) => value.as_ref().is_some_and(|e| expr_calls(e, target)),
        Stmt::ExprStmt(e, _) => expr_calls(e, target),
        Stmt::Block(stmts, _) => stmts_call(stmts, target),
    }
}

fn expr_calls(expr: &Expr, target: &str) -> bool {
    match expr {
        Expr::Call { callee, args, .. } => callee == target || args.iter().any(|a| expr_calls(a, target)),
        Expr::Unary { operand, .. } => expr_calls(operand, target),
        Expr::Binary { left, right, .. } => expr_calls(left, target) || expr_calls(right, target),
        Expr::Index { base, index, .. } => expr_calls(base, target) || expr_calls(index, target),
        Expr::Member { base, .. } => expr_calls(base, target),
        Expr::Cast { expr, .. } => expr_calls(expr, target),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic;

    fn generate_src(src: &str) -> String {
        let tokens = Lexer::new(src).tokenize().unwrap().tokens;
        let program = Parser::new(tokens).parse().unwrap();
        let sem = semantic::analyze(&program).unwrap();
        generate(&program, &sem).unwrap()
    }

    #[test]
    fn emits_main_with_return_zero() {
        let c = generate_src("begin print(1); end");
        assert!(c.contains("int main(void)"));
        assert!(c.contains("return 0;"));
        assert!(c.contains("printf(\"%d\\n\", 1);"));
    }

    #[test]
    fn struct_lowers_to_typedef() {
        let c = generate_src("struct Point { int x; int y; } begin end");
        assert!(c.contains("typedef struct {"));
        assert!(c.contains("int x;"));
        assert!(c.contains("} Point;"));
    }

    #[test]
    fn function_signature_and_call_round_trip() {
        let c = generate_src("func add(int a, int b) -> int { return a + b; } begin print(add(1, 2)); end");
        assert!(c.contains("int add(int a, int b)"));
        assert!(c.contains("add(1, 2)"));
    }

    #[test]
    fn text_print_selects_string_format() {
        let c = generate_src("begin text s = \"hi\"; print(s); end");
        assert!(c.contains("printf(\"%s\\n\", s);"));
    }

    #[test]
    fn for_loop_clauses_omit_their_own_semicolons() {
        let c = generate_src("begin for (int i = 0; i < 3; i = i + 1) { print(i); } end");
        assert!(c.contains("for (int i = 0; (i < 3); i = (i + 1)) {"));
    }

    #[test]
    fn float_print_uses_shortest_representation_format() {
        let c = generate_src("begin float f = 7.0; print(f); end");
        assert!(c.contains("printf(\"%g\\n\", f);"));
        assert!(!c.contains("%f"));
    }

    #[test]
    fn max_lowers_to_inline_ternary_not_a_runtime_call() {
        let c = generate_src("begin print(max(1, 2)); end");
        assert!(c.contains("((1) > (2) ? (1) : (2))"));
        assert!(!c.contains("tern_max"));
    }

    #[test]
    fn len_lowers_to_strlen_on_text() {
        let c = generate_src("begin text s = \"hi\"; print(len(s)); end");
        assert!(c.contains("((int)strlen(s))"));
        assert!(!c.contains("tern_len"));
    }

    #[test]
    fn input_lowers_to_on_demand_helper() {
        let c = generate_src("begin int x = input(); print(x); end");
        assert!(c.contains("static int read_int_helper(void)"));
        assert!(c.contains("read_int_helper()"));
        assert!(!c.contains("tern_read_int"));
    }

    #[test]
    fn helper_is_omitted_when_program_never_reads_input() {
        let c = generate_src("begin print(1); end");
        assert!(!c.contains("read_int_helper"));
    }
}
