//! Semantic analysis: name resolution, type inference/check, constant
//! folding for diagnostics, warning collection
//!
//! Three collection passes over the merged program (composite names,
//! composite fields, function signatures) followed by a per-function
//! body pass and a synthetic `__main__` pass over the top-level
//! statements. Every pass shares one [`Analyzer`] instance so that type
//! errors raised mid-pass abort the whole analysis with a single fatal
//! [`Diagnostic`] — unlike the parser, this stage does not recover.

use crate::ast::*;
use crate::types::{floor_div_i64, is_assignable, is_castable, numeric_result, CompositeType, FunctionSignature, Type};
use std::collections::HashMap;
use tern_core::{Diagnostic, DiagnosticCode, Span};

pub const MAIN_FUNCTION_NAME: &str = "__main__";

/// Builtins callable without a user declaration, resolved by arity.
const BUILTIN_ARITIES: &[(&str, usize)] = &[("input", 0), ("bata", 0), ("max", 2), ("len", 1)];

#[derive(Debug, Clone, PartialEq)]
pub struct VarSymbol {
    pub ty: Type,
    pub span: Span,
    pub used: bool,
}

#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    pub label: String,
    pub vars: Vec<(String, Type)>,
}

struct Scope {
    vars: HashMap<String, VarSymbol>,
    label: String,
}

/// Everything backends need that the analyzer computed: resolved
/// signatures, composite layouts, the per-expression type map, and every
/// warning collected along the way. Fatal errors never reach here — they
/// abort [`analyze`] before a result is produced.
#[derive(Debug, Clone, Default)]
pub struct SemanticResult {
    pub functions: HashMap<String, FunctionSignature>,
    pub composites: HashMap<String, CompositeType>,
    pub expr_types: HashMap<ExprId, Type>,
    pub warnings: Vec<Diagnostic>,
    pub scope_snapshots: Vec<ScopeSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ConstValue {
    Int(i64),
    Bool(bool),
}

impl ConstValue {
    fn as_case_key(self) -> i64 {
        match self {
            ConstValue::Int(n) => n,
            ConstValue::Bool(b) => b as i64,
        }
    }
}

pub fn analyze(program: &Program) -> Result<SemanticResult, Diagnostic> {
    let mut analyzer = Analyzer::new(program);
    analyzer.collect_composites()?;
    analyzer.resolve_composite_fields()?;
    analyzer.collect_function_signatures()?;

    for function in &program.functions {
        analyzer.analyze_function(function)?;
    }
    analyzer.analyze_main()?;

    Ok(SemanticResult {
        functions: analyzer.functions,
        composites: analyzer.composites,
        expr_types: analyzer.expr_types,
        warnings: analyzer.warnings,
        scope_snapshots: analyzer.scope_snapshots,
    })
}

struct Analyzer<'p> {
    program: &'p Program,
    composites: HashMap<String, CompositeType>,
    functions: HashMap<String, FunctionSignature>,
    expr_types: HashMap<ExprId, Type>,
    warnings: Vec<Diagnostic>,
    scopes: Vec<Scope>,
    scope_snapshots: Vec<ScopeSnapshot>,
    scope_tag_counts: HashMap<String, u32>,
    loop_depth: u32,
    switch_depth: u32,
    current_function: String,
    current_return: Type,
}

impl<'p> Analyzer<'p> {
    fn new(program: &'p Program) -> Self {
        Analyzer {
            program,
            composites: HashMap::new(),
            functions: HashMap::new(),
            expr_types: HashMap::new(),
            warnings: Vec::new(),
            scopes: Vec::new(),
            scope_snapshots: Vec::new(),
            scope_tag_counts: HashMap::new(),
            loop_depth: 0,
            switch_depth: 0,
            current_function: MAIN_FUNCTION_NAME.to_string(),
            current_return: Type::Void,
        }
    }

    // ---- collection passes -----------------------------------------

    fn collect_composites(&mut self) -> Result<(), Diagnostic> {
        for decl in &self.program.type_decls {
            if is_primitive_name(&decl.name) || BUILTIN_ARITIES.iter().any(|(n, _)| *n == decl.name) {
                return Err(Diagnostic::error(
                    DiagnosticCode::RedeclaredVariable,
                    format!("Type name `{}` collides with a builtin.", decl.name),
                    decl.span,
                ));
            }
            if self.composites.contains_key(&decl.name) {
                return Err(Diagnostic::error(
                    DiagnosticCode::RedeclaredVariable,
                    format!("Type `{}` is declared more than once.", decl.name),
                    decl.span,
                ));
            }
            self.composites.insert(
                decl.name.clone(),
                CompositeType {
                    kind: decl.kind,
                    name: decl.name.clone(),
                    fields: Vec::new(),
                },
            );
        }
        Ok(())
    }

    fn resolve_composite_fields(&mut self) -> Result<(), Diagnostic> {
        for decl in &self.program.type_decls {
            let mut fields = Vec::new();
            for field in &decl.fields {
                if fields.iter().any(|(n, _): &(String, Type)| n == &field.name) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::RedeclaredVariable,
                        format!("Field `{}` declared twice in `{}`.", field.name, decl.name),
                        field.span,
                    ));
                }
                let ty = self.resolve_type_spec(&field.spec)?;
                fields.push((field.name.clone(), ty));
            }
            self.composites.get_mut(&decl.name).unwrap().fields = fields;
        }
        Ok(())
    }

    fn collect_function_signatures(&mut self) -> Result<(), Diagnostic> {
        for function in &self.program.functions {
            if is_primitive_name(&function.name)
                || self.composites.contains_key(&function.name)
                || BUILTIN_ARITIES.iter().any(|(n, _)| *n == function.name)
            {
                return Err(Diagnostic::error(
                    DiagnosticCode::RedeclaredVariable,
                    format!("Function name `{}` collides with a builtin or type.", function.name),
                    function.span,
                ));
            }
            if self.functions.contains_key(&function.name) {
                return Err(Diagnostic::error(
                    DiagnosticCode::RedeclaredVariable,
                    format!("Function `{}` is declared more than once.", function.name),
                    function.span,
                ));
            }
            let mut params = Vec::new();
            for param in &function.params {
                if params.iter().any(|(n, _): &(String, Type)| n == &param.name) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::InvalidParams,
                        format!("Parameter `{}` repeated in `{}`.", param.name, function.name),
                        param.span,
                    ));
                }
                let ty = self.resolve_type_spec(&param.spec)?;
                params.push((param.name.clone(), ty));
            }
            let return_type = self.resolve_type_spec(&function.return_spec)?;
            self.functions.insert(
                function.name.clone(),
                FunctionSignature { return_type, params },
            );
        }
        Ok(())
    }

    fn resolve_type_spec(&self, spec: &TypeSpec) -> Result<Type, Diagnostic> {
        let base = if let Some(rest) = spec.type_name.strip_prefix("struct ") {
            self.lookup_composite(rest, CompositeKind::Struct, spec.span)?
        } else if let Some(rest) = spec.type_name.strip_prefix("class ") {
            self.lookup_composite(rest, CompositeKind::Class, spec.span)?
        } else {
            match spec.type_name.as_str() {
                "int" => Type::Int,
                "float" => Type::Float,
                "bool" => Type::Bool,
                "text" => Type::Text,
                "void" => Type::Void,
                other => match self.composites.get(other) {
                    Some(c) => composite_type_of(c),
                    None => {
                        return Err(Diagnostic::error(
                            DiagnosticCode::UnknownType,
                            format!("Unknown type `{}`.", other),
                            spec.span,
                        ))
                    }
                },
            }
        };
        match spec.array_size {
            Some(0) => Err(Diagnostic::error(
                DiagnosticCode::InvalidStatement,
                "Array size must be positive.",
                spec.span,
            )),
            Some(n) => Ok(Type::Array(Box::new(base), n)),
            None => Ok(base),
        }
    }

    fn lookup_composite(&self, name: &str, kind: CompositeKind, span: Span) -> Result<Type, Diagnostic> {
        match self.composites.get(name) {
            Some(c) if c.kind == kind => Ok(composite_type_of(c)),
            Some(_) => Err(Diagnostic::error(
                DiagnosticCode::UnknownType,
                format!("`{}` is not a {}.", name, kind.keyword()),
                span,
            )),
            None => Err(Diagnostic::error(
                DiagnosticCode::UnknownType,
                format!("Unknown {} `{}`.", kind.keyword(), name),
                span,
            )),
        }
    }

    // ---- bodies ------------------------------------------------------

    fn analyze_function(&mut self, function: &FunctionDecl) -> Result<(), Diagnostic> {
        self.current_function = function.name.clone();
        let sig = self.functions.get(&function.name).unwrap().clone();
        self.current_return = sig.return_type.clone();

        self.push_scope("params");
        for (param, (_, ty)) in function.params.iter().zip(sig.params.iter()) {
            self.declare_var(&param.name, ty.clone(), param.span)?;
        }
        let always_returns = self.analyze_block(&function.body)?;
        self.pop_scope();

        if !matches!(self.current_return, Type::Void) && !always_returns {
            self.warnings.push(Diagnostic::warning(
                DiagnosticCode::MissingReturn,
                format!("Function `{}` does not return on every path.", function.name),
                function.span,
            ));
        }
        Ok(())
    }

    fn analyze_main(&mut self) -> Result<(), Diagnostic> {
        self.current_function = MAIN_FUNCTION_NAME.to_string();
        self.current_return = Type::Int;
        self.push_scope("main");
        let statements: &'p [Stmt] = &self.program.statements;
        self.analyze_block(statements)?;
        self.pop_scope();
        Ok(())
    }

    fn push_scope(&mut self, tag: &str) {
        let key = format!("{}:{}", self.current_function, tag);
        let count = self.scope_tag_counts.entry(key.clone()).or_insert(0);
        let label = format!("{}#{}", key, count);
        *count += 1;
        self.scopes.push(Scope { vars: HashMap::new(), label });
    }

    fn pop_scope(&mut self) {
        let scope = self.scopes.pop().expect("balanced push/pop_scope");
        let mut vars: Vec<(String, Type)> = Vec::new();
        for (name, symbol) in &scope.vars {
            if !symbol.used {
                self.warnings.push(Diagnostic::warning(
                    DiagnosticCode::UnusedVariable,
                    format!("Variable `{}` is never used.", name),
                    symbol.span,
                ));
            }
            vars.push((name.clone(), symbol.ty.clone()));
        }
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        self.scope_snapshots.push(ScopeSnapshot { label: scope.label, vars });
    }

    fn declare_var(&mut self, name: &str, ty: Type, span: Span) -> Result<(), Diagnostic> {
        let scope = self.scopes.last_mut().expect("scope active while declaring");
        if scope.vars.contains_key(name) {
            return Err(Diagnostic::error(
                DiagnosticCode::RedeclaredVariable,
                format!("Variable `{}` is already declared in this scope.", name),
                span,
            ));
        }
        scope.vars.insert(name.to_string(), VarSymbol { ty, span, used: false });
        Ok(())
    }

    fn lookup(&mut self, name: &str, span: Span) -> Result<Type, Diagnostic> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(symbol) = scope.vars.get_mut(name) {
                symbol.used = true;
                return Ok(symbol.ty.clone());
            }
        }
        let mut message = format!("Variable `{}` is not declared.", name);
        if let Some(suggestion) = self.suggest(name) {
            message.push_str(&format!(" Did you mean `{}`?", suggestion));
        }
        Err(Diagnostic::error(DiagnosticCode::UndeclaredVariable, message, span))
    }

    /// Closest-match heuristic scoped to identifiers visible right now:
    /// every variable in an enclosing scope plus declared function names.
    fn suggest(&self, name: &str) -> Option<String> {
        let mut candidates: Vec<&str> = Vec::new();
        for scope in &self.scopes {
            candidates.extend(scope.vars.keys().map(String::as_str));
        }
        candidates.extend(self.functions.keys().map(String::as_str));
        candidates
            .into_iter()
            .map(|c| (c, levenshtein(name, c)))
            .filter(|(_, d)| *d <= 2 && *d > 0)
            .min_by_key(|(_, d)| *d)
            .map(|(c, _)| c.to_string())
    }

    /// Analyzes a statement list, returning whether it terminates control
    /// flow on every path. Statements after the first terminator are
    /// flagged `unreachable_code` and skipped rather than type-checked.
    fn analyze_block(&mut self, stmts: &[Stmt]) -> Result<bool, Diagnostic> {
        let mut terminated = false;
        for stmt in stmts {
            if terminated {
                self.warnings.push(Diagnostic::warning(
                    DiagnosticCode::UnreachableCode,
                    "Unreachable code.",
                    stmt.span(),
                ));
                continue;
            }
            if self.analyze_stmt(stmt)? {
                terminated = true;
            }
        }
        Ok(terminated)
    }

    fn analyze_stmt(&mut self, stmt: &Stmt) -> Result<bool, Diagnostic> {
        match stmt {
            Stmt::VarDecl { spec, name, init, span } => {
                let ty = self.resolve_type_spec(spec)?;
                if spec.array_size.is_some() && init.is_some() {
                    return Err(Diagnostic::error(
                        DiagnosticCode::ArrayInitNotSupported,
                        "Array declarations cannot have an initializer.",
                        *span,
                    ));
                }
                if let Some(init_expr) = init {
                    let init_ty = self.type_of(init_expr)?;
                    if !is_assignable(&ty, &init_ty) {
                        return Err(Diagnostic::error(
                            DiagnosticCode::TypeMismatch,
                            format!("Cannot assign `{}` to `{}` variable `{}`.", init_ty, ty, name),
                            *span,
                        ));
                    }
                }
                self.declare_var(name, ty, *span)?;
                Ok(false)
            }
            Stmt::Assign { target, value, span } => {
                self.check_lvalue(target)?;
                let target_ty = self.type_of(target)?;
                let value_ty = self.type_of(value)?;
                if !is_assignable(&target_ty, &value_ty) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("Cannot assign `{}` to `{}`.", value_ty, target_ty),
                        *span,
                    ));
                }
                Ok(false)
            }
            Stmt::If { cond, then_branch, else_branch, span } => {
                self.check_condition(cond)?;
                if self.eval_const(cond).is_some() {
                    self.warnings.push(Diagnostic::warning(
                        DiagnosticCode::ConstantCondition,
                        "Condition is always the same value.",
                        *span,
                    ));
                }
                self.push_scope("if-then");
                let then_terminates = self.analyze_block(then_branch)?;
                self.pop_scope();
                let else_terminates = match else_branch {
                    Some(body) => {
                        self.push_scope("if-else");
                        let t = self.analyze_block(body)?;
                        self.pop_scope();
                        t
                    }
                    None => false,
                };
                Ok(else_branch.is_some() && then_terminates && else_terminates)
            }
            Stmt::While { cond, body, span } => {
                self.check_condition(cond)?;
                if self.eval_const(cond).is_some() {
                    self.warnings.push(Diagnostic::warning(
                        DiagnosticCode::ConstantCondition,
                        "Condition is always the same value.",
                        *span,
                    ));
                }
                self.loop_depth += 1;
                self.push_scope("while");
                self.analyze_block(body)?;
                self.pop_scope();
                self.loop_depth -= 1;
                Ok(false)
            }
            Stmt::For { init, cond, post, body, span: _ } => {
                self.push_scope("for");
                if let Some(init) = init {
                    self.analyze_stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.check_condition(cond)?;
                }
                self.loop_depth += 1;
                let body_result = self.analyze_block(body);
                let post_result = if body_result.is_ok() {
                    post.as_ref().map(|p| self.analyze_stmt(p))
                } else {
                    None
                };
                self.loop_depth -= 1;
                self.pop_scope();
                body_result?;
                if let Some(r) = post_result {
                    r?;
                }
                Ok(false)
            }
            Stmt::DoWhile { body, cond, span: _ } => {
                self.loop_depth += 1;
                self.push_scope("do-while");
                self.analyze_block(body)?;
                self.pop_scope();
                self.loop_depth -= 1;
                self.check_condition(cond)?;
                Ok(false)
            }
            Stmt::Switch { cond, cases, default, span: _ } => {
                let cond_ty = self.type_of(cond)?;
                if !matches!(cond_ty, Type::Int | Type::Bool) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::InvalidCondition,
                        format!("Switch condition must be int or bool, found `{}`.", cond_ty),
                        cond.span(),
                    ));
                }
                self.switch_depth += 1;
                let mut seen = std::collections::HashSet::new();
                for case in cases {
                    let value = self.eval_const(&case.label).ok_or_else(|| {
                        Diagnostic::error(
                            DiagnosticCode::InvalidCaseLabel,
                            "Case label must be a compile-time constant int or bool expression.",
                            case.label.span(),
                        )
                    })?;
                    let key = value.as_case_key();
                    if !seen.insert(key) {
                        return Err(Diagnostic::error(
                            DiagnosticCode::DuplicateCase,
                            format!("Duplicate case label `{}`.", key),
                            case.span,
                        ));
                    }
                    self.push_scope("case");
                    self.analyze_block(&case.body)?;
                    self.pop_scope();
                }
                if let Some(default_body) = default {
                    self.push_scope("default");
                    self.analyze_block(default_body)?;
                    self.pop_scope();
                }
                self.switch_depth -= 1;
                Ok(false)
            }
            Stmt::Break(span) => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return Err(Diagnostic::error(
                        DiagnosticCode::BreakOutsideLoop,
                        "`break` outside a loop or switch.",
                        *span,
                    ));
                }
                Ok(true)
            }
            Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    return Err(Diagnostic::error(
                        DiagnosticCode::ContinueOutsideLoop,
                        "`continue` outside a loop.",
                        *span,
                    ));
                }
                Ok(true)
            }
            Stmt::Print(expr, span) => {
                let ty = self.type_of(expr)?;
                if !matches!(ty, Type::Int | Type::Float | Type::Bool | Type::Text) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("Cannot print a value of type `{}`.", ty),
                        *span,
                    ));
                }
                Ok(false)
            }
            Stmt::Return(value, span) => {
                let current_return = self.current_return.clone();
                match (value, &current_return) {
                    (None, Type::Void) => {}
                    // A bare `return;` at top level just exits main early
                    // with status 0, the same as falling off the end.
                    (None, _) if self.current_function == MAIN_FUNCTION_NAME => {}
                    (None, other) => {
                        return Err(Diagnostic::error(
                            DiagnosticCode::ReturnType,
                            format!("Function `{}` must return a value of type `{}`.", self.current_function, other),
                            *span,
                        ))
                    }
                    (Some(_), Type::Void) => {
                        return Err(Diagnostic::error(
                            DiagnosticCode::ReturnType,
                            format!("Function `{}` is void and cannot return a value.", self.current_function),
                            *span,
                        ))
                    }
                    (Some(expr), expected) => {
                        let ty = self.type_of(expr)?;
                        if !is_assignable(expected, &ty) {
                            return Err(Diagnostic::error(
                                DiagnosticCode::ReturnType,
                                format!("Function `{}` returns `{}` but found `{}`.", self.current_function, expected, ty),
                                *span,
                            ));
                        }
                    }
                }
                Ok(true)
            }
            Stmt::ExprStmt(expr, _span) => {
                self.type_of(expr)?;
                Ok(false)
            }
            Stmt::Block(stmts, _span) => {
                self.push_scope("block");
                let terminates = self.analyze_block(stmts)?;
                self.pop_scope();
                Ok(terminates)
            }
        }
    }

    fn check_condition(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        let ty = self.type_of(expr)?;
        if !matches!(ty, Type::Int | Type::Float | Type::Bool) {
            return Err(Diagnostic::error(
                DiagnosticCode::InvalidCondition,
                format!("Condition must be int, float, or bool, found `{}`.", ty),
                expr.span(),
            ));
        }
        Ok(())
    }

    fn check_lvalue(&self, expr: &Expr) -> Result<(), Diagnostic> {
        match expr {
            Expr::Identifier { .. } | Expr::Index { .. } | Expr::Member { .. } => Ok(()),
            _ => Err(Diagnostic::error(
                DiagnosticCode::InvalidLvalue,
                "Assignment target must be a variable, index, or field access.",
                expr.span(),
            )),
        }
    }

    fn type_of(&mut self, expr: &Expr) -> Result<Type, Diagnostic> {
        let ty = self.infer(expr)?;
        self.expr_types.insert(expr.id(), ty.clone());
        Ok(ty)
    }

    fn infer(&mut self, expr: &Expr) -> Result<Type, Diagnostic> {
        match expr {
            Expr::IntLiteral { .. } => Ok(Type::Int),
            Expr::FloatLiteral { .. } => Ok(Type::Float),
            Expr::BoolLiteral { .. } => Ok(Type::Bool),
            Expr::StringLiteral { .. } => Ok(Type::Text),
            Expr::Identifier { name, span, .. } => self.lookup(name, *span),
            Expr::Unary { op, operand, span, .. } => {
                let operand_ty = self.type_of(operand)?;
                match op {
                    UnaryOp::Neg => {
                        if !operand_ty.is_numeric() {
                            return Err(Diagnostic::error(
                                DiagnosticCode::TypeMismatch,
                                format!("Cannot negate `{}`.", operand_ty),
                                *span,
                            ));
                        }
                        Ok(operand_ty)
                    }
                    UnaryOp::Not => {
                        if !operand_ty.is_numeric() {
                            return Err(Diagnostic::error(
                                DiagnosticCode::TypeMismatch,
                                format!("Cannot apply `!` to `{}`.", operand_ty),
                                *span,
                            ));
                        }
                        Ok(Type::Bool)
                    }
                }
            }
            Expr::Binary { op, left, right, span, .. } => self.infer_binary(*op, left, right, *span),
            Expr::Call { callee, args, span, .. } => self.infer_call(callee, args, *span),
            Expr::Index { base, index, span, .. } => {
                let base_ty = self.type_of(base)?;
                let index_ty = self.type_of(index)?;
                if !matches!(index_ty, Type::Int | Type::Bool) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("Array index must be int or bool, found `{}`.", index_ty),
                        *span,
                    ));
                }
                match base_ty {
                    Type::Array(elem, _) => Ok(*elem),
                    Type::Text => Ok(Type::Int),
                    other => Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("Cannot index into `{}`.", other),
                        *span,
                    )),
                }
            }
            Expr::Member { base, field, span, .. } => {
                let base_ty = self.type_of(base)?;
                let name = base_ty.composite_name().ok_or_else(|| {
                    Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("Cannot access field `{}` on `{}`.", field, base_ty),
                        *span,
                    )
                })?;
                let composite = self.composites.get(name).expect("resolved composite type exists");
                composite.field_type(field).cloned().ok_or_else(|| {
                    Diagnostic::error(
                        DiagnosticCode::UnknownType,
                        format!("`{}` has no field `{}`.", name, field),
                        *span,
                    )
                })
            }
            Expr::Cast { type_name, expr: inner, span, .. } => {
                let src = self.type_of(inner)?;
                let dst = match type_name.as_str() {
                    "int" => Type::Int,
                    "float" => Type::Float,
                    "bool" => Type::Bool,
                    "text" => Type::Text,
                    other => {
                        return Err(Diagnostic::error(
                            DiagnosticCode::UnknownType,
                            format!("Unknown cast target `{}`.", other),
                            *span,
                        ))
                    }
                };
                if !is_castable(&src, &dst) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("Cannot cast `{}` to `{}`.", src, dst),
                        *span,
                    ));
                }
                Ok(dst)
            }
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: Span) -> Result<Type, Diagnostic> {
        let lhs = self.type_of(left)?;
        let rhs = self.type_of(right)?;
        match op {
            BinaryOp::Add if matches!(lhs, Type::Text) && matches!(rhs, Type::Text) => Ok(Type::Text),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                if !lhs.is_numeric() || !rhs.is_numeric() {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("`{}` requires numeric operands, found `{}` and `{}`.", op.symbol(), lhs, rhs),
                        span,
                    ));
                }
                Ok(numeric_result(&lhs, &rhs))
            }
            BinaryOp::Mod => {
                if !matches!(lhs, Type::Int) || !matches!(rhs, Type::Int) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("`%` requires int operands, found `{}` and `{}`.", lhs, rhs),
                        span,
                    ));
                }
                Ok(Type::Int)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if !lhs.is_numeric() || !rhs.is_numeric() {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("`{}` requires numeric operands, found `{}` and `{}`.", op.symbol(), lhs, rhs),
                        span,
                    ));
                }
                Ok(Type::Bool)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                if !is_assignable(&lhs, &rhs) && !is_assignable(&rhs, &lhs) {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("Cannot compare `{}` with `{}`.", lhs, rhs),
                        span,
                    ));
                }
                Ok(Type::Bool)
            }
            BinaryOp::And | BinaryOp::Or => {
                if !lhs.is_numeric() || !rhs.is_numeric() {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        format!("`{}` requires numeric or bool operands, found `{}` and `{}`.", op.symbol(), lhs, rhs),
                        span,
                    ));
                }
                Ok(Type::Bool)
            }
        }
    }

    fn infer_call(&mut self, callee: &str, args: &[Expr], span: Span) -> Result<Type, Diagnostic> {
        if let Some((_, arity)) = BUILTIN_ARITIES.iter().find(|(n, _)| *n == callee) {
            if args.len() != *arity {
                return Err(Diagnostic::error(
                    DiagnosticCode::ArityMismatch,
                    format!("`{}` expects {} argument(s), found {}.", callee, arity, args.len()),
                    span,
                ));
            }
            let arg_types: Vec<Type> = args
                .iter()
                .map(|a| self.type_of(a))
                .collect::<Result<_, _>>()?;
            return Ok(match callee {
                "max" => numeric_result(&arg_types[0], &arg_types[1]),
                "len" => Type::Int,
                _ => Type::Int,
            });
        }

        let sig = self
            .functions
            .get(callee)
            .cloned()
            .ok_or_else(|| Diagnostic::error(DiagnosticCode::UndeclaredFunction, format!("Function `{}` is not declared.", callee), span))?;
        if sig.params.len() != args.len() {
            return Err(Diagnostic::error(
                DiagnosticCode::ArityMismatch,
                format!("`{}` expects {} argument(s), found {}.", callee, sig.params.len(), args.len()),
                span,
            ));
        }
        for (arg, (_, expected)) in args.iter().zip(sig.params.iter()) {
            let ty = self.type_of(arg)?;
            if !is_assignable(expected, &ty) {
                return Err(Diagnostic::error(
                    DiagnosticCode::TypeMismatch,
                    format!("Argument to `{}` expects `{}`, found `{}`.", callee, expected, ty),
                    arg.span(),
                ));
            }
        }
        Ok(sig.return_type)
    }

    /// Folds literal/unary/binary/cast expressions to a constant value.
    /// Identifiers, calls, indexing, and member access are never constant
    /// here even when their value is statically known.
    fn eval_const(&self, expr: &Expr) -> Option<ConstValue> {
        match expr {
            Expr::IntLiteral { value, .. } => Some(ConstValue::Int(*value)),
            Expr::BoolLiteral { value, .. } => Some(ConstValue::Bool(*value)),
            Expr::Unary { op, operand, .. } => match (op, self.eval_const(operand)?) {
                (UnaryOp::Neg, ConstValue::Int(n)) => Some(ConstValue::Int(-n)),
                (UnaryOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
                (UnaryOp::Not, ConstValue::Int(n)) => Some(ConstValue::Bool(n == 0)),
                _ => None,
            },
            Expr::Binary { op, left, right, .. } => {
                let l = self.eval_const(left)?;
                let r = self.eval_const(right)?;
                self.eval_const_binop(*op, l, r)
            }
            Expr::Cast { type_name, expr, .. } => {
                let v = self.eval_const(expr)?;
                match (type_name.as_str(), v) {
                    ("int", ConstValue::Bool(b)) => Some(ConstValue::Int(b as i64)),
                    ("int", v @ ConstValue::Int(_)) => Some(v),
                    ("bool", ConstValue::Int(n)) => Some(ConstValue::Bool(n != 0)),
                    ("bool", v @ ConstValue::Bool(_)) => Some(v),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn eval_const_binop(&self, op: BinaryOp, l: ConstValue, r: ConstValue) -> Option<ConstValue> {
        let li = match l {
            ConstValue::Int(n) => n,
            ConstValue::Bool(b) => b as i64,
        };
        let ri = match r {
            ConstValue::Int(n) => n,
            ConstValue::Bool(b) => b as i64,
        };
        match op {
            BinaryOp::Add => Some(ConstValue::Int(li + ri)),
            BinaryOp::Sub => Some(ConstValue::Int(li - ri)),
            BinaryOp::Mul => Some(ConstValue::Int(li * ri)),
            BinaryOp::Div => {
                if ri == 0 {
                    None
                } else {
                    Some(ConstValue::Int(floor_div_i64(li, ri)))
                }
            }
            BinaryOp::Mod => {
                if ri == 0 {
                    None
                } else {
                    Some(ConstValue::Int(li.rem_euclid(ri)))
                }
            }
            BinaryOp::Lt => Some(ConstValue::Bool(li < ri)),
            BinaryOp::Le => Some(ConstValue::Bool(li <= ri)),
            BinaryOp::Gt => Some(ConstValue::Bool(li > ri)),
            BinaryOp::Ge => Some(ConstValue::Bool(li >= ri)),
            BinaryOp::Eq => Some(ConstValue::Bool(li == ri)),
            BinaryOp::Ne => Some(ConstValue::Bool(li != ri)),
            BinaryOp::And => Some(ConstValue::Bool(li != 0 && ri != 0)),
            BinaryOp::Or => Some(ConstValue::Bool(li != 0 || ri != 0)),
        }
    }
}

fn composite_type_of(c: &CompositeType) -> Type {
    match c.kind {
        CompositeKind::Struct => Type::Struct(c.name.clone()),
        CompositeKind::Class => Type::Class(c.name.clone()),
    }
}

fn is_primitive_name(name: &str) -> bool {
    matches!(name, "int" | "float" | "bool" | "text" | "void")
}

/// Small edit-distance helper backing the "did you mean" hint; bounded
/// inputs (identifier lengths) keep the O(n*m) table cheap.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let tmp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = tmp;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn analyze_src(src: &str) -> Result<SemanticResult, Diagnostic> {
        let tokens = Lexer::new(src).tokenize().unwrap().tokens;
        let program = Parser::new(tokens).parse().unwrap();
        analyze(&program)
    }

    #[test]
    fn reports_undeclared_variable_with_suggestion() {
        let err = analyze_src("begin int score = 1; print(scor); end").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::UndeclaredVariable);
        assert!(err.message.contains("Did you mean `score`?"));
    }

    #[test]
    fn break_outside_loop_is_fatal() {
        let err = analyze_src("begin break; end").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::BreakOutsideLoop);
    }

    #[test]
    fn duplicate_case_label_is_fatal() {
        let err = analyze_src(
            "begin int x = 1; switch (x) { case 1: print(1); case 1: print(2); } end",
        )
        .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::DuplicateCase);
    }

    #[test]
    fn unreachable_and_unused_and_constant_condition_warnings() {
        let result = analyze_src(
            "begin if (true) { return; int y = 1; } end",
        )
        .unwrap();
        let codes: Vec<_> = result.warnings.iter().map(|w| w.code).collect();
        assert!(codes.contains(&DiagnosticCode::ConstantCondition));
        assert!(codes.contains(&DiagnosticCode::UnreachableCode));
    }

    #[test]
    fn function_call_checks_arity_and_types() {
        let result = analyze_src(
            "func add(int a, int b) -> int { return a + b; } begin print(add(1, 2)); end",
        )
        .unwrap();
        assert!(result.functions.contains_key("add"));
    }

    #[test]
    fn missing_return_warns_but_does_not_abort() {
        let result = analyze_src("func f() -> int { int x = 1; } begin end").unwrap();
        assert!(result.warnings.iter().any(|w| w.code == DiagnosticCode::MissingReturn));
    }
}
