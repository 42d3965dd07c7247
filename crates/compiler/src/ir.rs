//! Three-address IR generation
//!
//! One flat instruction list per function (including a synthetic
//! `__main__` for the top-level statement list), produced in a single
//! forward pass. This IR backs the optimizer and the textual/CFG dumps;
//! neither code-generation backend reads it; they both compile straight
//! from the AST using [`crate::semantic::SemanticResult`].

use crate::ast::*;
use crate::semantic::{SemanticResult, MAIN_FUNCTION_NAME};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Copy,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Label,
    Goto,
    Ifz,
    Ifnz,
    Print,
    Param,
    Call,
    Return,
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Copy => "copy",
            Op::Neg => "neg",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Lt => "lt",
            Op::Le => "le",
            Op::Gt => "gt",
            Op::Ge => "ge",
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Label => "label",
            Op::Goto => "goto",
            Op::Ifz => "ifz",
            Op::Ifnz => "ifnz",
            Op::Print => "print",
            Op::Param => "param",
            Op::Call => "call",
            Op::Return => "return",
        }
    }

    /// True for ops that can appear as the left side of a `copy`-folded
    /// constant-propagation rewrite: arithmetic and comparisons only.
    pub fn is_binary_arith(&self) -> bool {
        matches!(
            self,
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Ne
        )
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, Op::Add | Op::Mul | Op::Eq | Op::Ne)
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Op::Goto | Op::Ifz | Op::Ifnz)
    }

    pub fn terminates_block(&self) -> bool {
        matches!(self, Op::Goto | Op::Ifz | Op::Ifnz | Op::Return)
    }

    /// Which argument slots hold substitutable operands (as opposed to a
    /// label name, callee name, argument count, or print-kind marker).
    /// Shared by constant propagation and CSE so both agree on what
    /// counts as a "use".
    pub fn operand_slots(&self) -> (bool, bool) {
        match self {
            Op::Copy | Op::Neg | Op::Print | Op::Param | Op::Return | Op::Ifz | Op::Ifnz => (true, false),
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Ne => {
                (true, true)
            }
            Op::Label | Op::Goto | Op::Call => (false, false),
        }
    }
}

/// A single three-address instruction. Operands are strings: a numeric
/// literal's text, a quoted string literal, or a variable name (a
/// temporary or a renamed user declaration) — the same operand
/// vocabulary spec.md's data model describes, kept untyped so the
/// optimizer can substitute literals in place without re-typing them.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    pub arg1: Option<String>,
    pub arg2: Option<String>,
    pub result: Option<String>,
}

impl Instr {
    fn new(op: Op, arg1: Option<String>, arg2: Option<String>, result: Option<String>) -> Self {
        Instr { op, arg1, arg2, result }
    }
}

#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<String>,
    pub instructions: Vec<Instr>,
    pub temporaries: HashSet<String>,
    pub locals: HashSet<String>,
}

pub fn generate(program: &Program, semantic: &SemanticResult) -> Vec<IrFunction> {
    let mut functions = Vec::new();
    for function in &program.functions {
        functions.push(Generator::new(semantic).gen_function(function));
    }
    functions.push(Generator::new(semantic).gen_main(&program.statements));
    functions
}

struct Generator<'s> {
    #[allow(dead_code)]
    semantic: &'s SemanticResult,
    temp_counter: u32,
    label_counter: u32,
    scopes: Vec<HashMap<String, String>>,
    used_names: HashSet<String>,
    instructions: Vec<Instr>,
    temporaries: HashSet<String>,
    locals: HashSet<String>,
    /// (break-label, continue-label) per enclosing loop/switch, innermost
    /// last. A switch frame's continue-label is empty so `continue`
    /// skips past it to the enclosing loop, mirroring the stack backend's
    /// control stack.
    control_stack: Vec<(String, String)>,
}

impl<'s> Generator<'s> {
    fn new(semantic: &'s SemanticResult) -> Self {
        Generator {
            semantic,
            temp_counter: 0,
            label_counter: 0,
            scopes: vec![HashMap::new()],
            used_names: HashSet::new(),
            instructions: Vec::new(),
            temporaries: HashSet::new(),
            locals: HashSet::new(),
            control_stack: Vec::new(),
        }
    }

    fn break_label(&self) -> String {
        self.control_stack.last().expect("break checked by semantic analysis").0.clone()
    }

    fn continue_label(&self) -> String {
        self.control_stack
            .iter()
            .rev()
            .map(|(_, c)| c)
            .find(|c| !c.is_empty())
            .expect("continue checked by semantic analysis")
            .clone()
    }

    fn new_temp(&mut self) -> String {
        let name = format!("_t{}", self.temp_counter);
        self.temp_counter += 1;
        self.temporaries.insert(name.clone());
        name
    }

    fn new_label(&mut self) -> String {
        let name = format!("L{}", self.label_counter);
        self.label_counter += 1;
        name
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Implements the renaming policy: first declaration of a source name
    /// keeps it verbatim; a later declaration of the same source name in
    /// a sibling scope gets `__N` appended until the internal name is
    /// unused.
    fn declare(&mut self, source: &str) -> String {
        let internal = if self.used_names.insert(source.to_string()) {
            source.to_string()
        } else {
            let mut n = 1;
            loop {
                let candidate = format!("{}__{}", source, n);
                if self.used_names.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            }
        };
        self.locals.insert(internal.clone());
        self.scopes.last_mut().unwrap().insert(source.to_string(), internal.clone());
        internal
    }

    fn resolve_var(&self, source: &str) -> String {
        for scope in self.scopes.iter().rev() {
            if let Some(internal) = scope.get(source) {
                return internal.clone();
            }
        }
        source.to_string()
    }

    fn emit(&mut self, op: Op, arg1: Option<String>, arg2: Option<String>, result: Option<String>) {
        self.instructions.push(Instr::new(op, arg1, arg2, result));
    }

    fn gen_function(mut self, function: &FunctionDecl) -> IrFunction {
        let params: Vec<String> = function.params.iter().map(|p| self.declare(&p.name)).collect();
        self.gen_block(&function.body);
        IrFunction {
            name: function.name.clone(),
            params,
            instructions: self.instructions,
            temporaries: self.temporaries,
            locals: self.locals,
        }
    }

    fn gen_main(mut self, statements: &[Stmt]) -> IrFunction {
        self.gen_block(statements);
        IrFunction {
            name: MAIN_FUNCTION_NAME.to_string(),
            params: Vec::new(),
            instructions: self.instructions,
            temporaries: self.temporaries,
            locals: self.locals,
        }
    }

    fn gen_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.gen_stmt(stmt);
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { name, init, .. } => {
                let internal = self.declare(name);
                let value = match init {
                    Some(expr) => self.gen_value(expr),
                    None => "0".to_string(),
                };
                self.emit(Op::Copy, Some(value), None, Some(internal));
            }
            Stmt::Assign { target, value, .. } => {
                // Index/member targets are not lowered here; the backends
                // compile assignments directly from the AST.
                if let Expr::Identifier { name, .. } = target {
                    let resolved = self.resolve_var(name);
                    let v = self.gen_value(value);
                    self.emit(Op::Copy, Some(v), None, Some(resolved));
                }
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                let then_label = self.new_label();
                match else_branch {
                    None => {
                        let end_label = self.new_label();
                        self.gen_cond_jump(cond, &then_label, &end_label);
                        self.emit(Op::Label, Some(then_label), None, None);
                        self.push_scope();
                        self.gen_block(then_branch);
                        self.pop_scope();
                        self.emit(Op::Label, Some(end_label), None, None);
                    }
                    Some(else_body) => {
                        let else_label = self.new_label();
                        let end_label = self.new_label();
                        self.gen_cond_jump(cond, &then_label, &else_label);
                        self.emit(Op::Label, Some(then_label), None, None);
                        self.push_scope();
                        self.gen_block(then_branch);
                        self.pop_scope();
                        self.emit(Op::Goto, Some(end_label.clone()), None, None);
                        self.emit(Op::Label, Some(else_label), None, None);
                        self.push_scope();
                        self.gen_block(else_body);
                        self.pop_scope();
                        self.emit(Op::Label, Some(end_label), None, None);
                    }
                }
            }
            Stmt::While { cond, body, .. } => {
                let check_label = self.new_label();
                let body_label = self.new_label();
                let end_label = self.new_label();
                self.emit(Op::Label, Some(check_label.clone()), None, None);
                self.gen_cond_jump(cond, &body_label, &end_label);
                self.emit(Op::Label, Some(body_label), None, None);
                self.push_scope();
                self.control_stack.push((end_label.clone(), check_label.clone()));
                self.gen_block(body);
                self.control_stack.pop();
                self.pop_scope();
                self.emit(Op::Goto, Some(check_label), None, None);
                self.emit(Op::Label, Some(end_label), None, None);
            }
            Stmt::For { init, cond, post, body, .. } => {
                self.push_scope();
                if let Some(init) = init {
                    self.gen_stmt(init);
                }
                let check_label = self.new_label();
                let body_label = self.new_label();
                let post_label = self.new_label();
                let end_label = self.new_label();
                self.emit(Op::Label, Some(check_label.clone()), None, None);
                match cond {
                    Some(c) => self.gen_cond_jump(c, &body_label, &end_label),
                    None => self.emit(Op::Goto, Some(body_label.clone()), None, None),
                }
                self.emit(Op::Label, Some(body_label), None, None);
                self.control_stack.push((end_label.clone(), post_label.clone()));
                self.gen_block(body);
                self.control_stack.pop();
                self.emit(Op::Label, Some(post_label), None, None);
                if let Some(post) = post {
                    self.gen_stmt(post);
                }
                self.emit(Op::Goto, Some(check_label), None, None);
                self.emit(Op::Label, Some(end_label), None, None);
                self.pop_scope();
            }
            Stmt::DoWhile { body, cond, .. } => {
                let body_label = self.new_label();
                let check_label = self.new_label();
                let end_label = self.new_label();
                self.emit(Op::Label, Some(body_label.clone()), None, None);
                self.push_scope();
                self.control_stack.push((end_label.clone(), check_label.clone()));
                self.gen_block(body);
                self.control_stack.pop();
                self.pop_scope();
                self.emit(Op::Label, Some(check_label), None, None);
                self.gen_cond_jump(cond, &body_label, &end_label);
                self.emit(Op::Label, Some(end_label), None, None);
            }
            Stmt::Switch { cond, cases, default, .. } => {
                let value = self.gen_value(cond);
                let end_label = self.new_label();
                self.control_stack.push((end_label.clone(), String::new()));
                let mut case_labels = Vec::new();
                for _ in cases {
                    case_labels.push(self.new_label());
                }
                let default_label = if default.is_some() { self.new_label() } else { end_label.clone() };
                for (case, label) in cases.iter().zip(case_labels.iter()) {
                    if let Expr::IntLiteral { value: lit, .. } = &case.label {
                        let key = self.new_temp();
                        self.emit(Op::Eq, Some(value.clone()), Some(lit.to_string()), Some(key.clone()));
                        self.emit(Op::Ifnz, Some(key), Some(label.clone()), None);
                    }
                }
                self.emit(Op::Goto, Some(default_label.clone()), None, None);
                for (case, label) in cases.iter().zip(case_labels.iter()) {
                    self.emit(Op::Label, Some(label.clone()), None, None);
                    self.push_scope();
                    self.gen_block(&case.body);
                    self.pop_scope();
                    self.emit(Op::Goto, Some(end_label.clone()), None, None);
                }
                if let Some(default_body) = default {
                    self.emit(Op::Label, Some(default_label), None, None);
                    self.push_scope();
                    self.gen_block(default_body);
                    self.pop_scope();
                }
                self.control_stack.pop();
                self.emit(Op::Label, Some(end_label), None, None);
            }
            Stmt::Break(_) => {
                let label = self.break_label();
                self.emit(Op::Goto, Some(label), None, None);
            }
            Stmt::Continue(_) => {
                let label = self.continue_label();
                self.emit(Op::Goto, Some(label), None, None);
            }
            Stmt::Print(expr, _) => {
                if let Expr::StringLiteral { value, .. } = expr {
                    self.emit(Op::Print, Some(c_quote(value)), Some("string".to_string()), None);
                } else {
                    let v = self.gen_value(expr);
                    self.emit(Op::Print, Some(v), Some("int".to_string()), None);
                }
            }
            Stmt::Return(value, _) => {
                let v = match value {
                    Some(expr) => self.gen_value(expr),
                    None => "0".to_string(),
                };
                self.emit(Op::Return, Some(v), None, None);
            }
            Stmt::ExprStmt(expr, _) => {
                self.gen_value(expr);
            }
            Stmt::Block(stmts, _) => {
                self.push_scope();
                self.gen_block(stmts);
                self.pop_scope();
            }
        }
    }

    /// Evaluates an expression for its value, returning an operand
    /// (literal text or resolved variable name) usable directly as an
    /// instruction argument.
    fn gen_value(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::IntLiteral { value, .. } => value.to_string(),
            Expr::FloatLiteral { value, .. } => value.to_string(),
            Expr::BoolLiteral { value, .. } => if *value { "1".to_string() } else { "0".to_string() },
            Expr::StringLiteral { value, .. } => c_quote(value),
            Expr::Identifier { name, .. } => self.resolve_var(name),
            Expr::Unary { op: UnaryOp::Neg, operand, .. } => {
                let v = self.gen_value(operand);
                let t = self.new_temp();
                self.emit(Op::Neg, Some(v), None, Some(t.clone()));
                t
            }
            Expr::Unary { op: UnaryOp::Not, .. } | Expr::Binary { op: BinaryOp::And, .. } | Expr::Binary { op: BinaryOp::Or, .. } => {
                self.gen_bool_value(expr)
            }
            Expr::Binary { op, left, right, .. } => {
                let l = self.gen_value(left);
                let r = self.gen_value(right);
                let t = self.new_temp();
                self.emit(binop_op(*op), Some(l), Some(r), Some(t.clone()));
                t
            }
            Expr::Call { callee, args, .. } => {
                for arg in args {
                    let v = self.gen_value(arg);
                    self.emit(Op::Param, Some(v), None, None);
                }
                let t = self.new_temp();
                self.emit(Op::Call, Some(callee.clone()), Some(args.len().to_string()), Some(t.clone()));
                t
            }
            Expr::Cast { expr: inner, .. } => {
                // Operands are untyped strings already, so a cast is a
                // no-op at this level; the backends apply the real
                // conversion from the typed AST.
                self.gen_value(inner)
            }
            Expr::Index { .. } | Expr::Member { .. } => {
                // Not lowered by this component, matching indexed/member
                // assignment targets; the backends compile these directly
                // from the AST.
                self.new_temp()
            }
        }
    }

    /// Produces a 0/1 temporary for a boolean-valued expression via the
    /// triple-label pattern: `copy 0 -> r; cond-jump; T: copy 1 -> r;
    /// goto end; F: end:`.
    fn gen_bool_value(&mut self, expr: &Expr) -> String {
        let result = self.new_temp();
        let true_label = self.new_label();
        let false_label = self.new_label();
        let end_label = self.new_label();
        self.emit(Op::Copy, Some("0".to_string()), None, Some(result.clone()));
        self.gen_cond_jump(expr, &true_label, &false_label);
        self.emit(Op::Label, Some(true_label), None, None);
        self.emit(Op::Copy, Some("1".to_string()), None, Some(result.clone()));
        self.emit(Op::Goto, Some(end_label.clone()), None, None);
        self.emit(Op::Label, Some(false_label), None, None);
        self.emit(Op::Label, Some(end_label), None, None);
        result
    }

    /// Recursively decomposes a boolean expression into conditional jumps
    /// without relying on host short-circuit evaluation.
    fn gen_cond_jump(&mut self, expr: &Expr, true_label: &str, false_label: &str) {
        match expr {
            Expr::BoolLiteral { value, .. } => {
                let target = if *value { true_label } else { false_label };
                self.emit(Op::Goto, Some(target.to_string()), None, None);
            }
            Expr::Unary { op: UnaryOp::Not, operand, .. } => {
                self.gen_cond_jump(operand, false_label, true_label);
            }
            Expr::Binary { op: BinaryOp::And, left, right, .. } => {
                let mid = self.new_label();
                self.gen_cond_jump(left, &mid, false_label);
                self.emit(Op::Label, Some(mid), None, None);
                self.gen_cond_jump(right, true_label, false_label);
            }
            Expr::Binary { op: BinaryOp::Or, left, right, .. } => {
                let mid = self.new_label();
                self.gen_cond_jump(left, true_label, &mid);
                self.emit(Op::Label, Some(mid), None, None);
                self.gen_cond_jump(right, true_label, false_label);
            }
            _ => {
                let v = self.gen_value(expr);
                self.emit(Op::Ifnz, Some(v), Some(true_label.to_string()), None);
                self.emit(Op::Goto, Some(false_label.to_string()), None, None);
            }
        }
    }
}

fn binop_op(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Mod => Op::Mod,
        BinaryOp::Lt => Op::Lt,
        BinaryOp::Le => Op::Le,
        BinaryOp::Gt => Op::Gt,
        BinaryOp::Ge => Op::Ge,
        BinaryOp::Eq => Op::Eq,
        BinaryOp::Ne => Op::Ne,
        BinaryOp::And | BinaryOp::Or => unreachable!("logical ops are lowered via gen_bool_value"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic;

    fn gen(src: &str) -> Vec<IrFunction> {
        let tokens = Lexer::new(src).tokenize().unwrap().tokens;
        let program = Parser::new(tokens).parse().unwrap();
        let sem = semantic::analyze(&program).unwrap();
        generate(&program, &sem)
    }

    #[test]
    fn straight_line_arithmetic_copies_into_declared_name() {
        let funcs = gen("begin int x = 1 + 2; print(x); end");
        let main = funcs.iter().find(|f| f.name == "__main__").unwrap();
        assert!(main.instructions.iter().any(|i| i.op == Op::Add));
        assert!(main.locals.contains("x"));
    }

    #[test]
    fn sibling_scopes_rename_colliding_declarations() {
        let funcs = gen("begin if (true) { int x = 1; } if (false) { int x = 2; } end");
        let main = funcs.iter().find(|f| f.name == "__main__").unwrap();
        assert!(main.locals.contains("x"));
        assert!(main.locals.contains("x__1"));
    }

    #[test]
    fn while_loop_emits_check_body_end_labels() {
        let funcs = gen("begin int i = 0; while (i < 3) { i = i + 1; } end");
        let main = funcs.iter().find(|f| f.name == "__main__").unwrap();
        let label_count = main.instructions.iter().filter(|i| i.op == Op::Label).count();
        assert!(label_count >= 3);
    }

    #[test]
    fn short_circuit_and_lowers_without_and_op() {
        let funcs = gen("begin bool b = true && false; end");
        let main = funcs.iter().find(|f| f.name == "__main__").unwrap();
        assert!(!main.instructions.iter().any(|i| i.op == Op::Add && i.result.as_deref() == Some("b")));
    }
}
