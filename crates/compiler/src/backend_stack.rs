//! Stack-machine backend: a second code generator, independent of
//! [`crate::backend_c`], compiling straight from the AST and
//! [`SemanticResult`] into a labeled text listing for a small stack
//! machine. Exists to give a learner two different targets to compare
//! without wiring either through the optimizer pipeline.
//!
//! ## Opcodes
//!
//! ```text
//! PUSH_INT n | PUSH_FLOAT f | PUSH_STR "..."
//! LOAD name
//! STORE name
//! STOREX target-text        ; pop value, write it into a non-identifier target
//! DECL name                 ; declare a local before its first store
//! ADD SUB MUL DIV MOD NEG
//! LT LE GT GE EQ NE NOT
//! DUP                       ; duplicate the top of stack
//! POP                       ; discard the top of stack
//! JMP      label
//! JZ       label            ; pop, jump if zero/false
//! JNZ      label            ; pop, jump if nonzero/true
//! LABEL    name
//! FUNC name arity           ; opens a function body, closed by END
//! PARAM name                ; one per declared parameter, in declaration order
//! END
//! CALL name argc
//! GETINDEX                  ; pop index, pop base, push base[index]
//! GETFIELD name             ; pop base, push base.<name>
//! MAX                       ; pop b, pop a, push the larger
//! LEN                       ; pop a, push its length
//! INPUT                     ; read one value from stdin, push it
//! CAST_INT CAST_FLOAT CAST_BOOL
//! PRINT
//! RET
//! HALT
//! TRAP kind
//! ```
//!
//! Every instruction is one line, mnemonic first. A `break`/`continue`
//! with no enclosing label emits `TRAP break`/`TRAP continue` instead of
//! a jump — semantic analysis rejects such programs before codegen runs,
//! so this only fires on a control-stack bug, never on user input.

use crate::ast::*;
use crate::semantic::SemanticResult;
use std::fmt::Write as _;

pub fn generate(program: &Program, semantic: &SemanticResult) -> String {
    let mut gen = Generator { semantic, out: String::new(), label_counter: 0, control_stack: Vec::new() };
    gen.emit_program(program);
    gen.out
}

struct Generator<'p> {
    semantic: &'p SemanticResult,
    out: String,
    label_counter: u32,
    /// `(break_label, continue_label)` per enclosing loop/switch, innermost
    /// last. A switch pushes an empty continue label so `continue` skips
    /// past it to the nearest real loop, mirroring the three-address
    /// generator's own control stack.
    control_stack: Vec<(String, String)>,
}

impl<'p> Generator<'p> {
    fn new_label(&mut self) -> String {
        let name = format!("S{}", self.label_counter);
        self.label_counter += 1;
        name
    }

    fn break_label(&self) -> Option<&str> {
        self.control_stack.last().map(|(b, _)| b.as_str())
    }

    fn continue_label(&self) -> Option<&str> {
        self.control_stack.iter().rev().map(|(_, c)| c.as_str()).find(|c| !c.is_empty())
    }

    fn emit_program(&mut self, program: &Program) {
        for function in &program.functions {
            self.emit_function(function);
        }
        let _ = writeln!(self.out, "LABEL __main__");
        for stmt in &program.statements {
            self.emit_stmt(stmt);
        }
        let _ = writeln!(self.out, "HALT");
    }

    fn emit_function(&mut self, function: &FunctionDecl) {
        let _ = writeln!(self.out, "FUNC {} {}", function.name, function.params.len());
        for param in &function.params {
            let _ = writeln!(self.out, "PARAM {}", param.name);
        }
        for stmt in &function.body {
            self.emit_stmt(stmt);
        }
        let _ = writeln!(self.out, "PUSH_INT 0");
        let _ = writeln!(self.out, "RET");
        let _ = writeln!(self.out, "END");
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { name, init, .. } => {
                let _ = writeln!(self.out, "DECL {}", name);
                match init {
                    Some(expr) => self.emit_expr(expr),
                    None => {
                        let _ = writeln!(self.out, "PUSH_INT 0");
                    }
                }
                let _ = writeln!(self.out, "STORE {}", name);
            }
            Stmt::Assign { target, value, .. } => {
                self.emit_expr(value);
                match target {
                    Expr::Identifier { name, .. } => {
                        let _ = writeln!(self.out, "STORE {}", name);
                    }
                    other => {
                        let _ = writeln!(self.out, "STOREX {}", render_target_text(other));
                    }
                }
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.emit_expr(cond);
                let _ = writeln!(self.out, "JZ {}", else_label);
                for s in then_branch {
                    self.emit_stmt(s);
                }
                let _ = writeln!(self.out, "JMP {}", end_label);
                let _ = writeln!(self.out, "LABEL {}", else_label);
                if let Some(body) = else_branch {
                    for s in body {
                        self.emit_stmt(s);
                    }
                }
                let _ = writeln!(self.out, "LABEL {}", end_label);
            }
            Stmt::While { cond, body, .. } => {
                let check_label = self.new_label();
                let end_label = self.new_label();
                self.control_stack.push((end_label.clone(), check_label.clone()));
                let _ = writeln!(self.out, "LABEL {}", check_label);
                self.emit_expr(cond);
                let _ = writeln!(self.out, "JZ {}", end_label);
                for s in body {
                    self.emit_stmt(s);
                }
                let _ = writeln!(self.out, "JMP {}", check_label);
                let _ = writeln!(self.out, "LABEL {}", end_label);
                self.control_stack.pop();
            }
            Stmt::DoWhile { body, cond, .. } => {
                let body_label = self.new_label();
                let check_label = self.new_label();
                let end_label = self.new_label();
                self.control_stack.push((end_label.clone(), check_label.clone()));
                let _ = writeln!(self.out, "LABEL {}", body_label);
                for s in body {
                    self.emit_stmt(s);
                }
                let _ = writeln!(self.out, "LABEL {}", check_label);
                self.emit_expr(cond);
                let _ = writeln!(self.out, "JZ {}", end_label);
                let _ = writeln!(self.out, "JMP {}", body_label);
                let _ = writeln!(self.out, "LABEL {}", end_label);
                self.control_stack.pop();
            }
            Stmt::For { init, cond, post, body, .. } => {
                if let Some(stmt) = init {
                    self.emit_stmt(stmt);
                }
                let check_label = self.new_label();
                let post_label = self.new_label();
                let end_label = self.new_label();
                self.control_stack.push((end_label.clone(), post_label.clone()));
                let _ = writeln!(self.out, "LABEL {}", check_label);
                match cond {
                    Some(expr) => self.emit_expr(expr),
                    None => {
                        let _ = writeln!(self.out, "PUSH_INT 1");
                    }
                }
                let _ = writeln!(self.out, "JZ {}", end_label);
                for s in body {
                    self.emit_stmt(s);
                }
                let _ = writeln!(self.out, "LABEL {}", post_label);
                if let Some(stmt) = post {
                    self.emit_stmt(stmt);
                }
                let _ = writeln!(self.out, "JMP {}", check_label);
                let _ = writeln!(self.out, "LABEL {}", end_label);
                self.control_stack.pop();
            }
            Stmt::Switch { cond, cases, default, .. } => {
                let end_label = self.new_label();
                self.control_stack.push((end_label.clone(), String::new()));
                let case_labels: Vec<String> = cases.iter().map(|_| self.new_label()).collect();
                let default_label = self.new_label();
                for (case, label) in cases.iter().zip(&case_labels) {
                    self.emit_expr(cond);
                    self.emit_expr(&case.label);
                    let _ = writeln!(self.out, "EQ");
                    let _ = writeln!(self.out, "JNZ {}", label);
                }
                let _ = writeln!(self.out, "JMP {}", default_label);
                for (case, label) in cases.iter().zip(&case_labels) {
                    let _ = writeln!(self.out, "LABEL {}", label);
                    for s in &case.body {
                        self.emit_stmt(s);
                    }
                    let _ = writeln!(self.out, "JMP {}", end_label);
                }
                let _ = writeln!(self.out, "LABEL {}", default_label);
                if let Some(body) = default {
                    for s in body {
                        self.emit_stmt(s);
                    }
                }
                let _ = writeln!(self.out, "LABEL {}", end_label);
                self.control_stack.pop();
            }
            Stmt::Break(_) => match self.break_label() {
                Some(label) => {
                    let label = label.to_string();
                    let _ = writeln!(self.out, "JMP {}", label);
                }
                None => {
                    let _ = writeln!(self.out, "TRAP break");
                }
            },
            Stmt::Continue(_) => match self.continue_label() {
                Some(label) => {
                    let label = label.to_string();
                    let _ = writeln!(self.out, "JMP {}", label);
                }
                None => {
                    let _ = writeln!(self.out, "TRAP continue");
                }
            },
            Stmt::Print(expr, _) => {
                self.emit_expr(expr);
                let _ = writeln!(self.out, "PRINT");
            }
            Stmt::Return(value, _) => {
                match value {
                    Some(expr) => self.emit_expr(expr),
                    None => {
                        let _ = writeln!(self.out, "PUSH_INT 0");
                    }
                }
                let _ = writeln!(self.out, "RET");
            }
            Stmt::ExprStmt(expr, _) => {
                self.emit_expr(expr);
                let _ = writeln!(self.out, "POP");
            }
            Stmt::Block(stmts, _) => {
                for s in stmts {
                    self.emit_stmt(s);
                }
            }
        }
    }

    fn emit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::IntLiteral { value, .. } => {
                let _ = writeln!(self.out, "PUSH_INT {}", value);
            }
            Expr::FloatLiteral { value, .. } => {
                let _ = writeln!(self.out, "PUSH_FLOAT {:?}", value);
            }
            Expr::BoolLiteral { value, .. } => {
                let _ = writeln!(self.out, "PUSH_INT {}", if *value { 1 } else { 0 });
            }
            Expr::StringLiteral { value, .. } => {
                let _ = writeln!(self.out, "PUSH_STR {:?}", value);
            }
            Expr::Identifier { name, .. } => {
                let _ = writeln!(self.out, "LOAD {}", name);
            }
            Expr::Unary { op, operand, .. } => {
                self.emit_expr(operand);
                let mnemonic = match op {
                    UnaryOp::Neg => "NEG",
                    UnaryOp::Not => "NOT",
                };
                let _ = writeln!(self.out, "{}", mnemonic);
            }
            Expr::Binary { op, left, right, .. } if op.is_logical() => self.emit_short_circuit(*op, left, right),
            Expr::Binary { op, left, right, .. } => {
                self.emit_expr(left);
                self.emit_expr(right);
                let _ = writeln!(self.out, "{}", binary_mnemonic(*op));
            }
            Expr::Call { callee, args, .. } if callee == "max" => {
                self.emit_expr(&args[0]);
                self.emit_expr(&args[1]);
                let _ = writeln!(self.out, "MAX");
            }
            Expr::Call { callee, args, .. } if callee == "len" => {
                self.emit_expr(&args[0]);
                let _ = writeln!(self.out, "LEN");
            }
            Expr::Call { callee, .. } if callee == "input" || callee == "bata" => {
                let _ = writeln!(self.out, "INPUT");
            }
            Expr::Call { callee, args, .. } => {
                for arg in args {
                    self.emit_expr(arg);
                }
                let _ = writeln!(self.out, "CALL {} {}", callee, args.len());
            }
            Expr::Index { base, index, .. } => {
                self.emit_expr(base);
                self.emit_expr(index);
                let _ = writeln!(self.out, "GETINDEX");
            }
            Expr::Member { base, field, .. } => {
                self.emit_expr(base);
                let _ = writeln!(self.out, "GETFIELD {}", field);
            }
            Expr::Cast { type_name, expr: inner, .. } => {
                self.emit_expr(inner);
                match type_name.as_str() {
                    "int" => {
                        let _ = writeln!(self.out, "CAST_INT");
                    }
                    "float" => {
                        let _ = writeln!(self.out, "CAST_FLOAT");
                    }
                    "bool" => {
                        let _ = writeln!(self.out, "CAST_BOOL");
                    }
                    // No stack opcode converts to text; the source value is
                    // already the only representation this machine carries.
                    _ => {}
                }
            }
        }
    }

    /// `&&`/`||` short-circuit by branching around the right operand
    /// rather than always evaluating both sides and ANDing/ORing the
    /// results, matching the three-address generator's lowering.
    fn emit_short_circuit(&mut self, op: BinaryOp, left: &Expr, right: &Expr) {
        let short_circuit_label = self.new_label();
        let end_label = self.new_label();
        self.emit_expr(left);
        let _ = writeln!(self.out, "DUP");
        match op {
            BinaryOp::And => {
                let _ = writeln!(self.out, "JZ {}", short_circuit_label);
            }
            BinaryOp::Or => {
                let _ = writeln!(self.out, "JNZ {}", short_circuit_label);
            }
            _ => unreachable!("caller only invokes this for logical operators"),
        }
        let _ = writeln!(self.out, "POP");
        self.emit_expr(right);
        let _ = writeln!(self.out, "JMP {}", end_label);
        let _ = writeln!(self.out, "LABEL {}", short_circuit_label);
        let _ = writeln!(self.out, "LABEL {}", end_label);
    }
}

/// Renders a non-identifier assignment target as the literal text `STOREX`
/// carries, since the opcode addresses its target by source text rather
/// than by an addressing sequence left on the stack.
fn render_target_text(expr: &Expr) -> String {
    match expr {
        Expr::Identifier { name, .. } => name.clone(),
        Expr::Index { base, index, .. } => format!("{}[{}]", render_target_text(base), render_target_text(index)),
        Expr::Member { base, field, .. } => format!("{}.{}", render_target_text(base), field),
        Expr::IntLiteral { value, .. } => value.to_string(),
        Expr::FloatLiteral { value, .. } => value.to_string(),
        Expr::BoolLiteral { value, .. } => value.to_string(),
        Expr::StringLiteral { value, .. } => format!("{:?}", value),
        Expr::Unary { op, operand, .. } => {
            let sym = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            format!("{}{}", sym, render_target_text(operand))
        }
        Expr::Binary { op, left, right, .. } => {
            format!("{}{}{}", render_target_text(left), binary_mnemonic(*op), render_target_text(right))
        }
        Expr::Call { callee, args, .. } => {
            let rendered: Vec<String> = args.iter().map(render_target_text).collect();
            format!("{}({})", callee, rendered.join(","))
        }
        Expr::Cast { type_name, expr: inner, .. } => format!("({}){}", type_name, render_target_text(inner)),
    }
}

fn binary_mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "ADD",
        BinaryOp::Sub => "SUB",
        BinaryOp::Mul => "MUL",
        BinaryOp::Div => "DIV",
        BinaryOp::Mod => "MOD",
        BinaryOp::Lt => "LT",
        BinaryOp::Le => "LE",
        BinaryOp::Gt => "GT",
        BinaryOp::Ge => "GE",
        BinaryOp::Eq => "EQ",
        BinaryOp::Ne => "NE",
        BinaryOp::And | BinaryOp::Or => unreachable!("logical ops short-circuit instead"),
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
        generate(&program, &sem)
    }

    #[test]
    fn straight_line_arithmetic_pushes_and_stores() {
        let listing = generate_src("begin int x = 1 + 2; print(x); end");
        assert!(listing.contains("PUSH_INT 1"));
        assert!(listing.contains("PUSH_INT 2"));
        assert!(listing.contains("ADD"));
        assert!(listing.contains("DECL x"));
        assert!(listing.contains("STORE x"));
        assert!(listing.contains("LOAD x"));
        assert!(listing.contains("PRINT"));
    }

    #[test]
    fn break_inside_loop_jumps_to_end_label() {
        let listing = generate_src("begin while (true) { break; } end");
        assert!(!listing.contains("TRAP"));
        let break_line = listing.lines().find(|l| l.starts_with("JMP")).unwrap();
        let target = break_line.split_whitespace().nth(1).unwrap();
        assert!(listing.contains(&format!("LABEL {}", target)));
    }

    #[test]
    fn continue_inside_switch_inside_loop_targets_the_loop() {
        let listing = generate_src(
            "begin int x = 1; while (x < 5) { switch (x) { case 1: continue; } x = x + 1; } end",
        );
        assert!(!listing.contains("TRAP"));
    }

    #[test]
    fn function_is_framed_with_func_param_and_end() {
        let listing = generate_src("func add(int a, int b) -> int { return a + b; } begin print(add(1, 2)); end");
        assert!(listing.contains("FUNC add 2"));
        assert!(listing.contains("PARAM a"));
        assert!(listing.contains("PARAM b"));
        assert!(listing.contains("CALL add 2"));
        assert!(listing.contains("END"));
    }

    #[test]
    fn short_circuit_and_does_not_emit_a_logical_and_opcode() {
        let listing = generate_src("begin bool b = (1 < 2) && (3 < 4); end");
        assert!(!listing.lines().any(|l| l == "AND"));
    }

    #[test]
    fn max_and_len_and_input_use_dedicated_opcodes() {
        let listing = generate_src("begin text s = \"hi\"; print(max(1, 2)); print(len(s)); print(input()); end");
        assert!(listing.contains("MAX"));
        assert!(listing.contains("LEN"));
        assert!(listing.contains("INPUT"));
        assert!(!listing.lines().any(|l| l.starts_with("CALL max") || l.starts_with("CALL len") || l.starts_with("CALL input")));
    }

    #[test]
    fn cast_to_int_emits_cast_int_opcode() {
        let listing = generate_src("begin float f = 1.5; int x = int(f); print(x); end");
        assert!(listing.contains("CAST_INT"));
    }

    #[test]
    fn index_assignment_emits_storex_with_target_text() {
        let listing = generate_src("begin int arr[3]; arr[0] = 5; end");
        assert!(listing.contains("STOREX arr[0]"));
    }
}
