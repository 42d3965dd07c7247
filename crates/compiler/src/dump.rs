//! Textual dumps of every pipeline stage, for `ternc dump --stage ...`.
//!
//! Every function here takes an already-computed stage result and
//! renders it as plain text; none of them do any compiling themselves.
//! Formats favor grep-ability over prettiness: one record per line where
//! that's natural (tokens, IR), indentation for tree shapes (AST,
//! symbol table), and Graphviz `dot` source for the two graph dumps.

use crate::ast::*;
use crate::cfg::Cfg;
use crate::ir::IrFunction;
use crate::semantic::SemanticResult;
use std::fmt::Write as _;
use tern_core::Token;

pub fn dump_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for tok in tokens {
        let _ = writeln!(out, "{:<4} {:<16} {:?}", tok.span.to_string(), format!("{:?}", tok.kind), tok.text);
    }
    out
}

pub fn dump_ast(program: &Program) -> String {
    let mut out = String::new();
    for import in &program.imports {
        let _ = writeln!(out, "import {:?}", import.path);
    }
    for decl in &program.type_decls {
        let _ = writeln!(out, "{} {}", decl.kind.keyword(), decl.name);
        for field in &decl.fields {
            let _ = writeln!(out, "  {} {}", type_spec_name(&field.spec), field.name);
        }
    }
    for function in &program.functions {
        let params: Vec<String> = function.params.iter().map(|p| format!("{} {}", type_spec_name(&p.spec), p.name)).collect();
        let _ = writeln!(out, "func {}({}) -> {}", function.name, params.join(", "), type_spec_name(&function.return_spec));
        dump_stmts(&mut out, &function.body, 1);
    }
    let _ = writeln!(out, "begin");
    dump_stmts(&mut out, &program.statements, 1);
    let _ = writeln!(out, "end");
    out
}

fn type_spec_name(spec: &TypeSpec) -> String {
    match spec.array_size {
        Some(n) => format!("{}[{}]", spec.type_name, n),
        None => spec.type_name.clone(),
    }
}

fn dump_stmts(out: &mut String, stmts: &[Stmt], depth: usize) {
    for stmt in stmts {
        dump_stmt(out, stmt, depth);
    }
}

fn dump_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    let pad = "  ".repeat(depth);
    match stmt {
        Stmt::VarDecl { spec, name, init, .. } => {
            let _ = writeln!(out, "{}VarDecl {} {} init={}", pad, type_spec_name(spec), name, init.is_some());
        }
        Stmt::Assign { target, .. } => {
            let _ = writeln!(out, "{}Assign {}", pad, dump_expr_inline(target));
        }
        Stmt::If { then_branch, else_branch, .. } => {
            let _ = writeln!(out, "{}If", pad);
            dump_stmts(out, then_branch, depth + 1);
            if let Some(body) = else_branch {
                let _ = writeln!(out, "{}Else", pad);
                dump_stmts(out, body, depth + 1);
            }
        }
        Stmt::While { body, .. } => {
            let _ = writeln!(out, "{}While", pad);
            dump_stmts(out, body, depth + 1);
        }
        Stmt::For { body, .. } => {
            let _ = writeln!(out, "{}For", pad);
            dump_stmts(out, body, depth + 1);
        }
        Stmt::DoWhile { body, .. } => {
            let _ = writeln!(out, "{}DoWhile", pad);
            dump_stmts(out, body, depth + 1);
        }
        Stmt::Switch { cases, default, .. } => {
            let _ = writeln!(out, "{}Switch", pad);
            for case in cases {
                let _ = writeln!(out, "{}  Case {}", pad, dump_expr_inline(&case.label));
                dump_stmts(out, &case.body, depth + 2);
            }
            if let Some(body) = default {
                let _ = writeln!(out, "{}  Default", pad);
                dump_stmts(out, body, depth + 2);
            }
        }
        Stmt::Break(_) => {
            let _ = writeln!(out, "{}Break", pad);
        }
        Stmt::Continue(_) => {
            let _ = writeln!(out, "{}Continue", pad);
        }
        Stmt::Print(expr, _) => {
            let _ = writeln!(out, "{}Print {}", pad, dump_expr_inline(expr));
        }
        Stmt::Return(value, _) => {
            let _ = writeln!(out, "{}Return {}", pad, value.as_ref().map(dump_expr_inline).unwrap_or_default());
        }
        Stmt::ExprStmt(expr, _) => {
            let _ = writeln!(out, "{}ExprStmt {}", pad, dump_expr_inline(expr));
        }
        Stmt::Block(stmts, _) => {
            let _ = writeln!(out, "{}Block", pad);
            dump_stmts(out, stmts, depth + 1);
        }
    }
}

fn dump_expr_inline(expr: &Expr) -> String {
    match expr {
        Expr::Identifier { name, .. } => name.clone(),
        Expr::IntLiteral { value, .. } => value.to_string(),
        Expr::FloatLiteral { value, .. } => value.to_string(),
        Expr::BoolLiteral { value, .. } => value.to_string(),
        Expr::StringLiteral { value, .. } => format!("{:?}", value),
        Expr::Unary { op, operand, .. } => format!("({:?} {})", op, dump_expr_inline(operand)),
        Expr::Binary { op, left, right, .. } => format!("({} {} {})", dump_expr_inline(left), op.symbol(), dump_expr_inline(right)),
        Expr::Call { callee, args, .. } => format!("{}({})", callee, args.iter().map(dump_expr_inline).collect::<Vec<_>>().join(", ")),
        Expr::Index { base, index, .. } => format!("{}[{}]", dump_expr_inline(base), dump_expr_inline(index)),
        Expr::Member { base, field, .. } => format!("{}.{}", dump_expr_inline(base), field),
        Expr::Cast { type_name, expr, .. } => format!("({}){}", type_name, dump_expr_inline(expr)),
    }
}

/// Graphviz source for the AST's statement tree, a function/`begin`
/// block at a time. Each node is labeled with its statement kind; edges
/// follow nesting, not control flow (see [`dump_cfg_dot`] for that).
pub fn dump_ast_dot(program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph ast {{");
    let mut counter = 0usize;
    let root = next_id(&mut counter);
    let _ = writeln!(out, "  n{} [label=\"program\"];", root);
    for function in &program.functions {
        let fid = next_id(&mut counter);
        let _ = writeln!(out, "  n{} [label=\"func {}\"];", fid, function.name);
        let _ = writeln!(out, "  n{} -> n{};", root, fid);
        dump_stmts_dot(&mut out, &function.body, fid, &mut counter);
    }
    let main_id = next_id(&mut counter);
    let _ = writeln!(out, "  n{} [label=\"begin\"];", main_id);
    let _ = writeln!(out, "  n{} -> n{};", root, main_id);
    dump_stmts_dot(&mut out, &program.statements, main_id, &mut counter);
    let _ = writeln!(out, "}}");
    out
}

fn next_id(counter: &mut usize) -> usize {
    let id = *counter;
    *counter += 1;
    id
}

fn dump_stmts_dot(out: &mut String, stmts: &[Stmt], parent: usize, counter: &mut usize) {
    for stmt in stmts {
        let id = next_id(counter);
        let label = stmt_label(stmt);
        let _ = writeln!(out, "  n{} [label=\"{}\"];", id, label);
        let _ = writeln!(out, "  n{} -> n{};", parent, id);
        for nested in stmt_children(stmt) {
            dump_stmts_dot(out, nested, id, counter);
        }
    }
}

fn stmt_label(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::VarDecl { .. } => "VarDecl",
        Stmt::Assign { .. } => "Assign",
        Stmt::If { .. } => "If",
        Stmt::While { .. } => "While",
        Stmt::For { .. } => "For",
        Stmt::DoWhile { .. } => "DoWhile",
        Stmt::Switch { .. } => "Switch",
        Stmt::Break(_) => "Break",
        Stmt::Continue(_) => "Continue",
        Stmt::Print(..) => "Print",
        Stmt::Return(..) => "Return",
        Stmt::ExprStmt(..) => "ExprStmt",
        Stmt::Block(..) => "Block",
    }
}

fn stmt_children(stmt: &Stmt) -> Vec<&[Stmt]> {
    match stmt {
        Stmt::If { then_branch, else_branch, .. } => {
            let mut v = vec![then_branch.as_slice()];
            if let Some(body) = else_branch {
                v.push(body.as_slice());
            }
            v
        }
        Stmt::While { body, .. } | Stmt::For { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Block(body, _) => vec![body.as_slice()],
        Stmt::Switch { cases, default, .. } => {
            let mut v: Vec<&[Stmt]> = cases.iter().map(|c| c.body.as_slice()).collect();
            if let Some(body) = default {
                v.push(body.as_slice());
            }
            v
        }
        _ => Vec::new(),
    }
}

pub fn dump_symbols(semantic: &SemanticResult) -> String {
    let mut out = String::new();
    for (name, sig) in sorted(&semantic.functions) {
        let params: Vec<String> = sig.params.iter().map(|(n, t)| format!("{} {}", t, n)).collect();
        let _ = writeln!(out, "func {}({}) -> {}", name, params.join(", "), sig.return_type);
    }
    for (name, composite) in sorted(&semantic.composites) {
        let _ = writeln!(out, "{} {}", composite.kind.keyword(), name);
        for (field, ty) in &composite.fields {
            let _ = writeln!(out, "  {} {}", ty, field);
        }
    }
    for snapshot in &semantic.scope_snapshots {
        let _ = writeln!(out, "scope {}", snapshot.label);
        for (name, ty) in &snapshot.vars {
            let _ = writeln!(out, "  {} {}", ty, name);
        }
    }
    out
}

fn sorted<V>(map: &std::collections::HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

pub fn dump_ir(functions: &[IrFunction]) -> String {
    let mut out = String::new();
    for function in functions {
        let _ = writeln!(out, "function {}({}):", function.name, function.params.join(", "));
        for instr in &function.instructions {
            dump_instr(&mut out, instr);
        }
        let _ = writeln!(out);
    }
    out
}

fn dump_instr(out: &mut String, instr: &crate::ir::Instr) {
    use crate::ir::Op;
    match instr.op {
        Op::Label => {
            let _ = writeln!(out, "{}:", instr.arg1.as_deref().unwrap_or(""));
        }
        _ => {
            let result = instr.result.as_deref().map(|r| format!("{} = ", r)).unwrap_or_default();
            let args = [&instr.arg1, &instr.arg2].into_iter().flatten().cloned().collect::<Vec<_>>().join(", ");
            let _ = writeln!(out, "    {}{} {}", result, instr.op.mnemonic(), args);
        }
    }
}

pub fn dump_cfg(cfg: &Cfg) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "cfg {}:", cfg.function);
    for block in &cfg.blocks {
        let mut preds: Vec<usize> = block.predecessors.iter().copied().collect();
        preds.sort_unstable();
        let mut succs: Vec<usize> = block.successors.iter().copied().collect();
        succs.sort_unstable();
        let _ = writeln!(out, "  block {} (preds={:?} succs={:?})", block.id, preds, succs);
        for instr in &block.instructions {
            dump_instr(&mut out, instr);
        }
    }
    out
}

pub fn dump_cfg_dot(cfg: &Cfg) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph cfg_{} {{", sanitize(&cfg.function));
    for block in &cfg.blocks {
        let _ = writeln!(out, "  b{} [label=\"block {}\"];", block.id, block.id);
    }
    for block in &cfg.blocks {
        let mut succs: Vec<usize> = block.successors.iter().copied().collect();
        succs.sort_unstable();
        for succ in succs {
            let _ = writeln!(out, "  b{} -> b{};", block.id, succ);
        }
    }
    let _ = writeln!(out, "}}");
    out
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic;

    #[test]
    fn token_dump_includes_span_and_lexeme() {
        let tokens = Lexer::new("begin end").tokenize().unwrap().tokens;
        let dumped = dump_tokens(&tokens);
        assert!(dumped.contains("\"begin\""));
        assert!(dumped.contains("\"end\""));
    }

    #[test]
    fn ast_dump_shows_nested_statements() {
        let program = Parser::new(Lexer::new("begin if (true) { print(1); } end").tokenize().unwrap().tokens).parse().unwrap();
        let dumped = dump_ast(&program);
        assert!(dumped.contains("If"));
        assert!(dumped.contains("Print"));
    }

    #[test]
    fn symbol_dump_lists_function_signature() {
        let program = Parser::new(Lexer::new("func add(int a, int b) -> int { return a + b; } begin end").tokenize().unwrap().tokens)
            .parse()
            .unwrap();
        let sem = semantic::analyze(&program).unwrap();
        let dumped = dump_symbols(&sem);
        assert!(dumped.contains("func add(int a, int b) -> int"));
    }

    #[test]
    fn ir_dump_renders_labels_without_indentation() {
        let program = Parser::new(Lexer::new("begin while (1 < 2) { print(1); } end").tokenize().unwrap().tokens).parse().unwrap();
        let sem = semantic::analyze(&program).unwrap();
        let funcs = ir::generate(&program, &sem);
        let dumped = dump_ir(&funcs);
        assert!(dumped.lines().any(|l| l.ends_with(':') && !l.starts_with(' ')));
    }

    #[test]
    fn cfg_dot_dump_is_valid_digraph_shell() {
        let program = Parser::new(Lexer::new("begin int x = 1; print(x); end").tokenize().unwrap().tokens).parse().unwrap();
        let sem = semantic::analyze(&program).unwrap();
        let funcs = ir::generate(&program, &sem);
        let main_fn = funcs.iter().find(|f| f.name == semantic::MAIN_FUNCTION_NAME).unwrap();
        let cfg = crate::cfg::build(main_fn);
        let dumped = dump_cfg_dot(&cfg);
        assert!(dumped.starts_with("digraph"));
        assert!(dumped.trim_end().ends_with('}'));
    }
}
