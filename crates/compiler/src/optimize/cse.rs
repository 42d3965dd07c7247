//! Local common-subexpression elimination: the optimizer's third pass.
//!
//! Within a single block, an available-expressions table keyed on
//! `(op, arg1, arg2)` lets a repeated computation collapse into a copy
//! of the earlier result. Commutative ops sort their operands before
//! keying so `a + b` and `b + a` hit the same entry. Any instruction
//! that redefines a name already used as an operand in the table
//! invalidates every entry built from it — this is a local, single-block
//! analysis, so there's no need to reason past a redefinition.

use crate::cfg::Cfg;
use crate::ir::{Instr, Op};
use std::collections::HashMap;

type ExprKey = (Op, Option<String>, Option<String>);

fn key_for(instr: &Instr) -> Option<ExprKey> {
    if !instr.op.is_binary_arith() {
        return None;
    }
    let (mut a, mut b) = (instr.arg1.clone(), instr.arg2.clone());
    if instr.op.is_commutative() {
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
    }
    Some((instr.op, a, b))
}

fn eliminate_block(instrs: &[Instr]) -> Vec<Instr> {
    let mut available: HashMap<ExprKey, String> = HashMap::new();
    let mut out = Vec::with_capacity(instrs.len());

    for instr in instrs {
        // Any reference to a name this instruction is about to redefine
        // invalidates expressions built from the old value.
        if let Some(result) = &instr.result {
            available.retain(|(_, a, b), _| a.as_deref() != Some(result.as_str()) && b.as_deref() != Some(result.as_str()));
        }

        if let Some(key) = key_for(instr) {
            if let Some(existing) = available.get(&key) {
                if let Some(result) = &instr.result {
                    out.push(Instr { op: Op::Copy, arg1: Some(existing.clone()), arg2: None, result: Some(result.clone()) });
                    available.insert(key, result.clone());
                    continue;
                }
            } else if let Some(result) = &instr.result {
                available.insert(key, result.clone());
            }
        }

        out.push(instr.clone());
    }
    out
}

pub fn eliminate(mut cfg: Cfg) -> Cfg {
    for block in &mut cfg.blocks {
        block.instructions = eliminate_block(&block.instructions);
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic;

    fn cfg_for(src: &str) -> Cfg {
        let tokens = Lexer::new(src).tokenize().unwrap().tokens;
        let program = Parser::new(tokens).parse().unwrap();
        let sem = semantic::analyze(&program).unwrap();
        let funcs = ir::generate(&program, &sem);
        let f = funcs.iter().find(|f| f.name == "__main__").unwrap();
        crate::cfg::build(f)
    }

    #[test]
    fn repeated_expression_becomes_a_copy() {
        let cfg = cfg_for("begin int a = input(); int x = a + 1; int y = a + 1; print(y); end");
        let eliminated = eliminate(cfg);
        let adds = eliminated
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| i.op == Op::Add)
            .count();
        assert_eq!(adds, 1);
    }

    #[test]
    fn commutative_operand_order_does_not_block_elimination() {
        let cfg = cfg_for("begin int a = input(); int b = input(); int x = a + b; int y = b + a; print(y); end");
        let eliminated = eliminate(cfg);
        let adds = eliminated
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| i.op == Op::Add)
            .count();
        assert_eq!(adds, 1);
    }

    #[test]
    fn redefining_an_operand_invalidates_the_entry() {
        let cfg = cfg_for("begin int a = input(); int x = a + 1; a = a + 5; int y = a + 1; print(y); end");
        let eliminated = eliminate(cfg);
        let adds = eliminated
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| i.op == Op::Add)
            .count();
        assert_eq!(adds, 3);
    }
}
