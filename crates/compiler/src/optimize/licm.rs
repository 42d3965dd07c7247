//! Loop-invariant code motion: the optimizer's fourth pass.
//!
//! A loop is any back edge `tail -> head` with `head.id <= tail.id` —
//! every loop header in this IR is emitted before its body, so a
//! backward edge by id is exactly a loop edge. The preheader is
//! `head.id - 1`, the block that falls through into the header, which
//! always exists because the header is never block 0.
//!
//! Rather than a full loop-nest analysis, this pass asks a narrower
//! question per loop: which blocks does *every* path from the header to
//! the back-edge block pass through? Those are the blocks that run on
//! every iteration that doesn't exit, computed as the standard
//! dominator relation restricted to "does this block dominate the
//! back-edge block". A defining instruction in one of those blocks
//! hoists to the preheader when none of its operands are written
//! anywhere else in the loop.

use crate::cfg::Cfg;
use crate::ir::{Instr, Op};
use std::collections::HashSet;

struct Loop {
    head: usize,
    tail: usize,
}

fn find_loops(cfg: &Cfg) -> Vec<Loop> {
    let mut loops = Vec::new();
    for block in &cfg.blocks {
        for &succ in &block.successors {
            if succ <= block.id {
                loops.push(Loop { head: succ, tail: block.id });
            }
        }
    }
    loops
}

/// `dom[b]` is the set of every block that dominates `b`, including `b`
/// itself. Computed by the standard iterative fixpoint over reverse
/// postorder (here just id order, since this IR's block ids already
/// follow program order).
fn compute_dominators(cfg: &Cfg) -> Vec<HashSet<usize>> {
    let n = cfg.blocks.len();
    let universe: HashSet<usize> = (0..n).collect();
    let mut dom: Vec<HashSet<usize>> = vec![universe.clone(); n];
    if n == 0 {
        return dom;
    }
    dom[0] = [0].into_iter().collect();

    let mut changed = true;
    while changed {
        changed = false;
        for b in 1..n {
            let preds: Vec<usize> = cfg.blocks[b].predecessors.iter().copied().collect();
            if preds.is_empty() {
                continue;
            }
            let mut new_dom = preds
                .iter()
                .map(|&p| dom[p].clone())
                .reduce(|a, b| a.intersection(&b).copied().collect())
                .unwrap_or_default();
            new_dom.insert(b);
            if new_dom != dom[b] {
                dom[b] = new_dom;
                changed = true;
            }
        }
    }
    dom
}

fn names_written_in_range(cfg: &Cfg, head: usize, tail: usize) -> HashSet<String> {
    let mut written = HashSet::new();
    for id in head..=tail {
        for instr in &cfg.blocks[id].instructions {
            if let Some(r) = &instr.result {
                written.insert(r.clone());
            }
        }
    }
    written
}

fn instr_operands(instr: &Instr) -> Vec<&String> {
    let (has1, has2) = instr.op.operand_slots();
    let mut out = Vec::new();
    if has1 {
        if let Some(a) = &instr.arg1 {
            out.push(a);
        }
    }
    if has2 {
        if let Some(a) = &instr.arg2 {
            out.push(a);
        }
    }
    out
}

fn is_invariant(instr: &Instr, written: &HashSet<String>) -> bool {
    if instr.result.is_none() {
        return false;
    }
    if !matches!(instr.op, Op::Copy | Op::Neg) && !instr.op.is_binary_arith() {
        return false;
    }
    instr_operands(instr).into_iter().all(|name| !written.contains(name))
}

pub fn hoist(mut cfg: Cfg) -> Cfg {
    let loops = find_loops(&cfg);
    let dom = compute_dominators(&cfg);
    for lp in loops {
        if lp.head == 0 {
            continue;
        }
        let preheader = lp.head - 1;
        if !cfg.blocks[preheader].successors.contains(&lp.head) {
            continue;
        }
        let written = names_written_in_range(&cfg, lp.head, lp.tail);
        let candidates: Vec<usize> = (lp.head..=lp.tail).filter(|b| dom[lp.tail].contains(b)).collect();

        let mut hoisted = Vec::new();
        for &id in &candidates {
            let instrs = cfg.blocks[id].instructions.clone();
            let mut kept = Vec::new();
            for instr in instrs {
                if is_invariant(&instr, &written) {
                    hoisted.push(instr);
                } else {
                    kept.push(instr);
                }
            }
            cfg.blocks[id].instructions = kept;
        }
        if hoisted.is_empty() {
            continue;
        }
        let insert_at = cfg.blocks[preheader].instructions.len().saturating_sub(
            cfg.blocks[preheader]
                .instructions
                .last()
                .map(|i| if i.op.terminates_block() { 1 } else { 0 })
                .unwrap_or(0),
        );
        for instr in hoisted.into_iter().rev() {
            cfg.blocks[preheader].instructions.insert(insert_at, instr);
        }
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
    fn loop_invariant_computation_moves_out_of_the_body() {
        let cfg = cfg_for("begin int a = input(); int i = 0; while (i < 10) { int t = a + 7; print(t); i = i + 1; } end");
        let hoisted = hoist(cfg);
        let head_id = hoisted
            .blocks
            .iter()
            .find(|b| b.instructions.iter().any(|i| i.op == Op::Lt))
            .map(|b| b.id)
            .unwrap();
        let invariant_add_after_head = hoisted.blocks[head_id..]
            .iter()
            .flat_map(|b| &b.instructions)
            .any(|i| i.op == Op::Add && i.arg2.as_deref() == Some("7"));
        assert!(!invariant_add_after_head);
        let invariant_add_before_head = hoisted.blocks[..head_id]
            .iter()
            .flat_map(|b| &b.instructions)
            .any(|i| i.op == Op::Add && i.arg2.as_deref() == Some("7"));
        assert!(invariant_add_before_head);
        let increment_still_present = hoisted
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .any(|i| i.op == Op::Add && i.arg2.as_deref() == Some("1"));
        assert!(increment_still_present);
    }

    #[test]
    fn no_loop_leaves_cfg_untouched() {
        let cfg = cfg_for("begin int x = 1 + 2; print(x); end");
        let before = cfg.blocks.len();
        let hoisted = hoist(cfg);
        assert_eq!(hoisted.blocks.len(), before);
    }
}
