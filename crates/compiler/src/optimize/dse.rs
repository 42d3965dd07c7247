//! Dead-store elimination: the optimizer's fifth and final pass.
//!
//! Backward liveness analysis to a fixpoint (the mirror image of
//! constant propagation's forward dataflow), then a reverse scan per
//! block dropping any defining instruction whose result is never live
//! at the point it's defined. `call` is never dropped even when its
//! result is dead — it may have side effects the optimizer doesn't
//! model.

use crate::cfg::Cfg;
use crate::ir::{Instr, Op};
use std::collections::{HashSet, VecDeque};

type LiveSet = HashSet<String>;

fn instr_uses(instr: &Instr) -> Vec<&String> {
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

fn block_live_in(instrs: &[Instr], live_out: &LiveSet) -> LiveSet {
    let mut live = live_out.clone();
    for instr in instrs.iter().rev() {
        if let Some(result) = &instr.result {
            live.remove(result);
        }
        for used in instr_uses(instr) {
            live.insert(used.clone());
        }
    }
    live
}

fn compute_liveness(cfg: &Cfg) -> (Vec<LiveSet>, Vec<LiveSet>) {
    let n = cfg.blocks.len();
    let mut live_in: Vec<LiveSet> = vec![LiveSet::new(); n];
    let mut live_out: Vec<LiveSet> = vec![LiveSet::new(); n];
    let mut worklist: VecDeque<usize> = (0..n).rev().collect();
    let mut queued: HashSet<usize> = (0..n).collect();

    while let Some(id) = worklist.pop_front() {
        queued.remove(&id);
        let mut out = LiveSet::new();
        for &succ in &cfg.blocks[id].successors {
            out.extend(live_in[succ].iter().cloned());
        }
        let new_in = block_live_in(&cfg.blocks[id].instructions, &out);
        let changed = new_in != live_in[id] || out != live_out[id];
        live_in[id] = new_in;
        live_out[id] = out;
        if changed {
            for &pred in &cfg.blocks[id].predecessors {
                if queued.insert(pred) {
                    worklist.push_back(pred);
                }
            }
        }
    }
    (live_in, live_out)
}

fn has_side_effects(op: Op) -> bool {
    matches!(op, Op::Call | Op::Print | Op::Param | Op::Return | Op::Label | Op::Goto | Op::Ifz | Op::Ifnz)
}

pub fn eliminate(mut cfg: Cfg) -> Cfg {
    let (_, live_out) = compute_liveness(&cfg);
    let n = cfg.blocks.len();
    for id in 0..n {
        let mut live = live_out[id].clone();
        let mut kept = Vec::with_capacity(cfg.blocks[id].instructions.len());
        for instr in cfg.blocks[id].instructions.iter().rev() {
            let is_dead_store = match &instr.result {
                Some(result) if !has_side_effects(instr.op) => !live.contains(result),
                _ => false,
            };
            if is_dead_store {
                continue;
            }
            if let Some(result) = &instr.result {
                live.remove(result);
            }
            for used in instr_uses(instr) {
                live.insert(used.clone());
            }
            kept.push(instr.clone());
        }
        kept.reverse();
        cfg.blocks[id].instructions = kept;
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
    fn unused_computation_is_dropped() {
        let cfg = cfg_for("begin int a = input(); int unused = a + 1; print(a); end");
        let eliminated = eliminate(cfg);
        let has_dead_add = eliminated.blocks.iter().flat_map(|b| &b.instructions).any(|i| i.op == Op::Add);
        assert!(!has_dead_add);
    }

    #[test]
    fn used_computation_survives() {
        let cfg = cfg_for("begin int a = input(); int used = a + 1; print(used); end");
        let eliminated = eliminate(cfg);
        let has_add = eliminated.blocks.iter().flat_map(|b| &b.instructions).any(|i| i.op == Op::Add);
        assert!(has_add);
    }

    #[test]
    fn call_is_never_eliminated_even_when_its_result_is_unused() {
        let cfg = cfg_for("begin int ignored = input(); print(1); end");
        let eliminated = eliminate(cfg);
        let has_call = eliminated.blocks.iter().flat_map(|b| &b.instructions).any(|i| i.op == Op::Call);
        assert!(has_call);
    }
}
