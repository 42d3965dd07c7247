//! Forward constant propagation: the optimizer's second pass.
//!
//! Per-block abstract state is a finite map from variable name to the
//! literal text of its known constant value. Meet over predecessors: a
//! name maps to `v` at a block's entry iff every predecessor's
//! out-state maps it to `v` too — so a value known on only one incoming
//! path is forgotten, not guessed at. The whole thing runs as an
//! iterative worklist to a fixpoint, the same shape as the liveness
//! analysis backing dead-store elimination.

use crate::cfg::Cfg;
use crate::ir::{Instr, Op};
use crate::types::floor_div_i64;
use std::collections::{HashMap, HashSet, VecDeque};

type ConstState = HashMap<String, String>;

enum Lit {
    Int(i64),
    Float(f64),
}

fn parse_lit(s: &str) -> Option<Lit> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Lit::Int(i));
    }
    s.parse::<f64>().ok().map(Lit::Float)
}

fn bool_str(b: bool) -> String {
    if b { "1".to_string() } else { "0".to_string() }
}

fn fmt_f64(v: f64) -> String {
    if v == v.trunc() && v.is_finite() {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

/// Folds a binary op over two literal operands, returning the literal
/// text of the result, or `None` if either operand isn't a literal or
/// the op isn't foldable this way (division by a literal zero is left
/// alone — that's a runtime trap, not a compile-time value).
fn fold_binary(op: Op, a: &str, b: &str) -> Option<String> {
    let (la, lb) = (parse_lit(a)?, parse_lit(b)?);
    match (la, lb) {
        (Lit::Int(x), Lit::Int(y)) => fold_int(op, x, y),
        (Lit::Float(x), Lit::Float(y)) => fold_float(op, x, y),
        (Lit::Int(x), Lit::Float(y)) => fold_float(op, x as f64, y),
        (Lit::Float(x), Lit::Int(y)) => fold_float(op, x, y as f64),
    }
}

fn fold_int(op: Op, x: i64, y: i64) -> Option<String> {
    match op {
        Op::Add => Some((x + y).to_string()),
        Op::Sub => Some((x - y).to_string()),
        Op::Mul => Some((x * y).to_string()),
        Op::Div if y != 0 => Some(floor_div_i64(x, y).to_string()),
        Op::Mod if y != 0 => Some(x.rem_euclid(y).to_string()),
        Op::Lt => Some(bool_str(x < y)),
        Op::Le => Some(bool_str(x <= y)),
        Op::Gt => Some(bool_str(x > y)),
        Op::Ge => Some(bool_str(x >= y)),
        Op::Eq => Some(bool_str(x == y)),
        Op::Ne => Some(bool_str(x != y)),
        _ => None,
    }
}

fn fold_float(op: Op, x: f64, y: f64) -> Option<String> {
    match op {
        Op::Add => Some(fmt_f64(x + y)),
        Op::Sub => Some(fmt_f64(x - y)),
        Op::Mul => Some(fmt_f64(x * y)),
        Op::Div if y != 0.0 => Some(fmt_f64(x / y)),
        Op::Lt => Some(bool_str(x < y)),
        Op::Le => Some(bool_str(x <= y)),
        Op::Gt => Some(bool_str(x > y)),
        Op::Ge => Some(bool_str(x >= y)),
        Op::Eq => Some(bool_str(x == y)),
        Op::Ne => Some(bool_str(x != y)),
        _ => None,
    }
}

fn fold_neg(a: &str) -> Option<String> {
    match parse_lit(a)? {
        Lit::Int(x) => Some((-x).to_string()),
        Lit::Float(x) => Some(fmt_f64(-x)),
    }
}

fn meet(states: &[&ConstState]) -> ConstState {
    let mut iter = states.iter();
    let first = match iter.next() {
        Some(s) => (*s).clone(),
        None => return ConstState::new(),
    };
    let mut result = first;
    for state in iter {
        result.retain(|k, v| state.get(k) == Some(v));
    }
    result
}

/// Substitutes known constants into operand slots, then folds the
/// instruction if every operand it needs is now a literal. Returns the
/// rewritten instruction and the out-state after applying its effect.
fn transform_instr(instr: &Instr, state: &mut ConstState) -> Instr {
    let (has_arg1, has_arg2) = instr.op.operand_slots();
    let arg1 = if has_arg1 {
        instr.arg1.as_ref().map(|a| state.get(a).cloned().unwrap_or_else(|| a.clone()))
    } else {
        instr.arg1.clone()
    };
    let arg2 = if has_arg2 {
        instr.arg2.as_ref().map(|a| state.get(a).cloned().unwrap_or_else(|| a.clone()))
    } else {
        instr.arg2.clone()
    };

    let mut out = Instr { op: instr.op, arg1, arg2, result: instr.result.clone() };

    if out.op == Op::Copy {
        if let (Some(result), Some(value)) = (&out.result, &out.arg1) {
            if parse_lit(value).is_some() {
                state.insert(result.clone(), value.clone());
            } else {
                state.remove(result);
            }
        }
        return out;
    }

    if out.op == Op::Neg {
        if let Some(value) = &out.arg1 {
            if let Some(folded) = fold_neg(value) {
                if let Some(result) = &out.result {
                    state.insert(result.clone(), folded.clone());
                }
                return Instr { op: Op::Copy, arg1: Some(folded), arg2: None, result: out.result };
            }
        }
    }

    if out.op.is_binary_arith() {
        if let (Some(a), Some(b)) = (&out.arg1, &out.arg2) {
            if let Some(folded) = fold_binary(out.op, a, b) {
                if let Some(result) = &out.result {
                    state.insert(result.clone(), folded.clone());
                }
                return Instr { op: Op::Copy, arg1: Some(folded), arg2: None, result: out.result };
            }
        }
    }

    // Any other defining instruction (call results, params we can't
    // fold, index/member placeholders) invalidates prior knowledge of
    // its result, since we no longer know its value.
    if let Some(result) = &out.result {
        state.remove(result);
    }
    out
}

pub fn propagate(mut cfg: Cfg) -> Cfg {
    let n = cfg.blocks.len();
    if n == 0 {
        return cfg;
    }
    let mut in_states: Vec<ConstState> = vec![ConstState::new(); n];
    let mut out_states: Vec<ConstState> = vec![ConstState::new(); n];
    let mut worklist: VecDeque<usize> = (0..n).collect();
    let mut queued: HashSet<usize> = (0..n).collect();

    while let Some(id) = worklist.pop_front() {
        queued.remove(&id);
        let preds: Vec<usize> = {
            let mut p: Vec<usize> = cfg.blocks[id].predecessors.iter().copied().collect();
            p.sort_unstable();
            p
        };
        let new_in = if id == 0 {
            ConstState::new()
        } else if preds.is_empty() {
            ConstState::new()
        } else {
            let pred_states: Vec<&ConstState> = preds.iter().map(|&p| &out_states[p]).collect();
            meet(&pred_states)
        };

        let mut state = new_in.clone();
        for instr in &cfg.blocks[id].instructions {
            transform_instr(instr, &mut state);
        }

        let changed = in_states[id] != new_in || out_states[id] != state;
        in_states[id] = new_in;
        out_states[id] = state;

        if changed {
            let succs: Vec<usize> = cfg.blocks[id].successors.iter().copied().collect();
            for s in succs {
                if queued.insert(s) {
                    worklist.push_back(s);
                }
            }
        }
    }

    for id in 0..n {
        let mut state = in_states[id].clone();
        let rewritten: Vec<Instr> = cfg.blocks[id]
            .instructions
            .iter()
            .map(|instr| transform_instr(instr, &mut state))
            .collect();
        cfg.blocks[id].instructions = rewritten;
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
    fn folds_straight_line_arithmetic_into_a_copy() {
        let cfg = cfg_for("begin int x = 1 + 2; print(x); end");
        let propagated = propagate(cfg);
        let copies_seven: Vec<&Instr> = propagated
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| i.op == Op::Copy && i.arg1.as_deref() == Some("3"))
            .collect();
        assert!(!copies_seven.is_empty());
    }

    #[test]
    fn value_known_on_only_one_branch_is_not_propagated_past_merge() {
        let cfg = cfg_for("begin int x = 0; if (input() > 0) { x = 1; } print(x); end");
        let propagated = propagate(cfg);
        // `x` disagrees across the two incoming paths to the merge block
        // (1 on the then-path, 0 on the fallthrough), so the print must
        // still read the variable, not a folded literal.
        let print_instr = propagated
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .find(|i| i.op == Op::Print)
            .unwrap();
        assert_ne!(print_instr.arg1.as_deref(), Some("1"));
    }

    #[test]
    fn floor_division_folds_with_negative_operands() {
        let cfg = cfg_for("begin int x = 7 / -2; end");
        let propagated = propagate(cfg);
        let has_minus_four = propagated
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .any(|i| i.op == Op::Copy && i.arg1.as_deref() == Some("-4"));
        assert!(has_minus_four);
    }
}
