//! Control-flow graph construction from a flat instruction list
//!
//! Leaders partition the list into blocks; a block's last instruction
//! determines its successors; predecessors are the inverse of
//! successors. Block ids are `0..N-1` with block 0 always the entry.

use crate::ir::{Instr, IrFunction, Op};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    pub instructions: Vec<Instr>,
    pub successors: HashSet<usize>,
    pub predecessors: HashSet<usize>,
}

#[derive(Debug, Clone)]
pub struct Cfg {
    pub function: String,
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    pub fn entry(&self) -> &BasicBlock {
        &self.blocks[0]
    }
}

pub fn build(function: &IrFunction) -> Cfg {
    let instrs = &function.instructions;
    let leaders = find_leaders(instrs);
    let mut starts: Vec<usize> = leaders.into_iter().collect();
    starts.sort_unstable();

    let mut blocks = Vec::new();
    for (idx, &start) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).copied().unwrap_or(instrs.len());
        blocks.push(BasicBlock {
            id: idx,
            start,
            end,
            instructions: instrs[start..end].to_vec(),
            successors: HashSet::new(),
            predecessors: HashSet::new(),
        });
    }

    let label_to_block: HashMap<String, usize> = blocks
        .iter()
        .filter_map(|b| match b.instructions.first() {
            Some(Instr { op: Op::Label, arg1: Some(l), .. }) => Some((l.clone(), b.id)),
            _ => None,
        })
        .collect();

    let block_count = blocks.len();
    for i in 0..block_count {
        let last = blocks[i].instructions.last().cloned();
        let successors = match last {
            Some(Instr { op: Op::Goto, arg1: Some(target), .. }) => {
                label_to_block.get(&target).map(|&b| vec![b]).unwrap_or_default()
            }
            Some(Instr { op: Op::Ifz, arg2: Some(target), .. }) | Some(Instr { op: Op::Ifnz, arg2: Some(target), .. }) => {
                let mut succs = Vec::new();
                if let Some(&b) = label_to_block.get(&target) {
                    succs.push(b);
                }
                if i + 1 < block_count {
                    succs.push(i + 1);
                }
                succs
            }
            Some(Instr { op: Op::Return, .. }) => Vec::new(),
            _ => {
                if i + 1 < block_count {
                    vec![i + 1]
                } else {
                    Vec::new()
                }
            }
        };
        blocks[i].successors = successors.into_iter().collect();
    }

    for i in 0..block_count {
        let succs: Vec<usize> = blocks[i].successors.iter().copied().collect();
        for s in succs {
            blocks[s].predecessors.insert(i);
        }
    }

    Cfg { function: function.name.clone(), blocks }
}

fn find_leaders(instrs: &[Instr]) -> HashSet<usize> {
    let mut leaders = HashSet::new();
    if !instrs.is_empty() {
        leaders.insert(0);
    }
    let label_index: HashMap<&str, usize> = instrs
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| match instr {
            Instr { op: Op::Label, arg1: Some(l), .. } => Some((l.as_str(), i)),
            _ => None,
        })
        .collect();

    for (i, instr) in instrs.iter().enumerate() {
        if instr.op.terminates_block() {
            if i + 1 < instrs.len() {
                leaders.insert(i + 1);
            }
        }
        let target = match instr.op {
            Op::Goto => instr.arg1.as_deref(),
            Op::Ifz | Op::Ifnz => instr.arg2.as_deref(),
            _ => None,
        };
        if let Some(label) = target {
            if let Some(&idx) = label_index.get(label) {
                leaders.insert(idx);
            }
        }
    }
    leaders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{self};
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic;

    fn cfg_for(src: &str, fn_name: &str) -> Cfg {
        let tokens = Lexer::new(src).tokenize().unwrap().tokens;
        let program = Parser::new(tokens).parse().unwrap();
        let sem = semantic::analyze(&program).unwrap();
        let funcs = ir::generate(&program, &sem);
        let f = funcs.iter().find(|f| f.name == fn_name).unwrap();
        build(f)
    }

    #[test]
    fn block_ids_are_contiguous_from_zero() {
        let cfg = cfg_for("begin int i = 0; while (i < 3) { i = i + 1; } end", "__main__");
        let ids: Vec<usize> = cfg.blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, (0..cfg.blocks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn predecessors_are_inverse_of_successors() {
        let cfg = cfg_for("begin if (true) { print(1); } else { print(2); } end", "__main__");
        for block in &cfg.blocks {
            for &succ in &block.successors {
                assert!(cfg.blocks[succ].predecessors.contains(&block.id));
            }
        }
    }

    #[test]
    fn return_block_has_no_successors() {
        let cfg = cfg_for("func f() -> int { return 1; }", "f");
        let last = cfg.blocks.last().unwrap();
        assert!(last.instructions.last().map(|i| i.op == ir::Op::Return).unwrap_or(false));
        assert!(last.successors.is_empty());
    }
}
