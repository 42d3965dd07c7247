//! Reachability pruning: the optimizer's first pass.
//!
//! A depth-first walk from block 0 over successor edges marks every
//! block a real execution could reach. Anything else — orphaned blocks
//! left over from a `goto` the frontend never emits a jump to, or a
//! dead branch of a `constant_condition` `if` — is dropped, and the
//! survivors are renumbered `0..K-1` in DFS order so every later pass
//! can assume block 0 is still the entry and ids are dense.

use crate::cfg::{BasicBlock, Cfg};
use std::collections::{HashMap, HashSet};

pub fn prune(cfg: Cfg) -> Cfg {
    let mut reached = HashSet::new();
    let mut stack = vec![0usize];
    while let Some(id) = stack.pop() {
        if !reached.insert(id) {
            continue;
        }
        let mut succs: Vec<usize> = cfg.blocks[id].successors.iter().copied().collect();
        succs.sort_unstable();
        for s in succs.into_iter().rev() {
            stack.push(s);
        }
    }

    let mut keep: Vec<usize> = reached.into_iter().collect();
    keep.sort_unstable();

    let remap: HashMap<usize, usize> = keep.iter().enumerate().map(|(new, &old)| (old, new)).collect();

    let blocks: Vec<BasicBlock> = keep
        .iter()
        .enumerate()
        .map(|(new_id, &old_id)| {
            let old = &cfg.blocks[old_id];
            BasicBlock {
                id: new_id,
                start: old.start,
                end: old.end,
                instructions: old.instructions.clone(),
                successors: old.successors.iter().filter_map(|s| remap.get(s).copied()).collect(),
                predecessors: old.predecessors.iter().filter_map(|p| remap.get(p).copied()).collect(),
            }
        })
        .collect();

    Cfg { function: cfg.function, blocks }
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
    fn renumbers_surviving_blocks_densely_from_zero() {
        let cfg = cfg_for("begin if (true) { print(1); } else { print(2); } end");
        let pruned = prune(cfg);
        let ids: Vec<usize> = pruned.blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, (0..pruned.blocks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn predecessor_successor_symmetry_survives_pruning() {
        let cfg = cfg_for("begin int i = 0; while (i < 3) { i = i + 1; } end");
        let pruned = prune(cfg);
        for block in &pruned.blocks {
            for &succ in &block.successors {
                assert!(pruned.blocks[succ].predecessors.contains(&block.id));
            }
        }
    }

    #[test]
    fn entry_block_is_always_kept() {
        let cfg = cfg_for("begin print(1); end");
        let pruned = prune(cfg);
        assert_eq!(pruned.entry().id, 0);
    }
}
