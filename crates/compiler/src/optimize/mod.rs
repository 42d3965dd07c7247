//! Optimizer pipeline: reachability, constant propagation, local CSE,
//! LICM, dead-store elimination — each pass rewrites a [`Cfg`] in place
//! and hands it to the next.

pub mod constprop;
pub mod cse;
pub mod dse;
pub mod licm;
pub mod reachability;

use crate::cfg::Cfg;

pub fn optimize(cfg: Cfg) -> Cfg {
    let cfg = reachability::prune(cfg);
    let cfg = constprop::propagate(cfg);
    let cfg = cse::eliminate(cfg);
    let cfg = licm::hoist(cfg);
    dse::eliminate(cfg)
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
    fn pipeline_keeps_block_ids_contiguous() {
        let cfg = cfg_for("begin int x = 1 + 2; if (x == 3) { print(x); } end");
        let optimized = optimize(cfg);
        let ids: Vec<usize> = optimized.blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, (0..optimized.blocks.len()).collect::<Vec<_>>());
    }
}
