use std::collections::HashSet;

use crate::{
    cfg::{Cfg, NodeId},
    il::{TacInstr, TacListing},
    prelude::*,
};

type Live = HashSet<String>;

/// Remove instructions without side effects whose result is never read.
///
/// Variables in `aliased` are never removed: they may be read through a
/// pointer, by a called function, or after the function returns.
pub fn eliminate_dead_stores(listing: &mut TacListing, aliased: &HashSet<String>) {
    let cfg = Cfg::build(listing.as_slice());
    let instructions = listing.as_slice();
    let block_out = solve(&cfg, instructions, aliased);

    let mut dead = vec![false; listing.len()];
    for (block, mut live) in cfg.blocks().iter().zip(block_out) {
        for line in block.range.clone().rev() {
            let instr = &instructions[line];
            if is_dead(instr, &live, aliased) {
                dead[line] = true;
                continue;
            }
            transfer(&mut live, instr, aliased);
        }
    }

    let removed = dead.iter().filter(|d| **d).count();
    listing.retain_lines(|position, _| !dead[position.0]);
    if removed > 0 {
        debug!("removed {} dead stores", removed);
    }
}

fn is_dead(instr: &TacInstr, live_after: &Live, aliased: &HashSet<String>) -> bool {
    match instr.write() {
        Some(dst) if instr.is_pure() => {
            !live_after.contains(&dst.name) && !aliased.contains(&dst.name)
        }
        _ => false,
    }
}

/// Backward liveness analysis, returning the variables live at the end of each block.
fn solve(cfg: &Cfg, instructions: &[TacInstr], aliased: &HashSet<String>) -> Vec<Live> {
    let mut block_in: Vec<Live> = vec![Live::new(); cfg.len()];
    let mut block_out: Vec<Live> = vec![Live::new(); cfg.len()];

    let mut changed = true;
    while changed {
        changed = false;
        // Visiting blocks in reverse converges quickly for a backward analysis.
        for block in (0..cfg.len()).rev() {
            let mut live = Live::new();
            for succ in cfg.successors(NodeId::Block(block)) {
                match succ {
                    // Aliased variables may be read once the function returns.
                    NodeId::Exit => live.extend(aliased.iter().cloned()),
                    NodeId::Block(s) => live.extend(block_in[*s].iter().cloned()),
                    NodeId::Entry => unreachable!("no edges enter the entry node"),
                }
            }
            block_out[block] = live.clone();

            for instr in instructions[cfg.block(block).range.clone()].iter().rev() {
                if !is_dead(instr, &live, aliased) {
                    transfer(&mut live, instr, aliased);
                }
            }
            if live != block_in[block] {
                block_in[block] = live;
                changed = true;
            }
        }
    }
    block_out
}

fn transfer(live: &mut Live, instr: &TacInstr, aliased: &HashSet<String>) {
    if let Some(dst) = instr.write() {
        live.remove(&dst.name);
    }
    for value in instr.reads() {
        if let Some(var) = value.as_var() {
            live.insert(var.name.clone());
        }
    }
    match instr {
        // The callee may read any aliased variable, and a load may read
        // through a pointer to one.
        TacInstr::Call(..) | TacInstr::Load(..) => live.extend(aliased.iter().cloned()),
        _ => {}
    }
}
