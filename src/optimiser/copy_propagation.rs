use std::collections::{HashSet, VecDeque};

use crate::{
    cfg::{Cfg, NodeId},
    il::{TacInstr, TacListing, Value, Variable},
    prelude::*,
};

/// A copy `dst = src` known to hold at a program point.
type Copy = (Variable, Value);

/// The copies reaching a program point. `None` is the set of all copies, used
/// for blocks which have not been visited yet.
type Reaching = Option<HashSet<Copy>>;

/// Replace uses of variables with the value they were copied from, and remove
/// copies which are already known to hold.
///
/// A copy `x = y` reaches a use of `x` only if it holds on every path to the
/// use. Since any variable in `aliased` may be modified through a pointer,
/// copies involving such variables do not survive function calls or stores.
pub fn propagate_copies(listing: &mut TacListing, aliased: &HashSet<String>) {
    let cfg = Cfg::build(listing.as_slice());
    let block_in = solve(&cfg, listing.as_slice(), aliased);

    let mut redundant = vec![false; listing.len()];
    let mut rewritten = 0;
    let instructions = listing.as_mut_slice();
    for (block, reaching) in cfg.blocks().iter().zip(block_in) {
        // Blocks which were never visited are unreachable; leave them alone.
        let mut copies = reaching.unwrap_or_default();
        for line in block.range.clone() {
            let instr = &mut instructions[line];
            for value in instr.reads_mut() {
                if let Some(replacement) = known_source(&copies, value) {
                    *value = replacement;
                    rewritten += 1;
                }
            }
            if let TacInstr::Copy(dst, src) = instr {
                if is_known(&copies, dst, src) {
                    redundant[line] = true;
                    continue;
                }
            }
            transfer(&mut copies, instr, aliased);
        }
    }

    let removed = redundant.iter().filter(|r| **r).count();
    listing.retain_lines(|position, _| !redundant[position.0]);
    if rewritten + removed > 0 {
        debug!(
            "propagated {} copies, removed {} redundant copies",
            rewritten, removed
        );
    }
}

/// Forward dataflow analysis, returning the copies reaching the start of each block.
fn solve(cfg: &Cfg, instructions: &[TacInstr], aliased: &HashSet<String>) -> Vec<Reaching> {
    let mut block_in: Vec<Reaching> = vec![None; cfg.len()];
    let mut block_out: Vec<Reaching> = vec![None; cfg.len()];
    let mut worklist: VecDeque<usize> = (0..cfg.len()).collect();
    let mut queued = vec![true; cfg.len()];

    while let Some(block) = worklist.pop_front() {
        queued[block] = false;

        let mut copies = meet(cfg, NodeId::Block(block), &block_out);
        block_in[block] = Some(copies.clone());
        for instr in &instructions[cfg.block(block).range.clone()] {
            if let TacInstr::Copy(dst, src) = instr {
                if is_known(&copies, dst, src) {
                    continue;
                }
            }
            transfer(&mut copies, instr, aliased);
        }

        if block_out[block].as_ref() != Some(&copies) {
            block_out[block] = Some(copies);
            for succ in cfg.successors(NodeId::Block(block)) {
                if let NodeId::Block(s) = succ {
                    if !queued[*s] {
                        queued[*s] = true;
                        worklist.push_back(*s);
                    }
                }
            }
        }
    }
    block_in
}

/// Intersect the copies leaving every predecessor. The function entry has no
/// known copies.
fn meet(cfg: &Cfg, node: NodeId, block_out: &[Reaching]) -> HashSet<Copy> {
    let mut result: Reaching = None;
    for pred in cfg.predecessors(node) {
        let incoming = match pred {
            NodeId::Entry => Some(HashSet::new()),
            NodeId::Block(b) => block_out[*b].clone(),
            NodeId::Exit => unreachable!("the exit node has no successors"),
        };
        result = match (result, incoming) {
            (None, incoming) => incoming,
            (result, None) => result,
            (Some(a), Some(b)) => Some(a.intersection(&b).cloned().collect()),
        };
    }
    result.unwrap_or_default()
}

fn is_known(copies: &HashSet<Copy>, dst: &Variable, src: &Value) -> bool {
    if src.as_var() == Some(dst) {
        return true;
    }
    if copies.contains(&(dst.clone(), src.clone())) {
        return true;
    }
    match src {
        Value::Var(src) => copies.contains(&(src.clone(), Value::Var(dst.clone()))),
        Value::Const(_) => false,
    }
}

fn known_source(copies: &HashSet<Copy>, value: &Value) -> Option<Value> {
    let var = value.as_var()?;
    copies
        .iter()
        .find(|(dst, _)| dst == var)
        .map(|(_, src)| src.clone())
}

fn transfer(copies: &mut HashSet<Copy>, instr: &TacInstr, aliased: &HashSet<String>) {
    match instr {
        TacInstr::Call(..) | TacInstr::Store(..) => {
            copies.retain(|(dst, src)| {
                !aliased.contains(&dst.name) && !src.as_var().is_some_and(|v| aliased.contains(&v.name))
            });
        }
        _ => {}
    }

    if let Some(written) = instr.write() {
        copies.retain(|(dst, src)| dst != written && src.as_var() != Some(written));
    }

    if let TacInstr::Copy(dst, src) = instr {
        if dst.ty == src.ty() && src.as_var() != Some(dst) {
            copies.insert((dst.clone(), src.clone()));
        }
    }
}
