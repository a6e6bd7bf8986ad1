//! Backward liveness analysis over the control-flow graph of a [`Target`].

use std::collections::BTreeSet;

use crate::{
    cfg::{Cfg, NodeId},
    prelude::*,
};

use super::{Location, Target};

type LiveSet<R> = BTreeSet<Location<R>>;

/// The locations live before and after every instruction of a function.
/// Only locations taking part in allocation are tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Liveness<R> {
    live_in: Vec<LiveSet<R>>,
    live_out: Vec<LiveSet<R>>,
}
impl<R: Ord + Clone> Liveness<R> {
    /// The locations live immediately before the instruction at `index`.
    pub fn live_in(&self, index: usize) -> &BTreeSet<Location<R>> {
        &self.live_in[index]
    }

    /// The locations live immediately after the instruction at `index`.
    pub fn live_out(&self, index: usize) -> &BTreeSet<Location<R>> {
        &self.live_out[index]
    }

    pub fn len(&self) -> usize {
        self.live_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_out.is_empty()
    }
}

/// Compute the live-out set of every instruction. Values live at the function
/// exit are the target's exit registers; a return is followed by nothing else.
pub fn analyse<T: Target>(target: &T) -> Liveness<T::Register> {
    let instructions = target.instructions();
    let cfg = Cfg::build(instructions);

    let exit: LiveSet<T::Register> = target
        .exit_live()
        .into_iter()
        .map(Location::Reg)
        .filter(|l| target.class_of(l).is_some())
        .collect();

    let mut block_in: Vec<LiveSet<T::Register>> = vec![BTreeSet::new(); cfg.len()];
    let mut changed = true;
    let mut iterations = 0;
    while changed {
        changed = false;
        iterations += 1;
        for block in (0..cfg.len()).rev() {
            let mut live = block_out(&cfg, block, &block_in, &exit);
            for index in cfg.block(block).range.clone().rev() {
                transfer(target, index, &mut live);
            }
            if live != block_in[block] {
                block_in[block] = live;
                changed = true;
            }
        }
    }
    trace!("liveness converged after {} iterations", iterations);

    let mut live_in = vec![BTreeSet::new(); instructions.len()];
    let mut live_out = vec![BTreeSet::new(); instructions.len()];
    for block in 0..cfg.len() {
        let mut live = block_out(&cfg, block, &block_in, &exit);
        for index in cfg.block(block).range.clone().rev() {
            live_out[index] = live.clone();
            transfer(target, index, &mut live);
            live_in[index] = live.clone();
        }
    }
    Liveness { live_in, live_out }
}

fn block_out<R: Ord + Clone>(
    cfg: &Cfg,
    block: usize,
    block_in: &[LiveSet<R>],
    exit: &LiveSet<R>,
) -> LiveSet<R> {
    let mut live = BTreeSet::new();
    for succ in cfg.successors(NodeId::Block(block)) {
        match succ {
            NodeId::Exit => live.extend(exit.iter().cloned()),
            NodeId::Block(s) => live.extend(block_in[*s].iter().cloned()),
            NodeId::Entry => unreachable!("no edges enter the entry node"),
        }
    }
    live
}

fn transfer<T: Target>(target: &T, index: usize, live: &mut LiveSet<T::Register>) {
    for written in target.writes(index) {
        live.remove(&written);
    }
    for read in target.reads(index) {
        if target.class_of(&read).is_some() {
            live.insert(read);
        }
    }
}
