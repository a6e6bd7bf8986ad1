//! Control-flow graphs over instruction listings.
//!
//! Basic blocks are index ranges into the listing they were built from. The
//! graph is stored as an arena of blocks; edges refer to blocks by [`NodeId`].

use std::{collections::HashMap, hash::Hash, ops::Range};

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow<'a, L> {
    /// A jump target.
    Label(&'a L),
    /// An unconditional jump.
    Jump(&'a L),
    /// A conditional jump, which falls through to the next instruction when not taken.
    Branch(&'a L),
    /// Leaves the function.
    Return,
    /// Continues with the next instruction.
    Next,
}

/// Instructions that can be arranged into a control-flow graph.
pub trait ControlFlow {
    type Label: Eq + Hash;

    fn flow(&self) -> Flow<'_, Self::Label>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Entry,
    Block(usize),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// The instructions of this block, as indices into the listing.
    pub range: Range<usize>,
    pub successors: Vec<NodeId>,
    pub predecessors: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    entry_successors: Vec<NodeId>,
    exit_predecessors: Vec<NodeId>,
}

impl Cfg {
    /// Partition the instructions into basic blocks and connect them.
    pub fn build<T: ControlFlow>(instructions: &[T]) -> Self {
        let ranges = partition(instructions);

        let block_of_label: HashMap<&T::Label, usize> = ranges
            .iter()
            .enumerate()
            .filter_map(|(block, range)| match instructions[range.start].flow() {
                Flow::Label(label) => Some((label, block)),
                _ => None,
            })
            .collect();

        let mut cfg = Cfg {
            blocks: ranges
                .iter()
                .map(|range| BasicBlock {
                    range: range.clone(),
                    successors: vec![],
                    predecessors: vec![],
                })
                .collect(),
            entry_successors: vec![],
            exit_predecessors: vec![],
        };

        let first = if ranges.is_empty() {
            NodeId::Exit
        } else {
            NodeId::Block(0)
        };
        cfg.add_edge(NodeId::Entry, first);

        for (block, range) in ranges.iter().enumerate() {
            let fallthrough = if block + 1 < ranges.len() {
                NodeId::Block(block + 1)
            } else {
                NodeId::Exit
            };
            let target = |label: &T::Label| {
                block_of_label
                    .get(label)
                    .map(|&b| NodeId::Block(b))
                    // Jumps to missing labels are rejected by verification;
                    // treat them as leaving the function.
                    .unwrap_or(NodeId::Exit)
            };

            let from = NodeId::Block(block);
            match instructions[range.end - 1].flow() {
                Flow::Jump(label) => cfg.add_edge(from, target(label)),
                Flow::Branch(label) => {
                    cfg.add_edge(from, target(label));
                    cfg.add_edge(from, fallthrough);
                }
                Flow::Return => cfg.add_edge(from, NodeId::Exit),
                Flow::Label(_) | Flow::Next => cfg.add_edge(from, fallthrough),
            }
        }

        cfg
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let successors = match from {
            NodeId::Entry => &mut self.entry_successors,
            NodeId::Block(b) => &mut self.blocks[b].successors,
            NodeId::Exit => unreachable!("edges never leave the exit node"),
        };
        if successors.contains(&to) {
            return;
        }
        successors.push(to);

        match to {
            NodeId::Entry => unreachable!("edges never enter the entry node"),
            NodeId::Block(b) => self.blocks[b].predecessors.push(from),
            NodeId::Exit => self.exit_predecessors.push(from),
        }
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> &BasicBlock {
        &self.blocks[index]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        match node {
            NodeId::Entry => &self.entry_successors,
            NodeId::Block(b) => &self.blocks[b].successors,
            NodeId::Exit => &[],
        }
    }

    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        match node {
            NodeId::Entry => &[],
            NodeId::Block(b) => &self.blocks[b].predecessors,
            NodeId::Exit => &self.exit_predecessors,
        }
    }

    /// For every block, whether it can be reached from the entry node.
    pub fn reachable(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.blocks.len()];
        let mut worklist = vec![NodeId::Entry];
        while let Some(node) = worklist.pop() {
            for &succ in self.successors(node) {
                if let NodeId::Block(b) = succ {
                    if !reachable[b] {
                        reachable[b] = true;
                        worklist.push(succ);
                    }
                }
            }
        }
        reachable
    }
}

/// Split the listing into maximal runs with a single entry and a single exit.
fn partition<T: ControlFlow>(instructions: &[T]) -> Vec<Range<usize>> {
    let mut ranges = vec![];
    let mut start = 0;
    for (i, instr) in instructions.iter().enumerate() {
        match instr.flow() {
            Flow::Label(_) => {
                if start < i {
                    ranges.push(start..i);
                }
                start = i;
            }
            Flow::Jump(_) | Flow::Branch(_) | Flow::Return => {
                ranges.push(start..i + 1);
                start = i + 1;
            }
            Flow::Next => {}
        }
    }
    if start < instructions.len() {
        ranges.push(start..instructions.len());
    }
    ranges
}
