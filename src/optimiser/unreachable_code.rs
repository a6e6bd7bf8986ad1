use std::collections::HashSet;

use crate::{
    cfg::Cfg,
    il::{TacInstr, TacListing},
    prelude::*,
};

/// Remove blocks that cannot be reached from the function entry, jumps to the
/// instruction that follows them anyway, and labels nothing jumps to.
pub fn eliminate_unreachable_code(listing: &mut TacListing) {
    let before = listing.len();

    remove_unreachable_blocks(listing);
    remove_redundant_jumps(listing);
    remove_unused_labels(listing);

    if listing.len() != before {
        debug!("removed {} unreachable instructions", before - listing.len());
    }
}

fn remove_unreachable_blocks(listing: &mut TacListing) {
    let cfg = Cfg::build(listing.as_slice());
    let reachable = cfg.reachable();
    let mut dead = vec![false; listing.len()];
    for (block, _) in reachable.iter().enumerate().filter(|(_, r)| !**r) {
        for line in cfg.block(block).range.clone() {
            dead[line] = true;
        }
    }
    listing.retain_lines(|position, _| !dead[position.0]);
}

/// A jump is redundant if its target is one of the labels immediately after it.
fn remove_redundant_jumps(listing: &mut TacListing) {
    let instructions = listing.as_slice();
    let redundant: Vec<bool> = instructions
        .iter()
        .enumerate()
        .map(|(i, instr)| match instr.jump_target() {
            Some(target) => instructions[i + 1..]
                .iter()
                .map_while(TacInstr::as_label)
                .any(|label| label == target),
            None => false,
        })
        .collect();
    listing.retain_lines(|position, _| !redundant[position.0]);
}

fn remove_unused_labels(listing: &mut TacListing) {
    let targets: HashSet<_> = listing
        .iter_instructions()
        .filter_map(TacInstr::jump_target)
        .cloned()
        .collect();
    listing.retain_lines(|_, instr| match instr {
        TacInstr::Label(label) => targets.contains(label),
        _ => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{testing::*, BinOp};

    macro_rules! assert_eliminates {
        ($input:expr, $expected:expr) => {{
            let mut listing: TacListing = $input.into();
            eliminate_unreachable_code(&mut listing);
            let expected: Vec<&str> = $expected;
            assert_eq!(expected, render(&listing));
        }};
    }

    #[test]
    fn code_after_return_is_removed() {
        assert_eliminates!(
            vec![
                TacInstr::Return(Some(cnst(1))),
                TacInstr::Copy(int("x"), cnst(2)),
                TacInstr::Return(Some(var("x"))),
            ],
            vec!["return 1"]
        );
    }

    #[test]
    fn jump_to_next_instruction_is_removed() {
        assert_eliminates!(
            vec![
                TacInstr::JumpIfZero(var("c"), lbl("end")),
                TacInstr::Label(lbl("end")),
                TacInstr::Return(Some(var("c"))),
            ],
            vec!["return c"]
        );
    }

    #[test]
    fn jump_to_any_directly_following_label_is_removed() {
        assert_eliminates!(
            vec![
                TacInstr::JumpIfZero(var("c"), lbl("b")),
                TacInstr::Label(lbl("a")),
                TacInstr::Label(lbl("b")),
                TacInstr::Jump(lbl("a")),
            ],
            vec!["a_1:", "goto a_1"]
        );
    }

    #[test]
    fn loop_body_stays_reachable() {
        assert_eliminates!(
            vec![
                TacInstr::Label(lbl("loop")),
                TacInstr::Bin(int("i"), BinOp::Add, var("i"), cnst(1)),
                TacInstr::JumpIfNotZero(var("i"), lbl("loop")),
                TacInstr::Return(Some(var("i"))),
            ],
            vec!["loop_1:", "i = i + 1", "if_not_zero i goto loop_1", "return i"]
        );
    }

    #[test]
    fn unreachable_block_behind_jump_is_removed() {
        assert_eliminates!(
            vec![
                TacInstr::Jump(lbl("end")),
                TacInstr::Label(lbl("dead")),
                TacInstr::Copy(int("x"), cnst(1)),
                TacInstr::Label(lbl("end")),
                TacInstr::Return(Some(cnst(0))),
            ],
            vec!["return 0"]
        );
    }
}
