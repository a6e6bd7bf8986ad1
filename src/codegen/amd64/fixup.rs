//! Rewriting of allocated instructions whose operands x86-64 cannot encode,
//! such as two memory operands or an immediate destination. Offending operands
//! are routed through scratch registers which the allocator never assigns.

use crate::listing::Listing;

use super::{
    assembly::{Instr, Operand},
    op_semantics::{directions, op_semantics},
    x86::{AsmType, Op, Register},
};

use Operand::*;
use Register::*;

/// Scratch register for destinations.
fn destination_scratch(size: AsmType) -> Register {
    if size == AsmType::Double {
        Xmm15
    } else {
        R11
    }
}

/// Scratch register for sources.
fn source_scratch(size: AsmType) -> Register {
    if size == AsmType::Double {
        Xmm14
    } else {
        R10
    }
}

fn is_self_move(instr: &Instr) -> bool {
    instr.is_move() && instr.operands[0] == instr.operands[1]
}

/// Returns `true` if the operand at `index` cannot be encoded in its position.
fn is_illegal(instr: &Instr, index: usize) -> bool {
    let semantics = op_semantics(instr, index);
    let operand = &instr.operands[index];
    match operand {
        Imm(_) if !semantics.immediate => true,
        // Only `mov` into a register takes a full 64-bit immediate.
        Imm(_) if operand.is_large_immediate() => {
            !(instr.op == Op::Mov && index == 1 && instr.operands[0].is_register())
        }
        _ if operand.is_memory() && !semantics.memory => true,
        // At most one operand may be in memory.
        _ if operand.is_memory() && index == 1 => instr.operands[0].is_memory(),
        _ => false,
    }
}

/// Rewrite a single instruction into one or more encodable instructions.
pub fn fix_instr(mut instr: Instr, out: &mut Listing<Instr>) {
    if is_self_move(&instr) {
        return;
    }

    // There is no `push` for SSE registers.
    if let (Op::Push, [Reg(reg)]) = (instr.op, instr.operands.as_slice()) {
        if reg.is_sse() {
            let reg = *reg;
            out.push(Instr::bare(Op::Sub, vec![Reg(Rsp), Imm(8)]));
            out.push(Instr::new(Op::Mov, AsmType::Double, vec![Memory(Rsp, 0), Reg(reg)]));
            return;
        }
    }

    let directions = directions(&instr);
    let sizes = instr.operand_sizes();
    let mut after = None;

    if !instr.operands.is_empty() && is_illegal(&instr, 0) {
        // A lone operand that is only read is a source.
        let scratch = if instr.operands.len() == 1 && !directions[0].writes() {
            Reg(source_scratch(sizes[0]))
        } else {
            Reg(destination_scratch(sizes[0]))
        };
        let original = std::mem::replace(&mut instr.operands[0], scratch.clone());
        if directions[0].reads() {
            out.push(Instr::new(Op::Mov, instr.size, vec![scratch.clone(), original.clone()]));
        }
        if directions[0].writes() {
            after = Some(Instr::new(Op::Mov, instr.size, vec![original, scratch]));
        }
    }

    if instr.operands.len() > 1 && is_illegal(&instr, 1) {
        let scratch = Reg(source_scratch(sizes[1]));
        let original = std::mem::replace(&mut instr.operands[1], scratch.clone());
        out.push(Instr::new(Op::Mov, sizes[1], vec![scratch, original]));
    }

    out.push(instr);
    if let Some(store) = after {
        out.push(store);
    }
}

/// Rewrite every instruction of a function body.
pub fn fix_up(body: Listing<Instr>) -> Listing<Instr> {
    let mut fixed = Listing::new();
    for instr in body.into_vec() {
        fix_instr(instr, &mut fixed);
    }
    fixed
}
