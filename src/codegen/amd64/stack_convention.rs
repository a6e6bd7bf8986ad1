//! Conventions for stack usage.
use super::assembly::*;
use super::x86::*;

use Op::*;
use Operand::*;
use Register::*;

/// The stack frame of a function: space for its stack slots, and the
/// callee-saved registers it must preserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bytes reserved below the base pointer.
    pub locals: usize,
    pub callee_saved: Vec<Register>,
}
impl Frame {
    /// Construct a frame holding `slot_bytes` of stack slots. The locals are
    /// padded so that the stack pointer stays 16-byte aligned once the
    /// callee-saved registers have been pushed.
    pub fn new(slot_bytes: usize, callee_saved: Vec<Register>) -> Self {
        let pushed = 8 * callee_saved.len();
        let locals = (slot_bytes + pushed).next_multiple_of(16) - pushed;
        Self {
            locals,
            callee_saved,
        }
    }
}

pub trait StackConvention {
    fn add_prologue(block: &mut Block, frame: &Frame);
    fn add_epilogue(block: &mut Block, frame: &Frame);

    fn prologue(frame: &Frame) -> Block {
        let mut block = Block::new();
        Self::add_prologue(&mut block, frame);
        block
    }
    fn epilogue(frame: &Frame) -> Block {
        let mut block = Block::new();
        Self::add_epilogue(&mut block, frame);
        block
    }
}

/// The System V frame layout, shared by Linux and macOS.
pub struct SystemV;
impl StackConvention for SystemV {
    fn add_prologue(block: &mut Block, frame: &Frame) {
        block
            .push_cmt(Instr::bare(Push, vec![Reg(Rbp)]), "store base pointer")
            .push_cmt(
                Instr::bare(Mov, vec![Reg(Rbp), Reg(Rsp)]),
                "move base pointer down",
            );
        if frame.locals > 0 {
            block.push_cmt(
                Instr::bare(Sub, vec![Reg(Rsp), Imm(frame.locals as i64)]),
                "reserve stack slots",
            );
        }
        for reg in &frame.callee_saved {
            block.push_cmt(Instr::bare(Push, vec![Reg(*reg)]), "save callee-saved register");
        }
    }

    fn add_epilogue(block: &mut Block, frame: &Frame) {
        for reg in frame.callee_saved.iter().rev() {
            block.push_cmt(Instr::bare(Pop, vec![Reg(*reg)]), "restore callee-saved register");
        }
        block
            .push_cmt(
                Instr::bare(Mov, vec![Reg(Rsp), Reg(Rbp)]),
                "move stack pointer back up",
            )
            .push_cmt(Instr::bare(Pop, vec![Reg(Rbp)]), "restore previous base pointer")
            .push_cmt(Instr::bare(Ret, vec![]), "return to caller");
    }
}
