//! What instructions do with their operands: which operands are read or
//! written, which registers are used implicitly, and which kinds of operand
//! each position accepts.

use super::{
    assembly::{Instr, Operand},
    x86::{AsmType, Op, Register, CALLER_SAVED},
};

use Register::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
    ReadWrite,
}
impl Direction {
    pub fn reads(&self) -> bool {
        matches!(self, Direction::Read | Direction::ReadWrite)
    }

    pub fn writes(&self) -> bool {
        matches!(self, Direction::Write | Direction::ReadWrite)
    }
}

/// Describes what types of locations are accepted for an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSemantics {
    pub immediate: bool,
    pub memory: bool,
}
impl OpSemantics {
    /// The operand may be placed in memory or in a register, or be an immediate.
    fn any() -> Self {
        Self {
            immediate: true,
            memory: true,
        }
    }
    /// The operand may be placed in memory or in a register.
    fn reg_or_mem() -> Self {
        Self {
            immediate: false,
            memory: true,
        }
    }
    /// The operand must be a register.
    fn reg() -> Self {
        Self {
            immediate: false,
            memory: false,
        }
    }
}

/// How each operand of the instruction is accessed.
pub fn directions(instr: &Instr) -> Vec<Direction> {
    use Direction::*;
    match instr.op {
        Op::Mov
        | Op::Movsx(_)
        | Op::Movzx(_)
        | Op::Lea
        | Op::Cvttsd2si
        | Op::Cvtsi2sd(_)
        | Op::Pop => vec![Write, Read],
        // `xor r, r` does not depend on the previous value of `r`.
        Op::Xor if instr.operands.len() == 2 && instr.operands[0] == instr.operands[1] => {
            vec![Write, Write]
        }
        Op::Add | Op::Sub | Op::Imul | Op::And | Op::Or | Op::Xor | Op::Sal | Op::Sar | Op::Shr => {
            vec![ReadWrite, Read]
        }
        // `set` only replaces the lowest byte of its destination.
        Op::Neg | Op::Not | Op::Setcc(_) => vec![ReadWrite],
        Op::Cmp | Op::Comisd | Op::Idiv | Op::Div | Op::Push => vec![Read; instr.operands.len()],
        Op::Call | Op::Ret | Op::Cdq | Op::Jmp | Op::Jcc(_) | Op::Label => {
            vec![Read; instr.operands.len()]
        }
    }
    .into_iter()
    .take(instr.operands.len())
    .collect()
}

/// Registers read by the instruction which do not appear among its operands.
/// `arguments` are the registers holding the arguments of a call.
pub fn implicit_reads(instr: &Instr, arguments: &[Register]) -> Vec<Register> {
    match instr.op {
        Op::Idiv | Op::Div => vec![Rax, Rdx],
        Op::Cdq => vec![Rax],
        Op::Call => arguments.to_vec(),
        _ => vec![],
    }
}

/// Registers written by the instruction which do not appear among its operands.
pub fn implicit_writes(instr: &Instr) -> Vec<Register> {
    match instr.op {
        Op::Idiv | Op::Div => vec![Rax, Rdx],
        Op::Cdq => vec![Rdx],
        Op::Call => CALLER_SAVED.to_vec(),
        _ => vec![],
    }
}

/// The kinds of location accepted at each operand position.
pub fn op_semantics(instr: &Instr, index: usize) -> OpSemantics {
    let double = instr.size == AsmType::Double;
    match (instr.op, index) {
        (Op::Mov, 0) => OpSemantics::reg_or_mem(),
        (Op::Mov, _) if double => OpSemantics::reg_or_mem(),
        (Op::Mov, _) => OpSemantics::any(),
        (Op::Movsx(_) | Op::Movzx(_) | Op::Lea | Op::Cvttsd2si | Op::Cvtsi2sd(_), 0) => {
            OpSemantics::reg()
        }
        (Op::Movsx(_) | Op::Movzx(_) | Op::Cvttsd2si | Op::Cvtsi2sd(_), _) => {
            OpSemantics::reg_or_mem()
        }
        (Op::Lea, _) => OpSemantics {
            immediate: false,
            memory: true,
        },
        // SSE arithmetic needs a register destination.
        (Op::Add | Op::Sub | Op::Imul | Op::Div | Op::Xor | Op::Cmp, 0) if double => {
            OpSemantics::reg()
        }
        (Op::Add | Op::Sub | Op::Imul | Op::Div | Op::Xor | Op::Cmp, _) if double => {
            OpSemantics::reg_or_mem()
        }
        (Op::Comisd, 0) => OpSemantics::reg(),
        (Op::Comisd, _) => OpSemantics::reg_or_mem(),
        (Op::Imul, 0) => OpSemantics::reg(),
        (Op::Add | Op::Sub | Op::And | Op::Or | Op::Xor | Op::Cmp | Op::Sal | Op::Sar | Op::Shr, 0) => {
            OpSemantics::reg_or_mem()
        }
        (Op::Add | Op::Sub | Op::Imul | Op::And | Op::Or | Op::Xor | Op::Cmp, _) => {
            OpSemantics::any()
        }
        (Op::Sal | Op::Sar | Op::Shr, _) => OpSemantics {
            immediate: true,
            memory: false,
        },
        (Op::Idiv | Op::Div | Op::Neg | Op::Not | Op::Setcc(_), _) => OpSemantics::reg_or_mem(),
        (Op::Push, _) => OpSemantics::any(),
        (Op::Pop, _) => OpSemantics::reg_or_mem(),
        (Op::Call | Op::Ret | Op::Cdq | Op::Jmp | Op::Jcc(_) | Op::Label, _) => OpSemantics::any(),
    }
}

/// Registers used to compute the address of a memory operand.
pub fn address_registers(operand: &Operand) -> Option<Register> {
    match operand {
        Operand::Memory(reg, _) => Some(*reg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use Operand::*;

    #[test]
    fn arithmetic_reads_and_writes_its_destination() {
        let instr = Instr::new(Op::Add, AsmType::Longword, vec![Reg(Rax), Reg(Rcx)]);
        assert_eq!(vec![Direction::ReadWrite, Direction::Read], directions(&instr));
    }

    #[test]
    fn xor_with_itself_only_writes() {
        let instr = Instr::new(Op::Xor, AsmType::Longword, vec![Reg(Rdx), Reg(Rdx)]);
        assert!(directions(&instr).iter().all(|d| !d.reads()));
    }

    #[test]
    fn division_uses_rax_and_rdx() {
        let instr = Instr::new(Op::Idiv, AsmType::Longword, vec![Reg(Rcx)]);
        assert_eq!(vec![Rax, Rdx], implicit_reads(&instr, &[]));
        assert_eq!(vec![Rax, Rdx], implicit_writes(&instr));
    }

    #[test]
    fn calls_clobber_caller_saved_registers() {
        let instr = Instr::bare(Op::Call, vec![Id("f".to_string())]);
        let writes = implicit_writes(&instr);
        assert!(writes.contains(&Rax));
        assert!(writes.contains(&Xmm15));
        assert!(!writes.contains(&Rbx));
        assert_eq!(vec![Rdi], implicit_reads(&instr, &[Rdi]));
    }

    #[test]
    fn sse_arithmetic_requires_register_destination() {
        let instr = Instr::new(Op::Add, AsmType::Double, vec![Memory(Rbp, -8), Reg(Xmm0)]);
        assert!(!op_semantics(&instr, 0).memory);
        assert!(op_semantics(&instr, 1).memory);
    }
}
