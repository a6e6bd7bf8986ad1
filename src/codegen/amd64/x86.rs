use std::fmt::{self, Display, Formatter};

use crate::il::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
    Xmm8,
    Xmm9,
    Xmm10,
    Xmm11,
    Xmm12,
    Xmm13,
    Xmm14,
    Xmm15,
}

use Register::*;

/// General purpose registers available to the register allocator, caller-saved first.
/// `r10` and `r11` are kept free for fixing up illegal instructions.
pub const GENERAL_PURPOSE_COLOURS: &[Register] =
    &[Rax, Rcx, Rdx, Rsi, Rdi, R8, R9, Rbx, R12, R13, R14, R15];

/// SSE registers available to the register allocator. `xmm14` and `xmm15` are
/// kept free for fixing up illegal instructions.
pub const SSE_COLOURS: &[Register] = &[
    Xmm0, Xmm1, Xmm2, Xmm3, Xmm4, Xmm5, Xmm6, Xmm7, Xmm8, Xmm9, Xmm10, Xmm11, Xmm12, Xmm13,
];

pub const CALLEE_SAVED: &[Register] = &[Rbx, R12, R13, R14, R15];

/// Every register whose value may be destroyed by a function call.
pub const CALLER_SAVED: &[Register] = &[
    Rax, Rcx, Rdx, Rsi, Rdi, R8, R9, R10, R11, Xmm0, Xmm1, Xmm2, Xmm3, Xmm4, Xmm5, Xmm6, Xmm7,
    Xmm8, Xmm9, Xmm10, Xmm11, Xmm12, Xmm13, Xmm14, Xmm15,
];

/// The class of a register determines which instructions can use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegClass {
    General,
    Sse,
}
impl RegClass {
    /// The registers of this class that may be assigned by the allocator.
    pub fn colours(&self) -> &'static [Register] {
        match self {
            RegClass::General => GENERAL_PURPOSE_COLOURS,
            RegClass::Sse => SSE_COLOURS,
        }
    }
}
impl Display for RegClass {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            RegClass::General => "general",
            RegClass::Sse => "sse",
        })
    }
}

impl Register {
    pub fn class(&self) -> RegClass {
        if self.is_sse() {
            RegClass::Sse
        } else {
            RegClass::General
        }
    }

    pub fn is_sse(&self) -> bool {
        *self >= Xmm0
    }

    pub fn is_callee_saved(&self) -> bool {
        CALLEE_SAVED.contains(self)
    }

    /// The name of this register when accessed with the given width.
    pub fn name(&self, size: AsmType) -> &'static str {
        use AsmType::*;
        macro_rules! sized {
            ($q:expr, $l:expr, $b:expr) => {
                match size {
                    Quadword | Double => $q,
                    Longword => $l,
                    Byte => $b,
                }
            };
        }
        match self {
            Rax => sized!("rax", "eax", "al"),
            Rbx => sized!("rbx", "ebx", "bl"),
            Rcx => sized!("rcx", "ecx", "cl"),
            Rdx => sized!("rdx", "edx", "dl"),
            Rsi => sized!("rsi", "esi", "sil"),
            Rdi => sized!("rdi", "edi", "dil"),
            Rbp => sized!("rbp", "ebp", "bpl"),
            Rsp => sized!("rsp", "esp", "spl"),
            R8 => sized!("r8", "r8d", "r8b"),
            R9 => sized!("r9", "r9d", "r9b"),
            R10 => sized!("r10", "r10d", "r10b"),
            R11 => sized!("r11", "r11d", "r11b"),
            R12 => sized!("r12", "r12d", "r12b"),
            R13 => sized!("r13", "r13d", "r13b"),
            R14 => sized!("r14", "r14d", "r14b"),
            R15 => sized!("r15", "r15d", "r15b"),
            Xmm0 => "xmm0",
            Xmm1 => "xmm1",
            Xmm2 => "xmm2",
            Xmm3 => "xmm3",
            Xmm4 => "xmm4",
            Xmm5 => "xmm5",
            Xmm6 => "xmm6",
            Xmm7 => "xmm7",
            Xmm8 => "xmm8",
            Xmm9 => "xmm9",
            Xmm10 => "xmm10",
            Xmm11 => "xmm11",
            Xmm12 => "xmm12",
            Xmm13 => "xmm13",
            Xmm14 => "xmm14",
            Xmm15 => "xmm15",
        }
    }
}
impl Display for Register {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name(AsmType::Quadword))
    }
}

/// The width and kind of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsmType {
    Byte,
    Longword,
    Quadword,
    Double,
}
impl AsmType {
    pub fn size(&self) -> usize {
        match self {
            AsmType::Byte => 1,
            AsmType::Longword => 4,
            AsmType::Quadword | AsmType::Double => 8,
        }
    }

    /// The pointer size prefix used for memory operands of this type.
    pub fn ptr(&self) -> &'static str {
        match self {
            AsmType::Byte => "BYTE PTR",
            AsmType::Longword => "DWORD PTR",
            AsmType::Quadword | AsmType::Double => "QWORD PTR",
        }
    }
}
impl From<Type> for AsmType {
    fn from(ty: Type) -> Self {
        match ty {
            Type::Char | Type::SChar | Type::UChar => AsmType::Byte,
            Type::Int | Type::UInt => AsmType::Longword,
            Type::Long | Type::ULong | Type::Pointer => AsmType::Quadword,
            Type::Double => AsmType::Double,
        }
    }
}

/// Condition codes, as used by conditional jumps and `set` instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    E,
    Ne,
    L,
    Le,
    G,
    Ge,
    B,
    Be,
    A,
    Ae,
    P,
}
impl Display for Condition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Condition::E => "e",
            Condition::Ne => "ne",
            Condition::L => "l",
            Condition::Le => "le",
            Condition::G => "g",
            Condition::Ge => "ge",
            Condition::B => "b",
            Condition::Be => "be",
            Condition::A => "a",
            Condition::Ae => "ae",
            Condition::P => "p",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Stack manipulation
    Push,
    Pop,
    Call,
    Ret,
    // Copies and conversions
    Mov,
    /// Sign extension from an operand of the given type.
    Movsx(AsmType),
    /// Zero extension from an operand of the given type.
    Movzx(AsmType),
    Lea,
    Cvttsd2si,
    /// Conversion to double from an integer operand of the given type.
    Cvtsi2sd(AsmType),
    // Arithmetic
    Add,
    Sub,
    Imul,
    Idiv,
    Div,
    Cdq,
    Neg,
    // Bitwise operations
    And,
    Or,
    Xor,
    Not,
    Sal,
    Sar,
    Shr,
    // Comparison
    Cmp,
    Comisd,
    // Control flow
    Jmp,
    Jcc(Condition),
    Setcc(Condition),
    Label,
}
impl Op {
    /// The mnemonic of this operation when applied to operands of the given type.
    pub fn mnemonic(&self, size: AsmType) -> String {
        let double = size == AsmType::Double;
        match self {
            Op::Push => "push".into(),
            Op::Pop => "pop".into(),
            Op::Call => "call".into(),
            Op::Ret => "ret".into(),
            Op::Mov if double => "movsd".into(),
            Op::Mov => "mov".into(),
            Op::Movsx(AsmType::Longword) => "movsxd".into(),
            Op::Movsx(_) => "movsx".into(),
            // A 32-bit move clears the upper half of its destination.
            Op::Movzx(AsmType::Longword) => "mov".into(),
            Op::Movzx(_) => "movzx".into(),
            Op::Lea => "lea".into(),
            Op::Cvttsd2si => "cvttsd2si".into(),
            Op::Cvtsi2sd(_) => "cvtsi2sd".into(),
            Op::Add if double => "addsd".into(),
            Op::Add => "add".into(),
            Op::Sub if double => "subsd".into(),
            Op::Sub => "sub".into(),
            Op::Imul if double => "mulsd".into(),
            Op::Imul => "imul".into(),
            Op::Div if double => "divsd".into(),
            Op::Idiv => "idiv".into(),
            Op::Div => "div".into(),
            Op::Cdq if size == AsmType::Quadword => "cqo".into(),
            Op::Cdq => "cdq".into(),
            Op::Neg => "neg".into(),
            Op::And => "and".into(),
            Op::Or => "or".into(),
            Op::Xor if double => "xorpd".into(),
            Op::Xor => "xor".into(),
            Op::Not => "not".into(),
            Op::Sal => "sal".into(),
            Op::Sar => "sar".into(),
            Op::Shr => "shr".into(),
            Op::Cmp if double => "comisd".into(),
            Op::Cmp => "cmp".into(),
            Op::Comisd => "comisd".into(),
            Op::Jmp => "jmp".into(),
            Op::Jcc(cond) => format!("j{}", cond),
            Op::Setcc(cond) => format!("set{}", cond),
            Op::Label => String::new(),
        }
    }
}
