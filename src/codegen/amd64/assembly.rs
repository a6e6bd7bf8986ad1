//! General assembly definitions, in GNU assembler Intel syntax.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::{self, Display, Formatter},
};

use crate::{
    cfg::{ControlFlow, Flow},
    config::Platform,
    il::Label,
    listing::Listing,
};

use super::x86::{AsmType, Op, Register};

/// A block of commented assembly code, such as a prologue.
#[derive(Debug, Clone, Default)]
pub struct Block {
    lines: Vec<Line<Instr>>,
}
impl Block {
    pub fn new() -> Self {
        Self { lines: vec![] }
    }

    pub fn push_cmt<S: Into<String>>(&mut self, instr: Instr, comment: S) -> &mut Self {
        self.lines.push(Line::new_cmt(instr, comment.into()));
        self
    }
}
impl Display for Block {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// A line of assembly followed by a comment.
#[derive(Debug, Clone)]
pub struct Line<T> {
    line: T,
    comment: String,
}
impl<T> Line<T> {
    pub fn new_cmt(line: T, comment: String) -> Self {
        Self { line, comment }
    }
}
impl<T: Display> Display for Line<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:32}# {}", self.line.to_string(), self.comment)
    }
}

/// An assembler directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    IntelSyntax,
    Globl(String),
    Text,
    Data,
    Bss,
    Section(String),
    /// A macOS literal section for constants of the given size.
    Literal(usize),
    Balign(usize),
    Label(String),
    Byte(i64),
    Long(i64),
    Quad(i64),
    Zero(usize),
}
impl Display for Directive {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Directive::IntelSyntax => write!(f, "    .intel_syntax noprefix"),
            Directive::Globl(name) => write!(f, "    .globl {}", name),
            Directive::Text => write!(f, "    .text"),
            Directive::Data => write!(f, "    .data"),
            Directive::Bss => write!(f, "    .bss"),
            Directive::Section(section) => write!(f, "    .section {}", section),
            Directive::Literal(size) => write!(f, "    .literal{}", size),
            Directive::Balign(n) => write!(f, "    .balign {}", n),
            Directive::Label(name) => write!(f, "{}:", name),
            Directive::Byte(v) => write!(f, "    .byte {}", v),
            Directive::Long(v) => write!(f, "    .long {}", v),
            Directive::Quad(v) => write!(f, "    .quad {}", v),
            Directive::Zero(n) => write!(f, "    .zero {}", n),
        }
    }
}

/// A single instruction, consisting of an operator, the type of the data it
/// operates on, and zero or more operands in Intel order (destination first).
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    pub size: AsmType,
    pub operands: Vec<Operand>,
}
impl Instr {
    pub fn new(op: Op, size: AsmType, operands: Vec<Operand>) -> Instr {
        Self { op, size, operands }
    }

    /// An instruction without operands, or whose operands need no size.
    pub fn bare(op: Op, operands: Vec<Operand>) -> Instr {
        Self::new(op, AsmType::Quadword, operands)
    }

    pub fn label(label: Label) -> Instr {
        Self::bare(Op::Label, vec![Operand::Lbl(label)])
    }

    /// The width with which each operand is accessed.
    pub fn operand_sizes(&self) -> Vec<AsmType> {
        let n = self.operands.len();
        match self.op {
            // Zero extension from 32 bits is a plain 32-bit move.
            Op::Movzx(AsmType::Longword) => vec![AsmType::Longword, AsmType::Longword],
            Op::Movsx(from) | Op::Movzx(from) => vec![self.size, from],
            Op::Cvtsi2sd(from) => vec![AsmType::Double, from],
            Op::Cvttsd2si => vec![self.size, AsmType::Double],
            Op::Sal | Op::Sar | Op::Shr => vec![self.size, AsmType::Byte],
            Op::Setcc(_) => vec![AsmType::Byte],
            Op::Push | Op::Pop => vec![AsmType::Quadword],
            _ => vec![self.size; n],
        }
    }

    /// Returns `true` if this instruction copies one location into another of the same size.
    pub fn is_move(&self) -> bool {
        self.op == Op::Mov && self.operands.len() == 2
    }
}
impl Display for Instr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let (Op::Label, [label]) = (self.op, self.operands.as_slice()) {
            return write!(f, "{}:", label);
        }

        let operator = self.op.mnemonic(self.size);
        if self.operands.is_empty() {
            return write!(f, "    {}", operator);
        }
        write!(f, "    {:7} ", operator)?;
        let sized_memory = self.op != Op::Lea;
        let operands = self
            .operands
            .iter()
            .zip(self.operand_sizes())
            .map(|(operand, size)| operand.render(size, sized_memory))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&operands)
    }
}
impl ControlFlow for Instr {
    type Label = Label;

    fn flow(&self) -> Flow<'_, Label> {
        match (self.op, self.operands.first()) {
            (Op::Label, Some(Operand::Lbl(label))) => Flow::Label(label),
            (Op::Jmp, Some(Operand::Lbl(label))) => Flow::Jump(label),
            (Op::Jcc(_), Some(Operand::Lbl(label))) => Flow::Branch(label),
            (Op::Ret, _) => Flow::Return,
            _ => Flow::Next,
        }
    }
}

/// An operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// An immediate value
    Imm(i64),
    /// A register
    Reg(Register),
    /// A virtual register, to be replaced by a register or stack slot
    Pseudo(String),
    /// A memory location at a fixed offset from a register
    Memory(Register, i64),
    /// A symbol with static storage, addressed relative to `rip`
    Data(String),
    /// A local jump target
    Lbl(Label),
    /// A function name
    Id(String),
}
impl Operand {
    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory(..) | Operand::Data(_))
    }

    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Reg(_))
    }

    /// Returns `true` for immediates which do not fit a sign-extended 32-bit field.
    pub fn is_large_immediate(&self) -> bool {
        match self {
            Operand::Imm(v) => i32::try_from(*v).is_err(),
            _ => false,
        }
    }

    /// Render the operand as it is accessed with the given width.
    pub fn render(&self, size: AsmType, sized_memory: bool) -> String {
        let ptr = |s: String| {
            if sized_memory {
                format!("{} {}", size.ptr(), s)
            } else {
                s
            }
        };
        match self {
            Operand::Imm(v) => v.to_string(),
            Operand::Reg(reg) => reg.name(size).to_string(),
            Operand::Pseudo(name) => name.clone(),
            Operand::Memory(reg, 0) => ptr(format!("[{}]", reg)),
            Operand::Memory(reg, offset) if *offset < 0 => {
                ptr(format!("[{}-{}]", reg, offset.unsigned_abs()))
            }
            Operand::Memory(reg, offset) => ptr(format!("[{}+{}]", reg, offset)),
            Operand::Data(name) => ptr(format!("{}[rip]", name)),
            Operand::Lbl(label) => label.to_string(),
            Operand::Id(name) => name.clone(),
        }
    }
}
impl Display for Operand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.render(AsmType::Quadword, false))
    }
}
impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Reg(reg)
    }
}

/// What is known about a pseudo register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoInfo {
    pub ty: AsmType,
    /// Aliased pseudos may be accessed through pointers, and always live in memory.
    pub aliased: bool,
}

/// A function lowered to assembly over pseudo registers.
#[derive(Debug, Clone)]
pub struct AsmFunction {
    pub name: String,
    pub global: bool,
    pub body: Listing<Instr>,
    pub pseudos: BTreeMap<String, PseudoInfo>,
    /// Registers holding the return value when the function returns.
    pub return_registers: Vec<Register>,
    /// The registers read by calls to each callee, keyed by the called symbol.
    pub call_arguments: HashMap<String, Vec<Register>>,
}
impl AsmFunction {
}
impl Display for AsmFunction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for instr in self.body.iter_instructions() {
            writeln!(f, "{}", instr)?;
        }
        Ok(())
    }
}

/// A floating point constant in read-only memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub bits: u64,
    pub alignment: usize,
}

/// Floating point constants shared by every function of a program.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    platform: Platform,
    constants: Vec<Constant>,
}
impl ConstantPool {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            constants: vec![],
        }
    }

    /// Returns the name of a constant holding this value, creating it if needed.
    pub fn intern(&mut self, value: f64, alignment: usize) -> String {
        let bits = value.to_bits();
        if let Some(existing) = self
            .constants
            .iter()
            .find(|c| c.bits == bits && c.alignment == alignment)
        {
            return existing.name.clone();
        }
        let name = format!(
            "{}dbl.{}",
            self.platform.local_label_prefix(),
            self.constants.len()
        );
        self.constants.push(Constant {
            name: name.clone(),
            bits,
            alignment,
        });
        name
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use Operand::*;
    use Register::*;

    #[test]
    pub fn instr_serializes_correctly() {
        let instr = Instr::new(Op::Mov, AsmType::Quadword, vec![Reg(Rax), Reg(Rcx)]);

        assert_eq!("    mov     rax, rcx", instr.to_string());
    }

    #[test]
    fn operands_are_printed_at_the_instruction_width() {
        let instr = Instr::new(Op::Mov, AsmType::Longword, vec![Memory(Rbp, -8), Imm(3)]);
        assert_eq!("    mov     DWORD PTR [rbp-8], 3", instr.to_string());

        let instr = Instr::new(Op::Movsx(AsmType::Byte), AsmType::Quadword, vec![Reg(Rax), Reg(Rcx)]);
        assert_eq!("    movsx   rax, cl", instr.to_string());
    }

    #[test]
    fn lea_and_data_operands() {
        let instr = Instr::bare(Op::Lea, vec![Reg(Rax), Data("counter".to_string())]);
        assert_eq!("    lea     rax, counter[rip]", instr.to_string());

        let instr = Instr::new(Op::Add, AsmType::Longword, vec![Data("counter".to_string()), Imm(1)]);
        assert_eq!("    add     DWORD PTR counter[rip], 1", instr.to_string());
    }

    #[test]
    fn labels_and_bare_instructions() {
        assert_eq!(".Lmain.end_1:", Instr::label(Label::new(".Lmain.end", 1)).to_string());
        assert_eq!("    ret", Instr::bare(Op::Ret, vec![]).to_string());
    }

    #[test]
    fn constant_pool_deduplicates_by_value_and_alignment() {
        let mut pool = ConstantPool::new(Platform::Linux);

        let a = pool.intern(1.5, 8);
        let b = pool.intern(1.5, 8);
        let c = pool.intern(1.5, 16);

        assert_eq!(".Ldbl.0", a);
        assert_eq!(a, b);
        assert_eq!(".Ldbl.1", c);
        assert_eq!(2, pool.iter().count());
    }

    #[test]
    fn macos_constants_use_local_prefix() {
        let mut pool = ConstantPool::new(Platform::MacOs);
        assert_eq!("Ldbl.0", pool.intern(0.0, 8));
    }
}
