//! Emission of a complete assembly file: functions with their prologues and
//! epilogues, static data, and the floating point constant pool.

use std::fmt::{self, Display, Formatter};

use crate::{
    config::Platform,
    il::{StaticVariable, Type},
};

use super::{
    assembly::{AsmFunction, ConstantPool, Directive, Instr},
    stack_convention::{Frame, StackConvention, SystemV},
    x86::Op,
};

/// A function after register allocation and fix-up.
#[derive(Debug, Clone)]
pub struct EmittedFunction {
    pub function: AsmFunction,
    pub frame: Frame,
}

/// A complete assembly file.
#[derive(Debug, Clone)]
pub struct Assembly {
    platform: Platform,
    functions: Vec<EmittedFunction>,
    statics: Vec<StaticVariable>,
    constants: ConstantPool,
}
impl Assembly {
    pub fn new(
        platform: Platform,
        functions: Vec<EmittedFunction>,
        statics: Vec<StaticVariable>,
        constants: ConstantPool,
    ) -> Self {
        Self {
            platform,
            functions,
            statics,
            constants,
        }
    }

    fn fmt_function(&self, f: &mut Formatter, emitted: &EmittedFunction) -> fmt::Result {
        let function = &emitted.function;
        let symbol = self.platform.symbol(&function.name);
        if function.global {
            writeln!(f, "{}", Directive::Globl(symbol.clone()))?;
        }
        writeln!(f, "{}", Directive::Text)?;
        writeln!(f, "{}", Directive::Label(symbol))?;
        write!(f, "{}", SystemV::prologue(&emitted.frame))?;
        let epilogue = SystemV::epilogue(&emitted.frame);
        for instr in function.body.iter_instructions() {
            if is_return(instr) {
                write!(f, "{}", epilogue)?;
            } else {
                writeln!(f, "{}", instr)?;
            }
        }
        writeln!(f)
    }

    fn fmt_static(&self, f: &mut Formatter, var: &StaticVariable) -> fmt::Result {
        let symbol = self.platform.symbol(&var.name);
        let ty = var.ty();
        // Negative zero is not all zero bits, so it cannot go in `.bss`.
        let zero = var.init.bits() == 0;
        if var.global {
            writeln!(f, "{}", Directive::Globl(symbol.clone()))?;
        }
        writeln!(f, "{}", if zero { Directive::Bss } else { Directive::Data })?;
        writeln!(f, "{}", Directive::Balign(ty.size()))?;
        writeln!(f, "{}", Directive::Label(symbol))?;
        let value = var.init.bits();
        let init = match ty {
            _ if zero => Directive::Zero(ty.size()),
            Type::Char | Type::SChar | Type::UChar => Directive::Byte(value),
            Type::Int | Type::UInt => Directive::Long(value),
            Type::Long | Type::ULong | Type::Pointer | Type::Double => Directive::Quad(value),
        };
        writeln!(f, "{}", init)?;
        writeln!(f)
    }

    fn fmt_constants(&self, f: &mut Formatter) -> fmt::Result {
        if self.constants.is_empty() {
            return Ok(());
        }
        if self.platform == Platform::Linux {
            writeln!(f, "{}", Directive::Section(".rodata".to_string()))?;
        }
        for constant in self.constants.iter() {
            if self.platform == Platform::MacOs {
                writeln!(f, "{}", Directive::Literal(constant.alignment))?;
            }
            writeln!(f, "{}", Directive::Balign(constant.alignment))?;
            writeln!(f, "{}", Directive::Label(constant.name.clone()))?;
            writeln!(f, "{}", Directive::Quad(constant.bits as i64))?;
            // Sixteen byte constants are read whole by packed instructions.
            if constant.alignment == 16 {
                writeln!(f, "{}", Directive::Quad(0))?;
            }
        }
        writeln!(f)
    }
}
impl Display for Assembly {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "{}", Directive::IntelSyntax)?;
        writeln!(f)?;
        for function in &self.functions {
            self.fmt_function(f, function)?;
        }
        for var in &self.statics {
            self.fmt_static(f, var)?;
        }
        self.fmt_constants(f)?;
        if self.platform == Platform::Linux {
            writeln!(
                f,
                "{}",
                Directive::Section(".note.GNU-stack,\"\",@progbits".to_string())
            )?;
        }
        Ok(())
    }
}

/// Every return expands to the epilogue.
fn is_return(instr: &Instr) -> bool {
    instr.op == Op::Ret
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::{
        codegen::amd64::x86::{AsmType, Register::*},
        il::Const,
        listing::Listing,
    };

    use crate::codegen::amd64::assembly::Operand::*;

    fn function(name: &str, body: Vec<Instr>, frame: Frame) -> EmittedFunction {
        EmittedFunction {
            function: AsmFunction {
                name: name.to_string(),
                global: true,
                body: Listing::from(body),
                pseudos: BTreeMap::new(),
                return_registers: vec![Rax],
                call_arguments: HashMap::new(),
            },
            frame,
        }
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines()
            .map(|l| {
                l.split('#')
                    .next()
                    .unwrap_or_default()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|l| !l.is_empty())
            .collect()
    }

    fn return_three() -> EmittedFunction {
        function(
            "main",
            vec![
                Instr::new(Op::Mov, AsmType::Longword, vec![Reg(Rax), Imm(3)]),
                Instr::bare(Op::Ret, vec![]),
            ],
            Frame::new(0, vec![]),
        )
    }

    #[test]
    fn linux_function_is_emitted_with_frame() {
        let asm = Assembly::new(
            Platform::Linux,
            vec![return_three()],
            vec![],
            ConstantPool::new(Platform::Linux),
        );

        assert_eq!(
            vec![
                ".intel_syntax noprefix",
                ".globl main",
                ".text",
                "main:",
                "push rbp",
                "mov rbp, rsp",
                "mov eax, 3",
                "mov rsp, rbp",
                "pop rbp",
                "ret",
                ".section .note.GNU-stack,\"\",@progbits",
            ],
            lines(&asm.to_string())
        );
    }

    #[test]
    fn macos_symbols_are_decorated() {
        let asm = Assembly::new(
            Platform::MacOs,
            vec![return_three()],
            vec![],
            ConstantPool::new(Platform::MacOs),
        );
        let text = asm.to_string();

        assert!(text.contains(".globl _main"));
        assert!(text.contains("_main:"));
        assert!(!text.contains("GNU-stack"));
    }

    #[test]
    fn statics_are_placed_by_initialiser() {
        let asm = Assembly::new(
            Platform::Linux,
            vec![],
            vec![
                StaticVariable::new("counter", true, Const::Int(5)),
                StaticVariable::new("total", false, Const::Long(0)),
                StaticVariable::new("neg", false, Const::Double(-0.0)),
            ],
            ConstantPool::new(Platform::Linux),
        );

        let lines = lines(&asm.to_string());
        let expected = [
            ".globl counter",
            ".data",
            ".balign 4",
            "counter:",
            ".long 5",
            ".bss",
            ".balign 8",
            "total:",
            ".zero 8",
            ".data",
            ".balign 8",
            "neg:",
            ".quad -9223372036854775808",
        ];
        assert_eq!(expected.to_vec(), lines[1..1 + expected.len()].to_vec());
    }

    #[test]
    fn constants_use_platform_sections() {
        let mut linux = ConstantPool::new(Platform::Linux);
        linux.intern(1.0, 8);
        let text = Assembly::new(Platform::Linux, vec![], vec![], linux).to_string();
        assert!(text.contains(".section .rodata"));
        assert!(text.contains(".Ldbl.0:"));
        assert!(text.contains(".quad 4607182418800017408"));

        let mut macos = ConstantPool::new(Platform::MacOs);
        macos.intern(-0.0, 16);
        let lines = lines(&Assembly::new(Platform::MacOs, vec![], vec![], macos).to_string());
        assert_eq!(
            vec![
                ".intel_syntax noprefix",
                ".literal16",
                ".balign 16",
                "Ldbl.0:",
                ".quad -9223372036854775808",
                ".quad 0",
            ],
            lines
        );
    }

    #[test]
    fn every_return_gets_an_epilogue() {
        let body = vec![
            Instr::new(Op::Cmp, AsmType::Longword, vec![Reg(Rdi), Imm(0)]),
            Instr::bare(Op::Ret, vec![]),
            Instr::bare(Op::Ret, vec![]),
        ];
        let asm = Assembly::new(
            Platform::Linux,
            vec![function("f", body, Frame::new(0, vec![Rbx]))],
            vec![],
            ConstantPool::new(Platform::Linux),
        );
        let text = asm.to_string();

        assert_eq!(2, text.matches("pop     rbx").count());
        assert_eq!(2, text.matches("    ret").count());
        assert!(is_return(&Instr::bare(Op::Ret, vec![])));
    }
}
