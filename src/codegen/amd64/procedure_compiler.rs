//! Lowering of TAC functions to x86-64 assembly over pseudo registers.
//!
//! Every TAC variable becomes a pseudo register of the same name, except for
//! variables with static storage, which are addressed as data. Pseudo
//! registers are replaced by hard registers or stack slots during register
//! allocation.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    config::Platform,
    il::*,
    listing::Listing,
    optimiser::address_taken,
};

use super::{
    assembly::*,
    calling_convention::{self, ArgLocation},
    x86::*,
};

use Condition::*;
use Op::{
    Add, And, Call, Cdq, Cmp, Comisd, Cvtsi2sd, Cvttsd2si, Idiv, Imul, Jcc, Jmp, Lea, Mov, Movsx,
    Movzx, Neg, Not, Or, Push, Ret, Sal, Sar, Setcc, Shr, Sub, Xor,
};
use Operand::*;
use Register::*;

/// Information about the whole program needed to lower a single function.
pub struct ProgramInfo<'a> {
    pub platform: Platform,
    statics: HashMap<&'a str, Type>,
    functions: HashSet<&'a str>,
}
impl<'a> ProgramInfo<'a> {
    pub fn new(program: &'a TacProgram, platform: Platform) -> Self {
        Self {
            platform,
            statics: program
                .statics
                .iter()
                .map(|s| (s.name.as_str(), s.ty()))
                .collect(),
            functions: program.functions.iter().map(|f| f.name.as_str()).collect(),
        }
    }

    /// The symbol used to call the named function.
    fn callee(&self, name: &str) -> String {
        match self.platform {
            Platform::Linux if !self.functions.contains(name) => format!("{}@PLT", name),
            platform => platform.symbol(name),
        }
    }
}

pub struct ProcedureCompiler<'a, 'p> {
    function: &'a Function,
    program: &'a ProgramInfo<'p>,
    constants: &'a mut ConstantPool,
    aliased: HashSet<String>,
    labels: LabelGenerator,
    temps: NameGenerator,
    body: Listing<Instr>,
    pseudos: BTreeMap<String, PseudoInfo>,
    call_arguments: HashMap<String, Vec<Register>>,
}
impl<'a, 'p> ProcedureCompiler<'a, 'p> {
    /// Compile the given function. Double constants are added to `constants`.
    pub fn compile(
        function: &'a Function,
        program: &'a ProgramInfo<'p>,
        constants: &'a mut ConstantPool,
    ) -> AsmFunction {
        let mut compiler = Self {
            function,
            program,
            constants,
            aliased: address_taken(&function.body),
            labels: LabelGenerator::for_listing(&function.body),
            temps: NameGenerator::new(),
            body: Listing::new(),
            pseudos: BTreeMap::new(),
            call_arguments: HashMap::new(),
        };
        compiler.compile_params();
        for instr in function.body.iter_instructions() {
            compiler.compile_instr(instr);
        }
        // Falling off the end returns without a value.
        if !matches!(function.body.as_slice().last(), Some(TacInstr::Return(_))) {
            compiler.compile_return(None);
        }

        AsmFunction {
            name: function.name.clone(),
            global: function.global,
            body: compiler.body,
            pseudos: compiler.pseudos,
            return_registers: calling_convention::return_registers(function.return_type),
            call_arguments: compiler.call_arguments,
        }
    }

    fn emit<O: Into<Vec<Operand>>>(&mut self, op: Op, size: AsmType, operands: O) {
        self.body.push(Instr::new(op, size, operands.into()));
    }

    fn emit_label(&mut self, label: Label) {
        self.body.push(Instr::label(label));
    }

    /// Copy incoming parameters from their registers or stack slots into pseudos.
    fn compile_params(&mut self) {
        let params = &self.function.params;
        let types: Vec<Type> = params.iter().map(|p| p.ty).collect();
        for (param, location) in params.iter().zip(calling_convention::classify(&types)) {
            let source = match location {
                ArgLocation::Reg(reg) => Reg(reg),
                ArgLocation::Stack(n) => Memory(Rbp, calling_convention::stack_param_offset(n)),
            };
            let dst = self.var(param);
            self.emit(Mov, param.ty.into(), [dst, source]);
        }
    }

    /// Compile a single TAC instruction.
    fn compile_instr(&mut self, instr: &TacInstr) {
        match instr {
            TacInstr::Return(value) => self.compile_return(value.as_ref()),
            TacInstr::Unary(dst, op, src) => self.compile_unary(dst, *op, src),
            TacInstr::Bin(dst, op, lhs, rhs) => self.compile_bin(dst, *op, lhs, rhs),
            TacInstr::Copy(dst, src) => {
                let (dst_op, src_op) = (self.var(dst), self.operand(src));
                self.emit(Mov, dst.ty.into(), [dst_op, src_op]);
            }
            TacInstr::GetAddress(dst, src) => {
                let (dst_op, src_op) = (self.var(dst), self.operand(src));
                self.emit(Lea, AsmType::Quadword, [dst_op, src_op]);
            }
            TacInstr::Load(dst, ptr) => {
                let ptr = self.operand(ptr);
                self.emit(Mov, AsmType::Quadword, [Reg(R11), ptr]);
                let dst_op = self.var(dst);
                self.emit(Mov, dst.ty.into(), [dst_op, Memory(R11, 0)]);
            }
            TacInstr::Store(ptr, src) => {
                let ptr = self.operand(ptr);
                self.emit(Mov, AsmType::Quadword, [Reg(R11), ptr]);
                let src_op = self.operand(src);
                self.emit(Mov, src.ty().into(), [Memory(R11, 0), src_op]);
            }
            TacInstr::Jump(label) => {
                let label = self.label(label);
                self.emit(Jmp, AsmType::Quadword, [Lbl(label)]);
            }
            TacInstr::JumpIfZero(value, label) => self.compile_jump(value, label, true),
            TacInstr::JumpIfNotZero(value, label) => self.compile_jump(value, label, false),
            TacInstr::Label(label) => {
                let label = self.label(label);
                self.emit_label(label);
            }
            TacInstr::Call(dst, name, args) => self.compile_call(dst.as_ref(), name, args),
            TacInstr::Convert(dst, conversion, src) => self.compile_convert(dst, *conversion, src),
        }
    }

    fn compile_return(&mut self, value: Option<&Value>) {
        if let Some(value) = value {
            let ty = value.ty();
            let ret_reg = if ty.is_double() { Xmm0 } else { Rax };
            let operand = self.operand(value);
            self.emit(Mov, ty.into(), [Reg(ret_reg), operand]);
        }
        // Expanded into the epilogue during emission.
        self.body.push(Instr::bare(Ret, vec![]));
    }

    fn compile_unary(&mut self, dst: &Variable, op: UnOp, src: &Value) {
        let ty = src.ty();
        let size = AsmType::from(ty);
        let dst_op = self.var(dst);
        let src_op = self.operand(src);
        match op {
            UnOp::Not if ty.is_double() => {
                let zero = self.double_constant(0.0, 8);
                self.compile_double_equality(dst_op, src_op, zero, true);
            }
            UnOp::Not => {
                self.emit(Cmp, size, [src_op, Imm(0)]);
                self.emit(Mov, AsmType::Longword, [dst_op.clone(), Imm(0)]);
                self.emit(Setcc(E), AsmType::Byte, [dst_op]);
            }
            UnOp::Negate if ty.is_double() => {
                let negative_zero = self.double_constant(-0.0, 16);
                self.emit(Mov, size, [dst_op.clone(), src_op]);
                self.emit(Xor, size, [dst_op, negative_zero]);
            }
            UnOp::Negate => {
                self.emit(Mov, size, [dst_op.clone(), src_op]);
                self.emit(Neg, size, [dst_op]);
            }
            UnOp::Complement => {
                self.emit(Mov, size, [dst_op.clone(), src_op]);
                self.emit(Not, size, [dst_op]);
            }
        }
    }

    fn compile_bin(&mut self, dst: &Variable, op: BinOp, lhs: &Value, rhs: &Value) {
        let ty = lhs.ty();
        if op.is_comparison() {
            return self.compile_comparison(dst, op, lhs, rhs);
        }
        match op {
            BinOp::Divide | BinOp::Remainder if !ty.is_double() => {
                return self.compile_division(dst, op, lhs, rhs)
            }
            BinOp::ShiftLeft | BinOp::ShiftRight => return self.compile_shift(dst, op, lhs, rhs),
            BinOp::Multiply if AsmType::from(ty) == AsmType::Byte => {
                return self.compile_byte_multiply(dst, lhs, rhs)
            }
            _ => {}
        }

        let operator = match op {
            BinOp::Add => Add,
            BinOp::Subtract => Sub,
            BinOp::Multiply => Imul,
            BinOp::Divide => Op::Div,
            BinOp::BitAnd => And,
            BinOp::BitOr => Or,
            BinOp::BitXor => Xor,
            _ => unreachable!("{} is handled separately", op),
        };
        let size = AsmType::from(ty);
        let dst_op = self.var(dst);
        let lhs_op = self.operand(lhs);
        let rhs_op = self.operand(rhs);
        // Moving the left operand into the destination would clobber the right one.
        let target = if rhs_op == dst_op {
            self.temp(size)
        } else {
            dst_op.clone()
        };
        self.emit(Mov, size, [target.clone(), lhs_op]);
        self.emit(operator, size, [target.clone(), rhs_op]);
        if target != dst_op {
            self.emit(Mov, size, [dst_op, target]);
        }
    }

    fn compile_comparison(&mut self, dst: &Variable, op: BinOp, lhs: &Value, rhs: &Value) {
        let ty = lhs.ty();
        let dst_op = self.var(dst);
        let lhs_op = self.operand(lhs);
        let rhs_op = self.operand(rhs);

        if ty.is_double() {
            // `comisd` sets the flags like an unsigned comparison, and reports
            // unordered operands (NaN) as equal and less than. Swapping the
            // operands of `<` and `<=` makes every ordered comparison false for NaN.
            let (first, second, cond) = match op {
                BinOp::Equal => return self.compile_double_equality(dst_op, lhs_op, rhs_op, true),
                BinOp::NotEqual => {
                    return self.compile_double_equality(dst_op, lhs_op, rhs_op, false)
                }
                BinOp::LessThan => (rhs_op, lhs_op, A),
                BinOp::LessOrEqual => (rhs_op, lhs_op, Ae),
                BinOp::GreaterThan => (lhs_op, rhs_op, A),
                BinOp::GreaterOrEqual => (lhs_op, rhs_op, Ae),
                _ => unreachable!("{} is not a comparison", op),
            };
            self.emit(Comisd, AsmType::Double, [first, second]);
            self.emit(Mov, AsmType::Longword, [dst_op.clone(), Imm(0)]);
            self.emit(Setcc(cond), AsmType::Byte, [dst_op]);
            return;
        }

        let signed = ty.is_signed();
        let cond = match (op, signed) {
            (BinOp::Equal, _) => E,
            (BinOp::NotEqual, _) => Ne,
            (BinOp::LessThan, true) => L,
            (BinOp::LessThan, false) => B,
            (BinOp::LessOrEqual, true) => Le,
            (BinOp::LessOrEqual, false) => Be,
            (BinOp::GreaterThan, true) => G,
            (BinOp::GreaterThan, false) => A,
            (BinOp::GreaterOrEqual, true) => Ge,
            (BinOp::GreaterOrEqual, false) => Ae,
            _ => unreachable!("{} is not a comparison", op),
        };
        self.emit(Cmp, ty.into(), [lhs_op, rhs_op]);
        self.emit(Mov, AsmType::Longword, [dst_op.clone(), Imm(0)]);
        self.emit(Setcc(cond), AsmType::Byte, [dst_op]);
    }

    /// Set `dst` to `lhs == rhs` (or `lhs != rhs` when `equal` is false) for doubles.
    /// Unordered operands compare unequal.
    fn compile_double_equality(&mut self, dst: Operand, lhs: Operand, rhs: Operand, equal: bool) {
        let end = self.fresh_label("nan");
        let (unordered, cond) = if equal { (0, E) } else { (1, Ne) };
        self.emit(Comisd, AsmType::Double, [lhs, rhs]);
        self.emit(Mov, AsmType::Longword, [dst.clone(), Imm(unordered)]);
        self.emit(Jcc(P), AsmType::Quadword, [Lbl(end.clone())]);
        self.emit(Setcc(cond), AsmType::Byte, [dst]);
        self.emit_label(end);
    }

    fn compile_division(&mut self, dst: &Variable, op: BinOp, lhs: &Value, rhs: &Value) {
        let ty = lhs.ty();
        let signed = ty.is_signed();
        let (size, lhs_op, rhs_op) = if AsmType::from(ty) == AsmType::Byte {
            // There is no convenient 8-bit division; divide 32-bit values instead.
            let lhs_op = self.widen_byte(lhs);
            let rhs_op = self.widen_byte(rhs);
            (AsmType::Longword, lhs_op, rhs_op)
        } else {
            (AsmType::from(ty), self.operand(lhs), self.operand(rhs))
        };

        self.emit(Mov, size, [Reg(Rax), lhs_op]);
        if signed {
            self.body.push(Instr::new(Cdq, size, vec![]));
            self.emit(Idiv, size, [rhs_op]);
        } else {
            self.emit(Xor, AsmType::Longword, [Reg(Rdx), Reg(Rdx)]);
            self.emit(Op::Div, size, [rhs_op]);
        }
        let result = if op == BinOp::Divide { Rax } else { Rdx };
        let dst_op = self.var(dst);
        self.emit(Mov, dst.ty.into(), [dst_op, Reg(result)]);
    }

    fn compile_shift(&mut self, dst: &Variable, op: BinOp, lhs: &Value, rhs: &Value) {
        let ty = lhs.ty();
        let size = AsmType::from(ty);
        let operator = match op {
            BinOp::ShiftLeft => Sal,
            _ if ty.is_signed() => Sar,
            _ => Shr,
        };
        // The shift count is either an immediate or `cl`.
        let count = match rhs {
            Value::Const(c) => Imm(c.as_integer().unwrap_or_default() as i64 & 0xff),
            Value::Var(_) => {
                let rhs_op = self.operand(rhs);
                self.emit(Mov, rhs.ty().into(), [Reg(Rcx), rhs_op]);
                Reg(Rcx)
            }
        };
        let dst_op = self.var(dst);
        let lhs_op = self.operand(lhs);
        self.emit(Mov, size, [dst_op.clone(), lhs_op]);
        self.emit(operator, size, [dst_op, count]);
    }

    fn compile_byte_multiply(&mut self, dst: &Variable, lhs: &Value, rhs: &Value) {
        // `imul` has no two-operand 8-bit form. The low byte of the product
        // does not depend on how the operands were extended.
        let product = self.widen_byte(lhs);
        let rhs_op = self.widen_byte(rhs);
        let result = self.temp(AsmType::Longword);
        self.emit(Mov, AsmType::Longword, [result.clone(), product]);
        self.emit(Imul, AsmType::Longword, [result.clone(), rhs_op]);
        let dst_op = self.var(dst);
        self.emit(Mov, AsmType::Byte, [dst_op, result]);
    }

    /// Extend an 8-bit value to 32 bits, as its signedness dictates.
    fn widen_byte(&mut self, value: &Value) -> Operand {
        match value {
            Value::Const(c) => Imm(c.as_integer().unwrap_or_default() as i64),
            Value::Var(var) => {
                let widened = self.temp(AsmType::Longword);
                let src = self.var(var);
                let op = if var.ty.is_signed() {
                    Movsx(AsmType::Byte)
                } else {
                    Movzx(AsmType::Byte)
                };
                self.emit(op, AsmType::Longword, [widened.clone(), src]);
                widened
            }
        }
    }

    /// Jump to `label` if `value` is zero (or non-zero when `if_zero` is false).
    fn compile_jump(&mut self, value: &Value, label: &Label, if_zero: bool) {
        let ty = value.ty();
        let target = self.label(label);
        let operand = self.operand(value);
        if ty.is_double() {
            let zero = self.double_constant(0.0, 8);
            self.emit(Comisd, AsmType::Double, [operand, zero]);
            if if_zero {
                // NaN is not zero, but compares equal to it.
                let ordered = self.fresh_label("nan");
                self.emit(Jcc(P), AsmType::Quadword, [Lbl(ordered.clone())]);
                self.emit(Jcc(E), AsmType::Quadword, [Lbl(target)]);
                self.emit_label(ordered);
            } else {
                self.emit(Jcc(P), AsmType::Quadword, [Lbl(target.clone())]);
                self.emit(Jcc(Ne), AsmType::Quadword, [Lbl(target)]);
            }
        } else {
            self.emit(Cmp, ty.into(), [operand, Imm(0)]);
            let cond = if if_zero { E } else { Ne };
            self.emit(Jcc(cond), AsmType::Quadword, [Lbl(target)]);
        }
    }

    fn compile_call(&mut self, dst: Option<&Variable>, name: &str, args: &[Value]) {
        let types: Vec<Type> = args.iter().map(Value::ty).collect();
        let locations = calling_convention::classify(&types);

        let mut stack_args: Vec<(usize, &Value)> = locations
            .iter()
            .zip(args)
            .filter_map(|(location, arg)| match location {
                ArgLocation::Stack(n) => Some((*n, arg)),
                ArgLocation::Reg(_) => None,
            })
            .collect();
        stack_args.sort_by_key(|(n, _)| *n);

        // Keep the stack aligned at the call.
        let padding = if stack_args.len() % 2 == 1 { 8 } else { 0 };
        if padding > 0 {
            self.emit(Sub, AsmType::Quadword, [Reg(Rsp), Imm(padding)]);
        }
        for (_, arg) in stack_args.iter().rev() {
            let size = AsmType::from(arg.ty());
            let operand = self.operand(arg);
            match operand {
                Imm(_) | Reg(_) => self.emit(Push, AsmType::Quadword, [operand]),
                _ if size.size() == 8 => self.emit(Push, AsmType::Quadword, [operand]),
                // Pushing a narrower value from memory could read past its slot.
                _ => {
                    self.emit(Mov, size, [Reg(Rax), operand]);
                    self.emit(Push, AsmType::Quadword, [Reg(Rax)]);
                }
            }
        }

        let mut arg_regs = vec![];
        for (location, arg) in locations.iter().zip(args) {
            if let ArgLocation::Reg(reg) = location {
                let operand = self.operand(arg);
                self.emit(Mov, arg.ty().into(), [Reg(*reg), operand]);
                arg_regs.push(*reg);
            }
        }

        let callee = self.program.callee(name);
        self.emit(Call, AsmType::Quadword, [Id(callee.clone())]);
        let known = self.call_arguments.entry(callee).or_default();
        for reg in arg_regs {
            if !known.contains(&reg) {
                known.push(reg);
            }
        }

        let stack_bytes = 8 * stack_args.len() as i64 + padding;
        if stack_bytes > 0 {
            self.emit(Add, AsmType::Quadword, [Reg(Rsp), Imm(stack_bytes)]);
        }

        if let Some(dst) = dst {
            let ret_reg = if dst.ty.is_double() { Xmm0 } else { Rax };
            let dst_op = self.var(dst);
            self.emit(Mov, dst.ty.into(), [dst_op, Reg(ret_reg)]);
        }
    }

    fn compile_convert(&mut self, dst: &Variable, conversion: Conversion, src: &Value) {
        let src_size = AsmType::from(src.ty());
        let dst_size = AsmType::from(dst.ty);
        let dst_op = self.var(dst);
        match conversion {
            Conversion::SignExtend => {
                let src_op = self.operand(src);
                self.emit(Movsx(src_size), dst_size, [dst_op, src_op]);
            }
            Conversion::ZeroExtend => {
                let src_op = self.operand(src);
                self.emit(Movzx(src_size), dst_size, [dst_op, src_op]);
            }
            Conversion::Truncate => {
                let src_op = match src {
                    Value::Const(c) => self.immediate(Const::wrapping_from(
                        dst.ty,
                        c.as_integer().unwrap_or_default(),
                    )),
                    Value::Var(var) => self.var(var),
                };
                self.emit(Mov, dst_size, [dst_op, src_op]);
            }
            Conversion::IntToDouble => {
                let (from, src_op) = if src_size == AsmType::Byte {
                    (AsmType::Longword, self.widen_byte(src))
                } else {
                    (src_size, self.operand(src))
                };
                self.emit(Cvtsi2sd(from), AsmType::Double, [dst_op, src_op]);
            }
            Conversion::UIntToDouble => self.compile_uint_to_double(dst_op, src),
            Conversion::DoubleToInt => {
                let src_op = self.operand(src);
                if dst_size == AsmType::Byte {
                    let wide = self.temp(AsmType::Longword);
                    self.emit(Cvttsd2si, AsmType::Longword, [wide.clone(), src_op]);
                    self.emit(Mov, AsmType::Byte, [dst_op, wide]);
                } else {
                    self.emit(Cvttsd2si, dst_size, [dst_op, src_op]);
                }
            }
            Conversion::DoubleToUInt => self.compile_double_to_uint(dst_op, dst_size, src),
        }
    }

    fn compile_uint_to_double(&mut self, dst: Operand, src: &Value) {
        match AsmType::from(src.ty()) {
            AsmType::Byte => {
                let src_op = self.widen_byte(src);
                self.emit(Cvtsi2sd(AsmType::Longword), AsmType::Double, [dst, src_op]);
            }
            AsmType::Longword => {
                // Every 32-bit unsigned value is a non-negative 64-bit signed value.
                let wide = match src {
                    Value::Const(c) => Imm(c.as_integer().unwrap_or_default() as i64),
                    Value::Var(var) => {
                        let wide = self.temp(AsmType::Quadword);
                        let src_op = self.var(var);
                        self.emit(Movzx(AsmType::Longword), AsmType::Quadword, [wide.clone(), src_op]);
                        wide
                    }
                };
                self.emit(Cvtsi2sd(AsmType::Quadword), AsmType::Double, [dst, wide]);
            }
            _ => {
                // Values with the top bit set are halved, rounding to odd so that
                // the final result rounds correctly, converted, and doubled.
                let src_op = self.operand(src);
                let big = self.fresh_label("u2d_big");
                let end = self.fresh_label("u2d_end");
                let halved = self.temp(AsmType::Quadword);
                let low_bit = self.temp(AsmType::Quadword);
                let q = AsmType::Quadword;

                self.emit(Cmp, q, [src_op.clone(), Imm(0)]);
                self.emit(Jcc(L), q, [Lbl(big.clone())]);
                self.emit(Cvtsi2sd(q), AsmType::Double, [dst.clone(), src_op.clone()]);
                self.emit(Jmp, q, [Lbl(end.clone())]);
                self.emit_label(big);
                self.emit(Mov, q, [low_bit.clone(), src_op]);
                self.emit(Mov, q, [halved.clone(), low_bit.clone()]);
                self.emit(Shr, q, [halved.clone(), Imm(1)]);
                self.emit(And, q, [low_bit.clone(), Imm(1)]);
                self.emit(Or, q, [halved.clone(), low_bit]);
                self.emit(Cvtsi2sd(q), AsmType::Double, [dst.clone(), halved]);
                self.emit(Add, AsmType::Double, [dst.clone(), dst]);
                self.emit_label(end);
            }
        }
    }

    fn compile_double_to_uint(&mut self, dst: Operand, dst_size: AsmType, src: &Value) {
        let src_op = self.operand(src);
        match dst_size {
            AsmType::Byte | AsmType::Longword => {
                // Truncate a wider signed conversion, which covers the whole unsigned range.
                let wide_size = if dst_size == AsmType::Byte {
                    AsmType::Longword
                } else {
                    AsmType::Quadword
                };
                let wide = self.temp(wide_size);
                self.emit(Cvttsd2si, wide_size, [wide.clone(), src_op]);
                self.emit(Mov, dst_size, [dst, wide]);
            }
            _ => {
                // Values of 2^63 and above are offset into the signed range first.
                let upper = self.double_constant(9223372036854775808.0, 8);
                let big = self.fresh_label("d2u_big");
                let end = self.fresh_label("d2u_end");
                let offset = self.temp(AsmType::Double);
                let q = AsmType::Quadword;

                self.emit(Comisd, AsmType::Double, [src_op.clone(), upper.clone()]);
                self.emit(Jcc(Ae), q, [Lbl(big.clone())]);
                self.emit(Cvttsd2si, q, [dst.clone(), src_op.clone()]);
                self.emit(Jmp, q, [Lbl(end.clone())]);
                self.emit_label(big);
                self.emit(Mov, AsmType::Double, [offset.clone(), src_op]);
                self.emit(Sub, AsmType::Double, [offset.clone(), upper]);
                self.emit(Cvttsd2si, q, [dst.clone(), offset]);
                self.emit(Add, q, [dst, Imm(i64::MIN)]);
                self.emit_label(end);
            }
        }
    }

    /// The operand through which a value is accessed.
    fn operand(&mut self, value: &Value) -> Operand {
        match value {
            Value::Const(Const::Double(d)) => self.double_constant(*d, 8),
            Value::Const(c) => self.immediate(*c),
            Value::Var(var) => self.var(var),
        }
    }

    /// An integer constant as an immediate, in the signed representation of its width.
    fn immediate(&self, c: Const) -> Operand {
        let bits = c.bits();
        Imm(match AsmType::from(c.ty()) {
            AsmType::Byte => bits as i8 as i64,
            AsmType::Longword => bits as i32 as i64,
            AsmType::Quadword | AsmType::Double => bits,
        })
    }

    fn var(&mut self, var: &Variable) -> Operand {
        if self.program.statics.contains_key(var.name.as_str()) {
            return Data(self.program.platform.symbol(&var.name));
        }
        let aliased = self.aliased.contains(&var.name);
        self.pseudos
            .entry(var.name.clone())
            .or_insert(PseudoInfo {
                ty: var.ty.into(),
                aliased,
            });
        Pseudo(var.name.clone())
    }

    fn temp(&mut self, ty: AsmType) -> Operand {
        let name = self.temps.next_temp();
        self.pseudos.insert(name.clone(), PseudoInfo { ty, aliased: false });
        Pseudo(name)
    }

    fn double_constant(&mut self, value: f64, alignment: usize) -> Operand {
        Data(self.constants.intern(value, alignment))
    }

    /// Labels are local to the assembly file, so they are qualified with the function name.
    fn label(&self, label: &Label) -> Label {
        Label::new(
            format!(
                "{}{}.{}",
                self.program.platform.local_label_prefix(),
                self.function.name,
                label.name()
            ),
            label.subscript(),
        )
    }

    fn fresh_label(&mut self, id: &str) -> Label {
        let label = self.labels.next_label(id);
        self.label(&label)
    }
}
