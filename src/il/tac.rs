//! Three-Address Code

use std::{
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

use crate::{
    cfg::{ControlFlow, Flow},
    listing::Listing,
};

pub type TacListing = Listing<TacInstr>;

/// A complete compilation unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TacProgram {
    /// Functions, in the order in which they should be emitted.
    pub functions: Vec<Function>,
    /// Variables with static storage duration.
    pub statics: Vec<StaticVariable>,
}
impl TacProgram {
    pub fn new() -> Self {
        Self::default()
    }
}
impl Display for TacProgram {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for var in &self.statics {
            writeln!(f, "{}", var)?;
        }
        for function in &self.functions {
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}

/// A function definition. Its first instruction is the entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// Whether the function is visible outside the compilation unit.
    pub global: bool,
    pub params: Vec<Variable>,
    pub return_type: Option<Type>,
    pub body: TacListing,
}
impl Function {
    pub fn new<S: Into<String>>(
        name: S,
        params: Vec<Variable>,
        return_type: Option<Type>,
        body: Vec<TacInstr>,
    ) -> Self {
        Self {
            name: name.into(),
            global: true,
            params,
            return_type,
            body: body.into(),
        }
    }
}
impl Display for Function {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "function {}({})", self.name, params)?;
        for instr in self.body.iter_instructions() {
            if let TacInstr::Label(_) = instr {
                writeln!(f, "    {}", instr)?;
            } else {
                writeln!(f, "        {}", instr)?;
            }
        }
        Ok(())
    }
}

/// A variable with static storage duration, initialised before the program starts.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticVariable {
    pub name: String,
    pub global: bool,
    pub init: Const,
}
impl StaticVariable {
    pub fn new<S: Into<String>>(name: S, global: bool, init: Const) -> Self {
        Self {
            name: name.into(),
            global,
            init,
        }
    }

    pub fn ty(&self) -> Type {
        self.init.ty()
    }
}
impl Display for StaticVariable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let visibility = if self.global { "global" } else { "static" };
        write!(f, "{} {}: {} = {}", visibility, self.name, self.ty(), self.init)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    name: String,
    subscript: usize,
}
impl Label {
    pub fn new<S: Into<String>>(name: S, subscript: usize) -> Self {
        Self {
            name: name.into(),
            subscript,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscript(&self) -> usize {
        self.subscript
    }
}
impl Display for Label {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.subscript)
    }
}

/// The scalar types known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Char,
    SChar,
    UChar,
    Int,
    UInt,
    Long,
    ULong,
    Double,
    Pointer,
}
impl Type {
    /// Size of a value of this type, in bytes.
    pub fn size(&self) -> usize {
        match self {
            Type::Char | Type::SChar | Type::UChar => 1,
            Type::Int | Type::UInt => 4,
            Type::Long | Type::ULong | Type::Double | Type::Pointer => 8,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Char | Type::SChar | Type::Int | Type::Long)
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, Type::Double | Type::Pointer)
    }

    pub fn is_double(&self) -> bool {
        *self == Type::Double
    }
}
impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Type::Char => "char",
            Type::SChar => "schar",
            Type::UChar => "uchar",
            Type::Int => "int",
            Type::UInt => "uint",
            Type::Long => "long",
            Type::ULong => "ulong",
            Type::Double => "double",
            Type::Pointer => "ptr",
        })
    }
}

/// A typed constant. Integer constants always hold a value representable in
/// their type.
#[derive(Debug, Clone, Copy)]
pub enum Const {
    Char(i8),
    SChar(i8),
    UChar(u8),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Double(f64),
    /// A pointer constant. Only the null pointer can be written in source code.
    Pointer(u64),
}
impl Const {
    pub fn ty(&self) -> Type {
        match self {
            Const::Char(_) => Type::Char,
            Const::SChar(_) => Type::SChar,
            Const::UChar(_) => Type::UChar,
            Const::Int(_) => Type::Int,
            Const::UInt(_) => Type::UInt,
            Const::Long(_) => Type::Long,
            Const::ULong(_) => Type::ULong,
            Const::Double(_) => Type::Double,
            Const::Pointer(_) => Type::Pointer,
        }
    }

    /// The constant's value as a mathematical integer. Doubles have no
    /// integer value.
    pub fn as_integer(&self) -> Option<i128> {
        Some(match *self {
            Const::Char(v) | Const::SChar(v) => v as i128,
            Const::UChar(v) => v as i128,
            Const::Int(v) => v as i128,
            Const::UInt(v) => v as i128,
            Const::Long(v) => v as i128,
            Const::ULong(v) | Const::Pointer(v) => v as i128,
            Const::Double(_) => return None,
        })
    }

    /// Construct a constant of the given integer type, wrapping the value
    /// modulo 2^width.
    pub fn wrapping_from(ty: Type, value: i128) -> Const {
        match ty {
            Type::Char => Const::Char(value as i8),
            Type::SChar => Const::SChar(value as i8),
            Type::UChar => Const::UChar(value as u8),
            Type::Int => Const::Int(value as i32),
            Type::UInt => Const::UInt(value as u32),
            Type::Long => Const::Long(value as i64),
            Type::ULong => Const::ULong(value as u64),
            Type::Pointer => Const::Pointer(value as u64),
            Type::Double => Const::Double(value as f64),
        }
    }

    /// The bit pattern of the constant, sign- or zero-extended to 64 bits as
    /// its type dictates.
    pub fn bits(&self) -> i64 {
        match *self {
            Const::Double(d) => d.to_bits() as i64,
            _ => self.as_integer().map(|v| v as i64).unwrap_or_default(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Const::Double(d) => d == 0.0,
            _ => self.as_integer() == Some(0),
        }
    }

    pub fn zero(ty: Type) -> Const {
        match ty {
            Type::Double => Const::Double(0.0),
            _ => Const::wrapping_from(ty, 0),
        }
    }
}
impl PartialEq for Const {
    fn eq(&self, other: &Self) -> bool {
        // Doubles compare by bit pattern, so that listings containing NaN
        // constants still compare equal to themselves.
        self.ty() == other.ty() && self.bits() == other.bits()
    }
}
impl Eq for Const {}
impl Hash for Const {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty().hash(state);
        self.bits().hash(state);
    }
}
impl Display for Const {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Const::Char(v) | Const::SChar(v) => write!(f, "{}", v),
            Const::UChar(v) => write!(f, "{}u8", v),
            Const::Int(v) => write!(f, "{}", v),
            Const::UInt(v) => write!(f, "{}u", v),
            Const::Long(v) => write!(f, "{}l", v),
            Const::ULong(v) => write!(f, "{}ul", v),
            Const::Double(v) => write!(f, "{:?}", v),
            Const::Pointer(v) => write!(f, "ptr({:#x})", v),
        }
    }
}

/// A named variable of a fixed type. Names are unique within a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
}
impl Variable {
    pub fn new<S: Into<String>>(name: S, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}
impl Display for Variable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A TAC value. Values can be constants, or references to variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Const(Const),
    Var(Variable),
}
impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Const(c) => c.ty(),
            Value::Var(v) => v.ty,
        }
    }

    pub fn as_var(&self) -> Option<&Variable> {
        match self {
            Value::Const(_) => None,
            Value::Var(v) => Some(v),
        }
    }

    pub fn as_const(&self) -> Option<Const> {
        match self {
            Value::Const(c) => Some(*c),
            Value::Var(_) => None,
        }
    }
}
impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Const(lit) => write!(f, "{}", lit),
            Value::Var(var) => write!(f, "{}", var),
        }
    }
}
impl From<Const> for Value {
    fn from(value: Const) -> Self {
        Value::Const(value)
    }
}
impl From<Variable> for Value {
    fn from(value: Variable) -> Self {
        Value::Var(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// Bitwise complement, `~x`.
    Complement,
    /// Arithmetic negation, `-x`.
    Negate,
    /// Logical negation, `!x`. Always produces an `int`.
    Not,
}
impl Display for UnOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            UnOp::Complement => "~",
            UnOp::Negate => "-",
            UnOp::Not => "!",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}
impl BinOp {
    /// Comparisons produce an `int` regardless of the type of their operands.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Equal
                | BinOp::NotEqual
                | BinOp::LessThan
                | BinOp::LessOrEqual
                | BinOp::GreaterThan
                | BinOp::GreaterOrEqual
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinOp::ShiftLeft | BinOp::ShiftRight)
    }

    /// Operations that are only defined on integer operands.
    pub fn is_integer_only(&self) -> bool {
        matches!(
            self,
            BinOp::Remainder
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor
                | BinOp::ShiftLeft
                | BinOp::ShiftRight
        )
    }
}
impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::Remainder => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::ShiftLeft => "<<",
            BinOp::ShiftRight => ">>",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::LessThan => "<",
            BinOp::LessOrEqual => "<=",
            BinOp::GreaterThan => ">",
            BinOp::GreaterOrEqual => ">=",
        })
    }
}

/// Numeric conversions between scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    SignExtend,
    ZeroExtend,
    Truncate,
    IntToDouble,
    UIntToDouble,
    DoubleToInt,
    DoubleToUInt,
}
impl Display for Conversion {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Conversion::SignExtend => "sign_extend",
            Conversion::ZeroExtend => "zero_extend",
            Conversion::Truncate => "truncate",
            Conversion::IntToDouble => "int_to_double",
            Conversion::UIntToDouble => "uint_to_double",
            Conversion::DoubleToInt => "double_to_int",
            Conversion::DoubleToUInt => "double_to_uint",
        })
    }
}

/// A single TAC instruction. Destinations come first.
#[derive(Debug, Clone, PartialEq)]
pub enum TacInstr {
    /// Return from the function, optionally with a value.
    Return(Option<Value>),
    /// Apply a unary operator.
    Unary(Variable, UnOp, Value),
    /// Perform a binary operation.
    Bin(Variable, BinOp, Value, Value),
    /// Assign a value to a variable.
    Copy(Variable, Value),
    /// Store the address of a variable.
    GetAddress(Variable, Value),
    /// Read the value a pointer points to.
    Load(Variable, Value),
    /// Write a value to the location a pointer points to. The pointer comes first.
    Store(Value, Value),
    /// Jump to a label.
    Jump(Label),
    /// Jump if a value is zero.
    JumpIfZero(Value, Label),
    /// Jump if a value is not zero.
    JumpIfNotZero(Value, Label),
    /// A label which can be jumped to.
    Label(Label),
    /// Call a function with the given arguments, optionally storing its result.
    Call(Option<Variable>, String, Vec<Value>),
    /// Convert a value between types.
    Convert(Variable, Conversion, Value),
}
impl TacInstr {
    /// The variable this instruction assigns to, if any.
    pub fn write(&self) -> Option<&Variable> {
        match self {
            Self::Unary(dst, _, _)
            | Self::Bin(dst, _, _, _)
            | Self::Copy(dst, _)
            | Self::GetAddress(dst, _)
            | Self::Load(dst, _)
            | Self::Convert(dst, _, _) => Some(dst),
            Self::Call(dst, _, _) => dst.as_ref(),
            Self::Return(_)
            | Self::Store(_, _)
            | Self::Jump(_)
            | Self::JumpIfZero(_, _)
            | Self::JumpIfNotZero(_, _)
            | Self::Label(_) => None,
        }
    }

    /// The values this instruction reads. The operand of `GetAddress` is not
    /// read: only its location is used.
    pub fn reads(&self) -> Vec<&Value> {
        match self {
            Self::Return(value) => value.iter().collect(),
            Self::Unary(_, _, src) => vec![src],
            Self::Bin(_, _, lhs, rhs) => vec![lhs, rhs],
            Self::Copy(_, src) => vec![src],
            Self::GetAddress(_, _) => vec![],
            Self::Load(_, ptr) => vec![ptr],
            Self::Store(ptr, src) => vec![ptr, src],
            Self::Jump(_) | Self::Label(_) => vec![],
            Self::JumpIfZero(value, _) | Self::JumpIfNotZero(value, _) => vec![value],
            Self::Call(_, _, args) => args.iter().collect(),
            Self::Convert(_, _, src) => vec![src],
        }
    }

    /// Mutable access to the values this instruction reads.
    pub fn reads_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Self::Return(value) => value.iter_mut().collect(),
            Self::Unary(_, _, src) => vec![src],
            Self::Bin(_, _, lhs, rhs) => vec![lhs, rhs],
            Self::Copy(_, src) => vec![src],
            Self::GetAddress(_, _) => vec![],
            Self::Load(_, ptr) => vec![ptr],
            Self::Store(ptr, src) => vec![ptr, src],
            Self::Jump(_) | Self::Label(_) => vec![],
            Self::JumpIfZero(value, _) | Self::JumpIfNotZero(value, _) => vec![value],
            Self::Call(_, _, args) => args.iter_mut().collect(),
            Self::Convert(_, _, src) => vec![src],
        }
    }

    /// Instructions whose only effect is assigning their destination.
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Self::Unary(..)
                | Self::Bin(..)
                | Self::Copy(..)
                | Self::GetAddress(..)
                | Self::Load(..)
                | Self::Convert(..)
        )
    }

    pub fn as_label(&self) -> Option<&Label> {
        match self {
            Self::Label(label) => Some(label),
            _ => None,
        }
    }

    /// The label this instruction may jump to.
    pub fn jump_target(&self) -> Option<&Label> {
        match self {
            Self::Jump(label) | Self::JumpIfZero(_, label) | Self::JumpIfNotZero(_, label) => {
                Some(label)
            }
            _ => None,
        }
    }
}
impl ControlFlow for TacInstr {
    type Label = Label;

    fn flow(&self) -> Flow<'_, Label> {
        match self {
            Self::Label(label) => Flow::Label(label),
            Self::Jump(label) => Flow::Jump(label),
            Self::JumpIfZero(_, label) | Self::JumpIfNotZero(_, label) => Flow::Branch(label),
            Self::Return(_) => Flow::Return,
            _ => Flow::Next,
        }
    }
}
impl Display for TacInstr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Return(None) => f.write_str("return"),
            Self::Return(Some(value)) => write!(f, "return {}", value),
            Self::Unary(target, op, value) => write!(f, "{} = {}{}", target, op, value),
            Self::Bin(target, op, lhs, rhs) => {
                write!(f, "{} = {} {} {}", target, lhs, op, rhs)
            }
            Self::Copy(target, value) => write!(f, "{} = {}", target, value),
            Self::GetAddress(target, value) => write!(f, "{} = &{}", target, value),
            Self::Load(target, ptr) => write!(f, "{} = *{}", target, ptr),
            Self::Store(ptr, value) => write!(f, "*{} = {}", ptr, value),
            Self::Jump(label) => write!(f, "goto {}", label),
            Self::JumpIfZero(value, lbl) => write!(f, "if_zero {} goto {}", value, lbl),
            Self::JumpIfNotZero(value, lbl) => write!(f, "if_not_zero {} goto {}", value, lbl),
            Self::Label(lbl) => write!(f, "{}:", lbl),
            Self::Call(target, name, args) => {
                if let Some(target) = target {
                    write!(f, "{} = ", target)?;
                }
                write!(
                    f,
                    "call {}({})",
                    name,
                    args.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            Self::Convert(target, conversion, value) => {
                write!(f, "{} = {} {} to {}", target, conversion, value, target.ty)
            }
        }
    }
}
