use crate::{
    il::{BinOp, Const, Conversion, TacInstr, TacListing, Type, UnOp, Value, Variable},
    prelude::*,
};

/// Evaluate instructions whose operands are all constants.
///
/// Arithmetic is evaluated with the semantics of the operand type: integer
/// operations wrap around, double operations follow IEEE 754. Operations whose
/// result is undefined at run time (division by zero, overflowing signed
/// division, oversized shifts, out of range conversions) are left alone.
pub fn fold_constants(listing: &mut TacListing) {
    let mut folded = 0;
    *listing = std::mem::take(listing)
        .into_vec()
        .into_iter()
        .filter_map(|instr| match fold(&instr) {
            Some(replacement) => {
                folded += 1;
                replacement
            }
            None => Some(instr),
        })
        .collect();
    if folded > 0 {
        debug!("folded {} instructions", folded);
    }
}

/// Returns the replacement for a foldable instruction, which may be no
/// instruction at all. Returns `None` if the instruction cannot be folded.
fn fold(instr: &TacInstr) -> Option<Option<TacInstr>> {
    let copy = |dst: &Variable, value: Const| Some(Some(TacInstr::Copy(dst.clone(), Value::Const(value))));
    match instr {
        TacInstr::Unary(dst, op, Value::Const(src)) => copy(dst, unary(*op, *src)?),
        TacInstr::Bin(dst, op, Value::Const(lhs), Value::Const(rhs)) => {
            copy(dst, binary(*op, *lhs, *rhs)?)
        }
        TacInstr::Convert(dst, conversion, Value::Const(src)) => {
            copy(dst, convert(*conversion, *src, dst.ty)?)
        }
        TacInstr::Copy(dst, Value::Const(src)) if src.ty() != dst.ty => {
            copy(dst, reinterpret(*src, dst.ty)?)
        }
        TacInstr::JumpIfZero(Value::Const(cond), label) => {
            Some(cond.is_zero().then(|| TacInstr::Jump(label.clone())))
        }
        TacInstr::JumpIfNotZero(Value::Const(cond), label) => {
            Some((!cond.is_zero()).then(|| TacInstr::Jump(label.clone())))
        }
        _ => None,
    }
}

fn bool_const(value: bool) -> Const {
    Const::Int(value as i32)
}

fn unary(op: UnOp, src: Const) -> Option<Const> {
    let ty = src.ty();
    Some(match (op, src) {
        (UnOp::Not, _) => bool_const(src.is_zero()),
        (UnOp::Negate, Const::Double(d)) => Const::Double(-d),
        (UnOp::Complement, Const::Double(_)) => return None,
        (UnOp::Negate, _) => Const::wrapping_from(ty, -src.as_integer()?),
        (UnOp::Complement, _) => Const::wrapping_from(ty, !src.as_integer()?),
    })
}

fn binary(op: BinOp, lhs: Const, rhs: Const) -> Option<Const> {
    match (lhs, rhs) {
        (Const::Double(a), Const::Double(b)) => binary_double(op, a, b),
        (Const::Double(_), _) | (_, Const::Double(_)) => None,
        _ => binary_integer(op, lhs.ty(), lhs.as_integer()?, rhs.as_integer()?),
    }
}

fn binary_integer(op: BinOp, ty: Type, a: i128, b: i128) -> Option<Const> {
    let width = (ty.size() * 8) as i128;
    let wrap = |v: i128| Const::wrapping_from(ty, v);
    Some(match op {
        BinOp::Add => wrap(a + b),
        BinOp::Subtract => wrap(a - b),
        BinOp::Multiply => wrap(a.wrapping_mul(b)),
        BinOp::Divide | BinOp::Remainder => {
            if b == 0 {
                return None;
            }
            let quotient = a / b;
            if !fits(ty, quotient) {
                // The only case is MIN / -1, which traps on x86.
                return None;
            }
            if op == BinOp::Divide {
                wrap(quotient)
            } else {
                wrap(a % b)
            }
        }
        BinOp::BitAnd => wrap(a & b),
        BinOp::BitOr => wrap(a | b),
        BinOp::BitXor => wrap(a ^ b),
        BinOp::ShiftLeft | BinOp::ShiftRight => {
            if b < 0 || b >= width {
                return None;
            }
            if op == BinOp::ShiftLeft {
                wrap(((a as u128) << b) as i128)
            } else {
                wrap(a >> b)
            }
        }
        BinOp::Equal => bool_const(a == b),
        BinOp::NotEqual => bool_const(a != b),
        BinOp::LessThan => bool_const(a < b),
        BinOp::LessOrEqual => bool_const(a <= b),
        BinOp::GreaterThan => bool_const(a > b),
        BinOp::GreaterOrEqual => bool_const(a >= b),
    })
}

fn binary_double(op: BinOp, a: f64, b: f64) -> Option<Const> {
    Some(match op {
        BinOp::Add => Const::Double(a + b),
        BinOp::Subtract => Const::Double(a - b),
        BinOp::Multiply => Const::Double(a * b),
        BinOp::Divide => Const::Double(a / b),
        BinOp::Equal => bool_const(a == b),
        BinOp::NotEqual => bool_const(a != b),
        BinOp::LessThan => bool_const(a < b),
        BinOp::LessOrEqual => bool_const(a <= b),
        BinOp::GreaterThan => bool_const(a > b),
        BinOp::GreaterOrEqual => bool_const(a >= b),
        BinOp::Remainder
        | BinOp::BitAnd
        | BinOp::BitOr
        | BinOp::BitXor
        | BinOp::ShiftLeft
        | BinOp::ShiftRight => return None,
    })
}

fn convert(conversion: Conversion, src: Const, to: Type) -> Option<Const> {
    match conversion {
        Conversion::SignExtend => {
            let width = src.ty().size() * 8;
            let bits = src.as_integer()?;
            let shift = 128 - width;
            Some(Const::wrapping_from(to, (bits << shift) >> shift))
        }
        Conversion::ZeroExtend => {
            let width = src.ty().size() * 8;
            let mask = (1i128 << width) - 1;
            Some(Const::wrapping_from(to, src.as_integer()? & mask))
        }
        Conversion::Truncate => Some(Const::wrapping_from(to, src.as_integer()?)),
        Conversion::IntToDouble | Conversion::UIntToDouble => {
            Some(Const::Double(src.as_integer()? as f64))
        }
        Conversion::DoubleToInt | Conversion::DoubleToUInt => match src {
            Const::Double(d) if d.is_finite() => {
                let truncated = d.trunc();
                // Every integer type fits into an i128, so this cast is exact
                // whenever the value is in range of the target type.
                if truncated.abs() >= 2f64.powi(100) {
                    return None;
                }
                let value = truncated as i128;
                fits(to, value).then(|| Const::wrapping_from(to, value))
            }
            _ => None,
        },
    }
}

/// A constant copied into a variable of a different type of the same width
/// keeps its bit pattern.
fn reinterpret(src: Const, to: Type) -> Option<Const> {
    if src.ty().size() != to.size() || src.ty().is_double() || to.is_double() {
        return None;
    }
    Some(Const::wrapping_from(to, src.as_integer()?))
}

/// Returns `true` if the value is representable in the given integer type.
fn fits(ty: Type, value: i128) -> bool {
    Const::wrapping_from(ty, value).as_integer() == Some(value)
}
