//! The System V AMD64 calling convention, as used on both Linux and macOS.

use crate::il::Type;

use super::x86::Register::{self, *};

const INTEGER_PARAMS: &[Register] = &[Rdi, Rsi, Rdx, Rcx, R8, R9];
const SSE_PARAMS: &[Register] = &[Xmm0, Xmm1, Xmm2, Xmm3, Xmm4, Xmm5, Xmm6, Xmm7];

/// Where a single argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgLocation {
    Reg(Register),
    /// The argument is the n-th (zero-based) value on the stack, counted from
    /// the lowest address upwards.
    Stack(usize),
}

/// Assigns a location to each argument of a call with the given argument types.
pub fn classify(types: &[Type]) -> Vec<ArgLocation> {
    let mut integer = INTEGER_PARAMS.iter();
    let mut sse = SSE_PARAMS.iter();
    let mut stack = 0;
    types
        .iter()
        .map(|ty| {
            let reg = if ty.is_double() {
                sse.next()
            } else {
                integer.next()
            };
            match reg {
                Some(&reg) => ArgLocation::Reg(reg),
                None => {
                    stack += 1;
                    ArgLocation::Stack(stack - 1)
                }
            }
        })
        .collect()
}

/// The registers in which a value of the given type is returned.
pub fn return_registers(ty: Option<Type>) -> Vec<Register> {
    match ty {
        None => vec![],
        Some(Type::Double) => vec![Xmm0],
        Some(_) => vec![Rax],
    }
}

/// Offset from the base pointer of the n-th stack parameter, once the return
/// address and saved base pointer have been pushed.
pub fn stack_param_offset(index: usize) -> i64 {
    16 + 8 * index as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_double_arguments_use_separate_registers() {
        let locations = classify(&[Type::Int, Type::Double, Type::Long, Type::Double]);

        assert_eq!(
            vec![
                ArgLocation::Reg(Rdi),
                ArgLocation::Reg(Xmm0),
                ArgLocation::Reg(Rsi),
                ArgLocation::Reg(Xmm1),
            ],
            locations
        );
    }

    #[test]
    fn seventh_integer_argument_goes_on_the_stack() {
        let locations = classify(&[Type::Int; 8]);

        assert_eq!(ArgLocation::Reg(R9), locations[5]);
        assert_eq!(ArgLocation::Stack(0), locations[6]);
        assert_eq!(ArgLocation::Stack(1), locations[7]);
    }

    #[test]
    fn stack_parameters_start_above_return_address() {
        assert_eq!(16, stack_param_offset(0));
        assert_eq!(24, stack_param_offset(1));
    }
}
