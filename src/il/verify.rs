//! Structural checks on incoming TAC. The producer of the TAC is expected to
//! uphold these; a violation is reported instead of being miscompiled.

use std::collections::{HashMap, HashSet};

use crate::{
    config::Config,
    error::{CompileError, CompileResult},
    listing::Position,
    prelude::*,
};

use super::*;

/// Verify that every function in the program is well-formed and only uses
/// enabled features. Returns the first violation found.
pub fn verify(program: &TacProgram, config: &Config) -> CompileResult<()> {
    for var in &program.statics {
        if var.ty().is_double() && !config.features.floating_point {
            return Err(CompileError::unsupported(
                &var.name,
                Position(0),
                "static variable of type double",
            ));
        }
    }

    let arities: HashMap<&str, usize> = program
        .functions
        .iter()
        .map(|f| (f.name.as_str(), f.params.len()))
        .collect();

    for function in &program.functions {
        FunctionVerifier::new(function, program, &arities, config).run()?;
        trace!("verified function '{}'", function.name);
    }
    Ok(())
}

struct FunctionVerifier<'a> {
    function: &'a Function,
    program: &'a TacProgram,
    arities: &'a HashMap<&'a str, usize>,
    config: &'a Config,
    /// Types of every variable seen so far, to detect inconsistent uses of a name.
    types: HashMap<&'a str, Type>,
}

impl<'a> FunctionVerifier<'a> {
    fn new(
        function: &'a Function,
        program: &'a TacProgram,
        arities: &'a HashMap<&'a str, usize>,
        config: &'a Config,
    ) -> Self {
        Self {
            function,
            program,
            arities,
            config,
            types: HashMap::new(),
        }
    }

    fn malformed<T, R: Into<String>>(&self, position: Position, reason: R) -> CompileResult<T> {
        Err(CompileError::malformed(
            &self.function.name,
            position,
            reason,
        ))
    }

    fn run(&mut self) -> CompileResult<()> {
        let labels = self.check_labels()?;

        let function = self.function;
        for param in &function.params {
            if self.types.insert(&param.name, param.ty).is_some() {
                return self.malformed(
                    Position(0),
                    format!("parameter '{}' is declared twice", param.name),
                );
            }
        }
        let program = self.program;
        for var in &program.statics {
            self.types.entry(&var.name).or_insert(var.ty());
        }

        for (position, instr) in function.body.iter_lines() {
            self.check_features(position, instr)?;
            self.check_variables(position, instr)?;
            if let Some(target) = instr.jump_target() {
                if !labels.contains(target) {
                    return self.malformed(position, format!("jump to undefined label '{}'", target));
                }
            }
            self.check_types(position, instr)?;
        }
        Ok(())
    }

    /// Collect all labels, rejecting duplicates.
    fn check_labels(&self) -> CompileResult<HashSet<&'a Label>> {
        let mut labels = HashSet::new();
        for (position, instr) in self.function.body.iter_lines() {
            if let Some(label) = instr.as_label() {
                if !labels.insert(label) {
                    return self.malformed(position, format!("label '{}' is defined twice", label));
                }
            }
        }
        Ok(labels)
    }

    fn check_features(&self, position: Position, instr: &TacInstr) -> CompileResult<()> {
        if self.config.features.floating_point {
            return Ok(());
        }
        let uses_double = instr.write().iter().any(|v| v.ty.is_double())
            || instr.reads().iter().any(|v| v.ty().is_double())
            || matches!(instr, TacInstr::GetAddress(_, src) if src.ty().is_double());
        if uses_double {
            return Err(CompileError::unsupported(
                &self.function.name,
                position,
                "floating point arithmetic",
            ));
        }
        Ok(())
    }

    /// Every name must be used with a single type throughout the function.
    fn check_variables(&mut self, position: Position, instr: &'a TacInstr) -> CompileResult<()> {
        let address_of = match instr {
            TacInstr::GetAddress(_, Value::Var(var)) => Some(var),
            _ => None,
        };
        let vars = instr
            .write()
            .into_iter()
            .chain(instr.reads().into_iter().filter_map(Value::as_var))
            .chain(address_of);
        for var in vars {
            let ty = *self.types.entry(&var.name).or_insert(var.ty);
            if ty != var.ty {
                return self.malformed(
                    position,
                    format!(
                        "variable '{}' is used as {} but was previously {}",
                        var.name, var.ty, ty
                    ),
                );
            }
        }
        Ok(())
    }

    fn check_types(&self, position: Position, instr: &TacInstr) -> CompileResult<()> {
        match instr {
            TacInstr::Return(value) => {
                let actual = value.as_ref().map(Value::ty);
                if actual != self.function.return_type {
                    return self.malformed(
                        position,
                        format!(
                            "return of {} from function returning {}",
                            describe(actual),
                            describe(self.function.return_type)
                        ),
                    );
                }
            }
            TacInstr::Unary(dst, op, src) => match op {
                UnOp::Not => self.expect(position, dst.ty, Type::Int, "result of '!'")?,
                UnOp::Complement if src.ty().is_double() => {
                    return self.malformed(position, "bitwise complement of a double")
                }
                UnOp::Complement | UnOp::Negate => {
                    self.expect(position, dst.ty, src.ty(), "destination")?
                }
            },
            TacInstr::Bin(dst, op, lhs, rhs) => {
                if op.is_integer_only() && (lhs.ty().is_double() || rhs.ty().is_double()) {
                    return self.malformed(position, format!("operator '{}' applied to a double", op));
                }
                if op.is_shift() {
                    if !rhs.ty().is_integer() {
                        return self.malformed(position, "shift count is not an integer");
                    }
                } else {
                    self.expect(position, rhs.ty(), lhs.ty(), "right operand")?;
                }
                if op.is_comparison() {
                    self.expect(position, dst.ty, Type::Int, "result of a comparison")?;
                } else {
                    self.expect(position, dst.ty, lhs.ty(), "destination")?;
                }
            }
            TacInstr::Copy(dst, src) => {
                let compatible = dst.ty.size() == src.ty().size()
                    && dst.ty.is_double() == src.ty().is_double();
                if !compatible {
                    return self.malformed(
                        position,
                        format!("copy of {} into {}", src.ty(), dst.ty),
                    );
                }
            }
            TacInstr::GetAddress(dst, src) => {
                if src.as_var().is_none() {
                    return self.malformed(position, "address of a constant");
                }
                self.expect(position, dst.ty, Type::Pointer, "destination of '&'")?;
            }
            TacInstr::Load(_, ptr) => {
                self.expect(position, ptr.ty(), Type::Pointer, "loaded address")?
            }
            TacInstr::Store(ptr, _) => {
                self.expect(position, ptr.ty(), Type::Pointer, "stored address")?
            }
            TacInstr::Jump(_) | TacInstr::Label(_) => {}
            TacInstr::JumpIfZero(_, _) | TacInstr::JumpIfNotZero(_, _) => {}
            TacInstr::Call(_, name, args) => {
                if let Some(&arity) = self.arities.get(name.as_str()) {
                    if arity != args.len() {
                        return self.malformed(
                            position,
                            format!(
                                "call to '{}' with {} arguments, expected {}",
                                name,
                                args.len(),
                                arity
                            ),
                        );
                    }
                }
            }
            TacInstr::Convert(dst, conversion, src) => {
                self.check_conversion(position, dst.ty, *conversion, src.ty())?
            }
        }
        Ok(())
    }

    fn check_conversion(
        &self,
        position: Position,
        to: Type,
        conversion: Conversion,
        from: Type,
    ) -> CompileResult<()> {
        let valid = match conversion {
            Conversion::SignExtend | Conversion::ZeroExtend => {
                !from.is_double() && !to.is_double() && to.size() > from.size()
            }
            Conversion::Truncate => {
                !from.is_double() && !to.is_double() && to.size() < from.size()
            }
            Conversion::IntToDouble | Conversion::UIntToDouble => from.is_integer() && to.is_double(),
            Conversion::DoubleToInt | Conversion::DoubleToUInt => from.is_double() && to.is_integer(),
        };
        if valid {
            Ok(())
        } else {
            self.malformed(
                position,
                format!("invalid conversion {} from {} to {}", conversion, from, to),
            )
        }
    }

    fn expect(&self, position: Position, actual: Type, expected: Type, what: &str) -> CompileResult<()> {
        if actual == expected {
            Ok(())
        } else {
            self.malformed(
                position,
                format!("{} has type {}, expected {}", what, actual, expected),
            )
        }
    }
}

fn describe(ty: Option<Type>) -> String {
    ty.map(|t| t.to_string()).unwrap_or_else(|| "void".to_string())
}
