//! Shorthands for writing TAC listings in tests.

use super::*;

pub fn int(name: &str) -> Variable {
    Variable::new(name, Type::Int)
}

pub fn ptr(name: &str) -> Variable {
    Variable::new(name, Type::Pointer)
}

/// An `int` variable used as an operand.
pub fn var(name: &str) -> Value {
    Value::Var(int(name))
}

pub fn cnst(value: i32) -> Value {
    Value::Const(Const::Int(value))
}

pub fn lbl(name: &str) -> Label {
    Label::new(name, 1)
}

pub fn function(body: Vec<TacInstr>) -> Function {
    Function::new("main", vec![], Some(Type::Int), body)
}

/// Render a listing the same way dumps do, one string per instruction.
pub fn render(listing: &TacListing) -> Vec<String> {
    listing.iter_instructions().map(ToString::to_string).collect()
}
