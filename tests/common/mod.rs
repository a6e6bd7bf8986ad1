#![allow(dead_code)]

use std::sync::Once;

use tacc::il::*;

static LOGGING: Once = Once::new();

/// Send log output to stderr, where the test harness captures it.
pub fn init_logging() {
    LOGGING.call_once(|| {
        stderrlog::new().verbosity(4usize).init().ok();
    });
}

pub fn int(name: &str) -> Variable {
    Variable::new(name, Type::Int)
}

pub fn var(name: &str) -> Value {
    Value::Var(int(name))
}

pub fn cnst(value: i32) -> Value {
    Value::Const(Const::Int(value))
}

/// Normalise assembly text to one instruction or directive per entry, without
/// comments or alignment padding.
pub fn lines(assembly: &str) -> Vec<String> {
    assembly
        .lines()
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

pub fn program(functions: Vec<Function>) -> TacProgram {
    TacProgram {
        functions,
        statics: vec![],
    }
}
