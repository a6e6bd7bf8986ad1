//! An optimising backend which compiles three-address code to x86-64
//! assembly for Linux and macOS.
//!
//! [`compile`] runs the whole pipeline: the program is verified, every
//! function is optimised, lowered to assembly over pseudo registers, given
//! registers by a graph colouring allocator and finally emitted as GNU
//! assembler source in Intel syntax.

pub mod cfg;
pub mod codegen;
pub mod config;
pub mod error;
mod ext;
pub mod il;
pub mod listing;
pub mod optimiser;
mod prelude;

use crate::prelude::*;

pub use crate::{
    config::{Config, Dump, Platform},
    error::{CompileError, CompileResult},
    il::TacProgram,
};

/// The result of compiling a program.
#[derive(Debug, Clone)]
pub struct Output {
    /// The complete assembly file.
    pub assembly: String,
    /// Debug dumps requested through [`config::DebugOptions`], in the order
    /// they were produced.
    pub dumps: Vec<Dump>,
}

/// Compile a program to assembly. No assembly is produced if the program is
/// rejected.
pub fn compile(program: &TacProgram, config: &Config) -> CompileResult<Output> {
    il::verify(program, config)?;

    let mut dumps = vec![];
    let mut program = program.clone();
    optimiser::optimise(&mut program, config, &mut dumps);
    let assembly = codegen::generate_assembly(&program, config, &mut dumps);

    info!(
        "compiled {} functions and {} statics for {:?}",
        program.functions.len(),
        program.statics.len(),
        config.platform
    );
    Ok(Output { assembly, dumps })
}
