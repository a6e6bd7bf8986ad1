//! Target code generation.
mod amd64;
pub mod register_allocation;
pub mod toolchain;

use crate::{
    config::{Config, Dump},
    il::TacProgram,
};

/// Generate the assembly file for a verified program. Debug dumps requested by
/// the configuration are appended to `dumps`.
pub fn generate_assembly(program: &TacProgram, config: &Config, dumps: &mut Vec<Dump>) -> String {
    amd64::compile(program, config, dumps)
}
