//! Native code generation for the System V AMD64 platforms.

mod assembly;
mod calling_convention;
mod emit;
mod fixup;
mod op_semantics;
mod procedure_compiler;
mod register_allocator;
mod stack_convention;
mod x86;

use crate::{
    codegen::register_allocation::graphviz::render_dot,
    config::{Config, Dump},
    il::TacProgram,
    prelude::*,
};

use self::{
    assembly::ConstantPool,
    emit::{Assembly, EmittedFunction},
    fixup::fix_up,
    procedure_compiler::{ProcedureCompiler, ProgramInfo},
    register_allocator::allocate_registers,
};

/// Compile a verified program to an assembly file for the configured platform.
pub fn compile(program: &TacProgram, config: &Config, dumps: &mut Vec<Dump>) -> String {
    let info = ProgramInfo::new(program, config.platform);
    let mut constants = ConstantPool::new(config.platform);
    let mut functions = Vec::with_capacity(program.functions.len());

    for function in &program.functions {
        let wanted = config.debug.wants(&function.name);
        let mut asm = ProcedureCompiler::compile(function, &info, &mut constants);
        debug!("lowered {} to {} instructions", asm.name, asm.body.len());
        if config.debug.dump_assembly && wanted {
            dumps.push(Dump::new(&asm.name, "asm.pseudo", asm.to_string()));
        }

        let (frame, allocation) = allocate_registers(&mut asm);
        if config.debug.dump_interference && wanted {
            for graph in allocation.graphs() {
                match render_dot(graph) {
                    Ok(dot) => dumps.push(Dump::new(
                        &asm.name,
                        format!("interference.{}", graph.name),
                        dot,
                    )),
                    Err(e) => warn!("{}: {:#}", asm.name, e),
                }
            }
        }

        asm.body = fix_up(std::mem::take(&mut asm.body));
        if config.debug.dump_assembly && wanted {
            dumps.push(Dump::new(&asm.name, "asm.allocated", asm.to_string()));
        }
        functions.push(EmittedFunction {
            function: asm,
            frame,
        });
    }

    Assembly::new(
        config.platform,
        functions,
        program.statics.clone(),
        constants,
    )
    .to_string()
}
