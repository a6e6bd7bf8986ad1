//! Register allocation for lowered functions. Describes an [`AsmFunction`] to
//! the target-independent allocator, then replaces every pseudo register by
//! the hard register or stack slot it was assigned.

use std::collections::HashMap;

use itertools::Itertools;

use crate::{
    codegen::register_allocation::{self, Allocation, Destination, Location, Target},
    prelude::*,
};

use super::{
    assembly::{AsmFunction, Instr, Operand},
    op_semantics::{address_registers, directions, implicit_reads, implicit_writes},
    stack_convention::Frame,
    x86::{AsmType, Op, RegClass, Register},
};

fn location(operand: &Operand) -> Option<Location<Register>> {
    match operand {
        Operand::Reg(reg) => Some(Location::Reg(*reg)),
        Operand::Pseudo(name) => Some(Location::Pseudo(name.clone())),
        _ => None,
    }
}

fn is_self_move(instr: &Instr) -> bool {
    instr.is_move()
        && instr.operands[0] == instr.operands[1]
        && !instr.operands[0].is_memory()
}

impl Target for AsmFunction {
    type Register = Register;
    type Class = RegClass;
    type Instr = Instr;

    fn instructions(&self) -> &[Instr] {
        self.body.as_slice()
    }

    fn reads(&self, index: usize) -> Vec<Location<Register>> {
        let instr = &self.body.as_slice()[index];
        let mut reads = vec![];
        for (operand, direction) in instr.operands.iter().zip(directions(instr)) {
            if direction.reads() {
                reads.extend(location(operand));
            }
            reads.extend(address_registers(operand).map(Location::Reg));
        }
        let arguments = match (instr.op, instr.operands.first()) {
            (Op::Call, Some(Operand::Id(callee))) => {
                self.call_arguments.get(callee).map_or(&[][..], Vec::as_slice)
            }
            _ => &[][..],
        };
        reads.extend(implicit_reads(instr, arguments).into_iter().map(Location::Reg));
        reads
    }

    fn writes(&self, index: usize) -> Vec<Location<Register>> {
        let instr = &self.body.as_slice()[index];
        let mut writes: Vec<_> = instr
            .operands
            .iter()
            .zip(directions(instr))
            .filter(|(_, direction)| direction.writes())
            .filter_map(|(operand, _)| location(operand))
            .collect();
        writes.extend(implicit_writes(instr).into_iter().map(Location::Reg));
        writes
    }

    fn as_move(&self, index: usize) -> Option<(Location<Register>, Location<Register>)> {
        let instr = &self.body.as_slice()[index];
        if !instr.is_move() {
            return None;
        }
        Some((location(&instr.operands[0])?, location(&instr.operands[1])?))
    }

    fn exit_live(&self) -> Vec<Register> {
        self.return_registers.clone()
    }

    fn class_of(&self, location: &Location<Register>) -> Option<RegClass> {
        match location {
            Location::Reg(reg) => {
                let class = reg.class();
                class.colours().contains(reg).then_some(class)
            }
            Location::Pseudo(name) => {
                let info = self.pseudos.get(name)?;
                match (info.aliased, info.ty) {
                    (true, _) => None,
                    (false, AsmType::Double) => Some(RegClass::Sse),
                    (false, _) => Some(RegClass::General),
                }
            }
        }
    }

    fn classes(&self) -> Vec<RegClass> {
        vec![RegClass::General, RegClass::Sse]
    }

    fn colours(&self, class: RegClass) -> &[Register] {
        class.colours()
    }

    fn rename(&mut self, renames: &HashMap<String, Location<Register>>) {
        for instr in self.body.iter_instructions_mut() {
            for operand in &mut instr.operands {
                if let Operand::Pseudo(name) = operand {
                    match renames.get(name) {
                        Some(Location::Reg(reg)) => *operand = Operand::Reg(*reg),
                        Some(Location::Pseudo(new)) => *operand = Operand::Pseudo(new.clone()),
                        None => {}
                    }
                }
            }
        }
        self.body.retain_lines(|_, instr| !is_self_move(instr));
    }
}

/// Allocate registers for the function and replace its pseudo registers.
/// Returns the stack frame the function needs, and the allocation for
/// inspection.
pub fn allocate_registers(function: &mut AsmFunction) -> (Frame, Allocation<Register>) {
    let mut allocation = register_allocation::allocate(function);

    // Pseudos without a register are given stack slots in order of first appearance.
    let names: Vec<String> = function
        .body
        .iter_instructions()
        .flat_map(|instr| instr.operands.iter())
        .filter_map(|operand| match operand {
            Operand::Pseudo(name) => Some(name.clone()),
            _ => None,
        })
        .unique()
        .collect();
    allocation.assign_stack_offsets(names.iter().map(String::as_str));

    for instr in function.body.iter_instructions_mut() {
        for operand in &mut instr.operands {
            let Operand::Pseudo(name) = operand else {
                continue;
            };
            match allocation.destination(name) {
                Some(Destination::Reg(reg)) => *operand = Operand::Reg(reg),
                Some(Destination::Stack(offset)) => {
                    *operand = Operand::Memory(Register::Rbp, offset.displacement())
                }
                None => {}
            }
        }
    }
    function.body.retain_lines(|_, instr| !is_self_move(instr));

    let callee_saved: Vec<Register> = function
        .body
        .iter_instructions()
        .flat_map(|instr| instr.operands.iter())
        .filter_map(|operand| match operand {
            Operand::Reg(reg) if reg.is_callee_saved() => Some(*reg),
            _ => None,
        })
        .sorted()
        .dedup()
        .collect();
    let frame = Frame::new(allocation.stack_size(), callee_saved);

    info!(
        "allocated {}: {} registers, {} coalesced, {} spilled, {} bytes of locals",
        function.name,
        allocation.used_registers().len(),
        allocation.coalesced(),
        allocation.spilled().count(),
        frame.locals
    );
    (frame, allocation)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{codegen::amd64::assembly::PseudoInfo, listing::Listing};

    use Operand::*;
    use Register::*;

    fn pseudo(name: &str) -> Operand {
        Pseudo(name.to_string())
    }

    fn function(body: Vec<Instr>, pseudos: &[(&str, AsmType)]) -> AsmFunction {
        AsmFunction {
            name: "main".to_string(),
            global: true,
            body: Listing::from(body),
            pseudos: pseudos
                .iter()
                .map(|(name, ty)| {
                    (
                        name.to_string(),
                        PseudoInfo {
                            ty: *ty,
                            aliased: false,
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
            return_registers: vec![Rax],
            call_arguments: HashMap::new(),
        }
    }

    fn rendered(function: &AsmFunction) -> Vec<String> {
        function
            .body
            .iter_instructions()
            .map(|i| i.to_string().split_whitespace().join(" "))
            .collect()
    }

    #[test]
    fn copies_into_the_return_register_are_coalesced() {
        let mut f = function(
            vec![
                Instr::new(Op::Mov, AsmType::Longword, vec![pseudo("x"), Imm(3)]),
                Instr::new(Op::Mov, AsmType::Longword, vec![Reg(Rax), pseudo("x")]),
                Instr::bare(Op::Ret, vec![]),
            ],
            &[("x", AsmType::Longword)],
        );
        let (frame, _) = allocate_registers(&mut f);

        assert_eq!(vec!["mov eax, 3", "ret"], rendered(&f));
        assert_eq!(0, frame.locals);
        assert!(frame.callee_saved.is_empty());
    }

    #[test]
    fn values_live_across_calls_avoid_caller_saved_registers() {
        let mut f = function(
            vec![
                Instr::new(Op::Mov, AsmType::Longword, vec![pseudo("x"), Imm(3)]),
                Instr::bare(Op::Call, vec![Id("f".to_string())]),
                Instr::new(Op::Mov, AsmType::Longword, vec![Reg(Rax), pseudo("x")]),
                Instr::bare(Op::Ret, vec![]),
            ],
            &[("x", AsmType::Longword)],
        );
        let (frame, allocation) = allocate_registers(&mut f);

        let reg = allocation.register("x").unwrap();
        assert!(reg.is_callee_saved());
        assert_eq!(vec![reg], frame.callee_saved);
        // One callee-saved push keeps the stack aligned with 8 bytes of padding.
        assert_eq!(8, frame.locals);
    }

    #[test]
    fn aliased_pseudos_live_on_the_stack() {
        let mut f = function(
            vec![
                Instr::new(Op::Mov, AsmType::Longword, vec![pseudo("x"), Imm(3)]),
                Instr::bare(Op::Lea, vec![Reg(Rax), pseudo("x")]),
                Instr::bare(Op::Ret, vec![]),
            ],
            &[],
        );
        f.pseudos.insert(
            "x".to_string(),
            PseudoInfo {
                ty: AsmType::Longword,
                aliased: true,
            },
        );
        let (frame, _) = allocate_registers(&mut f);

        assert_eq!(
            vec!["mov DWORD PTR [rbp-8], 3", "lea rax, [rbp-8]", "ret"],
            rendered(&f)
        );
        assert_eq!(16, frame.locals);
    }

    #[test]
    fn call_reads_its_argument_registers() {
        let mut f = function(
            vec![
                Instr::new(Op::Mov, AsmType::Longword, vec![Reg(Rdi), Imm(1)]),
                Instr::bare(Op::Call, vec![Id("g".to_string())]),
                Instr::bare(Op::Ret, vec![]),
            ],
            &[],
        );
        f.call_arguments.insert("g".to_string(), vec![Rdi]);

        assert_eq!(vec![Location::Reg(Rdi)], f.reads(1));
        assert!(f.writes(1).contains(&Location::Reg(Rax)));
    }

    #[test]
    fn double_pseudos_use_sse_registers() {
        let mut f = function(
            vec![
                Instr::new(Op::Mov, AsmType::Double, vec![pseudo("d"), Data("c".to_string())]),
                Instr::new(Op::Add, AsmType::Double, vec![pseudo("d"), pseudo("d")]),
                Instr::new(Op::Mov, AsmType::Double, vec![Reg(Xmm0), pseudo("d")]),
                Instr::bare(Op::Ret, vec![]),
            ],
            &[("d", AsmType::Double)],
        );
        f.return_registers = vec![Xmm0];
        allocate_registers(&mut f);

        assert_eq!(
            vec!["movsd xmm0, QWORD PTR c[rip]", "addsd xmm0, xmm0", "ret"],
            rendered(&f)
        );
    }
}
