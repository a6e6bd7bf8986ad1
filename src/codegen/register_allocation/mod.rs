//! Assignment of pseudo registers to hard registers by graph colouring.
//!
//! The allocator is independent of the target architecture. A function to be
//! allocated is described through the [`Target`] trait, which reports what
//! each instruction reads and writes, and which copies it performs.

mod allocation;
mod allocator;
pub mod graphviz;
pub mod interference;
pub mod liveness;

use std::{
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
};

use crate::cfg::ControlFlow;

pub use allocation::{Allocation, BaseOffset, Destination};
pub use allocator::{allocate, colour};
pub use interference::InterferenceGraph;
pub use liveness::Liveness;

/// A location that can hold a value during register allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location<R> {
    Reg(R),
    Pseudo(String),
}
impl<R> Location<R> {
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Location::Pseudo(_))
    }

    pub fn as_pseudo(&self) -> Option<&str> {
        match self {
            Location::Pseudo(name) => Some(name),
            Location::Reg(_) => None,
        }
    }
}
impl<R: Display> Display for Location<R> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Location::Reg(reg) => write!(f, "{}", reg),
            Location::Pseudo(name) => f.write_str(name),
        }
    }
}

/// A function whose pseudo registers can be allocated.
pub trait Target {
    type Register: Copy + Eq + Ord + Hash + Debug + Display;
    type Class: Copy + Eq + Ord + Hash + Debug + Display;
    type Instr: ControlFlow;

    fn instructions(&self) -> &[Self::Instr];

    /// The locations read by the instruction at `index`.
    fn reads(&self, index: usize) -> Vec<Location<Self::Register>>;

    /// The locations written by the instruction at `index`.
    fn writes(&self, index: usize) -> Vec<Location<Self::Register>>;

    /// For an instruction which copies one location into another, the
    /// destination and source.
    fn as_move(&self, index: usize) -> Option<(Location<Self::Register>, Location<Self::Register>)>;

    /// Registers whose values are read after the function returns.
    fn exit_live(&self) -> Vec<Self::Register>;

    /// The register class of a location, or [`None`] if it does not take part
    /// in allocation.
    fn class_of(&self, location: &Location<Self::Register>) -> Option<Self::Class>;

    /// The classes to allocate, in order.
    fn classes(&self) -> Vec<Self::Class>;

    /// The registers which may be assigned to pseudos of the given class.
    fn colours(&self, class: Self::Class) -> &[Self::Register];

    /// Replace every occurrence of the named pseudos by the given locations,
    /// dropping copies that become redundant.
    fn rename(&mut self, renames: &HashMap<String, Location<Self::Register>>);
}

#[cfg(test)]
pub(crate) mod testing {
    //! A tiny register machine for exercising the allocator.

    use super::*;
    use crate::cfg::Flow;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Toy {
        /// `dst = src`
        Mov(Location<char>, Location<char>),
        /// `dst = op(srcs...)`
        Def(Location<char>, Vec<Location<char>>),
        /// Reads all operands.
        Use(Vec<Location<char>>),
        Label(u32),
        Branch(u32),
        Ret,
    }
    impl ControlFlow for Toy {
        type Label = u32;

        fn flow(&self) -> Flow<'_, u32> {
            match self {
                Toy::Label(l) => Flow::Label(l),
                Toy::Branch(l) => Flow::Branch(l),
                Toy::Ret => Flow::Return,
                _ => Flow::Next,
            }
        }
    }

    pub fn p(name: &str) -> Location<char> {
        Location::Pseudo(name.to_string())
    }

    pub fn r(reg: char) -> Location<char> {
        Location::Reg(reg)
    }

    pub struct ToyFunction {
        pub body: Vec<Toy>,
        pub colours: Vec<char>,
        pub returns: Vec<char>,
    }
    impl ToyFunction {
        pub fn new(colours: &str, body: Vec<Toy>) -> Self {
            Self {
                body,
                colours: colours.chars().collect(),
                returns: vec![],
            }
        }
    }
    impl Target for ToyFunction {
        type Register = char;
        type Class = u8;
        type Instr = Toy;

        fn instructions(&self) -> &[Toy] {
            &self.body
        }

        fn reads(&self, index: usize) -> Vec<Location<char>> {
            match &self.body[index] {
                Toy::Mov(_, src) => vec![src.clone()],
                Toy::Def(_, srcs) | Toy::Use(srcs) => srcs.clone(),
                _ => vec![],
            }
        }

        fn writes(&self, index: usize) -> Vec<Location<char>> {
            match &self.body[index] {
                Toy::Mov(dst, _) | Toy::Def(dst, _) => vec![dst.clone()],
                _ => vec![],
            }
        }

        fn as_move(&self, index: usize) -> Option<(Location<char>, Location<char>)> {
            match &self.body[index] {
                Toy::Mov(dst, src) => Some((dst.clone(), src.clone())),
                _ => None,
            }
        }

        fn exit_live(&self) -> Vec<char> {
            self.returns.clone()
        }

        fn class_of(&self, location: &Location<char>) -> Option<u8> {
            match location {
                Location::Reg(reg) if !self.colours.contains(reg) => None,
                _ => Some(0),
            }
        }

        fn classes(&self) -> Vec<u8> {
            vec![0]
        }

        fn colours(&self, _: u8) -> &[char] {
            &self.colours
        }

        fn rename(&mut self, renames: &HashMap<String, Location<char>>) {
            let rename = |loc: &mut Location<char>| {
                if let Location::Pseudo(name) = loc {
                    if let Some(new) = renames.get(name) {
                        *loc = new.clone();
                    }
                }
            };
            for instr in &mut self.body {
                match instr {
                    Toy::Mov(dst, src) => {
                        rename(dst);
                        rename(src);
                    }
                    Toy::Def(dst, srcs) => {
                        rename(dst);
                        srcs.iter_mut().for_each(rename);
                    }
                    Toy::Use(srcs) => srcs.iter_mut().for_each(rename),
                    _ => {}
                }
            }
            self.body
                .retain(|instr| !matches!(instr, Toy::Mov(dst, src) if dst == src));
        }
    }
}
