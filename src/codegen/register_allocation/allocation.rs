use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
};

use super::InterferenceGraph;

/// A destination in which the value of a pseudo register will be held.
/// Values can be stored in a register or on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination<R> {
    Reg(R),
    Stack(BaseOffset),
}

/// The result of register allocation for a single function.
#[derive(Debug, Clone)]
pub struct Allocation<R> {
    registers: HashMap<String, R>,
    spilled: BTreeSet<String>,
    stack_slots: HashMap<String, BaseOffset>,
    coalesced: usize,
    graphs: Vec<InterferenceGraph<R>>,
}
impl<R: Copy + Eq + Ord + Hash + Debug + Display> Allocation<R> {
    pub fn new(
        registers: HashMap<String, R>,
        spilled: BTreeSet<String>,
        coalesced: usize,
        graphs: Vec<InterferenceGraph<R>>,
    ) -> Self {
        Self {
            registers,
            spilled,
            stack_slots: HashMap::new(),
            coalesced,
            graphs,
        }
    }

    /// The register assigned to a pseudo, if any.
    pub fn register(&self, name: &str) -> Option<R> {
        self.registers.get(name).copied()
    }

    pub fn spilled(&self) -> impl Iterator<Item = &str> {
        self.spilled.iter().map(String::as_str)
    }

    /// Number of pseudos eliminated by coalescing.
    pub fn coalesced(&self) -> usize {
        self.coalesced
    }

    /// The final interference graph of every register class.
    pub fn graphs(&self) -> &[InterferenceGraph<R>] {
        &self.graphs
    }

    /// Every register assigned to at least one pseudo.
    pub fn used_registers(&self) -> BTreeSet<R> {
        self.registers.values().copied().collect()
    }

    /// Assign a stack slot to each of the given names which was not assigned a
    /// register. Slots are handed out in the order the names are given; a name
    /// is only assigned a slot once.
    pub fn assign_stack_offsets<'a, I: IntoIterator<Item = &'a str>>(&mut self, names: I) {
        for name in names {
            if self.registers.contains_key(name) || self.stack_slots.contains_key(name) {
                continue;
            }
            let offset = BaseOffset::words(self.stack_slots.len() + 1);
            self.stack_slots.insert(name.to_string(), offset);
        }
    }

    /// Lookup the storage destination for a pseudo. Stack destinations are
    /// only known after [`Self::assign_stack_offsets()`] has been called.
    pub fn destination(&self, name: &str) -> Option<Destination<R>> {
        self.register(name)
            .map(Destination::Reg)
            .or_else(|| self.stack_slots.get(name).copied().map(Destination::Stack))
    }

    /// Number of bytes needed to hold every stack slot.
    pub fn stack_size(&self) -> usize {
        self.stack_slots.len() * 8
    }
}

/// A point on the stack, offset below the base of the current stack frame
/// by the given number of bytes.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BaseOffset(usize);
impl BaseOffset {
    /// Construct a new [`BaseOffset`], offset from the base of the stack frame
    /// by a given amount of words. A word is considered to be 8 bytes wide
    /// in the current implementation.
    pub fn words(words: usize) -> Self {
        Self(words * 8)
    }

    /// The displacement from the base pointer at which the slot starts.
    pub fn displacement(&self) -> i64 {
        -(self.0 as i64)
    }
}
impl Debug for BaseOffset {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}
impl Display for BaseOffset {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! make_allocation {
        ($($name:expr => $reg:expr),*; spilled: [$($spill:expr),*]) => {
            Allocation::<char>::new(
                vec![$(($name.to_string(), $reg)),*].into_iter().collect(),
                vec![$($spill.to_string()),*].into_iter().collect(),
                0,
                vec![],
            )
        };
    }

    #[test]
    fn registers_are_looked_up_by_name() {
        let allocation = make_allocation!("x" => 'a', "y" => 'b'; spilled: []);

        assert_eq!(Some(Destination::Reg('b')), allocation.destination("y"));
        assert_eq!(None, allocation.destination("z"));
    }

    #[test]
    fn stack_offsets_follow_the_given_order() {
        let mut allocation = make_allocation!("x" => 'a'; spilled: ["s", "t"]);
        allocation.assign_stack_offsets(["t", "x", "s", "t"]);

        assert_eq!(
            Some(Destination::Stack(BaseOffset::words(1))),
            allocation.destination("t")
        );
        assert_eq!(
            Some(Destination::Stack(BaseOffset::words(2))),
            allocation.destination("s")
        );
        assert_eq!(Some(Destination::Reg('a')), allocation.destination("x"));
        assert_eq!(16, allocation.stack_size());
    }

    #[test]
    fn names_without_a_register_receive_a_slot() {
        let mut allocation = make_allocation!(; spilled: []);
        allocation.assign_stack_offsets(["aliased"]);

        assert_eq!(-8, BaseOffset::words(1).displacement());
        assert!(matches!(
            allocation.destination("aliased"),
            Some(Destination::Stack(offset)) if offset.displacement() == -8
        ));
    }

    #[test]
    fn used_registers_are_deduplicated() {
        let allocation = make_allocation!("x" => 'a', "y" => 'a', "z" => 'c'; spilled: []);

        assert_eq!(vec!['a', 'c'], allocation.used_registers().into_iter().collect::<Vec<_>>());
    }
}
