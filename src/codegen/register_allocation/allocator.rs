//! Chaitin-Briggs graph colouring with conservative coalescing.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::{Debug, Display},
    hash::Hash,
};

use crate::prelude::*;

use super::{
    interference::{self, NodeId},
    liveness, Allocation, InterferenceGraph, Location, Target,
};

/// The registers assigned to the pseudos of one graph, and the pseudos that
/// could not be assigned one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colouring<R> {
    pub registers: HashMap<String, R>,
    pub spilled: Vec<String>,
}

/// Allocate registers for every pseudo of the target. Copies between
/// locations that can share a register are removed from the target; pseudos
/// that cannot be given a register are reported as spilled.
pub fn allocate<T: Target>(target: &mut T) -> Allocation<T::Register> {
    let mut coalesced = 0;
    let graphs = loop {
        let liveness = liveness::analyse(target);
        let mut graphs: Vec<_> = target
            .classes()
            .into_iter()
            .map(|class| (class, interference::build(target, &liveness, class)))
            .collect();

        let renames = coalesce(target, &mut graphs);
        if renames.is_empty() {
            break graphs;
        }
        coalesced += renames.len();
        target.rename(&renames);
    };
    debug!("coalesced {} pseudos", coalesced);

    let mut registers = HashMap::new();
    let mut spilled = BTreeSet::new();
    let mut final_graphs = vec![];
    for (class, graph) in graphs {
        let colouring = colour(&graph, target.colours(class));
        debug!(
            "{}: {} pseudos coloured, {} spilled",
            class,
            colouring.registers.len(),
            colouring.spilled.len()
        );
        registers.extend(colouring.registers);
        spilled.extend(colouring.spilled);
        final_graphs.push(graph);
    }

    Allocation::new(registers, spilled, coalesced, final_graphs)
}

/// Merge the two sides of every copy that can be merged without making the
/// graph harder to colour. Returns the new location of every merged pseudo.
fn coalesce<T: Target>(
    target: &T,
    graphs: &mut [(T::Class, InterferenceGraph<T::Register>)],
) -> HashMap<String, Location<T::Register>> {
    for index in 0..target.instructions().len() {
        let Some((dst, src)) = target.as_move(index) else {
            continue;
        };
        let (Some(class), Some(src_class)) = (target.class_of(&dst), target.class_of(&src)) else {
            continue;
        };
        if class != src_class {
            continue;
        }
        let Some((_, graph)) = graphs.iter_mut().find(|(c, _)| *c == class) else {
            continue;
        };
        let k = target.colours(class).len();
        let (Some(a), Some(b)) = (graph.id_of(&dst), graph.id_of(&src)) else {
            continue;
        };
        if a == b || graph.interferes(a, b) {
            continue;
        }

        match (graph.node(a).is_precoloured(), graph.node(b).is_precoloured()) {
            (true, true) => {}
            (true, false) => {
                if george(graph, b, a, k) {
                    trace!("coalescing {} into {}", graph.node(b).location, graph.node(a).location);
                    graph.merge(b, a);
                }
            }
            (false, true) => {
                if george(graph, a, b, k) {
                    trace!("coalescing {} into {}", graph.node(a).location, graph.node(b).location);
                    graph.merge(a, b);
                }
            }
            (false, false) => {
                if briggs(graph, a, b, k) {
                    trace!("coalescing {} into {}", graph.node(b).location, graph.node(a).location);
                    graph.merge(b, a);
                }
            }
        }
    }

    let mut renames = HashMap::new();
    for (_, graph) in graphs.iter() {
        for id in 0..graph.len() {
            let node = graph.node(NodeId(id));
            let Location::Pseudo(name) = &node.location else {
                continue;
            };
            if !node.removed {
                continue;
            }
            if let Some(representative) = graph.id_of(&node.location) {
                renames.insert(name.clone(), graph.node(representative).location.clone());
            }
        }
    }
    renames
}

fn is_significant<R>(graph: &InterferenceGraph<R>, id: NodeId, k: usize) -> bool
where
    R: Copy + Eq + Ord + Hash + Debug + Display,
{
    graph.node(id).is_precoloured() || graph.degree(id) >= k
}

/// Two pseudos may be merged if the merged node has fewer than `k` neighbours
/// of significant degree.
fn briggs<R>(graph: &InterferenceGraph<R>, a: NodeId, b: NodeId, k: usize) -> bool
where
    R: Copy + Eq + Ord + Hash + Debug + Display,
{
    let neighbours: HashSet<NodeId> = graph.neighbours(a).chain(graph.neighbours(b)).collect();
    neighbours
        .into_iter()
        .filter(|n| is_significant(graph, *n, k))
        .count()
        < k
}

/// A pseudo may be merged into a hard register if each of its neighbours
/// already interferes with the register, is a hard register itself, or has
/// insignificant degree.
fn george<R>(graph: &InterferenceGraph<R>, pseudo: NodeId, hard: NodeId, k: usize) -> bool
where
    R: Copy + Eq + Ord + Hash + Debug + Display,
{
    graph.neighbours(pseudo).all(|n| {
        graph.interferes(n, hard) || graph.node(n).is_precoloured() || graph.degree(n) < k
    })
}

/// Colour the pseudos of an interference graph with the given registers.
/// Hard registers in the graph keep their own colour.
pub fn colour<R>(graph: &InterferenceGraph<R>, colours: &[R]) -> Colouring<R>
where
    R: Copy + Eq + Ord + Hash + Debug + Display,
{
    let k = colours.len();
    let mut degrees: HashMap<NodeId, usize> =
        graph.node_ids().map(|id| (id, graph.degree(id))).collect();
    let mut remaining: BTreeSet<NodeId> = graph
        .node_ids()
        .filter(|id| !graph.node(*id).is_precoloured())
        .collect();

    // Simplify: repeatedly remove a node which is guaranteed a colour, or
    // optimistically push the cheapest spill candidate.
    let mut stack = vec![];
    while !remaining.is_empty() {
        let trivial = remaining.iter().copied().find(|id| degrees[id] < k);
        let next = match trivial {
            Some(id) => id,
            None => {
                let cost = |n: NodeId| graph.node(n).spill_cost;
                let Some(candidate) = remaining.iter().copied().reduce(|best, id| {
                    if cost(id) * degrees[&best] < cost(best) * degrees[&id] {
                        id
                    } else {
                        best
                    }
                }) else {
                    break;
                };
                trace!(
                    "{} is a spill candidate (cost {}, degree {})",
                    graph.node(candidate).location,
                    graph.node(candidate).spill_cost,
                    degrees[&candidate]
                );
                candidate
            }
        };
        remaining.remove(&next);
        for n in graph.neighbours(next) {
            if let Some(d) = degrees.get_mut(&n) {
                *d = d.saturating_sub(1);
            }
        }
        stack.push(next);
    }

    // Select: hand out colours in reverse order of removal.
    let mut assigned: HashMap<NodeId, R> = graph
        .node_ids()
        .filter_map(|id| match graph.node(id).location {
            Location::Reg(reg) => Some((id, reg)),
            Location::Pseudo(_) => None,
        })
        .collect();
    let mut spilled = vec![];
    while let Some(id) = stack.pop() {
        let taken: HashSet<R> = graph
            .neighbours(id)
            .filter_map(|n| assigned.get(&n).copied())
            .collect();
        let name = match &graph.node(id).location {
            Location::Pseudo(name) => name.clone(),
            Location::Reg(_) => continue,
        };
        match colours.iter().find(|c| !taken.contains(c)) {
            Some(reg) => {
                trace!("{} -> {}", name, reg);
                assigned.insert(id, *reg);
            }
            None => {
                trace!("{} spilled", name);
                spilled.push(name);
            }
        }
    }

    for (a, b) in graph.edges() {
        if let (Some(x), Some(y)) = (assigned.get(&a), assigned.get(&b)) {
            assert!(
                x != y,
                "Interfering locations {} and {} were both assigned {}",
                graph.node(a).location,
                graph.node(b).location,
                x
            );
        }
    }

    let registers = assigned
        .into_iter()
        .filter_map(|(id, reg)| graph.node(id).location.as_pseudo().map(|n| (n.to_string(), reg)))
        .collect();
    spilled.sort();
    Colouring { registers, spilled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::register_allocation::testing::*;

    macro_rules! graph {
        ($($a:expr => $b:expr),* $(,)?) => {{
            let mut graph = InterferenceGraph::<char>::new("test");
            $(
                let a = graph.add_node(p($a));
                let b = graph.add_node(p($b));
                graph.add_edge(a, b);
            )*
            graph
        }};
    }

    macro_rules! assert_valid_colouring {
        ($graph:expr, $colouring:expr) => {
            for (a, b) in $graph.edges() {
                let a = $graph.node(a).location.to_string();
                let b = $graph.node(b).location.to_string();
                if let (Some(x), Some(y)) = ($colouring.registers.get(&a), $colouring.registers.get(&b)) {
                    assert_ne!(x, y, "{} and {} share a colour", a, b);
                }
            }
        };
    }

    #[test]
    fn chain_is_coloured_with_two_colours() {
        let graph = graph!("x" => "y", "y" => "z");
        let colouring = colour(&graph, &['a', 'b']);

        assert!(colouring.spilled.is_empty());
        assert_eq!(3, colouring.registers.len());
        assert_valid_colouring!(graph, colouring);
    }

    #[test]
    fn clique_larger_than_colours_spills() {
        let graph = graph!("x" => "y", "y" => "z", "z" => "x");
        let colouring = colour(&graph, &['a', 'b']);

        assert_eq!(1, colouring.spilled.len());
        assert_eq!(2, colouring.registers.len());
        assert_valid_colouring!(graph, colouring);
    }

    #[test]
    fn cheapest_node_is_spilled() {
        let mut graph = graph!("x" => "y", "y" => "z", "z" => "x");
        for (name, cost) in [("x", 5), ("y", 1), ("z", 5)] {
            let id = graph.id_of(&p(name)).unwrap();
            for _ in 0..cost {
                graph.bump_spill_cost(id);
            }
        }
        let colouring = colour(&graph, &['a', 'b']);

        assert_eq!(vec!["y".to_string()], colouring.spilled);
    }

    #[test]
    fn precoloured_neighbours_are_avoided() {
        let mut graph = InterferenceGraph::<char>::new("test");
        let a = graph.add_node(r('a'));
        let x = graph.add_node(p("x"));
        graph.add_edge(a, x);
        let colouring = colour(&graph, &['a', 'b']);

        assert_eq!(Some(&'b'), colouring.registers.get("x"));
    }

    #[test]
    fn allocate_spills_when_pressure_exceeds_registers() {
        let mut function = ToyFunction::new(
            "ab",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Def(p("y"), vec![]),
                Toy::Def(p("z"), vec![]),
                Toy::Use(vec![p("x"), p("y"), p("z")]),
                Toy::Ret,
            ],
        );
        let allocation = allocate(&mut function);

        assert_eq!(1, allocation.spilled().count());
        let registers: BTreeSet<_> = ["x", "y", "z"]
            .into_iter()
            .filter_map(|name| allocation.register(name))
            .collect();
        assert_eq!(2, registers.len());
    }

    #[test]
    fn allocate_removes_coalesced_copies() {
        let mut function = ToyFunction::new(
            "ab",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Mov(p("y"), p("x")),
                Toy::Use(vec![p("y")]),
                Toy::Ret,
            ],
        );
        let allocation = allocate(&mut function);

        assert_eq!(1, allocation.coalesced());
        assert_eq!(3, function.body.len());
        assert!(!function.body.iter().any(|i| matches!(i, Toy::Mov(..))));
    }

    #[test]
    fn allocate_coalesces_pseudo_into_hard_register() {
        let mut function = ToyFunction::new(
            "ab",
            vec![Toy::Def(p("x"), vec![]), Toy::Mov(r('a'), p("x")), Toy::Ret],
        );
        function.returns = vec!['a'];
        allocate(&mut function);

        assert_eq!(vec![Toy::Def(r('a'), vec![]), Toy::Ret], function.body);
    }

    #[test]
    fn allocate_keeps_copies_between_interfering_values() {
        let mut function = ToyFunction::new(
            "abc",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Mov(p("y"), p("x")),
                Toy::Def(p("x"), vec![]),
                Toy::Use(vec![p("x"), p("y")]),
                Toy::Ret,
            ],
        );
        let allocation = allocate(&mut function);

        assert_eq!(0, allocation.coalesced());
        assert_eq!(5, function.body.len());
        assert_ne!(allocation.register("x"), allocation.register("y"));
    }

    #[test]
    fn allocate_never_assigns_clobbered_register_across_definition() {
        let mut function = ToyFunction::new(
            "ab",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Def(r('a'), vec![]),
                Toy::Use(vec![p("x"), r('a')]),
                Toy::Ret,
            ],
        );
        let allocation = allocate(&mut function);

        assert_eq!(Some('b'), allocation.register("x"));
    }
}
