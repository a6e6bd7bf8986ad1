//! Machine-independent optimisations on TAC.
//!
//! Every function is optimised on its own. The enabled passes run in a fixed
//! order (constant folding, unreachable code elimination, copy propagation,
//! dead store elimination) and the sequence is repeated until an iteration
//! leaves the listing unchanged, or the configured number of iterations is
//! reached.

mod address_taken;
mod constant_folding;
mod copy_propagation;
mod dead_stores;
mod unreachable_code;

use std::collections::HashSet;

use crate::{
    config::{Config, Dump},
    il::{Function, TacListing, TacProgram},
    prelude::*,
};

pub use address_taken::address_taken;
pub use constant_folding::fold_constants;
pub use copy_propagation::propagate_copies;
pub use dead_stores::eliminate_dead_stores;
pub use unreachable_code::eliminate_unreachable_code;

/// Optimise every function of the program in place.
pub fn optimise(program: &mut TacProgram, config: &Config, dumps: &mut Vec<Dump>) {
    if !config.optimisations.any_enabled() {
        return;
    }
    let statics: HashSet<String> = program.statics.iter().map(|s| s.name.clone()).collect();
    for function in &mut program.functions {
        optimise_function(function, &statics, config, dumps);
    }
}

/// Optimise a single function until no pass changes it. Variables named in
/// `statics` have static storage, and may be read or written by other functions.
pub fn optimise_function(
    function: &mut Function,
    statics: &HashSet<String>,
    config: &Config,
    dumps: &mut Vec<Dump>,
) {
    let opts = config.optimisations;
    let dump = config.debug.dump_tac && config.debug.wants(&function.name);
    if dump {
        dumps.push(Dump::new(&function.name, "tac", function.body.to_string()));
    }

    if config.max_optimisation_passes == 0 {
        debug!("{}: optimisation passes capped at zero", function.name);
        return;
    }

    let initial_len = function.body.len();
    for iteration in 1..=config.max_optimisation_passes {
        let before = function.body.clone();

        // Rewrites may add or remove address-of sites, so this is recomputed
        // on every iteration.
        let mut aliased = address_taken(&function.body);
        aliased.extend(statics.iter().cloned());

        let mut run = |name: &str, enabled: bool, pass: &mut dyn FnMut(&mut TacListing)| {
            if !enabled {
                return;
            }
            pass(&mut function.body);
            trace!("{}: {} left {} instructions", function.name, name, function.body.len());
            if dump {
                dumps.push(Dump::new(
                    &function.name,
                    format!("tac.{}.{}", iteration, name),
                    function.body.to_string(),
                ));
            }
        };

        run("fold", opts.fold_constants, &mut |body: &mut TacListing| {
            fold_constants(body)
        });
        run(
            "unreachable",
            opts.eliminate_unreachable_code,
            &mut |body: &mut TacListing| eliminate_unreachable_code(body),
        );
        run("copyprop", opts.propagate_copies, &mut |body: &mut TacListing| {
            propagate_copies(body, &aliased)
        });
        run("dse", opts.eliminate_dead_stores, &mut |body: &mut TacListing| {
            eliminate_dead_stores(body, &aliased)
        });

        if function.body == before {
            debug!(
                "{}: optimised from {} to {} instructions in {} iteration(s)",
                function.name,
                initial_len,
                function.body.len(),
                iteration
            );
            return;
        }
    }

    warn!(
        "{}: optimisation did not converge within {} iterations",
        function.name, config.max_optimisation_passes
    );
}
