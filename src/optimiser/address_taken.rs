use std::collections::HashSet;

use crate::il::{TacInstr, TacListing, Value};

/// Collect the names of all variables whose address is taken in the listing.
/// Any pointer may refer to one of these, so later passes must assume they can
/// be read or written through an alias.
pub fn address_taken(listing: &TacListing) -> HashSet<String> {
    listing
        .iter_instructions()
        .filter_map(|instr| match instr {
            TacInstr::GetAddress(_, Value::Var(var)) => Some(var.name.clone()),
            _ => None,
        })
        .collect()
}
