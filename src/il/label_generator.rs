use std::collections::HashMap;

use super::{Label, TacInstr};
use crate::listing::Listing;

/// Generates labels which do not collide with the labels already present in a function.
pub struct LabelGenerator {
    seen_subscripts: HashMap<String, usize>,
}
impl LabelGenerator {
    pub fn new() -> Self {
        Self {
            seen_subscripts: HashMap::new(),
        }
    }

    /// Creates a generator which will never produce a label that is defined in the listing.
    pub fn for_listing(listing: &Listing<TacInstr>) -> Self {
        let mut generator = Self::new();
        for label in listing.iter_instructions().filter_map(TacInstr::as_label) {
            generator.reserve(label);
        }
        generator
    }

    /// Marks a label as taken, so that it is never generated.
    pub fn reserve(&mut self, label: &Label) {
        let subscript = self.seen_subscripts.entry(label.name().to_string()).or_insert(0);
        *subscript = (*subscript).max(label.subscript());
    }

    /// Generates a new unique label.
    pub fn next_label<S: Into<String>>(&mut self, id: S) -> Label {
        let id = id.into();
        let current_subscript = self.seen_subscripts.entry(id.clone()).or_insert(0);
        *current_subscript += 1;

        Label::new(id, *current_subscript)
    }
}
impl Default for LabelGenerator {
    fn default() -> Self {
        Self::new()
    }
}
