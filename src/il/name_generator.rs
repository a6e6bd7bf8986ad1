use std::collections::HashSet;

/// Generates names for temporaries introduced after the TAC has been produced.
/// Generated names start with `%`, which can never appear in a source identifier.
pub struct NameGenerator {
    index: usize,
    taken: HashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self {
            index: 0,
            taken: HashSet::new(),
        }
    }

    /// Creates a generator which will avoid the given names.
    pub fn avoiding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index: 0,
            taken: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Generates a new unique temporary name.
    pub fn next_temp(&mut self) -> String {
        loop {
            self.index += 1;
            let name = format!("%t{}", self.index);
            if !self.taken.contains(&name) {
                return name;
            }
        }
    }
}
impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_temp_generates_ascending_temp_values() {
        let mut name_gen = NameGenerator::new();

        assert_eq!("%t1", name_gen.next_temp());
        assert_eq!("%t2", name_gen.next_temp());
    }

    #[test]
    fn taken_names_are_skipped() {
        let mut name_gen = NameGenerator::avoiding(["%t1", "%t3"]);

        assert_eq!("%t2", name_gen.next_temp());
        assert_eq!("%t4", name_gen.next_temp());
    }
}
