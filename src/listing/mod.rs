//! Generic logic for code listings (TAC, assembly, etc).

mod position;

use std::{
    fmt::{self, Display, Formatter},
    slice::{Iter, IterMut},
    vec::IntoIter,
};

pub use position::Position;

/// An ordered sequence of instructions, addressed by [`Position`].
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    lines: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new() -> Self {
        Self { lines: vec![] }
    }

    pub fn push(&mut self, line: T) {
        self.lines.push(line);
    }

    /// Keep only the lines for which the predicate returns `true`. The
    /// predicate sees every line's original position.
    pub fn retain_lines<F>(&mut self, mut keep: F)
    where
        F: FnMut(Position, &T) -> bool,
    {
        let mut position = Position(0);
        self.lines.retain(|line| {
            let keep = keep(position, line);
            position = position + 1;
            keep
        });
    }

    pub fn iter_lines(&self) -> LinesIter<'_, T> {
        LinesIter {
            inner: self.lines.iter(),
            position: Position(0),
        }
    }

    pub fn iter_instructions(&self) -> Iter<'_, T> {
        self.lines.iter()
    }

    pub fn iter_instructions_mut(&mut self) -> IterMut<'_, T> {
        self.lines.iter_mut()
    }

    pub fn into_lines(self) -> IntoLines<T> {
        IntoLines {
            inner: self.lines.into_iter(),
            position: Position(0),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.lines
    }

    pub fn as_slice(&self) -> &[T] {
        &self.lines
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T> From<Vec<T>> for Listing<T> {
    fn from(lines: Vec<T>) -> Self {
        Self { lines }
    }
}
impl<T> FromIterator<T> for Listing<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}
impl<T: Display> Display for Listing<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

pub struct LinesIter<'item, T> {
    inner: Iter<'item, T>,
    position: Position,
}

impl<'item, T> Iterator for LinesIter<'item, T> {
    type Item = (Position, &'item T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|v| {
            let current = self.position;
            self.position = current + 1;
            (current, v)
        })
    }
}

pub struct IntoLines<T> {
    inner: IntoIter<T>,
    position: Position,
}

impl<T> Iterator for IntoLines<T> {
    type Item = (Position, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|v| {
            let current = self.position;
            self.position = current + 1;
            (current, v)
        })
    }
}

impl<T> IntoIterator for Listing<T> {
    type Item = (Position, T);
    type IntoIter = IntoLines<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_lines()
    }
}
