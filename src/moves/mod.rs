pub mod move_buffer;

use std::fmt::{self, Debug, Display};

/// A legal move as seen by the search, tagged with what the generator knows
/// about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<M> {
    pub mv: M,
    /// The mover plays again after this move (a capture).
    pub grants_extra_turn: bool,
    /// Ordering key; higher is searched first.
    pub priority: i32,
}

impl<M> Candidate<M> {
    pub const fn new(mv: M, grants_extra_turn: bool, priority: i32) -> Self {
        Self {
            mv,
            grants_extra_turn,
            priority,
        }
    }

    /// Ordinary move that hands the turn to the opponent.
    pub const fn quiet(mv: M, priority: i32) -> Self {
        Self::new(mv, false, priority)
    }
}

/// Ordered, non-empty sequence of primitive moves applied as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundMove<E> {
    parts: Vec<E>,
}

impl<E> CompoundMove<E> {
    pub fn new(parts: Vec<E>) -> miette::Result<Self> {
        miette::ensure!(!parts.is_empty(), "A compound move needs at least one part");
        Ok(Self { parts })
    }

    pub fn single(part: E) -> Self {
        Self { parts: vec![part] }
    }

    /// `head` followed by `tail`; never empty.
    pub fn with_tail(head: E, tail: impl IntoIterator<Item = E>) -> Self {
        let mut parts = vec![head];
        parts.extend(tail);
        Self { parts }
    }

    #[inline]
    pub fn parts(&self) -> &[E] {
        &self.parts
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    #[inline]
    pub fn first(&self) -> &E {
        &self.parts[0]
    }

    #[inline]
    pub fn last(&self) -> &E {
        &self.parts[self.parts.len() - 1]
    }
}

impl<E: Display> Display for CompoundMove<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}
