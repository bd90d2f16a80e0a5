use crate::moves::Candidate;

/// Reusable list of candidates produced by a `MoveGenerator`.
#[derive(Clone, Debug)]
pub struct MoveBuffer<M> {
    moves: Vec<Candidate<M>>,
}

impl<M> Default for MoveBuffer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MoveBuffer<M> {
    pub const fn new() -> Self {
        Self { moves: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            moves: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, candidate: Candidate<M>) {
        self.moves.push(candidate);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.moves.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn first(&self) -> Option<&Candidate<M>> {
        self.moves.first()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Candidate<M>> {
        self.moves.get(index)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Candidate<M>] {
        &self.moves
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate<M>> {
        self.moves.iter()
    }

    /// Highest priority first. Stable, so equal priorities keep generation order.
    pub fn sort_by_priority(&mut self) {
        self.moves.sort_by_key(|c| std::cmp::Reverse(c.priority));
    }

    /// Keeps only the first `beam` candidates.
    pub fn truncate(&mut self, beam: usize) {
        self.moves.truncate(beam);
    }

    /// Moves only, in buffer order.
    pub fn moves(&self) -> impl Iterator<Item = &M> {
        self.moves.iter().map(|c| &c.mv)
    }
}

impl<'a, M> IntoIterator for &'a MoveBuffer<M> {
    type Item = &'a Candidate<M>;
    type IntoIter = std::slice::Iter<'a, Candidate<M>>;
    fn into_iter(self) -> Self::IntoIter {
        self.moves.iter()
    }
}

impl<M> IntoIterator for MoveBuffer<M> {
    type Item = Candidate<M>;
    type IntoIter = std::vec::IntoIter<Candidate<M>>;
    fn into_iter(self) -> Self::IntoIter {
        self.moves.into_iter()
    }
}
