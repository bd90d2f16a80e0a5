#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreTypes {
    /// Score is the exact evaluation [alpha < score < beta]
    Exact,
    /// Score is at least this value, i.e, beta cutoff [score >= beta]
    LowerBound,
    /// Score is at most this value, i.e, alpha not improved [score <= alpha]
    UpperBound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranspositionEntry<M> {
    pub hash: u64,
    pub depth: u16,
    pub score: i32,
    pub score_type: ScoreTypes,
    pub best_move: Option<M>,
    /// Every line below ended in a finished game, so the score holds at any depth
    pub resolved: bool,
}

impl<M> TranspositionEntry<M> {
    pub fn new(hash: u64, best_move: Option<M>, score: i32, depth: u16, score_type: ScoreTypes) -> Self {
        Self {
            hash,
            depth,
            score,
            score_type,
            best_move,
            resolved: false,
        }
    }

    pub fn with_resolved(mut self, resolved: bool) -> Self {
        self.resolved = resolved;
        self
    }

    /// Full-key comparison; a slot hit with a different key is a collision.
    #[inline(always)]
    pub fn matches(&self, hash: u64) -> bool {
        self.hash == hash
    }
}

/// Fixed-capacity table indexed by `hash mod capacity`.
///
/// A slot is overwritten when it is empty, holds a different position, or
/// holds a result no deeper than the new one. Entries are never removed.
#[derive(Debug)]
pub struct TranspositionTable<M> {
    entries: Vec<Option<TranspositionEntry<M>>>,
    filled: usize,
}

impl<M: Clone> Default for TranspositionTable<M> {
    fn default() -> Self {
        Self::new(crate::consts::DEFAULT_TT_ENTRIES)
    }
}

impl<M: Clone> TranspositionTable<M> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity.max(1)],
            filled: 0,
        }
    }

    #[inline(always)]
    fn index(&self, hash: u64) -> usize {
        (hash % self.entries.len() as u64) as usize
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn probe(&self, hash: u64) -> Option<&TranspositionEntry<M>> {
        self.entries[self.index(hash)]
            .as_ref()
            .filter(|entry| entry.matches(hash))
    }

    /// Returns whether the entry was written.
    pub fn store(&mut self, new_entry: TranspositionEntry<M>) -> bool {
        let index = self.index(new_entry.hash);
        let replace = match &self.entries[index] {
            None => {
                self.filled += 1;
                true
            }
            Some(old) => !old.matches(new_entry.hash) || new_entry.depth >= old.depth,
        };
        if replace {
            self.entries[index] = Some(new_entry);
        }
        replace
    }

    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|e| *e = None);
        self.filled = 0;
    }

    /// Occupancy in per-mille.
    pub fn hash_full(&self) -> u16 {
        (self.filled * 1000 / self.entries.len()) as u16
    }
}
