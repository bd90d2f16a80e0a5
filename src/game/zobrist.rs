use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::consts::ZOBRIST_SEED;

/// One random key per distinguishable (feature, state) pair, plus a key for
/// the side to move.
///
/// A position hash is the XOR of the keys of every feature currently set, so
/// setting and clearing the same feature are the same operation.
#[derive(Debug, Clone)]
pub struct ZobristKeys {
    /// Flat `[feature][state]` table
    keys: Vec<u64>,
    states: usize,
    /// Flipped when the second player is to move
    second_to_move: u64,
}

impl ZobristKeys {
    pub fn new(features: usize, states: usize) -> Self {
        Self::with_seed(features, states, ZOBRIST_SEED)
    }

    pub fn with_seed(features: usize, states: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let second_to_move = rng.random();
        let keys = (0..features * states).map(|_| rng.random()).collect();
        Self {
            keys,
            states,
            second_to_move,
        }
    }

    #[inline(always)]
    pub fn key(&self, feature: usize, state: usize) -> u64 {
        debug_assert!(state < self.states, "state {state} out of range");
        self.keys[feature * self.states + state]
    }

    #[inline(always)]
    pub fn second_to_move(&self) -> u64 {
        self.second_to_move
    }

    pub fn features(&self) -> usize {
        self.keys.len() / self.states.max(1)
    }

    /// XORs `feature` in `state` into (or out of) `hash`.
    #[inline(always)]
    pub fn toggle(&self, hash: u64, feature: usize, state: usize) -> u64 {
        hash ^ self.key(feature, state)
    }

    /// Moves `feature` from `old` to `new`. `None` is the unset state and owns no key.
    #[inline]
    pub fn update(&self, hash: u64, feature: usize, old: Option<usize>, new: Option<usize>) -> u64 {
        let mut hash = hash;
        if let Some(state) = old {
            hash = self.toggle(hash, feature, state);
        }
        if let Some(state) = new {
            hash = self.toggle(hash, feature, state);
        }
        hash
    }

    /// Full recomputation from an iterator of set `(feature, state)` pairs.
    pub fn hash<I>(&self, set: I, second_to_move: bool) -> u64
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut hash = set
            .into_iter()
            .fold(0, |acc, (feature, state)| acc ^ self.key(feature, state));
        if second_to_move {
            hash ^= self.second_to_move;
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_reproducible_per_seed() {
        let a = ZobristKeys::with_seed(9, 2, 7);
        let b = ZobristKeys::with_seed(9, 2, 7);
        let c = ZobristKeys::with_seed(9, 2, 8);
        assert_eq!(a.key(4, 1), b.key(4, 1));
        assert_ne!(a.key(4, 1), c.key(4, 1));
        assert_eq!(a.features(), 9);
    }

    #[test]
    fn update_is_its_own_inverse() {
        let keys = ZobristKeys::new(16, 2);
        let start = keys.hash([(0, 0), (3, 1)], false);
        let moved = keys.update(start, 5, None, Some(1));
        assert_ne!(start, moved);
        assert_eq!(keys.update(moved, 5, Some(1), None), start);

        let recolored = keys.update(start, 3, Some(1), Some(0));
        assert_eq!(recolored, keys.hash([(0, 0), (3, 0)], false));
    }

    #[test]
    fn side_key_changes_hash() {
        let keys = ZobristKeys::new(4, 1);
        let h1 = keys.hash([(1, 0)], false);
        let h2 = keys.hash([(1, 0)], true);
        assert_eq!(h1 ^ h2, keys.second_to_move());
    }
}
