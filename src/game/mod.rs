//! Abstract game-state contract consumed by every search engine, plus the
//! concrete games the crate ships with.

pub mod dots;
pub mod streak;
pub mod zobrist;

#[cfg(test)]
mod tests;

use std::fmt::{self, Debug, Display};

use crate::moves::move_buffer::MoveBuffer;

pub use dots::{DotsAndBoxes, Edge};
pub use streak::{Cell, StreakGame};
pub use zobrist::ZobristKeys;

#[derive(Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Player {
    #[default]
    One,
    Two,
}

impl Player {
    pub const PLAYERS: [Player; 2] = [Player::One, Player::Two];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn flip(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }
}

impl Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::One => write!(f, "Player 1"),
            Player::Two => write!(f, "Player 2"),
        }
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    Draw,
    Win(Player),
}

impl Outcome {
    /// Playout reward for `player`: 1 for a win, 0.5 for a draw, 0 for a loss.
    #[inline]
    pub fn reward(self, player: Player) -> f64 {
        match self {
            Outcome::Draw => 0.5,
            Outcome::Win(winner) if winner == player => 1.0,
            Outcome::Win(_) => 0.0,
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Draw => write!(f, "Draw"),
            Outcome::Win(p) => write!(f, "{p} wins"),
        }
    }
}

/// A snapshot of a two-player game.
///
/// Mutation is always paired: every `apply` is undone by `undo` with the value
/// `apply` returned, which must restore the position (hash included) exactly.
pub trait Position: Clone + Debug + Send + Sync + 'static {
    type Move: Clone + Debug + PartialEq + Send + Sync + 'static;
    /// State `undo` needs that cannot be recovered from the move alone.
    type Undo: Copy + Debug + Send + Sync;

    fn side_to_move(&self) -> Player;

    fn apply(&mut self, mv: &Self::Move) -> Self::Undo;

    fn undo(&mut self, mv: &Self::Move, undo: Self::Undo);

    /// `Some` once no legal move remains.
    fn outcome(&self) -> Option<Outcome>;

    fn score(&self, player: Player) -> i32;

    fn hash(&self) -> u64;

    /// Static evaluation from the side to move's point of view.
    fn evaluate(&self) -> i32 {
        let stm = self.side_to_move();
        self.score(stm) - self.score(stm.flip())
    }

    #[inline]
    fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }
}

/// Move generation capability shared by all engines.
pub trait MoveGenerator: Position {
    /// Fills `moves` with every legal candidate, best-first.
    /// Leaves it empty only when the position is terminal.
    fn generate_moves(&self, moves: &mut MoveBuffer<Self::Move>);

    fn legal_moves(&self) -> MoveBuffer<Self::Move> {
        let mut moves = MoveBuffer::new();
        self.generate_moves(&mut moves);
        moves
    }
}
