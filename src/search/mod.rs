pub mod alpha_beta;
pub mod common;
pub mod driver;
pub mod error;
pub mod mcts;
pub mod parallel;
pub mod tt;

#[cfg(test)]
mod tests;

pub use alpha_beta::AlphaBetaSearch;
pub use common::{SearchConfig, SearchLimits, SearchResult, SearchStats};
pub use driver::{Choice, DriverConfig, SearchDriver, Strategy};
pub use error::SearchError;
pub use mcts::{MctsConfig, MctsSearch};
pub use parallel::{ParallelConfig, ParallelSearch};

use crate::game::MoveGenerator;

/// A move-picking algorithm the driver can run under limits.
pub trait SearchEngine<G: MoveGenerator> {
    fn name(&self) -> &'static str;

    fn search(&mut self, position: &G, limits: SearchLimits) -> Result<SearchResult<G::Move>, SearchError>;
}
