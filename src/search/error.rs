use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::game::Outcome;

/// Failures surfaced by the search engines and the driver.
#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("Search budget must be greater than zero")]
    #[diagnostic(code(arbor::search::zero_budget), help("pass a deadline of at least 1ms"))]
    ZeroBudget,

    /// The generator returned nothing for a position that is not over
    #[error("No legal moves in a position that is not terminal")]
    #[diagnostic(code(arbor::search::no_legal_moves))]
    NoLegalMoves,

    #[error("Game is already over: {0}")]
    #[diagnostic(code(arbor::search::game_over))]
    GameOver(Outcome),

    /// A branch worker did not report back in time
    #[error("Worker did not finish depth {depth} within {waited:?}")]
    #[diagnostic(
        code(arbor::search::worker_timeout),
        help("the driver retries with the sequential search")
    )]
    WorkerTimeout { depth: u16, waited: Duration },

    #[error("Failed to spawn search worker")]
    #[diagnostic(code(arbor::search::worker_spawn))]
    WorkerSpawn(#[from] std::io::Error),
}
