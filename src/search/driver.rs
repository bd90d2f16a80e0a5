use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::search::common::*;
use crate::search::mcts::MctsConfig;
use crate::search::parallel::ParallelConfig;

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    AlphaBeta,
    Parallel,
    Mcts,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::AlphaBeta => write!(f, "alpha-beta"),
            Strategy::Parallel => write!(f, "parallel"),
            Strategy::Mcts => write!(f, "mcts"),
        }
    }
}

/// Everything the driver needs to build its engines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub strategy: Strategy,
    /// Hard depth cap for the alpha-beta engines
    pub max_depth: Option<u16>,
    pub alpha_beta: SearchConfig,
    pub parallel: ParallelConfig,
    pub mcts: MctsConfig,
}

/// The move the driver settled on and how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice<M> {
    pub mv: M,
    pub score: i32,
    pub depth: u16,
    pub nodes: u64,
    /// Engine that produced the move; differs from the configured one after a sequential retry
    pub strategy: Strategy,
    /// The search finished nothing and the move was picked at random
    pub fallback: bool,
}

/// Runs the configured engine under a deadline and turns its result, or its
/// failure, into a playable move.
#[derive(Debug)]
pub struct SearchDriver<G: MoveGenerator> {
    config: DriverConfig,
    alpha_beta: AlphaBetaSearch<G>,
    parallel: ParallelSearch<G>,
    mcts: MctsSearch<G>,
    rng: StdRng,
}

impl<G: MoveGenerator> Default for SearchDriver<G> {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

impl<G: MoveGenerator> SearchDriver<G> {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            alpha_beta: AlphaBetaSearch::new(config.alpha_beta),
            parallel: ParallelSearch::new(config.parallel),
            mcts: MctsSearch::new(config.mcts),
            rng: config
                .mcts
                .seed
                .map_or_else(StdRng::from_os_rng, |seed| StdRng::seed_from_u64(!seed)),
            config,
        }
    }

    /// Lets another thread abort the sequential search mid-iteration.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.alpha_beta.set_stop_flag(Some(stop));
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.config.strategy = strategy;
    }

    fn engine(&mut self, strategy: Strategy) -> &mut dyn SearchEngine<G> {
        match strategy {
            Strategy::AlphaBeta => &mut self.alpha_beta,
            Strategy::Parallel => &mut self.parallel,
            Strategy::Mcts => &mut self.mcts,
        }
    }

    /// Picks a move for `position` within `deadline_ms` milliseconds.
    ///
    /// A zero budget or a position without moves is an error. A search that
    /// completes nothing yields a random legal move marked as a fallback.
    /// When the parallel search fails, the sequential search gets whatever
    /// is left of the budget. The transposition table starts empty on every call.
    pub fn choose_move(&mut self, position: &G, deadline_ms: u64) -> Result<Choice<G::Move>, SearchError> {
        if deadline_ms == 0 {
            return Err(SearchError::ZeroBudget);
        }
        if let Some(outcome) = position.outcome() {
            return Err(SearchError::GameOver(outcome));
        }
        let legal = position.legal_moves();
        if legal.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }

        let budget = Duration::from_millis(deadline_ms);
        let limits = SearchLimits {
            max_depth: self.config.max_depth,
            ..SearchLimits::time(deadline_ms)
        };
        self.alpha_beta.clear();

        let started = Instant::now();
        let mut strategy = self.config.strategy;
        let searched = {
            let engine = self.engine(strategy);
            debug!("Searching with {} for {deadline_ms}ms", engine.name());
            engine.search(position, limits)
        };
        let result = match searched {
            Ok(result) => result,
            Err(e @ (SearchError::WorkerTimeout { .. } | SearchError::WorkerSpawn(_))) => {
                let remaining = budget.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    warn!("{e}, no time left for the sequential search");
                    SearchResult::default()
                } else {
                    warn!("{e}, retrying with the sequential search for {remaining:?}");
                    strategy = Strategy::AlphaBeta;
                    let limits = SearchLimits {
                        max_time: Some(remaining.max(Duration::from_millis(1))),
                        ..limits
                    };
                    self.alpha_beta.search(position, limits)?
                }
            }
            Err(e) => return Err(e),
        };

        info!(
            "{strategy} picked {:?} score {} depth {} nodes {} ({} nps) in {:?}",
            result.best_move,
            result.score,
            result.depth,
            result.nodes_searched,
            result.nps(),
            started.elapsed()
        );

        match result.best_move {
            Some(mv) => Ok(Choice {
                mv,
                score: result.score,
                depth: result.depth,
                nodes: result.nodes_searched,
                strategy,
                fallback: false,
            }),
            None => {
                let Some(candidate) = legal.as_slice().choose(&mut self.rng) else {
                    return Err(SearchError::NoLegalMoves);
                };
                warn!(
                    "{strategy} completed no iteration in {deadline_ms}ms, playing random move {:?}",
                    candidate.mv
                );
                Ok(Choice {
                    mv: candidate.mv.clone(),
                    score: 0,
                    depth: 0,
                    nodes: result.nodes_searched,
                    strategy,
                    fallback: true,
                })
            }
        }
    }
}
