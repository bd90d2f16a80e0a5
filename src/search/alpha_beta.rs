//! Negamax search with Alpha-Beta pruning and Iterative Deepening, backed by a
//! Zobrist-keyed transposition table.
//!
//! Moves that grant an extra turn are searched without negating the score or
//! swapping the window. The wall-clock budget is checked only between
//! iterations, so a single deep iteration can overrun it; an external stop
//! flag aborts the iteration in flight, which is then discarded.

use std::cmp::{max, min};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::trace_span;

use crate::prelude::*;
use crate::search::common::*;
use crate::search::tt::{ScoreTypes, TranspositionEntry, TranspositionTable};

#[derive(Debug)]
pub struct AlphaBetaSearch<G: MoveGenerator> {
    /// Core search data
    nodes_searched: u64,
    /// Search params
    config: SearchConfig,
    limits: SearchLimits,
    stop: Option<Arc<AtomicBool>>,
    /// Transposition table, absent when disabled
    tt: Option<TranspositionTable<G::Move>>,
    /// Status
    aborted: bool,
    /// Set when some line ended at depth 0 rather than at a finished game
    hit_horizon: bool,
    start_time: Instant,
    /// Debug/tuning
    stats: SearchStats,
}

impl<G: MoveGenerator> Default for AlphaBetaSearch<G> {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl<G: MoveGenerator> AlphaBetaSearch<G> {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            nodes_searched: 0,
            tt: config
                .use_tt
                .then(|| TranspositionTable::new(config.tt_capacity)),
            config,
            limits: SearchLimits::default(),
            stop: None,
            aborted: false,
            hit_horizon: false,
            start_time: Instant::now(),
            stats: SearchStats::new(),
        }
    }

    /// Constructor to set limits for search. Time, node count, depth
    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Search stops as soon as `stop` reads true, even mid-iteration.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn set_limits(&mut self, limits: SearchLimits) {
        self.limits = limits;
    }

    pub fn set_stop_flag(&mut self, stop: Option<Arc<AtomicBool>>) {
        self.stop = stop;
    }

    /// Whether any line searched since the last root search stopped at the
    /// depth limit instead of a finished game.
    pub fn hit_horizon(&self) -> bool {
        self.hit_horizon
    }

    pub fn config(&self) -> SearchConfig {
        self.config
    }

    pub fn nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    pub fn clear(&mut self) {
        if let Some(tt) = &mut self.tt {
            tt.clear();
        }
        self.stats = SearchStats::new();
    }

    pub fn get_stats(&mut self) -> SearchStats {
        self.stats.nodes_searched = self.nodes_searched;
        self.stats.time_elapsed = self.start_time.elapsed();
        self.stats.hash_full = self.tt.as_ref().map_or(0, |tt| tt.hash_full());
        self.stats.calculate_nps();
        self.stats
    }
}

// Main search
impl<G: MoveGenerator> AlphaBetaSearch<G> {
    pub fn find_best_move(&mut self, position: &G) -> Result<SearchResult<G::Move>, SearchError> {
        let span = trace_span!("search_root");
        let _guard = span.enter();

        if let Some(outcome) = position.outcome() {
            return Err(SearchError::GameOver(outcome));
        }

        self.prepare_for_search();
        let mut board = position.clone();
        let mut root_moves = board.legal_moves();
        if root_moves.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }
        debug!(
            "Finding best move among {} candidates with max_depth: {:?}, max_time: {:?}",
            root_moves.len(),
            self.limits.max_depth,
            self.limits.max_time
        );

        let mut best_move = None;
        let mut best_score = -INFINITY;
        let mut completed_depth = 0;

        'id_loop: for depth in 1..=self.limits.max_depth.unwrap_or(MAX_PLY as u16) {
            if self.should_stop() {
                break 'id_loop;
            }

            trace!("Iterative Deepening current depth: {depth}");
            self.hit_horizon = false;

            let Some((local_best_move, local_best_score)) =
                self.root_search(&mut board, depth, &mut root_moves, best_move.as_ref())
            else {
                debug!("Depth {depth} aborted, keeping depth {completed_depth}");
                break 'id_loop;
            };

            completed_depth = depth;
            best_move = Some(local_best_move);
            best_score = local_best_score;

            debug!(
                "depth {depth} score {best_score} nodes {} nps {} best {:?}",
                self.nodes_searched,
                (self.nodes_searched * 1000) / self.start_time.elapsed().as_millis().max(1) as u64,
                best_move
            );

            // Every line ended in a finished game, deeper iterations change nothing
            if !self.hit_horizon {
                debug!("Tree fully resolved at depth {depth}");
                break 'id_loop;
            }
        }

        if self.config.collect_stats {
            self.stats.depth_reached = completed_depth;
            self.get_stats().log_summary();
        }

        Ok(SearchResult {
            best_move,
            score: best_score,
            depth: completed_depth,
            nodes_searched: self.nodes_searched,
            time_taken: self.start_time.elapsed(),
        })
    }

    /// Fixed-depth score of `position` for the side to move, full window.
    /// `None` when the stop flag fired.
    pub fn search_depth(&mut self, position: &G, depth: u16) -> Option<i32> {
        self.prepare_for_search();
        let mut board = position.clone();
        self.search_window(&mut board, depth, 0, -INFINITY, INFINITY)
    }

    /// Runs one negamax call with the given window and ply offset, leaving
    /// `board` as it was. Used by the parallel search for its leaf jobs.
    pub fn search_window(
        &mut self,
        board: &mut G,
        depth: u16,
        ply: usize,
        alpha: i32,
        beta: i32,
    ) -> Option<i32> {
        self.aborted = false;
        let score = self.alpha_beta(board, depth, ply, alpha, beta);
        (!self.aborted).then_some(score)
    }

    /// Searches every root move at `depth`, previous best first.
    fn root_search(
        &mut self,
        board: &mut G,
        depth: u16,
        root_moves: &mut MoveBuffer<G::Move>,
        prev_best: Option<&G::Move>,
    ) -> Option<(G::Move, i32)> {
        let ordered = Self::ordered(root_moves, prev_best, self.config.beam_width);

        let mut alpha = -INFINITY;
        let beta = INFINITY;
        let mut local_best: Option<(G::Move, i32)> = None;

        for candidate in ordered.iter() {
            let undo = board.apply(&candidate.mv);
            let score = self.child_score(board, candidate, depth, 1, alpha, beta);
            board.undo(&candidate.mv, undo);

            if self.aborted {
                return None;
            }

            if local_best.as_ref().is_none_or(|(_, best)| score > *best) {
                local_best = Some((candidate.mv.clone(), score));
            }
            alpha = max(alpha, score);
        }

        *root_moves = ordered;
        local_best
    }

    /// Score of the position after `candidate` from the mover's point of view.
    #[inline]
    fn child_score(
        &mut self,
        board: &mut G,
        candidate: &Candidate<G::Move>,
        depth: u16,
        ply: usize,
        alpha: i32,
        beta: i32,
    ) -> i32 {
        if candidate.grants_extra_turn {
            if self.config.collect_stats {
                self.stats.extra_turns += 1;
            }
            self.alpha_beta(board, depth - 1, ply, alpha, beta)
        } else {
            -self.alpha_beta(board, depth - 1, ply, -beta, -alpha)
        }
    }

    fn alpha_beta(&mut self, board: &mut G, depth: u16, ply: usize, mut alpha: i32, mut beta: i32) -> i32 {
        // Every entry into this function is exploring a new node
        self.nodes_searched += 1;
        if self.nodes_searched % STOP_POLL_INTERVAL == 0 && self.stop_requested() {
            self.aborted = true;
        }
        if self.aborted {
            return 0;
        }

        let original_alpha = alpha;
        let current_hash = board.hash();
        let mut tt_move = None;

        // TT Probe
        if let Some(tt) = &self.tt {
            if self.config.collect_stats {
                self.stats.tt_probes += 1;
            }
            if let Some(entry) = tt.probe(current_hash) {
                if self.config.collect_stats {
                    self.stats.tt_hits += 1;
                }
                tt_move = entry.best_move.clone();
                if entry.depth >= depth {
                    let score = adjust_score_for_ply(entry.score, ply);
                    // A stored horizon score still depends on the depth limit
                    if !entry.resolved {
                        self.hit_horizon = true;
                    }
                    match entry.score_type {
                        ScoreTypes::Exact => {
                            if self.config.collect_stats {
                                self.stats.tt_exact_returns += 1;
                            }
                            return score;
                        }
                        // The true score is 'at least' the stored one
                        ScoreTypes::LowerBound => alpha = max(alpha, score),
                        // The true score is 'at most' the stored one
                        ScoreTypes::UpperBound => beta = min(beta, score),
                    }
                    if alpha >= beta {
                        if self.config.collect_stats {
                            self.stats.tt_cutoffs += 1;
                        }
                        return score;
                    }
                }
            }
        }

        if let Some(outcome) = board.outcome() {
            if self.config.collect_stats {
                self.stats.terminal_returns += 1;
            }
            return terminal_score(outcome, board.side_to_move(), ply);
        }

        if depth == 0 || ply >= MAX_PLY {
            self.hit_horizon = true;
            if self.config.collect_stats {
                self.stats.horizon_returns += 1;
            }
            return board.evaluate();
        }

        let legal_moves = board.legal_moves();
        if legal_moves.is_empty() {
            error!("Non-terminal position without legal moves, treating as draw");
            return DRAW_SCORE;
        }
        let ordered = Self::ordered(&legal_moves, tt_move.as_ref(), self.config.beam_width);

        // Track the horizon for this subtree alone, then merge it back
        let horizon_above = std::mem::replace(&mut self.hit_horizon, false);
        let mut best_score = -INFINITY;
        let mut best_move = None;

        for (move_index, candidate) in ordered.iter().enumerate() {
            let undo = board.apply(&candidate.mv);
            let score = self.child_score(board, candidate, depth, ply + 1, alpha, beta);
            board.undo(&candidate.mv, undo);

            if self.aborted {
                self.hit_horizon |= horizon_above;
                return 0;
            }

            if score > best_score {
                best_score = score;
                best_move = Some(candidate.mv.clone());
            }
            alpha = max(alpha, score);

            if alpha >= beta {
                if self.config.collect_stats {
                    if move_index < MAX_PLY {
                        self.stats.cutoff_at_move[move_index] += 1;
                    }
                    self.stats.beta_cutoffs += 1;
                }
                break;
            }
        }

        let resolved = !self.hit_horizon;
        self.hit_horizon |= horizon_above;

        let score_type = if best_score <= original_alpha {
            // We failed to raise alpha. This is a fail-low.
            // The score is an upper bound on the node's true value
            if self.config.collect_stats {
                self.stats.fail_lows += 1;
            }
            ScoreTypes::UpperBound
        } else if best_score >= beta {
            ScoreTypes::LowerBound
        } else {
            if self.config.collect_stats {
                self.stats.exact_scores += 1;
            }
            ScoreTypes::Exact
        };

        if let Some(tt) = &mut self.tt {
            tt.store(TranspositionEntry::new(
                current_hash,
                best_move,
                adjust_score_from_ply(best_score, ply),
                depth,
                score_type,
            )
            .with_resolved(resolved));
        }

        best_score
    }
}

impl<G: MoveGenerator> AlphaBetaSearch<G> {
    /// Copies `moves` with `hint` moved to the front and the beam applied.
    fn ordered(
        moves: &MoveBuffer<G::Move>,
        hint: Option<&G::Move>,
        beam: Option<usize>,
    ) -> MoveBuffer<G::Move> {
        let mut ordered = MoveBuffer::with_capacity(moves.len());
        let hinted = hint.and_then(|h| moves.iter().find(|c| c.mv == *h));
        if let Some(first) = hinted {
            ordered.push(first.clone());
        }
        for candidate in moves {
            if hinted.is_none_or(|h| h.mv != candidate.mv) {
                ordered.push(candidate.clone());
            }
        }
        if let Some(beam) = beam {
            ordered.truncate(beam.max(1));
        }
        ordered
    }

    #[inline]
    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Checked between iterations only.
    fn should_stop(&self) -> bool {
        if self.stop_requested() {
            debug!("Stop signal recieved");
            return true;
        }

        if let Some(max_time) = self.limits.max_time
            && self.start_time.elapsed() >= max_time
        {
            debug!("Max time utilized");
            return true;
        }

        if self
            .limits
            .max_nodes
            .is_some_and(|l| self.nodes_searched >= l)
        {
            debug!("Node limit exhausted");
            return true;
        }

        false
    }

    fn prepare_for_search(&mut self) {
        self.nodes_searched = 0;
        self.aborted = false;
        self.hit_horizon = false;
        self.start_time = Instant::now();
        self.stats = SearchStats::new();
    }
}

impl<G: MoveGenerator> SearchEngine<G> for AlphaBetaSearch<G> {
    fn name(&self) -> &'static str {
        "alpha-beta"
    }

    fn search(&mut self, position: &G, limits: SearchLimits) -> Result<SearchResult<G::Move>, SearchError> {
        self.limits = limits;
        self.find_best_move(position)
    }
}
