use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::prelude::*;
use std::{ops::Add, time::Duration};

/// Common statistics for all alpha-beta searches
#[derive(Debug, Clone, Copy)]
pub struct SearchStats {
    // Basic stats
    pub nodes_searched: u64,
    pub depth_reached: u16,
    pub time_elapsed: Duration,
    pub nps: u64,
    pub hash_full: u16, // per-mille

    // Early exit tracking
    pub tt_exact_returns: u64, // Returned exact score from TT
    pub terminal_returns: u64, // Game over inside the tree
    pub horizon_returns: u64,  // Static eval at depth 0

    // Transposition table stats
    pub tt_probes: u64,  // TT probe attempts
    pub tt_hits: u64,    // TT probes that found an entry
    pub tt_cutoffs: u64, // Times TT caused a cutoff (LowerBound / UpperBound)

    // Alpha-Beta window
    pub beta_cutoffs: u64, // Times alpha >= beta (fail-high)
    pub exact_scores: u64, // Times an exact score was found
    pub fail_lows: u64,    // Times we failed to raise alpha (fail-low)
    pub extra_turns: u64,  // Moves searched without a side switch

    // Move ordering stats (CutOffStats)
    pub cutoff_at_move: [u64; MAX_PLY],
}

impl Default for SearchStats {
    fn default() -> Self {
        Self {
            nodes_searched: Default::default(),
            depth_reached: Default::default(),
            time_elapsed: Default::default(),
            nps: Default::default(),
            hash_full: Default::default(),
            tt_exact_returns: Default::default(),
            terminal_returns: Default::default(),
            horizon_returns: Default::default(),
            tt_probes: Default::default(),
            tt_hits: Default::default(),
            tt_cutoffs: Default::default(),
            beta_cutoffs: Default::default(),
            exact_scores: Default::default(),
            fail_lows: Default::default(),
            extra_turns: Default::default(),
            cutoff_at_move: [Default::default(); MAX_PLY],
        }
    }
}

impl Add for SearchStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let mut combined_cutoff_at_move = [0u64; MAX_PLY];
        for (i, slot) in combined_cutoff_at_move.iter_mut().enumerate() {
            *slot = self.cutoff_at_move[i] + rhs.cutoff_at_move[i];
        }

        let total_nodes = self.nodes_searched + rhs.nodes_searched;
        let total_time = self.time_elapsed.max(rhs.time_elapsed);
        let time_ms = total_time.as_millis().max(1) as u64;

        Self {
            nodes_searched: total_nodes,
            depth_reached: self.depth_reached.max(rhs.depth_reached),
            time_elapsed: total_time,
            nps: (total_nodes * 1000) / time_ms,
            hash_full: self.hash_full.max(rhs.hash_full),

            tt_exact_returns: self.tt_exact_returns + rhs.tt_exact_returns,
            terminal_returns: self.terminal_returns + rhs.terminal_returns,
            horizon_returns: self.horizon_returns + rhs.horizon_returns,

            tt_probes: self.tt_probes + rhs.tt_probes,
            tt_hits: self.tt_hits + rhs.tt_hits,
            tt_cutoffs: self.tt_cutoffs + rhs.tt_cutoffs,

            beta_cutoffs: self.beta_cutoffs + rhs.beta_cutoffs,
            exact_scores: self.exact_scores + rhs.exact_scores,
            fail_lows: self.fail_lows + rhs.fail_lows,
            extra_turns: self.extra_turns + rhs.extra_turns,

            cutoff_at_move: combined_cutoff_at_move,
        }
    }
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn percent(numerator: u64, denominator: u64) -> f64 {
        if denominator == 0 {
            0.0
        } else {
            100.0 * numerator as f64 / denominator as f64
        }
    }

    pub fn calculate_nps(&mut self) {
        let time_ms = self.time_elapsed.as_millis().max(1) as u64;
        self.nps = (self.nodes_searched * 1000) / time_ms;
    }

    pub fn avg_cutoff_index(&self) -> f64 {
        let total_cutoffs: u64 = self.cutoff_at_move.iter().sum();
        if total_cutoffs == 0 {
            0.0
        } else {
            let weighted_sum: u64 = self
                .cutoff_at_move
                .iter()
                .enumerate()
                .map(|(i, &count)| i as u64 * count)
                .sum();
            weighted_sum as f64 / total_cutoffs as f64
        }
    }

    pub fn log_summary(&self) {
        let _span = debug_span!("search_stats").entered();
        debug!("=> SEARCH STATISTICS (depth {})", self.depth_reached);
        debug!(
            "NODES total={} time={:?} nps={}",
            self.nodes_searched, self.time_elapsed, self.nps
        );

        debug!("");
        debug!("==> Node Breakdown");
        debug!(
            "  - TT Exact:         {:>9} ({:>6.2}%)",
            self.tt_exact_returns,
            Self::percent(self.tt_exact_returns, self.nodes_searched)
        );
        debug!(
            "  - Terminal:         {:>9} ({:>6.2}%)",
            self.terminal_returns,
            Self::percent(self.terminal_returns, self.nodes_searched)
        );
        debug!(
            "  - Horizon:          {:>9} ({:>6.2}%)",
            self.horizon_returns,
            Self::percent(self.horizon_returns, self.nodes_searched)
        );
        debug!("  - Extra Turns:      {:>9}", self.extra_turns);

        debug!("");
        debug!("==> Window");
        debug!(
            "  - Beta Cutoffs:     {:>9} ({:>6.2}%)",
            self.beta_cutoffs,
            Self::percent(self.beta_cutoffs, self.nodes_searched)
        );
        debug!("  - Exact Scores:     {:>9}", self.exact_scores);
        debug!("  - Fail Lows:        {:>9}", self.fail_lows);

        debug!("");
        debug!("==> TT");
        debug!(
            "  - TT Hits:          {:>9} ({:>6.2}% of probes), hash_full: {}/1000",
            self.tt_hits,
            Self::percent(self.tt_hits, self.tt_probes),
            self.hash_full
        );
        debug!(
            "    - TT Cutoffs:     {:>9} ({:>6.2}% of hits)",
            self.tt_cutoffs,
            Self::percent(self.tt_cutoffs, self.tt_hits)
        );

        let total_cutoffs: u64 = self.cutoff_at_move.iter().sum();
        if total_cutoffs > 0 {
            debug!("");
            debug!("==> Move Ordering");
            debug!("  - Avg. Cutoff Index:  {:.2}", self.avg_cutoff_index());

            let histogram: Vec<String> = self
                .cutoff_at_move
                .iter()
                .take(10) // Limit to first 10 for readability
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(|(i, count)| format!("{i}:{count}"))
                .collect();

            if !histogram.is_empty() {
                debug!(
                    "  - Cutoff Histogram (move index:count): [{}]",
                    histogram.join(", ")
                );
            }
        }
    }
}

/// Configuration for alpha-beta behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Only the first `beam_width` candidates of each node are searched
    pub beam_width: Option<usize>,
    pub use_tt: bool,
    pub tt_capacity: usize,
    pub collect_stats: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            beam_width: None,
            use_tt: true,
            tt_capacity: DEFAULT_TT_ENTRIES,
            collect_stats: true,
        }
    }
}

/// Search limits (time, depth, nodes)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: Option<u16>,
    pub max_time: Option<Duration>,
    pub max_nodes: Option<u64>,
}

impl SearchLimits {
    pub fn depth(depth: u16) -> Self {
        Self {
            max_depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn time(time_ms: u64) -> Self {
        Self {
            max_time: Some(Duration::from_millis(time_ms)),
            ..Default::default()
        }
    }

    pub fn nodes(nodes: u64) -> Self {
        Self {
            max_nodes: Some(nodes),
            ..Default::default()
        }
    }
}

/// Result of a search
#[derive(Debug, Clone)]
pub struct SearchResult<M> {
    pub best_move: Option<M>,
    pub score: i32,
    /// Deepest fully completed iteration; 0 when none completed
    pub depth: u16,
    pub nodes_searched: u64,
    pub time_taken: Duration,
}

impl<M> Default for SearchResult<M> {
    fn default() -> Self {
        Self {
            best_move: None,
            score: 0,
            depth: 0,
            nodes_searched: 0,
            time_taken: Duration::ZERO,
        }
    }
}

impl<M> SearchResult<M> {
    pub fn nps(&self) -> u64 {
        let time_ms = self.time_taken.as_millis().max(1) as u64;
        (self.nodes_searched * 1000) / time_ms
    }
}

/// Score of a finished game from the side to move's point of view.
/// Wins found closer to the root score higher.
#[inline]
pub fn terminal_score(outcome: Outcome, stm: Player, ply: usize) -> i32 {
    match outcome {
        Outcome::Draw => DRAW_SCORE,
        Outcome::Win(winner) if winner == stm => WIN_SCORE - ply as i32,
        Outcome::Win(_) => -WIN_SCORE + ply as i32,
    }
}

#[inline(always)]
pub fn is_win_score(score: i32) -> bool {
    score.abs() > WIN_THRESHOLD
}

/// Helper functions for score adjustment
/// Adjusts Score to encode win distance in the score
/// Takes ply-independent score and converts it to also hold ply info
#[inline(always)]
pub fn adjust_score_for_ply(score: i32, ply: usize) -> i32 {
    if is_win_score(score) {
        if score > 0 {
            score.saturating_sub(ply as i32)
        } else {
            score.saturating_add(ply as i32)
        }
    } else {
        score
    }
}

// Adjusts Score to be relative to root.
// To be called before entry is stored in TranspositionTable
// Takes ply-dependent score and converts it to 'absolute' score
#[inline(always)]
pub fn adjust_score_from_ply(score: i32, ply: usize) -> i32 {
    if is_win_score(score) {
        if score > 0 {
            score.saturating_add(ply as i32)
        } else {
            score.saturating_sub(ply as i32)
        }
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ply_adjustment_round_trips() {
        let win_in_3 = WIN_SCORE - 3;
        let stored = adjust_score_from_ply(win_in_3, 2);
        assert_eq!(stored, WIN_SCORE - 1);
        assert_eq!(adjust_score_for_ply(stored, 2), win_in_3);
        assert_eq!(adjust_score_for_ply(adjust_score_from_ply(-win_in_3, 2), 2), -win_in_3);
        assert_eq!(adjust_score_from_ply(42, 7), 42);
    }

    #[test]
    fn faster_wins_score_higher() {
        let fast = terminal_score(Outcome::Win(Player::One), Player::One, 1);
        let slow = terminal_score(Outcome::Win(Player::One), Player::One, 5);
        assert!(fast > slow);
        let quick_loss = terminal_score(Outcome::Win(Player::Two), Player::One, 1);
        let late_loss = terminal_score(Outcome::Win(Player::Two), Player::One, 5);
        assert!(late_loss > quick_loss);
        assert_eq!(terminal_score(Outcome::Draw, Player::Two, 3), 0);
    }
}
