//! Monte Carlo Tree Search with UCT selection.
//!
//! Nodes live in an arena and refer to their parent by index. Statistics
//! change only through [`Node::record`], once per backpropagated batch.

use std::time::Instant;

use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::prelude::*;
use crate::search::common::*;

pub type NodeId = usize;

/// Iteration cap used when neither a deadline nor a cap was given.
pub const DEFAULT_ITERATIONS: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// UCT exploration constant
    pub exploration: f64,
    /// Playouts run from each expanded node
    pub rollout_batch: usize,
    pub max_iterations: Option<u64>,
    /// Fixed seed for reproducible searches
    pub seed: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration: DEFAULT_EXPLORATION,
            rollout_batch: 1,
            max_iterations: None,
            seed: None,
        }
    }
}

/// Aggregated result of one or more playouts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub playouts: u64,
    pub rewards: [f64; NUM_PLAYERS],
}

impl Tally {
    pub fn from_outcome(outcome: Outcome) -> Self {
        Self {
            playouts: 1,
            rewards: Player::PLAYERS.map(|p| outcome.reward(p)),
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            playouts: self.playouts + other.playouts,
            rewards: [
                self.rewards[0] + other.rewards[0],
                self.rewards[1] + other.rewards[1],
            ],
        }
    }
}

#[derive(Debug, Clone)]
struct Node<M> {
    parent: Option<NodeId>,
    mv: Option<M>,
    to_move: Player,
    terminal: Option<Outcome>,
    /// `None` until expanded
    children: Option<Vec<NodeId>>,
    visits: u64,
    score: [f64; NUM_PLAYERS],
}

impl<M> Node<M> {
    fn new(parent: Option<NodeId>, mv: Option<M>, to_move: Player, terminal: Option<Outcome>) -> Self {
        Self {
            parent,
            mv,
            to_move,
            terminal,
            children: None,
            visits: 0,
            score: [0.0; NUM_PLAYERS],
        }
    }

    #[inline]
    fn record(&mut self, tally: &Tally) {
        self.visits += tally.playouts;
        for (score, reward) in self.score.iter_mut().zip(tally.rewards) {
            *score += reward;
        }
    }

    #[inline]
    fn win_rate(&self, player: Player) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.score[player.index()] / self.visits as f64
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MctsStats {
    pub iterations: u64,
    pub playouts: u64,
    pub tree_size: usize,
    pub max_depth: usize,
}

impl MctsStats {
    pub fn log_summary(&self, elapsed: std::time::Duration) {
        let _span = debug_span!("mcts_stats").entered();
        debug!(
            "iterations={} playouts={} tree_size={} max_depth={} time={elapsed:?}",
            self.iterations, self.playouts, self.tree_size, self.max_depth
        );
    }
}

#[derive(Debug)]
pub struct MctsSearch<G: MoveGenerator> {
    config: MctsConfig,
    limits: SearchLimits,
    rng: StdRng,
    nodes: Vec<Node<G::Move>>,
    stats: MctsStats,
}

impl<G: MoveGenerator> Default for MctsSearch<G> {
    fn default() -> Self {
        Self::new(MctsConfig::default())
    }
}

impl<G: MoveGenerator> MctsSearch<G> {
    pub fn new(config: MctsConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            config,
            limits: SearchLimits::default(),
            rng,
            nodes: Vec::new(),
            stats: MctsStats::default(),
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn config(&self) -> MctsConfig {
        self.config
    }

    pub fn stats(&self) -> MctsStats {
        self.stats
    }

    /// Visit count and mean reward (for the root mover) of every root child.
    pub fn root_children(&self) -> Vec<(G::Move, u64, f64)> {
        let Some(root) = self.nodes.first() else {
            return Vec::new();
        };
        root.children
            .iter()
            .flatten()
            .filter_map(|&id| {
                let node = &self.nodes[id];
                let mv = node.mv.clone()?;
                Some((mv, node.visits, node.win_rate(root.to_move)))
            })
            .collect()
    }

    pub fn find_best_move(&mut self, position: &G) -> Result<SearchResult<G::Move>, SearchError> {
        let _span = debug_span!("mcts_root").entered();

        if let Some(outcome) = position.outcome() {
            return Err(SearchError::GameOver(outcome));
        }
        if position.legal_moves().is_empty() {
            return Err(SearchError::NoLegalMoves);
        }

        let start = Instant::now();
        self.nodes.clear();
        self.nodes
            .push(Node::new(None, None, position.side_to_move(), None));
        self.stats = MctsStats::default();

        let cap = self
            .config
            .max_iterations
            .or(self.limits.max_nodes)
            .or(self.limits.max_time.is_none().then_some(DEFAULT_ITERATIONS));

        loop {
            if cap.is_some_and(|cap| self.stats.iterations >= cap) {
                break;
            }
            if self.limits.max_time.is_some_and(|t| start.elapsed() >= t) {
                break;
            }
            self.iterate(position);
            self.stats.iterations += 1;
        }

        self.stats.tree_size = self.nodes.len();
        self.stats.log_summary(start.elapsed());

        let best = self.best_child();
        let score = best.map_or(0, |id| {
            (self.nodes[id].win_rate(position.side_to_move()) * 1000.0) as i32
        });
        Ok(SearchResult {
            best_move: best.and_then(|id| self.nodes[id].mv.clone()),
            score,
            depth: self.stats.max_depth as u16,
            nodes_searched: self.stats.playouts,
            time_taken: start.elapsed(),
        })
    }

    /// Select, expand, simulate, backpropagate.
    fn iterate(&mut self, root: &G) {
        let mut board = root.clone();
        let mut node = 0;
        let mut depth = 0;

        loop {
            if self.nodes[node].terminal.is_some() {
                break;
            }
            if self.nodes[node].children.is_none() {
                self.expand(node, &mut board);
            }
            let Some(children) = self.nodes[node].children.as_deref() else {
                break;
            };
            if children.is_empty() {
                break;
            }

            let unvisited: Vec<NodeId> = children
                .iter()
                .copied()
                .filter(|&c| self.nodes[c].visits == 0)
                .collect();
            let (next, expanding) = match unvisited.choose(&mut self.rng) {
                Some(&child) => (child, true),
                None => (self.select_uct(node), false),
            };

            if let Some(mv) = &self.nodes[next].mv {
                board.apply(mv);
            }
            node = next;
            depth += 1;
            if expanding {
                break;
            }
        }

        self.stats.max_depth = self.stats.max_depth.max(depth);
        let tally = self.simulate(node, &board);
        self.backpropagate(node, &tally);
    }

    fn expand(&mut self, node: NodeId, board: &mut G) {
        let moves = board.legal_moves();
        let mut children = Vec::with_capacity(moves.len());
        for candidate in moves {
            let undo = board.apply(&candidate.mv);
            let (to_move, terminal) = (board.side_to_move(), board.outcome());
            board.undo(&candidate.mv, undo);
            children.push(self.nodes.len());
            self.nodes
                .push(Node::new(Some(node), Some(candidate.mv), to_move, terminal));
        }
        self.nodes[node].children = Some(children);
    }

    /// UCT over fully visited children, ranked for the player choosing at `node`.
    /// Equal values are broken uniformly at random.
    fn select_uct(&mut self, node: NodeId) -> NodeId {
        let parent = &self.nodes[node];
        let log_visits = (parent.visits.max(1) as f64).ln();
        let c = self.config.exploration;

        let scored: Vec<(NodeId, f64)> = parent
            .children
            .iter()
            .flatten()
            .map(|&id| {
                let child = &self.nodes[id];
                let visits = child.visits as f64;
                (id, child.win_rate(parent.to_move) + c * (log_visits / visits).sqrt())
            })
            .collect();
        let top = scored
            .iter()
            .map(|&(_, uct)| uct)
            .fold(f64::NEG_INFINITY, f64::max);
        let tied: Vec<NodeId> = scored
            .into_iter()
            .filter(|&(_, uct)| uct == top)
            .map(|(id, _)| id)
            .collect();

        tied.choose(&mut self.rng).copied().unwrap_or(node)
    }

    fn simulate(&mut self, node: NodeId, board: &G) -> Tally {
        let batch = self.config.rollout_batch.max(1);

        let tally = match self.nodes[node].terminal {
            Some(outcome) => {
                let one = Tally::from_outcome(outcome);
                Tally {
                    playouts: batch as u64,
                    rewards: one.rewards.map(|r| r * batch as f64),
                }
            }
            None => self.rollouts(board, batch),
        };
        self.stats.playouts += tally.playouts;
        tally
    }

    fn rollouts(&mut self, board: &G, batch: usize) -> Tally {
        let seeds: Vec<u64> = (0..batch).map(|_| self.rng.random()).collect();

        #[cfg(feature = "parallel")]
        let tally = {
            use rayon::prelude::*;
            if batch > 1 {
                seeds
                    .par_iter()
                    .map(|&seed| Tally::from_outcome(rollout(board, seed)))
                    .reduce(Tally::default, Tally::merge)
            } else {
                seeds
                    .iter()
                    .map(|&seed| Tally::from_outcome(rollout(board, seed)))
                    .fold(Tally::default(), Tally::merge)
            }
        };
        #[cfg(not(feature = "parallel"))]
        let tally = seeds
            .iter()
            .map(|&seed| Tally::from_outcome(rollout(board, seed)))
            .fold(Tally::default(), Tally::merge);

        tally
    }

    fn backpropagate(&mut self, from: NodeId, tally: &Tally) {
        let mut current = Some(from);
        while let Some(id) = current {
            let node = &mut self.nodes[id];
            node.record(tally);
            current = node.parent;
        }
    }

    /// Highest mean reward for the root mover; ties go to the more visited child.
    fn best_child(&self) -> Option<NodeId> {
        let root = self.nodes.first()?;
        root.children
            .iter()
            .flatten()
            .copied()
            .filter(|&id| self.nodes[id].visits > 0)
            .max_by(|&a, &b| {
                let (na, nb) = (&self.nodes[a], &self.nodes[b]);
                na.win_rate(root.to_move)
                    .total_cmp(&nb.win_rate(root.to_move))
                    .then(na.visits.cmp(&nb.visits))
            })
    }
}

/// Plays uniformly random moves from `board` until the game ends.
fn rollout<G: MoveGenerator>(board: &G, seed: u64) -> Outcome {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut board = board.clone();
    let mut moves = MoveBuffer::new();
    loop {
        if let Some(outcome) = board.outcome() {
            return outcome;
        }
        board.generate_moves(&mut moves);
        let Some(candidate) = moves.as_slice().choose(&mut rng) else {
            // Non-terminal dead end; score it as a draw
            return Outcome::Draw;
        };
        let mv = candidate.mv.clone();
        board.apply(&mv);
    }
}

impl<G: MoveGenerator> SearchEngine<G> for MctsSearch<G> {
    fn name(&self) -> &'static str {
        "mcts"
    }

    fn search(&mut self, position: &G, limits: SearchLimits) -> Result<SearchResult<G::Move>, SearchError> {
        self.limits = limits;
        self.find_best_move(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Cell;

    /// Root with `n` children that all carry the same statistics.
    fn even_tree(n: usize, seed: u64) -> MctsSearch<StreakGame> {
        let mut search = MctsSearch::<StreakGame>::new(MctsConfig {
            seed: Some(seed),
            ..MctsConfig::default()
        });
        search.nodes.push(Node::new(None, None, Player::One, None));
        let tally = Tally {
            playouts: 4,
            rewards: [2.0, 2.0],
        };
        let children: Vec<NodeId> = (1..=n).collect();
        for &id in &children {
            let mut child = Node::new(Some(0), Some(Cell::new(0, (id - 1) as u8)), Player::Two, None);
            child.record(&tally);
            search.nodes.push(child);
            search.nodes[0].record(&tally);
        }
        search.nodes[0].children = Some(children);
        search
    }

    #[test]
    fn uct_ties_are_broken_at_random() {
        let mut search = even_tree(3, 9);
        let mut picked = [0u32; 4];
        for _ in 0..300 {
            picked[search.select_uct(0)] += 1;
        }
        assert_eq!(picked[0], 0);
        for (id, &count) in picked.iter().enumerate().skip(1) {
            assert!(count > 50, "child {id} picked {count} times");
        }
    }

    #[test]
    fn uct_prefers_the_stronger_child() {
        let mut search = even_tree(3, 2);
        search.nodes[2].record(&Tally {
            playouts: 0,
            rewards: [1.0, 0.0],
        });
        for _ in 0..20 {
            assert_eq!(search.select_uct(0), 2);
        }
    }
}
