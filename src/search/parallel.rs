//! Alpha-Beta fanned out across a worker pool.
//!
//! The first `fan_out_depth` plies are expanded into a tree of branches, each
//! with its own lock-protected window. Every unexpanded branch is a job that a
//! worker searches sequentially. Results flow up through `report`, and every
//! alpha raise flows down through `propagate`, so a cutoff found in one
//! branch narrows, and eventually cancels, its siblings while they run.
//!
//! Lock discipline: at most one branch lock is held at any time.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::prelude::*;
use crate::search::common::*;

type BranchId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Plies expanded into branches before handing off to workers
    pub fan_out_depth: u16,
    pub workers: usize,
    /// Longest wait for one iteration's branch tree to resolve
    pub branch_timeout: Duration,
    /// Settings of each worker's sequential search
    pub search: SearchConfig,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            fan_out_depth: 2,
            workers: thread::available_parallelism().map_or(4, |n| n.get()),
            branch_timeout: Duration::from_secs(30),
            search: SearchConfig {
                tt_capacity: DEFAULT_TT_ENTRIES / 8,
                collect_stats: false,
                ..SearchConfig::default()
            },
        }
    }
}

/// One-shot completion signal.
#[derive(Debug, Default)]
struct Gate {
    open: Mutex<bool>,
    cvar: Condvar,
}

impl Gate {
    fn open(&self) {
        *self.open.lock() = true;
        self.cvar.notify_all();
    }

    /// Returns whether the gate opened within `timeout`.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut open = self.open.lock();
        while !*open {
            if self.cvar.wait_until(&mut open, deadline).timed_out() {
                return *open;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    alpha: i32,
    beta: i32,
    /// Best child score so far and the child's slot
    best: Option<(i32, usize)>,
    /// Children that have not reported yet
    pending: usize,
}

#[derive(Debug)]
struct Branch<G: MoveGenerator> {
    parent: Option<BranchId>,
    /// Index among the parent's children
    slot: usize,
    mv: Option<G::Move>,
    /// The parent sees this branch's score negated (the move passed the turn)
    negate: bool,
    position: G,
    depth: u16,
    ply: usize,
    children: Vec<BranchId>,
    cancel: Arc<AtomicBool>,
    window: Mutex<Window>,
}

struct BranchTree<G: MoveGenerator> {
    branches: Vec<Branch<G>>,
    jobs: Mutex<VecDeque<BranchId>>,
    done: Gate,
    nodes: AtomicU64,
    /// Jobs dropped or aborted because their window closed
    cancelled: AtomicU64,
    hit_horizon: AtomicBool,
    stats: Mutex<SearchStats>,
}

const ROOT: BranchId = 0;

impl<G: MoveGenerator> BranchTree<G> {
    fn build(root: &G, depth: u16, fan_out: u16, beam: Option<usize>) -> Self {
        let mut tree = Self {
            branches: Vec::new(),
            jobs: Mutex::new(VecDeque::new()),
            done: Gate::default(),
            nodes: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            hit_horizon: AtomicBool::new(false),
            stats: Mutex::new(SearchStats::new()),
        };
        let mut jobs = VecDeque::new();
        tree.grow(
            root.clone(),
            None,
            None,
            false,
            depth,
            0,
            fan_out.max(1) as usize,
            beam,
            &mut jobs,
        );
        tree.jobs = Mutex::new(jobs);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        position: G,
        parent: Option<(BranchId, usize)>,
        mv: Option<G::Move>,
        negate: bool,
        depth: u16,
        ply: usize,
        fan_out: usize,
        beam: Option<usize>,
        jobs: &mut VecDeque<BranchId>,
    ) -> BranchId {
        let id = self.branches.len();
        let mut moves = MoveBuffer::new();
        if ply < fan_out && depth > 0 && !position.is_terminal() {
            position.generate_moves(&mut moves);
            if let Some(beam) = beam {
                moves.truncate(beam.max(1));
            }
        }

        self.branches.push(Branch {
            parent: parent.map(|(p, _)| p),
            slot: parent.map_or(0, |(_, s)| s),
            mv,
            negate,
            position,
            depth,
            ply,
            children: Vec::with_capacity(moves.len()),
            cancel: Arc::new(AtomicBool::new(false)),
            window: Mutex::new(Window {
                alpha: -INFINITY,
                beta: INFINITY,
                best: None,
                pending: moves.len(),
            }),
        });

        if moves.is_empty() {
            jobs.push_back(id);
            return id;
        }

        for (slot, candidate) in moves.into_iter().enumerate() {
            let mut child = self.branches[id].position.clone();
            child.apply(&candidate.mv);
            let child_id = self.grow(
                child,
                Some((id, slot)),
                Some(candidate.mv),
                !candidate.grants_extra_turn,
                depth - 1,
                ply + 1,
                fan_out,
                beam,
                jobs,
            );
            self.branches[id].children.push(child_id);
        }
        id
    }

    fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }

    fn next_job(&self) -> Option<BranchId> {
        self.jobs.lock().pop_front()
    }

    /// Worker loop: drain the queue with one sequential searcher.
    fn work(&self, config: SearchConfig) {
        let mut searcher = AlphaBetaSearch::<G>::new(config);
        while let Some(id) = self.next_job() {
            let value = self.run_job(id, &mut searcher);
            if value.is_none() {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            self.report(id, value);
        }
        if searcher.hit_horizon() {
            self.hit_horizon.store(true, Ordering::Relaxed);
        }
        if config.collect_stats {
            let mut total = self.stats.lock();
            *total = *total + searcher.get_stats();
        }
    }

    fn run_job(&self, id: BranchId, searcher: &mut AlphaBetaSearch<G>) -> Option<i32> {
        let branch = &self.branches[id];
        if branch.cancel.load(Ordering::Acquire) {
            return None;
        }
        let (alpha, beta) = {
            let window = branch.window.lock();
            (window.alpha, window.beta)
        };
        if alpha >= beta {
            return None;
        }

        searcher.set_stop_flag(Some(Arc::clone(&branch.cancel)));
        let before = searcher.nodes_searched();
        let mut board = branch.position.clone();
        let value = searcher.search_window(&mut board, branch.depth, branch.ply, alpha, beta);
        self.nodes
            .fetch_add(searcher.nodes_searched() - before, Ordering::Relaxed);
        trace!(
            "job {id} {:?} window ({alpha}, {beta}) -> {value:?}",
            branch.mv
        );
        value
    }

    /// Hands the finished score of `id` (from its own side's view) to its
    /// parent. `None` means the branch was cancelled and carries no score.
    fn report(&self, id: BranchId, value: Option<i32>) {
        let branch = &self.branches[id];
        let Some(parent_id) = branch.parent else {
            self.done.open();
            return;
        };
        let lifted = value.map(|v| if branch.negate { -v } else { v });

        let (raised, finished) = {
            let mut window = self.branches[parent_id].window.lock();
            let mut raised = None;
            if let Some(v) = lifted
                && window.best.is_none_or(|(best, _)| v > best)
            {
                window.best = Some((v, branch.slot));
                if v > window.alpha {
                    window.alpha = v;
                    raised = Some((window.alpha, window.beta));
                }
            }
            window.pending -= 1;
            let finished = (window.pending == 0).then_some(window.best.map(|(score, _)| score));
            (raised, finished)
        };

        if let Some((alpha, beta)) = raised {
            self.propagate(parent_id, alpha, beta);
        }
        if let Some(best) = finished {
            self.report(parent_id, best);
        }
    }

    /// Pushes the window of `id` down into its live children.
    fn propagate(&self, id: BranchId, alpha: i32, beta: i32) {
        if alpha >= beta {
            self.cancel_subtree(id);
            return;
        }
        for &child_id in &self.branches[id].children {
            let child = &self.branches[child_id];
            if child.cancel.load(Ordering::Acquire) {
                continue;
            }
            let (lo, hi) = if child.negate {
                (-beta, -alpha)
            } else {
                (alpha, beta)
            };
            let narrowed = {
                let mut window = child.window.lock();
                let changed = lo > window.alpha || hi < window.beta;
                window.alpha = window.alpha.max(lo);
                window.beta = window.beta.min(hi);
                changed.then_some((window.alpha, window.beta))
            };
            if let Some((alpha, beta)) = narrowed {
                self.propagate(child_id, alpha, beta);
            }
        }
    }

    fn cancel_subtree(&self, id: BranchId) {
        let branch = &self.branches[id];
        branch.cancel.store(true, Ordering::Release);
        for &child in &branch.children {
            self.cancel_subtree(child);
        }
    }

    /// Stops everything: running jobs abort, queued jobs are dropped.
    fn abort(&self) {
        self.jobs.lock().clear();
        self.cancel_subtree(ROOT);
    }

    fn root_result(&self) -> Option<(G::Move, i32)> {
        let root = &self.branches[ROOT];
        let (score, slot) = root.window.lock().best?;
        let mv = self.branches[*root.children.get(slot)?].mv.clone()?;
        Some((mv, score))
    }
}

/// Iterative deepening where each depth is searched by a branch tree.
#[derive(Debug)]
pub struct ParallelSearch<G: MoveGenerator> {
    config: ParallelConfig,
    limits: SearchLimits,
    nodes_searched: u64,
    cancelled_jobs: u64,
    stats: SearchStats,
    start_time: Instant,
    _game: PhantomData<fn() -> G>,
}

impl<G: MoveGenerator> Default for ParallelSearch<G> {
    fn default() -> Self {
        Self::new(ParallelConfig::default())
    }
}

impl<G: MoveGenerator> ParallelSearch<G> {
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config,
            limits: SearchLimits::default(),
            nodes_searched: 0,
            cancelled_jobs: 0,
            stats: SearchStats::new(),
            start_time: Instant::now(),
            _game: PhantomData,
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn config(&self) -> ParallelConfig {
        self.config
    }

    /// Jobs of the last search skipped or aborted by a cutoff elsewhere in the tree.
    pub fn cancelled_jobs(&self) -> u64 {
        self.cancelled_jobs
    }

    /// Worker statistics of the last search, summed over workers and depths.
    /// Empty unless `collect_stats` is set for the workers.
    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn find_best_move(&mut self, position: &G) -> Result<SearchResult<G::Move>, SearchError> {
        let _span = debug_span!("parallel_root").entered();

        if let Some(outcome) = position.outcome() {
            return Err(SearchError::GameOver(outcome));
        }
        if position.legal_moves().is_empty() {
            return Err(SearchError::NoLegalMoves);
        }

        self.nodes_searched = 0;
        self.cancelled_jobs = 0;
        self.stats = SearchStats::new();
        self.start_time = Instant::now();
        let mut result = SearchResult::default();

        for depth in 1..=self.limits.max_depth.unwrap_or(MAX_PLY as u16) {
            if self.should_stop() {
                break;
            }

            let pass = match self.search_pass(position, depth) {
                Ok(pass) => pass,
                Err(e) if result.depth > 0 => {
                    error!("{e}, keeping the result of depth {}", result.depth);
                    break;
                }
                Err(e) => return Err(e),
            };
            self.stats.depth_reached = depth;
            let Some((mv, score)) = pass.best else {
                break;
            };
            result.best_move = Some(mv);
            result.score = score;
            result.depth = depth;

            debug!(
                "parallel depth {depth} score {score} nodes {} (total {}) cancelled {} best {:?}",
                pass.nodes, self.nodes_searched, pass.cancelled, result.best_move
            );

            if !pass.hit_horizon {
                debug!("Tree fully resolved at depth {depth}");
                break;
            }
        }

        result.nodes_searched = self.nodes_searched;
        result.time_taken = self.start_time.elapsed();
        if self.config.search.collect_stats {
            self.stats.log_summary();
        }
        Ok(result)
    }

    /// One fixed-depth pass: build the tree, run the pool, wait on the gate.
    pub(crate) fn search_pass(&mut self, position: &G, depth: u16) -> Result<Pass<G::Move>, SearchError> {
        let tree = BranchTree::build(
            position,
            depth,
            self.config.fan_out_depth,
            self.config.search.beam_width,
        );
        let workers = self.config.workers.clamp(1, tree.job_count().max(1));
        let search_config = self.config.search;
        let timeout = self.config.branch_timeout;
        trace!(
            "depth {depth}: {} branches, {} jobs, {workers} workers",
            tree.branches.len(),
            tree.job_count()
        );

        let waited = Instant::now();
        let opened = thread::scope(|scope| -> Result<bool, SearchError> {
            let tree = &tree;
            let mut handles = Vec::with_capacity(workers);
            for i in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("branch-worker-{i}"))
                    .spawn_scoped(scope, move || tree.work(search_config));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        error!("Failed to spawn branch worker {i}: {e}");
                        tree.abort();
                        return Err(SearchError::WorkerSpawn(e));
                    }
                }
            }

            let opened = tree.done.wait(timeout);
            if !opened {
                error!("Branch tree for depth {depth} did not resolve in {timeout:?}");
                tree.abort();
            }
            for handle in handles {
                if handle.join().is_err() {
                    error!("Branch worker panicked during depth {depth}");
                }
            }
            Ok(opened)
        })?;

        let nodes = tree.nodes.load(Ordering::Relaxed);
        let cancelled = tree.cancelled.load(Ordering::Relaxed);
        self.nodes_searched += nodes;
        self.cancelled_jobs += cancelled;
        self.stats = self.stats + *tree.stats.lock();
        if !opened {
            return Err(SearchError::WorkerTimeout {
                depth,
                waited: waited.elapsed(),
            });
        }

        Ok(Pass {
            best: tree.root_result(),
            hit_horizon: tree.hit_horizon.load(Ordering::Relaxed),
            nodes,
            cancelled,
        })
    }

    /// Checked between iterations only.
    fn should_stop(&self) -> bool {
        self.limits
            .max_time
            .is_some_and(|t| self.start_time.elapsed() >= t)
            || self
                .limits
                .max_nodes
                .is_some_and(|n| self.nodes_searched >= n)
    }
}

pub(crate) struct Pass<M> {
    pub best: Option<(M, i32)>,
    pub hit_horizon: bool,
    /// Nodes searched by the workers in this pass
    pub nodes: u64,
    pub cancelled: u64,
}

impl<G: MoveGenerator> SearchEngine<G> for ParallelSearch<G> {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn search(&mut self, position: &G, limits: SearchLimits) -> Result<SearchResult<G::Move>, SearchError> {
        self.limits = limits;
        self.find_best_move(position)
    }
}
