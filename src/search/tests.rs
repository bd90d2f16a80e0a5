use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

use crate::game::{Cell, Edge};
use crate::prelude::*;
use crate::search::common::*;
use crate::search::driver::DriverConfig;
use crate::search::mcts::MctsConfig;
use crate::search::parallel::ParallelConfig;

/// Unpruned negamax with the same scoring rules as the real search.
fn minimax<G: MoveGenerator>(pos: &mut G, depth: u16, ply: usize) -> i32 {
    if let Some(outcome) = pos.outcome() {
        return terminal_score(outcome, pos.side_to_move(), ply);
    }
    if depth == 0 {
        return pos.evaluate();
    }
    let mut best = -INFINITY;
    for candidate in pos.legal_moves() {
        let undo = pos.apply(&candidate.mv);
        let score = if candidate.grants_extra_turn {
            minimax(pos, depth - 1, ply + 1)
        } else {
            -minimax(pos, depth - 1, ply + 1)
        };
        pos.undo(&candidate.mv, undo);
        best = best.max(score);
    }
    best
}

fn no_tt() -> SearchConfig {
    SearchConfig {
        use_tt: false,
        collect_stats: false,
        ..SearchConfig::default()
    }
}

fn streak_positions() -> Vec<StreakGame> {
    vec![
        StreakGame::tic_tac_toe(),
        StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap(),
        StreakGame::from_rows(&["xo.", ".x.", "..o"], 3, false).unwrap(),
        StreakGame::from_rows(&[".......", ".......", "...x...", "..ox..."], 4, true).unwrap(),
    ]
}

fn dots_positions() -> Vec<DotsAndBoxes> {
    vec![
        DotsAndBoxes::new(2, 2).unwrap(),
        DotsAndBoxes::from_edges(
            2,
            2,
            &[Edge::h(0, 0), Edge::v(0, 0), Edge::h(1, 1), Edge::v(1, 2)],
            Player::One,
            Player::One,
        )
        .unwrap(),
        DotsAndBoxes::from_edges(
            2,
            2,
            &[
                Edge::h(0, 0),
                Edge::h(0, 1),
                Edge::v(0, 0),
                Edge::v(0, 2),
                Edge::h(2, 0),
            ],
            Player::One,
            Player::Two,
        )
        .unwrap(),
    ]
}

#[test]
fn alpha_beta_matches_minimax_without_tt() {
    for pos in streak_positions() {
        for depth in 1..=4 {
            let expected = minimax(&mut pos.clone(), depth, 0);
            let mut search = AlphaBetaSearch::<StreakGame>::new(no_tt());
            assert_eq!(
                search.search_depth(&pos, depth),
                Some(expected),
                "depth {depth} on\n{pos}"
            );
        }
    }
}

#[test]
fn alpha_beta_matches_minimax_with_extra_turns() {
    for pos in dots_positions() {
        for depth in 1..=4 {
            let expected = minimax(&mut pos.clone(), depth, 0);
            let mut search = AlphaBetaSearch::<DotsAndBoxes>::new(no_tt());
            assert_eq!(
                search.search_depth(&pos, depth),
                Some(expected),
                "depth {depth} on\n{pos}"
            );
        }
    }
}

#[test]
fn alpha_beta_with_tt_matches_minimax_at_full_depth() {
    let pos = StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap();
    let expected = minimax(&mut pos.clone(), 9, 0);

    let mut search = AlphaBetaSearch::<StreakGame>::default();
    assert_eq!(search.search_depth(&pos, 9), Some(expected));

    let result = search
        .with_limits(SearchLimits::depth(9))
        .find_best_move(&pos)
        .unwrap();
    assert_eq!(result.score, expected);
}

#[test]
fn search_leaves_position_untouched() {
    let pos = StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap();
    let before = pos.clone();
    let mut search = AlphaBetaSearch::<StreakGame>::default().with_limits(SearchLimits::depth(5));
    search.find_best_move(&pos).unwrap();
    assert_eq!(pos, before);
}

#[test]
fn takes_immediate_win() {
    // X to move, c1 completes the top row
    let pos = StreakGame::from_rows(&["xx.", "oo.", "..."], 3, false).unwrap();
    let mut search = AlphaBetaSearch::<StreakGame>::default().with_limits(SearchLimits::depth(4));
    let result = search.find_best_move(&pos).unwrap();
    assert_eq!(result.best_move, Some(Cell::new(0, 2)));
    assert!(is_win_score(result.score));
    assert_eq!(result.score, WIN_SCORE - 1);
}

#[test]
fn beam_limits_root_candidates() {
    let pos = StreakGame::tic_tac_toe();
    let config = SearchConfig {
        beam_width: Some(1),
        ..no_tt()
    };
    let mut search = AlphaBetaSearch::<StreakGame>::new(config).with_limits(SearchLimits::depth(3));
    let result = search.find_best_move(&pos).unwrap();
    // Only the centre, the highest priority move, is ever looked at
    assert_eq!(result.best_move, Some(Cell::new(1, 1)));
}

#[test]
fn tic_tac_toe_self_play_at_depth_nine_is_a_draw() {
    let mut pos = StreakGame::tic_tac_toe();
    let mut search = AlphaBetaSearch::<StreakGame>::default().with_limits(SearchLimits::depth(9));
    while !pos.is_terminal() {
        let result = search.find_best_move(&pos).unwrap();
        let mv = result.best_move.expect("depth 1 always completes");
        pos.apply(&mv);
    }
    assert_eq!(pos.outcome(), Some(Outcome::Draw), "\n{pos}");
}

#[test]
fn deeper_budget_extends_the_same_iterations() {
    let pos = StreakGame::connect_four();
    let mut small = AlphaBetaSearch::<StreakGame>::default().with_limits(SearchLimits::nodes(2_000));
    let mut large = AlphaBetaSearch::<StreakGame>::default().with_limits(SearchLimits::nodes(50_000));
    let a = small.find_best_move(&pos).unwrap();
    let b = large.find_best_move(&pos).unwrap();

    assert!(a.depth >= 1);
    assert!(b.depth >= a.depth);

    // Replaying the smaller budget's depth reproduces its answer
    let mut replay = AlphaBetaSearch::<StreakGame>::default().with_limits(SearchLimits::depth(a.depth));
    let c = replay.find_best_move(&pos).unwrap();
    assert_eq!(c.best_move, a.best_move);
    assert_eq!(c.score, a.score);
}

#[test]
fn stop_flag_discards_unfinished_iteration() {
    let pos = StreakGame::connect_four();
    let stop = Arc::new(AtomicBool::new(true));
    let mut search = AlphaBetaSearch::<StreakGame>::default()
        .with_limits(SearchLimits::depth(6))
        .with_stop_flag(stop);
    let result = search.find_best_move(&pos).unwrap();
    assert_eq!(result.depth, 0);
    assert!(result.best_move.is_none());
}

#[test]
fn game_over_is_reported() {
    let pos = StreakGame::from_rows(&["xxx", "oo.", "..."], 3, false).unwrap();
    let mut search = AlphaBetaSearch::<StreakGame>::default();
    assert!(matches!(
        search.find_best_move(&pos),
        Err(SearchError::GameOver(Outcome::Win(Player::One)))
    ));
}

fn parallel(search: SearchConfig) -> ParallelConfig {
    ParallelConfig {
        fan_out_depth: 2,
        workers: 4,
        branch_timeout: Duration::from_secs(60),
        search,
    }
}

#[test]
fn parallel_matches_sequential_value() {
    for pos in streak_positions().into_iter().skip(1) {
        let depth = 3;
        let expected = AlphaBetaSearch::<StreakGame>::new(no_tt())
            .search_depth(&pos, depth)
            .unwrap();
        let result = ParallelSearch::<StreakGame>::new(parallel(no_tt()))
            .with_limits(SearchLimits::depth(depth))
            .find_best_move(&pos)
            .unwrap();
        assert_eq!(result.depth, depth, "\n{pos}");
        assert_eq!(result.score, expected, "\n{pos}");
    }
}

#[test]
fn parallel_matches_sequential_with_extra_turns() {
    for pos in dots_positions() {
        let depth = 3;
        let expected = minimax(&mut pos.clone(), depth, 0);
        let result = ParallelSearch::<DotsAndBoxes>::new(parallel(no_tt()))
            .with_limits(SearchLimits::depth(depth))
            .find_best_move(&pos)
            .unwrap();
        assert_eq!(result.depth, depth, "\n{pos}");
        assert_eq!(result.score, expected, "\n{pos}");
    }
}

#[test]
fn parallel_solves_tic_tac_toe() {
    let pos = StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap();
    let expected = minimax(&mut pos.clone(), 9, 0);
    let result = ParallelSearch::<StreakGame>::new(parallel(SearchConfig::default()))
        .with_limits(SearchLimits::depth(9))
        .find_best_move(&pos)
        .unwrap();
    assert_eq!(result.score, expected);
}

/// Tic-Tac-Toe whose evaluation takes long enough to outlast short timeouts.
#[derive(Debug, Clone)]
struct Sluggish(StreakGame);

const SLUGGISH_SCORE: Duration = Duration::from_millis(20);

impl Position for Sluggish {
    type Move = Cell;
    type Undo = <StreakGame as Position>::Undo;

    fn side_to_move(&self) -> Player {
        self.0.side_to_move()
    }
    fn apply(&mut self, mv: &Cell) -> Self::Undo {
        self.0.apply(mv)
    }
    fn undo(&mut self, mv: &Cell, undo: Self::Undo) {
        self.0.undo(mv, undo)
    }
    fn outcome(&self) -> Option<Outcome> {
        self.0.outcome()
    }
    fn score(&self, player: Player) -> i32 {
        thread::sleep(SLUGGISH_SCORE);
        self.0.score(player)
    }
    fn hash(&self) -> u64 {
        self.0.hash()
    }
}

impl MoveGenerator for Sluggish {
    fn generate_moves(&self, moves: &mut MoveBuffer<Cell>) {
        self.0.generate_moves(moves)
    }
}

/// One worker, so a depth-one pass over nine evaluations takes ~360ms.
fn sluggish_parallel(branch_timeout: Duration) -> ParallelConfig {
    ParallelConfig {
        workers: 1,
        branch_timeout,
        ..parallel(no_tt())
    }
}

#[test]
fn parallel_times_out_instead_of_hanging() {
    let pos = Sluggish(StreakGame::tic_tac_toe());
    let result = ParallelSearch::<Sluggish>::new(sluggish_parallel(Duration::from_millis(10)))
        .with_limits(SearchLimits::depth(3))
        .find_best_move(&pos);
    assert!(
        matches!(result, Err(SearchError::WorkerTimeout { depth: 1, .. })),
        "{result:?}"
    );
}

#[test]
fn parallel_timeout_keeps_completed_depths() {
    let pos = StreakGame::connect_four();
    let config = ParallelConfig {
        branch_timeout: Duration::from_millis(100),
        ..parallel(SearchConfig::default())
    };
    let result = ParallelSearch::<StreakGame>::new(config)
        .with_limits(SearchLimits::depth(40))
        .find_best_move(&pos)
        .unwrap();
    assert!(result.depth >= 1 && result.depth < 40, "depth {}", result.depth);
    assert!(pos.is_legal(result.best_move.unwrap()));
}

#[test]
fn parallel_cutoff_cancels_sibling_jobs() {
    // X wins at c1; every other root move is refuted by its first reply
    let pos = StreakGame::from_rows(&["xx.", "oo.", "..."], 3, false).unwrap();
    let depth = 4;
    let config = ParallelConfig {
        workers: 1,
        ..parallel(no_tt())
    };
    let mut search = ParallelSearch::<StreakGame>::new(config);
    let pass = search.search_pass(&pos, depth).unwrap();
    assert_eq!(pass.best.map(|(mv, _)| mv), Some(Cell::new(0, 2)));
    assert!(pass.cancelled > 0);
    assert_eq!(search.cancelled_jobs(), pass.cancelled);

    // The same leaf jobs, each searched on its own with a full window
    let mut full_window = 0;
    for first in pos.legal_moves() {
        let mut child = pos.clone();
        child.apply(&first.mv);
        if child.is_terminal() {
            full_window += 1;
            continue;
        }
        for reply in child.legal_moves() {
            let mut leaf = child.clone();
            leaf.apply(&reply.mv);
            let mut searcher = AlphaBetaSearch::<StreakGame>::new(no_tt());
            searcher.search_depth(&leaf, depth - 2);
            full_window += searcher.nodes_searched();
        }
    }
    assert!(pass.nodes < full_window, "{} >= {full_window}", pass.nodes);
}

#[test]
fn parallel_sums_worker_stats() {
    let pos = StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap();
    let config = parallel(SearchConfig {
        collect_stats: true,
        ..no_tt()
    });
    let mut search = ParallelSearch::<StreakGame>::new(config).with_limits(SearchLimits::depth(3));
    let result = search.find_best_move(&pos).unwrap();
    let stats = search.stats();
    assert_eq!(stats.nodes_searched, result.nodes_searched);
    assert_eq!(stats.depth_reached, 3);
    assert!(stats.horizon_returns > 0);
}

fn mcts(iterations: u64, seed: u64) -> MctsSearch<StreakGame> {
    MctsSearch::new(MctsConfig {
        max_iterations: Some(iterations),
        seed: Some(seed),
        ..MctsConfig::default()
    })
}

/// Value of `mv` for the mover under perfect play.
fn solved_value(pos: &StreakGame, mv: Cell) -> i32 {
    let mut after = pos.clone();
    after.apply(&mv);
    -AlphaBetaSearch::<StreakGame>::default()
        .search_depth(&after, 9)
        .unwrap()
}

#[test]
fn mcts_opening_move_does_not_lose() {
    let pos = StreakGame::tic_tac_toe();
    let result = mcts(20_000, 7).find_best_move(&pos).unwrap();
    let mv = result.best_move.unwrap();
    assert!(solved_value(&pos, mv) >= DRAW_SCORE, "{mv} loses");
}

#[test]
fn mcts_blocks_open_line() {
    // O to move must take c1
    let pos = StreakGame::from_rows(&["xx.", ".o.", "..."], 3, false).unwrap();
    let result = mcts(20_000, 11).find_best_move(&pos).unwrap();
    assert_eq!(result.best_move, Some(Cell::new(0, 2)));
    assert!(solved_value(&pos, Cell::new(0, 2)) >= DRAW_SCORE);
}

#[test]
fn mcts_backpropagates_whole_batch() {
    let pos = StreakGame::tic_tac_toe();
    let mut search = MctsSearch::<StreakGame>::new(MctsConfig {
        rollout_batch: 4,
        max_iterations: Some(100),
        seed: Some(3),
        ..MctsConfig::default()
    });
    search.find_best_move(&pos).unwrap();

    let stats = search.stats();
    assert_eq!(stats.iterations, 100);
    assert_eq!(stats.playouts, 400);
    let visits: u64 = search.root_children().iter().map(|(_, v, _)| v).sum();
    assert_eq!(visits, 400);
}

#[test]
fn mcts_is_reproducible_with_a_seed() {
    let pos = StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap();
    let a = mcts(2_000, 5).find_best_move(&pos).unwrap();
    let b = mcts(2_000, 5).find_best_move(&pos).unwrap();
    assert_eq!(a.best_move, b.best_move);
    assert_eq!(a.score, b.score);
}

/// A broken game: never over, never any moves.
#[derive(Debug, Clone, PartialEq)]
struct Stuck;

impl Position for Stuck {
    type Move = u8;
    type Undo = ();

    fn side_to_move(&self) -> Player {
        Player::One
    }
    fn apply(&mut self, _mv: &u8) {}
    fn undo(&mut self, _mv: &u8, _undo: ()) {}
    fn outcome(&self) -> Option<Outcome> {
        None
    }
    fn score(&self, _player: Player) -> i32 {
        0
    }
    fn hash(&self) -> u64 {
        0
    }
}

impl MoveGenerator for Stuck {
    fn generate_moves(&self, moves: &mut MoveBuffer<u8>) {
        moves.clear();
    }
}

#[test]
fn driver_rejects_zero_budget() {
    let mut driver = SearchDriver::<StreakGame>::default();
    assert!(matches!(
        driver.choose_move(&StreakGame::tic_tac_toe(), 0),
        Err(SearchError::ZeroBudget)
    ));
}

#[test]
fn driver_rejects_finished_and_stuck_positions() {
    let won = StreakGame::from_rows(&["xxx", "oo.", "..."], 3, false).unwrap();
    let mut driver = SearchDriver::<StreakGame>::default();
    assert!(matches!(
        driver.choose_move(&won, 100),
        Err(SearchError::GameOver(_))
    ));

    for strategy in [Strategy::AlphaBeta, Strategy::Parallel, Strategy::Mcts] {
        let mut driver = SearchDriver::<Stuck>::new(DriverConfig {
            strategy,
            ..DriverConfig::default()
        });
        assert!(matches!(
            driver.choose_move(&Stuck, 100),
            Err(SearchError::NoLegalMoves)
        ));
    }
}

#[test]
fn driver_falls_back_to_random_legal_move() {
    let pos = StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap();
    let mut driver = SearchDriver::<StreakGame>::default().with_stop_flag(Arc::new(AtomicBool::new(true)));
    let choice = driver.choose_move(&pos, 1_000).unwrap();
    assert!(choice.fallback);
    assert_eq!(choice.depth, 0);
    assert!(pos.is_legal(choice.mv));
}

#[test]
fn driver_retries_sequentially_after_worker_timeout() {
    let pos = Sluggish(StreakGame::tic_tac_toe());
    let mut driver = SearchDriver::<Sluggish>::new(DriverConfig {
        strategy: Strategy::Parallel,
        parallel: sluggish_parallel(Duration::from_millis(50)),
        ..DriverConfig::default()
    });
    let choice = driver.choose_move(&pos, 300).unwrap();
    assert_eq!(choice.strategy, Strategy::AlphaBeta);
    assert!(!choice.fallback);
    assert!(choice.depth >= 1);
    assert!(pos.0.is_legal(choice.mv));
}

#[test]
fn driver_retry_only_gets_the_remaining_budget() {
    let pos = Sluggish(StreakGame::tic_tac_toe());
    let mut driver = SearchDriver::<Sluggish>::new(DriverConfig {
        strategy: Strategy::Parallel,
        parallel: sluggish_parallel(Duration::from_millis(100)),
        ..DriverConfig::default()
    });

    // The parallel attempt alone uses up the budget, so no retry runs
    let started = Instant::now();
    let choice = driver.choose_move(&pos, 50).unwrap();
    let elapsed = started.elapsed();
    assert!(choice.fallback);
    assert_eq!(choice.strategy, Strategy::Parallel);
    assert!(pos.0.is_legal(choice.mv));
    assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");
}

#[test]
fn driver_starts_every_call_with_an_empty_table() {
    let pos = StreakGame::from_rows(&["x..", ".o.", "..."], 3, false).unwrap();
    let mut driver = SearchDriver::<StreakGame>::new(DriverConfig {
        max_depth: Some(5),
        ..DriverConfig::default()
    });
    let first = driver.choose_move(&pos, 10_000).unwrap();
    let second = driver.choose_move(&pos, 10_000).unwrap();
    assert_eq!(first.depth, 5);
    assert_eq!(first, second);
}

#[test]
fn driver_plays_every_strategy() {
    let pos = StreakGame::from_rows(&["xx.", ".o.", "..."], 3, false).unwrap();
    for strategy in [Strategy::AlphaBeta, Strategy::Parallel, Strategy::Mcts] {
        let mut driver = SearchDriver::<StreakGame>::new(DriverConfig {
            strategy,
            mcts: MctsConfig {
                max_iterations: Some(20_000),
                seed: Some(1),
                ..MctsConfig::default()
            },
            ..DriverConfig::default()
        });
        let choice = driver.choose_move(&pos, 10_000).unwrap();
        assert_eq!(choice.strategy, strategy);
        assert_eq!(choice.mv, Cell::new(0, 2), "{strategy} failed to block");
    }
}
