use std::fmt::Debug;
use std::time::{Duration, Instant};

use crate::game::MoveGenerator;

#[derive(Debug)]
pub struct PerftResult<M> {
    /// Total nodes counted
    pub nodes: u64,
    /// Time taken
    pub duration: Duration,
    /// Nodes per second
    pub nps: u64,
    /// Move breakdown showing count for each move
    pub move_counts: Option<Vec<(M, u64)>>,
}

impl<M> PerftResult<M> {
    /// Creates a new PerftResult with the given data
    pub fn new(nodes: u64, duration: Duration, move_counts: Option<Vec<(M, u64)>>) -> Self {
        let nanos = duration.as_nanos();
        let nps = if nanos > 0 {
            (nodes as u128 * 1_000_000_000 / nanos) as u64
        } else {
            0
        };

        Self {
            nodes,
            duration,
            nps,
            move_counts,
        }
    }
}

/// Counts leaf positions `depth` plies below `board`. A finished game counts
/// as a leaf wherever it occurs.
pub fn perft<G: MoveGenerator>(board: &mut G, depth: u8, divide: bool) -> PerftResult<G::Move> {
    let start_time = Instant::now();
    let (nodes, move_counts) = count(board, depth, divide);
    PerftResult::new(nodes, start_time.elapsed(), move_counts)
}

type Breakdown<M> = Option<Vec<(M, u64)>>;

fn count<G: MoveGenerator>(board: &mut G, depth: u8, divide: bool) -> (u64, Breakdown<G::Move>) {
    if depth == 0 || board.is_terminal() {
        return (1, None);
    }

    let legal_moves = board.legal_moves();
    let mut move_counts = divide.then(|| Vec::with_capacity(legal_moves.len()));

    if depth == 1 && !divide {
        return (legal_moves.len() as u64, None);
    }

    let mut total_nodes = 0;
    for candidate in legal_moves {
        #[cfg(debug_assertions)]
        let hash_before = board.hash();

        let undo = board.apply(&candidate.mv);
        let (sub_nodes, _) = count(board, depth - 1, false);
        board.undo(&candidate.mv, undo);

        #[cfg(debug_assertions)]
        debug_assert_eq!(
            board.hash(),
            hash_before,
            "undo of {:?} at depth {depth} broke the hash",
            candidate.mv
        );

        total_nodes += sub_nodes;
        if let Some(counts) = &mut move_counts {
            counts.push((candidate.mv, sub_nodes));
        }
    }

    (total_nodes, move_counts)
}

/// Performs a Perft test and prints a detailed breakdown
pub fn perft_divide<G>(board: &mut G, depth: u8) -> PerftResult<G::Move>
where
    G: MoveGenerator,
    G::Move: Debug,
{
    println!("Starting perft...");
    let result = perft(board, depth, true);

    if let Some(ref move_counts) = result.move_counts {
        println!("Perft results at depth {depth}");
        println!("----------------------------");

        for (mov, count) in move_counts {
            println!("{mov:?}: {count}");
        }

        println!("----------------------------");
        println!("Total nodes: {}", result.nodes);
        println!("Time: {} ms", result.duration.as_millis());
        println!("Nodes per second: {}", result.nps);
    }

    result
}

/// Runs a suite of perft tests for depths 1 through max_depth
pub fn run_perft_suite<G: MoveGenerator>(board: &mut G, max_depth: u8) {
    println!("Running Perft suite up to depth {max_depth}");
    println!("----------------------------");

    for depth in 1..=max_depth {
        let result = perft(board, depth, false);
        println!(
            "Depth {}: {} nodes in {} ms ({} nps)",
            depth,
            result.nodes,
            result.duration.as_millis(),
            result.nps
        );
    }

    println!("----------------------------");
}
