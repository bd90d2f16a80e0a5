pub mod game;
pub mod moves;
pub mod prelude;
pub mod search;
pub mod utils;

pub mod consts {
    pub const NUM_PLAYERS: usize = 2;

    pub const MAX_PLY: usize = 128;

    /// Default transposition table size, in entries
    pub const DEFAULT_TT_ENTRIES: usize = 1 << 18;

    pub const ZOBRIST_SEED: u64 = 1070373321345817214;

    /// Window bound; larger than any reachable score and safe to negate
    pub const INFINITY: i32 = 1_000_000_000;
    pub const WIN_SCORE: i32 = 1_000_000;
    pub const WIN_THRESHOLD: i32 = WIN_SCORE - MAX_PLY as i32;
    pub const DRAW_SCORE: i32 = 0;

    /// How often, in nodes, the alpha-beta search polls its stop flag
    pub const STOP_POLL_INTERVAL: u64 = 1024;

    pub const DEFAULT_EXPLORATION: f64 = std::f64::consts::SQRT_2;
}
