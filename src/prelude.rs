pub use crate::consts::*;
pub use crate::game::{
    self, DotsAndBoxes, MoveGenerator, Outcome, Player, Position, StreakGame, ZobristKeys,
};
pub use crate::moves::{self, Candidate, CompoundMove, move_buffer::MoveBuffer};
pub use crate::search::{
    self, AlphaBetaSearch, Choice, MctsSearch, ParallelSearch, SearchDriver, SearchEngine,
    SearchError, SearchResult, Strategy,
};
pub use crate::utils::{self, log::*};
pub use miette::{self, Context, IntoDiagnostic, Result};
pub use std::fmt::Display;
pub use std::str::FromStr;
pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
