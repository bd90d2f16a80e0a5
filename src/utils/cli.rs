use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::prelude::*;
use crate::utils::config::EngineSettings;

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version = env!("APP_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write debug logs to a file in the temp directory
    #[arg(long, global = true)]
    pub log_file: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play a game against the engine
    Play {
        #[command(flatten)]
        board: BoardArgs,
        #[command(flatten)]
        settings: SettingsArgs,
        /// Search strategy, overriding the config file
        #[arg(short, long)]
        strategy: Option<Strategy>,
        /// Side played from the keyboard
        #[arg(long, value_enum, default_value_t = HumanSide::One)]
        human: HumanSide,
    },

    /// Play a series of engine-vs-engine games, swapping colours every game
    Match {
        #[command(flatten)]
        board: BoardArgs,
        #[command(flatten)]
        settings: SettingsArgs,
        /// Number of games
        #[arg(short = 'n', long, default_value = "10")]
        games: usize,
        #[arg(long, value_enum, default_value_t = Strategy::AlphaBeta)]
        first: Strategy,
        #[arg(long, value_enum, default_value_t = Strategy::Mcts)]
        second: Strategy,
    },

    /// Count move-generator leaf nodes to the given depth
    Perft {
        #[command(flatten)]
        board: BoardArgs,
        /// set search depth
        #[arg(short, long, default_value = "5")]
        depth: u8,
        /// set divide flag
        #[arg(long, default_value = "false")]
        divide: bool,
    },

    /// Write the default settings as TOML
    Config {
        #[arg(short, long)]
        write: PathBuf,
    },
}

impl Commands {
    pub fn board(&self) -> Option<&BoardArgs> {
        match self {
            Commands::Play { board, .. }
            | Commands::Match { board, .. }
            | Commands::Perft { board, .. } => Some(board),
            Commands::Config { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GameKind {
    #[value(name = "tictactoe")]
    TicTacToe,
    #[value(name = "connect4")]
    ConnectFour,
    Dots,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HumanSide {
    One,
    Two,
    #[value(name = "none")]
    Nobody,
}

impl HumanSide {
    pub fn controls(self, player: Player) -> bool {
        matches!(
            (self, player),
            (HumanSide::One, Player::One) | (HumanSide::Two, Player::Two)
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct BoardArgs {
    #[arg(short, long, value_enum, default_value_t = GameKind::TicTacToe)]
    pub game: GameKind,
    /// Board rows (boxes for dots)
    #[arg(long)]
    pub rows: Option<usize>,
    /// Board columns (boxes for dots)
    #[arg(long)]
    pub cols: Option<usize>,
}

impl BoardArgs {
    /// Tic-Tac-Toe or Connect Four, sized by `--rows`/`--cols`.
    pub fn streak_game(&self) -> miette::Result<StreakGame> {
        let (rows, cols, streak, gravity) = match self.game {
            GameKind::TicTacToe => (3, 3, 3, false),
            GameKind::ConnectFour => (6, 7, 4, true),
            GameKind::Dots => miette::bail!("Dots and boxes is not a streak game"),
        };
        let (rows, cols) = (self.rows.unwrap_or(rows), self.cols.unwrap_or(cols));
        StreakGame::new(cols, rows, streak.min(rows.max(cols)), gravity)
    }

    pub fn dots_game(&self) -> miette::Result<DotsAndBoxes> {
        DotsAndBoxes::new(self.rows.unwrap_or(3), self.cols.unwrap_or(3))
    }
}

#[derive(Debug, Clone, Args)]
pub struct SettingsArgs {
    /// Per-move budget in milliseconds, overriding the config file
    #[arg(short, long)]
    pub time_ms: Option<u64>,
    /// TOML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl SettingsArgs {
    /// Settings from the config file (or defaults) with flags applied on top.
    pub fn resolve(&self) -> miette::Result<EngineSettings> {
        let mut settings = match &self.config {
            Some(path) => EngineSettings::load_from_file(path)?,
            None => EngineSettings::default(),
        };
        if let Some(time_ms) = self.time_ms {
            settings.time_ms = time_ms;
        }
        Ok(settings)
    }
}

#[derive(Parser, Debug)]
#[command(name = "game_cmd", no_binary_name = true)]
pub struct GameCommand {
    #[command(subcommand)]
    pub cmd: GameSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum GameSubcommand {
    /// Make a move on the board, e.g. `b2`, `d` or `h0.1`
    #[clap(visible_alias = "m")]
    Move { mv: String },

    /// Print the current board state
    #[clap(visible_alias = "p")]
    Print,

    /// Undo the last move
    #[clap(visible_alias = "u")]
    Undo,

    /// Ask the engine for a move without playing it
    #[clap(visible_alias = "h")]
    Hint,

    /// Switch the engine's search strategy
    #[clap(visible_alias = "s")]
    Strategy {
        #[arg(value_enum)]
        strategy: Strategy,
    },

    /// Clear screen
    #[clap(visible_alias = "c")]
    Clear,

    /// Quit game
    #[clap(visible_alias = "q")]
    Quit,
}

impl GameCommand {
    /// Splits a line of keyboard input the way a shell would and parses it.
    pub fn parse_line(line: &str) -> miette::Result<Self> {
        let words = shell_words::split(line)
            .into_diagnostic()
            .context("Failed to split input")?;
        Self::try_parse_from(words).into_diagnostic()
    }
}
