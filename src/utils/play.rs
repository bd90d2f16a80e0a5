use std::io::{self, BufRead, Write};

use crate::prelude::*;
use crate::utils::cli::{GameCommand, GameSubcommand, HumanSide};
use crate::utils::config::EngineSettings;
use crate::utils::clear_screen;

#[cfg(feature = "parallel")]
use {
    indicatif::{ProgressBar, ProgressStyle},
    rayon::prelude::*,
};

/// A game the command line can drive: printable, with moves that can be
/// typed in and shown back.
pub trait Playable: MoveGenerator + Display {
    fn parse_move(&self, text: &str) -> miette::Result<Self::Move>;

    fn format_move(&self, mv: &Self::Move) -> String;
}

impl Playable for StreakGame {
    fn parse_move(&self, text: &str) -> miette::Result<Self::Move> {
        StreakGame::parse_move(self, text)
    }

    fn format_move(&self, mv: &Self::Move) -> String {
        mv.to_string()
    }
}

impl Playable for DotsAndBoxes {
    fn parse_move(&self, text: &str) -> miette::Result<Self::Move> {
        DotsAndBoxes::parse_move(self, text)
    }

    fn format_move(&self, mv: &Self::Move) -> String {
        mv.to_string()
    }
}

/// Interactive game between the keyboard and the engine.
pub fn game_loop<G: Playable>(
    mut board: G,
    settings: EngineSettings,
    human: HumanSide,
) -> miette::Result<()> {
    let mut driver = SearchDriver::<G>::new(settings.engine);
    let mut history: Vec<(G::Move, G::Undo)> = Vec::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("{board}");
    loop {
        if let Some(outcome) = board.outcome() {
            println!("Game over: {outcome}");
            return Ok(());
        }

        let mover = board.side_to_move();
        if !human.controls(mover) {
            let choice = driver.choose_move(&board, settings.time_ms)?;
            println!(
                "{mover} plays {} (score {}, depth {}, {})",
                board.format_move(&choice.mv),
                choice.score,
                choice.depth,
                choice.strategy
            );
            let undo = board.apply(&choice.mv);
            history.push((choice.mv, undo));
            println!("{board}");
            continue;
        }

        print!("{mover} > ");
        io::stdout().flush().into_diagnostic()?;
        let Some(line) = lines.next() else {
            return Ok(());
        };
        let line = line.into_diagnostic()?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match GameCommand::parse_line(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e:?}");
                continue;
            }
        };

        match command.cmd {
            GameSubcommand::Move { mv } => match board.parse_move(&mv) {
                Ok(mv) => {
                    let undo = board.apply(&mv);
                    history.push((mv, undo));
                    println!("{board}");
                }
                Err(e) => println!("{e:?}"),
            },
            GameSubcommand::Print => println!("{board}"),
            GameSubcommand::Undo => {
                if history.is_empty() {
                    println!("Nothing to undo");
                    continue;
                }
                // Roll back to the last position the human had to move in
                while let Some((mv, undo)) = history.pop() {
                    board.undo(&mv, undo);
                    if human.controls(board.side_to_move()) {
                        break;
                    }
                }
                println!("{board}");
            }
            GameSubcommand::Hint => match driver.choose_move(&board, settings.time_ms) {
                Ok(choice) => println!(
                    "Hint: {} (score {}, depth {})",
                    board.format_move(&choice.mv),
                    choice.score,
                    choice.depth
                ),
                Err(e) => println!("{:?}", miette::Report::new(e)),
            },
            GameSubcommand::Strategy { strategy } => {
                driver.set_strategy(strategy);
                info!("Engine now searches with {strategy}");
            }
            GameSubcommand::Clear => clear_screen()?,
            GameSubcommand::Quit => return Ok(()),
        }
    }
}

/// Plays `board` to the end, each side moving with its own driver.
pub fn play_out<G: Playable>(
    mut board: G,
    drivers: &mut [SearchDriver<G>; NUM_PLAYERS],
    time_ms: u64,
) -> miette::Result<Outcome> {
    loop {
        if let Some(outcome) = board.outcome() {
            return Ok(outcome);
        }
        let mover = board.side_to_move();
        let choice = drivers[mover.index()].choose_move(&board, time_ms)?;
        trace!("{mover} plays {}", board.format_move(&choice.mv));
        board.apply(&choice.mv);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchSummary {
    pub first_wins: usize,
    pub second_wins: usize,
    pub draws: usize,
}

impl MatchSummary {
    pub fn games(&self) -> usize {
        self.first_wins + self.second_wins + self.draws
    }

    fn merge(self, other: Self) -> Self {
        Self {
            first_wins: self.first_wins + other.first_wins,
            second_wins: self.second_wins + other.second_wins,
            draws: self.draws + other.draws,
        }
    }
}

impl Display for MatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "+{} ={} -{} ({} games)",
            self.first_wins,
            self.draws,
            self.second_wins,
            self.games()
        )
    }
}

/// Engine-vs-engine series from `start`. The first strategy plays
/// `Player::One` in even-numbered games and `Player::Two` in odd ones.
pub fn run_match<G: Playable>(
    start: &G,
    settings: EngineSettings,
    first: Strategy,
    second: Strategy,
    games: usize,
) -> miette::Result<MatchSummary> {
    let _span = span!(Level::DEBUG, "match", %first, %second, games).entered();

    let run_single_game = |game: usize| -> miette::Result<MatchSummary> {
        let driver_for = |strategy: Strategy| {
            let mut config = settings.engine;
            config.strategy = strategy;
            // Distinct seeds so seeded games are not all identical
            config.mcts.seed = config.mcts.seed.map(|seed| seed.wrapping_add(game as u64));
            SearchDriver::<G>::new(config)
        };

        let first_side = if game % 2 == 0 { Player::One } else { Player::Two };
        let mut drivers = if first_side == Player::One {
            [driver_for(first), driver_for(second)]
        } else {
            [driver_for(second), driver_for(first)]
        };

        let outcome = play_out(start.clone(), &mut drivers, settings.time_ms)?;
        debug!("Game {game}: {outcome}");
        Ok(match outcome {
            Outcome::Draw => MatchSummary {
                draws: 1,
                ..Default::default()
            },
            Outcome::Win(p) if p == first_side => MatchSummary {
                first_wins: 1,
                ..Default::default()
            },
            Outcome::Win(_) => MatchSummary {
                second_wins: 1,
                ..Default::default()
            },
        })
    };

    #[cfg(feature = "parallel")]
    let results: Vec<MatchSummary> = {
        let pb = ProgressBar::new(games as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
                .into_diagnostic()?
                .progress_chars("#>-"),
        );
        let results = (0..games)
            .into_par_iter()
            .map(|game| {
                let result = run_single_game(game);
                pb.inc(1);
                result
            })
            .collect::<miette::Result<Vec<_>>>()?;
        pb.finish_with_message("Done");
        results
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<MatchSummary> = (0..games)
        .map(run_single_game)
        .collect::<miette::Result<Vec<_>>>()?;

    let summary = results
        .into_iter()
        .fold(MatchSummary::default(), MatchSummary::merge);
    info!("{first} vs {second}: {summary}");
    Ok(summary)
}
