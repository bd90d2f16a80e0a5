use arbor::prelude::*;
use arbor::utils::cli::{self, Commands, GameKind};
use arbor::utils::config::EngineSettings;
use arbor::utils::perft;
use arbor::utils::play::{self, Playable};
use clap::Parser;

fn main() -> miette::Result<()> {
    init();

    let span = span!(Level::DEBUG, "main", version = env!("APP_VERSION"));
    let _guard = span.enter();

    let cli = cli::Cli::parse();
    if cli.verbose {
        set_log_level(Level::DEBUG)?;
    }
    if cli.log_file {
        toggle_file_logging(true)?;
    }

    match cli.command {
        Some(Commands::Config { write }) => {
            EngineSettings::default().save_to_file(&write)?;
            println!("Wrote default settings to {}", write.display());
        }
        Some(cmd) => {
            let Some(board) = cmd.board().cloned() else {
                return Ok(());
            };
            match board.game {
                GameKind::TicTacToe | GameKind::ConnectFour => {
                    run(board.streak_game()?, cmd)?
                }
                GameKind::Dots => run(board.dots_game()?, cmd)?,
            }
        }
        None => {
            println!("Starting default game");
            play::game_loop(
                StreakGame::tic_tac_toe(),
                EngineSettings::default(),
                cli::HumanSide::One,
            )?;
        }
    }
    Ok(())
}

fn run<G: Playable>(mut board: G, cmd: Commands) -> miette::Result<()> {
    match cmd {
        Commands::Play {
            settings,
            strategy,
            human,
            ..
        } => {
            let mut settings = settings.resolve()?;
            if let Some(strategy) = strategy {
                settings.engine.strategy = strategy;
            }
            trace!(
                "Starting game with strategy: {}, time: {} ms",
                settings.engine.strategy, settings.time_ms
            );
            play::game_loop(board, settings, human)
        }
        Commands::Match {
            settings,
            games,
            first,
            second,
            ..
        } => {
            let settings = settings.resolve()?;
            let summary = play::run_match(&board, settings, first, second, games)?;
            println!("{first} vs {second}: {summary}");
            Ok(())
        }
        Commands::Perft { depth, divide, .. } => {
            trace!("Running perft with depth: {:?}, divide: {:?}", depth, divide);
            println!("{board}");
            if divide {
                perft::perft_divide(&mut board, depth);
            } else {
                perft::run_perft_suite(&mut board, depth);
            }
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}
