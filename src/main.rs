//! hexmcts: a Monte Carlo Tree Search engine for Havannah and Y.
//!
//! ## Usage
//!
//! - `hexmcts` - Show a demo
//! - `hexmcts gtp --game havannah --size 8` - Start a GTP server for GUI integration
//! - `hexmcts demo` - Search a few positions and print what was found
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use hexmcts::constants::{MAX_MEMORY, NUM_THREADS};
use hexmcts::engine::Engine;
use hexmcts::geometry::{Hexagon, Shape, Triangle};
use hexmcts::gtp::GtpEngine;

/// hexmcts: MCTS engine for Havannah and Y
#[derive(Parser)]
#[command(name = "hexmcts")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Game {
    Havannah,
    Y,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the GTP server for use with GUI applications
    Gtp {
        #[arg(long, value_enum, default_value = "havannah")]
        game: Game,
        /// Board size, the game's default if omitted
        #[arg(long)]
        size: Option<usize>,
        #[arg(long, default_value_t = NUM_THREADS)]
        threads: usize,
        /// Tree memory limit in MB
        #[arg(long, default_value_t = MAX_MEMORY / (1024 * 1024))]
        memory: usize,
    },
    /// Run a simple demo of the engine
    Demo,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Gtp {
            game,
            size,
            threads,
            memory,
        }) => match game {
            Game::Havannah => run_gtp::<Hexagon>(size, threads, memory),
            Game::Y => run_gtp::<Triangle>(size, threads, memory),
        },
        Some(Commands::Demo) | None => run_demo(),
    }
}

fn run_gtp<S: Shape>(size: Option<usize>, threads: usize, memory: usize) -> anyhow::Result<()> {
    let size = size.unwrap_or(S::DEFAULT_SIZE);
    let mut engine = Engine::<S>::new(size).with_context(|| format!("starting {} size {size}", S::NAME))?;
    engine.set_threads(threads);
    engine.set_memory_limit(memory * 1024 * 1024);
    log::info!("{} size {size}, {threads} threads, {memory} MB", S::NAME);
    GtpEngine::from_engine(engine).run()
}

fn run_demo() -> anyhow::Result<()> {
    println!("hexmcts: MCTS for Havannah and Y\n");

    println!("=== Y, size 4 ===");
    let mut y = Engine::<Triangle>::new(4)?;
    let result = y.search(Duration::from_secs(30), 200_000, 1)?;
    println!("Best move: {}", result.best);
    println!("Outcome: {} in {} moves", result.outcome, result.proof_depth);
    let pv: Vec<String> = y.principal_variation(&[]).iter().map(|m| m.to_string()).collect();
    println!("PV: {}\n", pv.join(" "));

    println!("=== Havannah, size 4 ===");
    let mut hex = Engine::<Hexagon>::new(4)?;
    for _ in 0..6 {
        let result = hex.search(Duration::from_secs(2), 5_000, 0)?;
        hex.commit_move(result.best)?;
        println!("Played {} ({} runs)", result.best, result.runs);
    }
    println!("{}", hex.board());
    Ok(())
}
