use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use threes_ai::config;
use threes_ai::engine::{self as GameEngine, tile_value};
use threes_ai::expectimax::{Expectimax, ExpectimaxConfig};
use threes_ai::game::{Game, GameSummary};

#[derive(Parser, Debug)]
#[command(name = "threes-ai", about = "Play simulated Threes! games with expectimax")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: u32,

    /// Seed for the first game; game i uses seed + i
    #[arg(long)]
    seed: Option<u64>,

    /// JSON search config (see `ExpectimaxConfig`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the cumulative-probability cutoff
    #[arg(long)]
    prob_cutoff: Option<f32>,

    /// Override the depth cap
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Per game: stop after this many moves
    #[arg(long)]
    max_moves: Option<u32>,

    /// Print the final board of every game
    #[arg(long)]
    boards: bool,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);
    GameEngine::new();

    let cfg = search_config(&args)?;
    info!(?cfg, "search config");
    let mut expectimax = Expectimax::with_config(cfg);

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.games as u64);
        pb.set_style(ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} | {msg}")?);
        pb
    };

    let start = Instant::now();
    let mut results: Vec<GameSummary> = Vec::with_capacity(args.games as usize);
    for game_idx in 0..args.games {
        let rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(game_idx as u64)),
            None => StdRng::from_entropy(),
        };
        let summary = Game::new(rng).play(|board, deck, tile| expectimax.best_move(board, deck, tile), args.max_moves);
        info!(
            game = game_idx,
            score = summary.score,
            max_tile = tile_value(summary.max_rank),
            moves = summary.moves,
            "game over"
        );
        if args.boards {
            pb.suspend(|| println!("{}", summary.board));
        }
        pb.set_message(format!("last score: {:.0}", summary.score));
        pb.inc(1);
        results.push(summary);
    }
    pb.finish_and_clear();

    print_report(&results, start.elapsed().as_secs_f64());
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

fn search_config(args: &Args) -> anyhow::Result<ExpectimaxConfig> {
    let mut cfg = match &args.config {
        Some(path) => config::load(path)?,
        None => ExpectimaxConfig::default(),
    };
    if let Some(cutoff) = args.prob_cutoff {
        cfg.prob_cutoff = cutoff;
    }
    if let Some(cap) = args.depth_cap {
        cfg.depth_cap = Some(cap);
    }
    Ok(cfg)
}

fn print_report(results: &[GameSummary], elapsed: f64) {
    if results.is_empty() {
        return;
    }
    let games = results.len() as f64;
    let mean = results.iter().map(|r| r.score).sum::<f64>() / games;
    let best = results.iter().map(|r| r.score).fold(0.0, f64::max);
    let top_rank = results.iter().map(|r| r.max_rank).max().unwrap_or(0);
    let moves: u64 = results.iter().map(|r| r.moves as u64).sum();
    println!(
        "Games: {} | mean score: {:.0} | best score: {:.0} | highest tile: {} | moves/sec: {:.1}",
        results.len(),
        mean,
        best,
        tile_value(top_rank),
        moves as f64 / elapsed.max(1e-6)
    );
}
