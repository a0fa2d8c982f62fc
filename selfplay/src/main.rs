//! Self-play data generator.
//!
//! Plays games on a worker pool, one RNG stream per game, and funnels the
//! finished samples through a single writer thread so chunk files are
//! never interleaved. A writer failure stops sample collection but does
//! not disturb games already in flight.

mod driver;
mod writer;

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use driver::{play_one_game, DriverConfig};
use writer::{ChunkWriter, Sample};

#[derive(Parser, Debug)]
#[command(
    name = "hexxagon-selfplay",
    version,
    about = "Generate Hexxagon training samples via MCTS self-play"
)]
struct Cli {
    /// Number of games to play
    #[arg(short = 'n', long, default_value_t = 2000)]
    games: u32,

    /// MCTS simulations per move
    #[arg(long, default_value_t = 800)]
    sims: u32,

    /// Concurrent games (0 = half the CPUs)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Output directory
    #[arg(short, long, default_value = "selfplay_out")]
    out: PathBuf,

    /// Samples per chunk
    #[arg(long = "chunk", default_value_t = 5000)]
    chunk_size: usize,

    /// Base random seed; each game derives its own stream
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Discard games shorter than this many plies
    #[arg(long, default_value_t = 20)]
    min_plies: usize,

    /// Random opening moves per side
    #[arg(long, default_value_t = 2)]
    opening_moves: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let workers = if cli.workers > 0 {
        cli.workers
    } else {
        (std::thread::available_parallelism().map_or(1, |n| n.get()) / 2).max(1)
    };
    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating output directory {}", cli.out.display()))?;

    info!(
        games = cli.games,
        sims = cli.sims,
        workers,
        out = %cli.out.display(),
        chunk = cli.chunk_size,
        seed = cli.seed,
        "selfplay starting"
    );

    let cfg = DriverConfig {
        sims: cli.sims,
        min_plies: cli.min_plies,
        opening_moves: cli.opening_moves,
        ..DriverConfig::default()
    };

    let (tx, rx) = mpsc::sync_channel::<Vec<Sample>>(workers * 2);
    let mut chunk_writer = ChunkWriter::new(&cli.out, cli.chunk_size);
    let writer_thread = std::thread::spawn(move || {
        for batch in rx {
            for sample in &batch {
                if let Err(e) = chunk_writer.write_sample(sample) {
                    error!(error = %e, "writer failed, dropping remaining samples");
                    return;
                }
            }
        }
        if let Err(e) = chunk_writer.finish() {
            error!(error = %e, "failed to seal the final chunk");
        }
    });

    let progress = ProgressBar::new(u64::from(cli.games));
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} games ({eta})",
        )?
        .progress_chars("=>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("building the game worker pool")?;
    pool.install(|| {
        (0..cli.games).into_par_iter().for_each_with(tx, |tx, game| {
            let mut rng = ChaCha20Rng::seed_from_u64(cli.seed.wrapping_add(u64::from(game)));
            if let Some(samples) = play_one_game(&cfg, &mut rng) {
                if tx.send(samples).is_err() {
                    warn!(game, "writer gone, sample batch dropped");
                }
            }
            progress.inc(1);
        });
    });
    // `for_each_with` consumed and dropped every sender clone; the writer
    // drains the channel and exits.
    if writer_thread.join().is_err() {
        anyhow::bail!("writer thread panicked");
    }
    progress.finish_with_message("done");
    info!("selfplay done");
    Ok(())
}
