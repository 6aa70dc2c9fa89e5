use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;

use rl_classics::blackjack::{self, TrainingConfig};

// Monte Carlo control with exploring starts for simplified blackjack.
// Usable ace states are written to stdout, the rest to stderr.
#[derive(Debug, Parser)]
#[command(about = "Learn a blackjack policy with Monte Carlo exploring starts")]
struct Args {
    #[arg(long, default_value_t = blackjack::EPISODES)]
    episodes: u64,

    /// Seed for a reproducible run; system entropy otherwise.
    #[arg(long)]
    seed: Option<u64>,

    /// Episodes used afterwards to compare the learned and the stick-at-20 policies.
    #[arg(long, default_value_t = 0)]
    eval_episodes: u64,

    /// Log the learned policy as a table.
    #[arg(long)]
    policy_table: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    rl_classics::log(args.verbose);

    let config = TrainingConfig {
        episodes: args.episodes,
        eval_episodes: args.eval_episodes,
    };
    let mut rng = rl_classics::rng(args.seed);

    let mut usable = BufWriter::new(io::stdout().lock());
    let mut no_usable = BufWriter::new(io::stderr().lock());
    blackjack::run(&config, args.policy_table, &mut rng, &mut usable, &mut no_usable)
        .context("blackjack training failed")?;
    usable.flush().context("failed to flush stdout")?;
    no_usable.flush().context("failed to flush stderr")?;
    Ok(())
}
