use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;

use rl_classics::coin_bet::{self, GamblerConfig};

// Gambler's problem solved by value iteration.
// Prints "state,value,Best actions: ..." per state; per-sweep errors go to stderr.
#[derive(Debug, Parser)]
#[command(about = "Solve the gambler's problem by value iteration")]
struct Args {
    /// Capital at which the gambler wins.
    #[arg(long, default_value_t = coin_bet::LIMIT)]
    limit: usize,

    /// Probability of the coin coming up heads.
    #[arg(long, default_value_t = coin_bet::HEADS_PROB)]
    heads_prob: f64,

    /// Convergence threshold on the largest change of a sweep.
    #[arg(long, default_value_t = coin_bet::THETA)]
    theta: f64,

    /// Log text plots of the values and the largest optimal bets.
    #[arg(long)]
    plot: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    rl_classics::log(args.verbose);

    let config = GamblerConfig {
        limit: args.limit,
        heads_prob: args.heads_prob,
        theta: args.theta,
    };

    let mut out = BufWriter::new(io::stdout().lock());
    let mut diag = io::stderr().lock();
    coin_bet::run(&config, args.plot, &mut out, &mut diag).context("gambler's problem failed")?;
    out.flush().context("failed to flush output")?;
    Ok(())
}
