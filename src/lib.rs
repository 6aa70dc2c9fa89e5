pub mod blackjack;
pub mod coin_bet;
pub mod solver;

use rand::rngs::StdRng;
use rand::SeedableRng;

// Logs go to stderr; RUST_LOG takes precedence over the verbosity flag.
pub fn log(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

// Seeded runs are reproducible; otherwise the generator is seeded from system entropy.
pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
