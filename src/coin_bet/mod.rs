use std::io::Write;

use plotlib::{
    page::Page,
    repr::Plot,
    style::{PointMarker, PointStyle},
    view::ContinuousView,
};
use thiserror::Error;

use crate::solver::*;

pub const LIMIT: usize = 100;
pub const HEADS_PROB: f64 = 0.4;
pub const THETA: f64 = 0.0005;

#[derive(Debug, Error)]
pub enum Error {
    #[error("heads probability must lie strictly between 0 and 1, got {0}")]
    InvalidHeadsProb(f64),

    #[error("convergence threshold must be positive, got {0}")]
    InvalidTheta(f64),

    #[error("capital limit must be at least 2, got {0}")]
    InvalidLimit(usize),

    #[error("failed to render plot: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GamblerConfig {
    // Capital at which the gambler wins.
    pub limit: usize,
    pub heads_prob: f64,
    // Sweeping stops once the largest change of a sweep is at most this.
    pub theta: f64,
}

impl Default for GamblerConfig {
    fn default() -> Self {
        GamblerConfig {
            limit: LIMIT,
            heads_prob: HEADS_PROB,
            theta: THETA,
        }
    }
}

impl GamblerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.heads_prob > 0.0 && self.heads_prob < 1.0) {
            return Err(Error::InvalidHeadsProb(self.heads_prob));
        }
        if !(self.theta > 0.0) {
            return Err(Error::InvalidTheta(self.theta));
        }
        if self.limit < 2 {
            return Err(Error::InvalidLimit(self.limit));
        }
        Ok(())
    }
}

// States are the amounts of money 0..=limit; 0 and limit are final.
#[derive(Clone, Debug)]
pub struct CoinEnv {
    limit: usize,
    heads_prob: f64,
}

impl CoinEnv {
    pub fn new(config: &GamblerConfig) -> Result<CoinEnv, Error> {
        config.validate()?;
        Ok(CoinEnv {
            limit: config.limit,
            heads_prob: config.heads_prob,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    // A bet can neither exceed the money held nor take it past the limit.
    pub fn max_bet(&self, money: usize) -> usize {
        money.min(self.limit - money)
    }

    // Zero everywhere except the winning state.
    pub fn initial_state_values(&self) -> Vec<f64> {
        let mut state_values = vec![0.0; self.limit + 1];
        state_values[self.limit] = 1.0;
        state_values
    }
}

impl FiniteMdp for CoinEnv {
    fn state_count(&self) -> usize {
        self.limit + 1
    }

    fn actions(&self, money: usize) -> Vec<usize> {
        (1..=self.max_bet(money)).collect()
    }

    fn action_value(&self, state_values: &[f64], money: usize, bet: usize) -> f64 {
        self.heads_prob * state_values[money + bet]
            + (1.0 - self.heads_prob) * state_values[money - bet]
    }
}

#[derive(Clone, Debug)]
pub struct Solution {
    pub state_values: Vec<f64>,
    pub sweeps: usize,
}

// Runs value iteration to convergence, writing one "Error: <delta>" line per sweep to `diag`.
pub fn solve<W: Write + ?Sized>(env: &CoinEnv, theta: f64, diag: &mut W) -> Result<Solution, Error> {
    let mut state_values = env.initial_state_values();
    let mut io_result = Ok(());
    let sweeps = value_iteration(env, &mut state_values, theta, |sweep, max_delta| {
        log::debug!("sweep {}: max delta {}", sweep, max_delta);
        if io_result.is_ok() {
            io_result = writeln!(diag, "Error: {}", max_delta);
        }
    });
    io_result?;

    Ok(Solution {
        state_values,
        sweeps,
    })
}

// Bets whose value lies within 2θ of the converged state value.
pub fn best_bets(env: &CoinEnv, state_values: &[f64], money: usize, theta: f64) -> Vec<usize> {
    greedy_actions(env, state_values, money, 2.0 * theta)
}

pub fn write_policy<W: Write + ?Sized>(
    env: &CoinEnv,
    solution: &Solution,
    theta: f64,
    out: &mut W,
) -> Result<(), Error> {
    for money in 0..=env.limit() {
        write!(out, "{},{},Best actions:", money, solution.state_values[money])?;
        for bet in best_bets(env, &solution.state_values, money, theta) {
            write!(out, " {}", bet)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn render_plot(values: Vec<(f64, f64)>, x_max: f64, y_label: &str) -> Result<String, Error> {
    let s1 = Plot::new(values).point_style(PointStyle::new().marker(PointMarker::Circle));
    let v = ContinuousView::new()
        .add(s1)
        .x_range(0.0, x_max)
        .x_label("State")
        .y_label(y_label);
    Page::single(&v)
        .dimensions(100, 50)
        .to_text()
        .map_err(|e| Error::Plot(format!("{:?}", e)))
}

pub fn plot_state_values(env: &CoinEnv, state_values: &[f64]) -> Result<String, Error> {
    let values = (1..env.limit())
        .map(|i| (i as f64, state_values[i]))
        .collect();
    render_plot(values, env.limit() as f64, "Value")
}

// Plots the largest optimal bet of every non-final state.
pub fn plot_policy(env: &CoinEnv, state_values: &[f64], theta: f64) -> Result<String, Error> {
    let values = (1..env.limit())
        .map(|i| {
            let max_bet = best_bets(env, state_values, i, theta)
                .into_iter()
                .max()
                .unwrap_or(0);
            (i as f64, max_bet as f64)
        })
        .collect();
    render_plot(values, env.limit() as f64, "Action")
}

pub fn run<O, D>(config: &GamblerConfig, plot: bool, out: &mut O, diag: &mut D) -> Result<(), Error>
where
    O: Write + ?Sized,
    D: Write + ?Sized,
{
    let env = CoinEnv::new(config)?;
    log::info!(
        "gambler: limit {}, heads probability {}, theta {}",
        config.limit,
        config.heads_prob,
        config.theta
    );

    let solution = solve(&env, config.theta, diag)?;
    log::info!("value iteration converged after {} sweeps", solution.sweeps);
    write_policy(&env, &solution, config.theta, out)?;

    if plot {
        log::info!("state values\n{}", plot_state_values(&env, &solution.state_values)?);
        log::info!(
            "largest optimal bets\n{}",
            plot_policy(&env, &solution.state_values, config.theta)?
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn solved() -> (CoinEnv, Solution) {
        let config = GamblerConfig::default();
        let env = CoinEnv::new(&config).unwrap();
        let solution = solve(&env, config.theta, &mut std::io::sink()).unwrap();
        (env, solution)
    }

    #[rstest]
    #[case(0.0, THETA, LIMIT)]
    #[case(1.0, THETA, LIMIT)]
    #[case(-0.5, THETA, LIMIT)]
    #[case(f64::NAN, THETA, LIMIT)]
    #[case(HEADS_PROB, 0.0, LIMIT)]
    #[case(HEADS_PROB, -1.0, LIMIT)]
    #[case(HEADS_PROB, THETA, 1)]
    fn invalid_configs_are_rejected(#[case] heads_prob: f64, #[case] theta: f64, #[case] limit: usize) {
        let config = GamblerConfig {
            limit,
            heads_prob,
            theta,
        };
        assert!(CoinEnv::new(&config).is_err());
    }

    #[test]
    fn final_states_are_fixed() {
        let (env, solution) = solved();
        assert_eq!(solution.state_values[0], 0.0);
        assert_eq!(solution.state_values[env.limit()], 1.0);
        assert!(env.actions(0).is_empty());
        assert!(env.actions(env.limit()).is_empty());
    }

    #[test]
    fn sweeps_never_lower_values() {
        let env = CoinEnv::new(&GamblerConfig::default()).unwrap();
        let mut values = env.initial_state_values();
        let mut sweeps = 0;
        loop {
            let prev = values.clone();
            let max_delta = iterate_state_value(&env, &mut values);
            sweeps += 1;

            for s in 0..=LIMIT {
                assert!(values[s] >= prev[s], "sweep {} lowered v[{}]", sweeps, s);
            }
            assert_eq!(values[0], 0.0);
            assert_eq!(values[LIMIT], 1.0);

            if max_delta <= THETA {
                break;
            }
            assert!(sweeps < 1000);
        }
    }

    #[test]
    fn values_are_probabilities() {
        let (_, solution) = solved();
        for v in &solution.state_values {
            assert!((0.0..=1.0).contains(v), "{}", v);
        }
    }

    #[test]
    fn converges_in_bounded_sweeps() {
        let (_, solution) = solved();
        assert!(solution.sweeps > 1);
        assert!(solution.sweeps < 1000);
    }

    #[test]
    fn reference_values() {
        let (_, solution) = solved();
        // Betting everything at 50 wins with the heads probability.
        assert_float_eq!(solution.state_values[50], HEADS_PROB, abs <= 2.0 * THETA);
        assert!(solution.state_values[99] > 0.9);
        assert!(solution.state_values[99] < 1.0);
    }

    #[test]
    fn best_bets_are_legal_and_optimal() {
        let (env, solution) = solved();
        let values = &solution.state_values;
        for money in 1..env.limit() {
            let bets = best_bets(&env, values, money, THETA);
            assert!(!bets.is_empty(), "no best bet for {}", money);
            for bet in &bets {
                assert!(*bet >= 1 && *bet <= money.min(env.limit() - money));
            }

            let max_value = env
                .actions(money)
                .into_iter()
                .map(|bet| env.action_value(values, money, bet))
                .fold(f64::NEG_INFINITY, f64::max);
            assert_float_eq!(values[money], max_value, abs <= THETA);
        }
    }

    #[test]
    fn state_one_bets_one() {
        let (env, solution) = solved();
        assert_eq!(best_bets(&env, &solution.state_values, 1, THETA), vec![1]);
        assert_eq!(
            best_bets(&env, &solution.state_values, 50, THETA).last(),
            Some(&50)
        );
    }

    #[test]
    fn output_format() {
        let config = GamblerConfig::default();
        let mut out = Vec::new();
        let mut diag = Vec::new();
        run(&config, false, &mut out, &mut diag).unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), LIMIT + 1);
        assert_eq!(lines[0], "0,0,Best actions:");
        assert_eq!(lines[LIMIT], "100,1,Best actions:");
        assert!(lines[1].starts_with("1,"));
        assert!(lines[1].ends_with(",Best actions: 1"));

        let diag = String::from_utf8(diag).unwrap();
        assert!(diag.lines().count() > 1);
        assert!(diag.lines().all(|l| l.starts_with("Error: ")));
    }
}
