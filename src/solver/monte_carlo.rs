use rand::Rng;

// Running mean of observed returns; no history is kept.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ValueEstimate {
    avg: f64,
    count: u64,
}

impl ValueEstimate {
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.avg += (value - self.avg) / self.count as f64;
    }

    pub fn average(&self) -> f64 {
        self.avg
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

// An episodic environment that ends with a single scalar result.
pub trait Episode {
    type State: Copy;
    type Action: Copy;

    fn state(&self) -> Self::State;

    fn step<R: Rng + ?Sized>(&mut self, action: Self::Action, rng: &mut R);

    fn is_done(&self) -> bool;

    // Terminal result; only meaningful once `is_done()` is true.
    fn result(&self) -> f64;
}

// Plays `env` to the end with the given policy.
// Returns the visited (state, action) pairs in order and the terminal result.
pub fn generate_episode<E, R, P>(
    mut env: E,
    rng: &mut R,
    mut policy: P,
) -> (Vec<(E::State, E::Action)>, f64)
where
    E: Episode,
    R: Rng + ?Sized,
    P: FnMut(&E::State, &mut R) -> E::Action,
{
    let mut trajectory = Vec::new();
    while !env.is_done() {
        let state = env.state();
        let action = policy(&state, rng);
        env.step(action, rng);
        trajectory.push((state, action));
    }
    (trajectory, env.result())
}

// Average result of `episodes` playthroughs produced by `new_env` under `policy`.
pub fn evaluate_policy<E, R, N, P>(episodes: u64, rng: &mut R, mut new_env: N, mut policy: P) -> f64
where
    E: Episode,
    R: Rng + ?Sized,
    N: FnMut(&mut R) -> E,
    P: FnMut(&E::State, &mut R) -> E::Action,
{
    let mut returns = ValueEstimate::default();
    for _ in 0..episodes {
        let env = new_env(rng);
        let (_, result) = generate_episode(env, rng, &mut policy);
        returns.update(result);
    }
    returns.average()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    #[rstest]
    #[case(&[3.5], 3.5)]
    #[case(&[1.0, -1.0], 0.0)]
    #[case(&[1.0, 1.0, 0.0, -1.0, 1.0], 0.4)]
    #[case(&[0.1, 0.2, 0.3, 0.4], 0.25)]
    fn value_estimate_is_arithmetic_mean(#[case] values: &[f64], #[case] expected: f64) {
        let mut estimate = ValueEstimate::default();
        for v in values {
            estimate.update(*v);
        }
        assert_float_eq!(estimate.average(), expected, abs <= 1e-12);
        assert_eq!(estimate.count(), values.len() as u64);
    }

    #[test]
    fn single_value_is_exact() {
        let mut estimate = ValueEstimate::default();
        estimate.update(-0.123456789);
        assert_eq!(estimate.average(), -0.123456789);
    }

    // Counts down to zero; the result is the number of steps taken.
    struct Countdown {
        left: u32,
        steps: u32,
    }

    impl Episode for Countdown {
        type State = u32;
        type Action = u32;

        fn state(&self) -> u32 {
            self.left
        }

        fn step<R: Rng + ?Sized>(&mut self, action: u32, _rng: &mut R) {
            self.left = self.left.saturating_sub(action);
            self.steps += 1;
        }

        fn is_done(&self) -> bool {
            self.left == 0
        }

        fn result(&self) -> f64 {
            self.steps as f64
        }
    }

    #[test]
    fn generate_episode_records_trajectory() {
        let mut rng = StdRng::seed_from_u64(7);
        let env = Countdown { left: 5, steps: 0 };
        let (trajectory, result) = generate_episode(env, &mut rng, |_, _| 2);
        assert_eq!(trajectory, vec![(5, 2), (3, 2), (1, 2)]);
        assert_float_eq!(result, 3.0, abs <= 1e-12);
    }

    #[test]
    fn evaluate_policy_averages_results() {
        let mut rng = StdRng::seed_from_u64(7);
        let avg = evaluate_policy(
            10,
            &mut rng,
            |_: &mut StdRng| Countdown { left: 4, steps: 0 },
            |_: &u32, _: &mut StdRng| 1,
        );
        assert_float_eq!(avg, 4.0, abs <= 1e-12);
    }
}
