pub mod monte_carlo;

// A finite MDP with states indexed by 0..state_count().
pub trait FiniteMdp {
    fn state_count(&self) -> usize;

    // Possible actions in this state.
    // Empty if this is a final state.
    fn actions(&self, state: usize) -> Vec<usize>;

    // Returns the action value given the current state value function.
    fn action_value(&self, state_values: &[f64], state: usize, action: usize) -> f64;
}

// Performs a single state value function iteration in place.
// States are updated in index order, so state s already sees the new values of
// all states below it within the same sweep.
// Returns the maximum change in state-values.
pub fn iterate_state_value<M: FiniteMdp + ?Sized>(mdp: &M, state_values: &mut [f64]) -> f64 {
    let mut max_delta: f64 = 0.0;

    for state in 0..mdp.state_count() {
        let prev_state_value = state_values[state];

        // Relaxation against the prior value: a sweep never lowers a value.
        let best_action_value = mdp
            .actions(state)
            .into_iter()
            .map(|action| mdp.action_value(state_values, state, action))
            .fold(prev_state_value, f64::max);
        state_values[state] = best_action_value;

        max_delta = max_delta.max((best_action_value - prev_state_value).abs());
    }

    max_delta
}

// Sweeps until the maximum change of a sweep drops to `theta` or below.
// `on_sweep` is called after every sweep with its 1-based index and maximum change.
// Returns the number of sweeps performed.
pub fn value_iteration<M, F>(mdp: &M, state_values: &mut [f64], theta: f64, mut on_sweep: F) -> usize
where
    M: FiniteMdp + ?Sized,
    F: FnMut(usize, f64),
{
    assert!(theta > 0.0, "convergence threshold must be positive");
    assert_eq!(state_values.len(), mdp.state_count());

    let mut sweeps = 0;
    loop {
        let max_delta = iterate_state_value(mdp, state_values);
        sweeps += 1;
        on_sweep(sweeps, max_delta);
        if max_delta <= theta {
            return sweeps;
        }
    }
}

// Returns all actions whose value is within `tolerance` of the state value.
// Don't require exact equality to forgive rounding and convergence errors.
pub fn greedy_actions<M: FiniteMdp + ?Sized>(
    mdp: &M,
    state_values: &[f64],
    state: usize,
    tolerance: f64,
) -> Vec<usize> {
    mdp.actions(state)
        .into_iter()
        .filter(|action| {
            (state_values[state] - mdp.action_value(state_values, state, *action)).abs() < tolerance
        })
        .collect()
}
