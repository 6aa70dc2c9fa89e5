use std::collections::BTreeMap;

use rand::Rng;

use super::{Action, State, DECISION_THRESHOLD};
use crate::solver::monte_carlo::ValueEstimate;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActionValues {
    pub stick: ValueEstimate,
    pub hit: ValueEstimate,
}

impl ActionValues {
    fn get_mut(&mut self, action: Action) -> &mut ValueEstimate {
        match action {
            Action::Stick => &mut self.stick,
            Action::Hit => &mut self.hit,
        }
    }

    // Hit only when it is strictly better, so ties go to Stick.
    pub fn greedy_action(&self) -> Action {
        if self.hit.average() > self.stick.average() {
            Action::Hit
        } else {
            Action::Stick
        }
    }

    // Value of the state under the greedy policy.
    pub fn best_value(&self) -> f64 {
        self.hit.average().max(self.stick.average())
    }
}

// Per-episode state of the agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeContext {
    // Set until the first decision at or above the threshold has been taken at random.
    exploring_start: bool,
}

impl EpisodeContext {
    pub fn exploring() -> Self {
        EpisodeContext {
            exploring_start: true,
        }
    }

    pub fn greedy() -> Self {
        EpisodeContext {
            exploring_start: false,
        }
    }

    pub fn is_exploring(&self) -> bool {
        self.exploring_start
    }
}

pub fn random_action<R: Rng + ?Sized>(rng: &mut R) -> Action {
    if rng.gen_range(0..2) == 0 {
        Action::Stick
    } else {
        Action::Hit
    }
}

// Every-visit Monte Carlo control agent with exploring starts.
// Action values persist across episodes; nothing else does.
#[derive(Clone, Debug, Default)]
pub struct McAgent {
    action_values: BTreeMap<State, ActionValues>,
}

impl McAgent {
    pub fn next_action<R: Rng + ?Sized>(
        &self,
        state: &State,
        context: &mut EpisodeContext,
        rng: &mut R,
    ) -> Action {
        if state.player_sum < DECISION_THRESHOLD {
            return Action::Hit;
        }

        if context.exploring_start {
            context.exploring_start = false;
            return random_action(rng);
        }

        match self.action_values.get(state) {
            Some(action_values) => action_values.greedy_action(),
            // Never visited -- choose action at random.
            None => random_action(rng),
        }
    }

    pub fn greedy_action(&self, state: &State) -> Option<Action> {
        self.action_values
            .get(state)
            .map(|action_values| action_values.greedy_action())
    }

    // Every visited pair absorbs the undiscounted terminal result.
    pub fn backup(&mut self, trajectory: &[(State, Action)], result: f64) {
        for (state, action) in trajectory {
            self.action_values
                .entry(*state)
                .or_default()
                .get_mut(*action)
                .update(result);
        }
    }

    pub fn action_values(&self) -> &BTreeMap<State, ActionValues> {
        &self.action_values
    }
}
