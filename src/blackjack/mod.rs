use std::io::Write;

use prettytable::{Cell, Row, Table};
use rand::prelude::*;
use thiserror::Error;

use crate::solver::monte_carlo::{self, Episode, ValueEstimate};

mod agent;

pub use agent::{random_action, ActionValues, EpisodeContext, McAgent};

const BLACKJACK: u32 = 21;
const ACE_VALUE: u32 = 11;
const DEALER_STICK: u32 = 17;

// Below this total the player cannot bust, so the agent always hits.
pub const DECISION_THRESHOLD: u32 = 12;
pub const EPISODES: u64 = 500_000;
const PROGRESS_INTERVAL: u64 = 100_000;

#[derive(Debug, Error)]
pub enum Error {
    #[error("episode budget must be positive")]
    NoEpisodes,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Action {
    Stick,
    Hit,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct State {
    pub player_sum: u32,
    pub usable_ace: bool,
    // Dealer's open card, ace counted as 11.
    pub dealer_sum: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Hand {
    // Value counts usable aces as 11.
    value: u32,
    usable_aces: u32,
}

impl Hand {
    pub fn from_cards(cards: &[u32]) -> Hand {
        let mut hand = Hand::default();
        for c in cards {
            hand.add_card(*c);
        }
        hand
    }

    // Ace is passed as 1.
    pub fn add_card(&mut self, card: u32) {
        if card == 1 {
            self.value += ACE_VALUE;
            self.usable_aces += 1;
        } else {
            self.value += card;
        }

        while self.value > BLACKJACK && self.usable_aces > 0 {
            self.value -= ACE_VALUE - 1;
            self.usable_aces -= 1;
        }
    }

    fn add_random_card<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.add_card(random_card(rng))
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn usable_aces(&self) -> u32 {
        self.usable_aces
    }

    pub fn is_bust(&self) -> bool {
        self.value > BLACKJACK
    }
}

// Draw with replacement: 1 is an ace, face cards count 10.
pub fn random_card<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    (rng.gen_range(0..52) % 13 + 1).min(10)
}

// One hand of blackjack. The player acts until sticking, reaching 21 or going bust.
#[derive(Clone, Debug)]
pub struct Environment {
    player: Hand,
    dealer: Hand,
    result: f64,
    done: bool,
}

impl Environment {
    // Deals two cards to the player and the open card to the dealer.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Environment {
        let mut env = Environment {
            player: Hand::default(),
            dealer: Hand::default(),
            result: 0.0,
            done: false,
        };
        env.player.add_random_card(rng);
        env.player.add_random_card(rng);
        env.dealer.add_random_card(rng);
        env.resolve_player(rng);
        env
    }

    pub fn player(&self) -> &Hand {
        &self.player
    }

    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    fn resolve_player<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.player.value == BLACKJACK {
            self.rollout_dealer(rng);
        } else if self.player.is_bust() {
            self.result = -1.0;
            self.done = true;
        }
    }

    // Dealer takes cards until they reach 17, then the totals are compared.
    fn rollout_dealer<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        while self.dealer.value < DEALER_STICK {
            self.dealer.add_random_card(rng);
        }

        self.result = if self.dealer.is_bust() || self.player.value > self.dealer.value {
            1.0
        } else if self.dealer.value > self.player.value {
            -1.0
        } else {
            0.0
        };
        self.done = true;
    }
}

impl Episode for Environment {
    type State = State;
    type Action = Action;

    fn state(&self) -> State {
        State {
            player_sum: self.player.value,
            usable_ace: self.player.usable_aces > 0,
            dealer_sum: self.dealer.value,
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, action: Action, rng: &mut R) {
        debug_assert!(!self.done, "step on a finished hand");
        if self.done {
            return;
        }

        match action {
            Action::Hit => {
                self.player.add_random_card(rng);
                self.resolve_player(rng);
            }
            Action::Stick => self.rollout_dealer(rng),
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn result(&self) -> f64 {
        self.result
    }
}

// A policy that only sticks on 20 or higher.
pub fn stick_at_20_policy(state: &State) -> Action {
    if state.player_sum < 20 {
        Action::Hit
    } else {
        Action::Stick
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingConfig {
    pub episodes: u64,
    // Episodes played afterwards to compare the learned policy with the naive one; 0 skips.
    pub eval_episodes: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            episodes: EPISODES,
            eval_episodes: 0,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.episodes == 0 {
            return Err(Error::NoEpisodes);
        }
        Ok(())
    }
}

// Monte Carlo control with exploring starts.
pub fn train<R: Rng + ?Sized>(config: &TrainingConfig, rng: &mut R) -> Result<McAgent, Error> {
    config.validate()?;
    log::info!("training for {} episodes", config.episodes);

    let mut agent = McAgent::default();
    let mut returns = ValueEstimate::default();
    for episode in 1..=config.episodes {
        let mut context = EpisodeContext::exploring();
        let env = Environment::new(rng);
        let (trajectory, result) = monte_carlo::generate_episode(env, rng, |state, rng| {
            agent.next_action(state, &mut context, rng)
        });
        agent.backup(&trajectory, result);

        returns.update(result);
        if episode % PROGRESS_INTERVAL == 0 {
            log::info!(
                "episode {}: average return {:.4}, {} states",
                episode,
                returns.average(),
                agent.action_values().len()
            );
        }
    }
    Ok(agent)
}

// Average returns of the learned greedy policy and of the stick-at-20 policy.
pub fn evaluate<R: Rng + ?Sized>(agent: &McAgent, episodes: u64, rng: &mut R) -> (f64, f64) {
    let learned = monte_carlo::evaluate_policy(
        episodes,
        rng,
        |rng: &mut R| Environment::new(rng),
        |state: &State, rng: &mut R| agent.next_action(state, &mut EpisodeContext::greedy(), rng),
    );
    let naive = monte_carlo::evaluate_policy(
        episodes,
        rng,
        |rng: &mut R| Environment::new(rng),
        |state: &State, _: &mut R| stick_at_20_policy(state),
    );
    (learned, naive)
}

// Writes "player,dealer,value" for every decision state; usable ace states go to `usable`.
pub fn write_report<U, N>(agent: &McAgent, usable: &mut U, no_usable: &mut N) -> Result<(), Error>
where
    U: Write + ?Sized,
    N: Write + ?Sized,
{
    writeln!(usable, "X,Y,Z")?;
    writeln!(no_usable, "X,Y,Z")?;
    for (state, action_values) in agent.action_values() {
        if state.player_sum < DECISION_THRESHOLD {
            continue;
        }

        let line = format!(
            "{},{},{}",
            state.player_sum,
            state.dealer_sum,
            action_values.best_value()
        );
        if state.usable_ace {
            writeln!(usable, "{}", line)?;
        } else {
            writeln!(no_usable, "{}", line)?;
        }
    }
    Ok(())
}

pub fn policy_table(agent: &McAgent) -> Table {
    let dealer_sums: Vec<u32> = (2..=ACE_VALUE).collect();

    let mut table = Table::new();

    let mut header = vec![Cell::new(""), Cell::new("Ace?")];
    for dealer_sum in dealer_sums.iter() {
        header.push(if *dealer_sum == ACE_VALUE {
            Cell::new("A")
        } else {
            Cell::new(&format!("{}", dealer_sum))
        });
    }
    table.add_row(Row::new(header));

    for usable_ace in &[false, true] {
        for player_sum in DECISION_THRESHOLD..=BLACKJACK {
            let mut cells = Vec::new();
            cells.push(Cell::new(&format!("{}", player_sum)));
            cells.push(Cell::new(if *usable_ace { "Y" } else { "N" }));
            for dealer_sum in dealer_sums.iter() {
                let state = State {
                    player_sum,
                    usable_ace: *usable_ace,
                    dealer_sum: *dealer_sum,
                };
                cells.push(match agent.greedy_action(&state) {
                    Some(Action::Hit) => Cell::new("H"),
                    Some(Action::Stick) => Cell::new("S"),
                    None => Cell::new(""),
                });
            }
            table.add_row(Row::new(cells));
        }
    }
    table
}

pub fn run<R, U, N>(
    config: &TrainingConfig,
    show_policy: bool,
    rng: &mut R,
    usable: &mut U,
    no_usable: &mut N,
) -> Result<McAgent, Error>
where
    R: Rng + ?Sized,
    U: Write + ?Sized,
    N: Write + ?Sized,
{
    let agent = train(config, rng)?;
    write_report(&agent, usable, no_usable)?;

    if show_policy {
        log::info!("learned policy\n{}", policy_table(&agent));
    }

    if config.eval_episodes > 0 {
        let (learned, naive) = evaluate(&agent, config.eval_episodes, rng);
        log::info!("average naive returns: {:.4}", naive);
        log::info!("average learned returns: {:.4}", learned);
    }
    Ok(agent)
}
