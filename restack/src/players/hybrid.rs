use std::rc::Rc;

use log::debug;
use rand::{
    Rng,
    SeedableRng,
};
use wyhash::WyRng;

use crate::{
    error::Result,
    poker::{
        card::Card,
        oracle::win_probability_rollout,
    },
    resolver::Resolver,
    state::{
        action::{
            agent_action_index,
            nearest_raise,
            Action,
        },
        manager::{
            GameState,
            Stage,
            StateManager,
        },
    },
    subtree::{
        bayesian_range_update,
        uniform_range,
        ActionMatrix,
    },
    Assets,
};

use super::{
    resolve::end_stage_for,
    Player,
};

const END_DEPTH: u32 = 5;

/// Board rollouts behind each equity estimate taken after the flop.
const EQUITY_ROLLOUTS: u32 = 400;

/// Coin-flips between re-solving and a cheat-sheet/rollout policy. With
/// `resolve_probability` 0 this is a pure equity player.
pub struct HybridPlayer {
    name: String,
    seat: usize,
    hand: Vec<Card>,
    r1: Vec<f64>,
    r2: Vec<f64>,
    opponent_strategy: ActionMatrix,
    resolve_probability: f64,
    assets: Rc<Assets>,
    states: StateManager,
    rng: WyRng,
}

impl HybridPlayer {
    pub fn new(
        name: &str,
        seat: usize,
        assets: Rc<Assets>,
        resolve_probability: f64,
        seed: u64,
    ) -> HybridPlayer {
        let states = assets.state_manager();
        HybridPlayer {
            name: name.to_string(),
            seat,
            hand: vec![],
            r1: uniform_range(),
            r2: uniform_range(),
            opponent_strategy: ActionMatrix::uniform(),
            resolve_probability,
            assets,
            states,
            rng: WyRng::seed_from_u64(seed),
        }
    }

    /// A player that never re-solves and plays on equity alone.
    pub fn rollout_only(name: &str, seat: usize, assets: Rc<Assets>, seed: u64) -> HybridPlayer {
        HybridPlayer::new(name, seat, assets, 0.0, seed)
    }

    fn resolve_action(&mut self, state: &GameState) -> Result<Action> {
        let resolver = Resolver::new(
            &self.assets.evaluator,
            &self.assets.nets,
            &self.states,
            &self.assets.config.resolver,
        );
        let resolution = resolver.resolve(
            &mut self.rng,
            state,
            &self.r1,
            &self.r2,
            end_stage_for(state.stage),
            END_DEPTH,
            self.assets.config.resolver.nbr_rollouts,
        )?;

        self.r1 = resolution.r1;
        self.r2 = resolution.r2;
        self.opponent_strategy = resolution.strategy;
        Ok(resolution.action)
    }

    fn rollout_action(&mut self, state: &GameState) -> Result<Action> {
        let win_probability = if state.stage == Stage::PreFlop {
            self.assets.cheat_sheet.get(&self.hand, state.num_players())
        } else {
            win_probability_rollout(
                &self.assets.evaluator,
                &mut self.rng,
                &self.hand,
                &state.public_cards,
                state.num_players(),
                EQUITY_ROLLOUTS,
            )?
        };
        debug!("{}: win probability {:.3}", self.name, win_probability);

        let legal = self.states.legal_actions(state);
        let action = if win_probability < 0.1 {
            Action::Fold
        } else if win_probability < 0.5 {
            legal[self.rng.gen_range(0..legal.len())]
        } else if win_probability < 0.8 {
            *legal
                .iter()
                .find(|a| matches!(a, Action::Call))
                .or_else(|| legal.iter().find(|a| matches!(a, Action::Check)))
                .unwrap_or(&Action::Fold)
        } else {
            let raises: Vec<&Action> =
                legal.iter().filter(|a| matches!(a, Action::Raise(_))).collect();
            if raises.is_empty() {
                *legal
                    .iter()
                    .find(|a| matches!(a, Action::Call))
                    .or_else(|| legal.iter().find(|a| matches!(a, Action::Check)))
                    .unwrap_or(&Action::Fold)
            } else {
                *raises[self.rng.gen_range(0..raises.len())]
            }
        };
        Ok(action)
    }
}

impl Player for HybridPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn hole_cards(&self) -> &[Card] {
        &self.hand
    }

    fn receive_cards(&mut self, cards: Vec<Card>) {
        self.hand = cards;
    }

    fn get_action(&mut self, state: &GameState) -> Result<Action> {
        if self.rng.gen::<f64>() < self.resolve_probability {
            self.resolve_action(state)
        } else {
            self.rollout_action(state)
        }
    }

    fn inform_of_action(&mut self, action: &Action, actor_seat: usize) {
        if actor_seat == self.seat {
            return;
        }
        let raises = self.states.allowed_raises();
        let menu_action = match action {
            Action::Raise(amount) => Action::Raise(nearest_raise(*amount, raises)),
            other => *other,
        };
        let index = agent_action_index(&menu_action, raises);
        self.r2 = bayesian_range_update(&self.r2, &self.opponent_strategy, index);
    }

    fn prepare_for_new_round(&mut self) {
        self.hand.clear();
        self.r1 = uniform_range();
        self.r2 = uniform_range();
        self.opponent_strategy = ActionMatrix::uniform();
    }
}
