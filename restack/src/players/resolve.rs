use std::rc::Rc;

use rand::SeedableRng;
use wyhash::WyRng;

use crate::{
    error::Result,
    poker::card::Card,
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

use super::Player;

/// Depth within the end stage at which re-solve trees are truncated.
const END_DEPTH: u32 = 5;

/// An agent that re-solves at every decision, carrying its belief ranges
/// across the hand. `r1` is its own range, `r2` the opponent's; both reset
/// to uniform each hand.
pub struct ResolvePlayer {
    name: String,
    seat: usize,
    hand: Vec<Card>,
    r1: Vec<f64>,
    r2: Vec<f64>,
    opponent_strategy: ActionMatrix,
    assets: Rc<Assets>,
    states: StateManager,
    rng: WyRng,
}

impl ResolvePlayer {
    pub fn new(name: &str, seat: usize, assets: Rc<Assets>, seed: u64) -> ResolvePlayer {
        let states = assets.state_manager();
        ResolvePlayer {
            name: name.to_string(),
            seat,
            hand: vec![],
            r1: uniform_range(),
            r2: uniform_range(),
            opponent_strategy: ActionMatrix::uniform(),
            assets,
            states,
            rng: WyRng::seed_from_u64(seed),
        }
    }
}

/// Re-solve to the end of the current stage, or through showdown once the
/// river is out.
pub(crate) fn end_stage_for(stage: Stage) -> Stage {
    if stage < Stage::River {
        stage
    } else {
        Stage::Showdown
    }
}

impl Player for ResolvePlayer {
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

    fn inform_of_action(&mut self, action: &Action, actor_seat: usize) {
        if actor_seat == self.seat {
            return;
        }
        // Interpret the opponent through the latest strategy snapshot,
        // snapping free-form raises onto the agent menu.
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

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_end_stage_selection() {
        assert_eq!(Stage::PreFlop, end_stage_for(Stage::PreFlop));
        assert_eq!(Stage::Flop, end_stage_for(Stage::Flop));
        assert_eq!(Stage::Turn, end_stage_for(Stage::Turn));
        assert_eq!(Stage::Showdown, end_stage_for(Stage::River));
    }
}
