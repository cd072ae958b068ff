use std::time::Instant;

use log::{
    debug,
    info,
};
use more_asserts::assert_gt;
use rand::Rng;
use rand_distr::{
    Distribution,
    WeightedIndex,
};

use crate::{
    config::ResolverConfig,
    error::Result,
    net::NetManager,
    poker::evaluator::HandEvaluator,
    state::{
        action::{
            agent_action_from_index,
            Action,
            AGENT_ACTIONS_LEN,
        },
        manager::{
            GameState,
            Stage,
            StateManager,
        },
    },
    subtree::{
        bayesian_range_update,
        ActionMatrix,
        SubtreeManager,
    },
};

/// What a resolve hands back: the sampled action, the acting player's
/// posterior range, the untouched opponent range, and the mean strategy
/// the opponent will adopt as its next opponent model.
pub struct Resolution {
    pub action: Action,
    pub r1: Vec<f64>,
    pub r2: Vec<f64>,
    pub strategy: ActionMatrix,
}

/// Continual re-solving: build a depth-limited public tree at the acting
/// state, iterate CFR+ rollouts over it, and act from the averaged root
/// strategy.
pub struct Resolver<'a> {
    evaluator: &'a HandEvaluator,
    nets: &'a NetManager,
    states: &'a StateManager,
    config: &'a ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(
        evaluator: &'a HandEvaluator,
        nets: &'a NetManager,
        states: &'a StateManager,
        config: &'a ResolverConfig,
    ) -> Resolver<'a> {
        Resolver {
            evaluator,
            nets,
            states,
            config,
        }
    }

    pub fn resolve<R: Rng>(
        &self,
        rng: &mut R,
        state: &GameState,
        r1: &[f64],
        r2: &[f64],
        end_stage: Stage,
        end_depth: u32,
        nbr_rollouts: u32,
    ) -> Result<Resolution> {
        assert_gt!(nbr_rollouts, 0);

        let start = Instant::now();
        let mut tree = SubtreeManager::new(
            self.evaluator,
            self.nets,
            self.states,
            self.config,
            state.clone(),
            end_stage,
            end_depth,
            ActionMatrix::uniform(),
            rng,
        )?;

        // The final strategy is the mean of the per-iteration root
        // strategies, which is what converges toward equilibrium.
        let mut mean_strategy = ActionMatrix::zeros();
        for _ in 0..nbr_rollouts {
            tree.traversal_rollout(rng, r1, r2)?;
            let snapshot = tree.update_strategies();
            mean_strategy.add_assign(&snapshot);
        }
        mean_strategy.scale(1.0 / nbr_rollouts as f64);

        let mut action_probs = [0.0f64; AGENT_ACTIONS_LEN];
        for (h, mass) in r1.iter().enumerate() {
            if *mass == 0.0 {
                continue;
            }
            for (a, p) in action_probs.iter_mut().enumerate() {
                *p += mass * mean_strategy.get(h, a);
            }
        }
        let total: f64 = action_probs.iter().sum();
        if total > 0.0 {
            for p in &mut action_probs {
                *p /= total;
            }
        } else {
            action_probs = [1.0 / AGENT_ACTIONS_LEN as f64; AGENT_ACTIONS_LEN];
        }
        debug!("Root action distribution: {:?}", action_probs);

        let dist = WeightedIndex::new(action_probs)
            .unwrap_or_else(|e| panic!("Invalid action weights {:?}: {}", action_probs, e));
        let action_index = dist.sample(rng);
        let action = agent_action_from_index(action_index, self.states.allowed_raises());

        let r1 = bayesian_range_update(r1, &mean_strategy, action_index);
        info!(
            "Resolved {} in {} ({} rollouts)",
            action,
            humantime::format_duration(start.elapsed()),
            nbr_rollouts
        );

        Ok(Resolution {
            action,
            r1,
            r2: r2.to_vec(),
            strategy: mean_strategy,
        })
    }
}

#[cfg(test)]
mod tests {

    use more_asserts::assert_lt;
    use rand::SeedableRng;
    use wyhash::WyRng;

    use crate::{
        config::PokerConfig,
        poker::card::{
            parse_cards,
            HOLE_PAIRS,
        },
        poker::deck::Deck,
        poker::test_support::evaluator,
        subtree::uniform_range,
    };

    use super::*;

    fn river_state() -> GameState {
        let mut s = GameState::new(2, 1000);
        s.stage = Stage::River;
        s.public_cards = parse_cards("Jh 8h 4h 2c 9d");
        s.deck = Deck::new_without(&s.public_cards);
        s.player_bets = vec![20, 20];
        s.player_chips = vec![980, 980];
        s.pot = 40;
        s.bet_to_match = 20;
        s
    }

    fn run_resolve(seed: u64) -> Resolution {
        let mut rng = WyRng::seed_from_u64(seed);
        let states = StateManager::new(PokerConfig::default());
        let nets = NetManager::zero();
        let config = ResolverConfig {
            nbr_random_events: 2,
            nbr_actions_in_rollout: 3,
            nbr_rollouts: 10,
        };
        let resolver = Resolver::new(evaluator(), &nets, &states, &config);
        resolver
            .resolve(
                &mut rng,
                &river_state(),
                &uniform_range(),
                &uniform_range(),
                Stage::Showdown,
                10,
                config.nbr_rollouts,
            )
            .unwrap()
    }

    #[test]
    fn test_resolve_is_deterministic_under_a_fixed_seed() {
        let first = run_resolve(42);
        let second = run_resolve(42);

        assert_eq!(first.action, second.action);
        assert_eq!(first.r1, second.r1);
        assert_eq!(first.r2, second.r2);
        assert_eq!(first.strategy, second.strategy);
    }

    #[test]
    fn test_resolve_leaves_the_opponent_range_untouched() {
        let resolution = run_resolve(7);
        assert_eq!(uniform_range(), resolution.r2);
    }

    #[test]
    fn test_mean_strategy_rows_are_distributions() {
        let resolution = run_resolve(11);
        for h in (0..HOLE_PAIRS).step_by(113) {
            let sum: f64 = resolution.strategy.row(h).iter().sum();
            assert_lt!((sum - 1.0).abs(), 1e-6);
        }
    }
}
