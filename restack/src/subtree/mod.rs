pub mod node;

use std::rc::Rc;

use log::debug;
use more_asserts::assert_gt;
use rand::{
    seq::SliceRandom,
    Rng,
};

use crate::{
    config::ResolverConfig,
    error::Result,
    net::NetManager,
    poker::{
        card::{
            hole_pair_index,
            Card,
            DECK_SIZE,
            HOLE_PAIRS,
        },
        evaluator::HandEvaluator,
        oracle::utility_matrix,
    },
    state::{
        action::{
            agent_action_index,
            AGENT_ACTIONS_LEN,
        },
        manager::{
            GameState,
            Stage,
            StateKind,
            StateManager,
        },
    },
};

pub use self::node::{
    ActionMatrix,
    NodeKind,
    SubtreeNode,
};

/// Clamp added to action-probability denominators so Bayesian updates
/// never divide by zero.
pub const RANGE_EPSILON: f64 = 1e-4;

pub fn uniform_range() -> Vec<f64> {
    vec![1.0 / HOLE_PAIRS as f64; HOLE_PAIRS]
}

/// Everything a traversal needs besides the tree itself. Splitting it from
/// the root keeps the recursive passes free of self-borrow knots.
struct Ctx<'a> {
    evaluator: &'a HandEvaluator,
    nets: &'a NetManager,
    states: &'a StateManager,
    resolver: &'a ResolverConfig,
    allowed_raises: [i32; 2],
    avg_pot_size: f64,
    end_stage: Stage,
    end_depth: u32,
    root_player_index: usize,
}

/// Builds and owns the public re-solve tree rooted at one decision.
///
/// Private information never enters the tree; hands are marginalised
/// through the 1326-entry range vectors threaded down each traversal.
pub struct SubtreeManager<'a> {
    ctx: Ctx<'a>,
    root: SubtreeNode,
}

impl<'a> SubtreeManager<'a> {
    /// Roots a tree at `state`, which must be a player-to-act state, and
    /// expands the root over every legal action.
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng>(
        evaluator: &'a HandEvaluator,
        nets: &'a NetManager,
        states: &'a StateManager,
        resolver: &'a ResolverConfig,
        state: GameState,
        end_stage: Stage,
        end_depth: u32,
        strategy: ActionMatrix,
        rng: &mut R,
    ) -> Result<SubtreeManager<'a>> {
        debug_assert_eq!(StateKind::Player, state.kind);

        let utility = Rc::new(utility_matrix(evaluator, &state.public_cards)?);
        let root_player_index = state.current_player_index;
        let root = SubtreeNode::new(
            state,
            0,
            NodeKind::Player,
            strategy,
            ActionMatrix::zeros(),
            utility,
            [vec![0.0; HOLE_PAIRS], vec![0.0; HOLE_PAIRS]],
        );

        let ctx = Ctx {
            evaluator,
            nets,
            states,
            resolver,
            allowed_raises: states.allowed_raises(),
            avg_pot_size: states.poker().avg_pot_size as f64,
            end_stage,
            end_depth,
            root_player_index,
        };

        let mut manager = SubtreeManager {
            ctx,
            root,
        };
        expand_player_children(&manager.ctx, &mut manager.root, rng, None)?;
        debug!("Initial subtree:\n{}", manager.root.dump(0));
        Ok(manager)
    }

    pub fn root(&self) -> &SubtreeNode {
        &self.root
    }

    /// One bottom-up pass computing counterfactual values for both ranges.
    pub fn traversal_rollout<R: Rng>(
        &mut self,
        rng: &mut R,
        r1: &[f64],
        r2: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let SubtreeManager {
            ctx,
            root,
        } = self;
        rollout(ctx, root, r1, r2, rng)
    }

    /// Post-order CFR+ regret accumulation and regret-matching pass.
    /// Returns the root strategy after the update.
    pub fn update_strategies(&mut self) -> ActionMatrix {
        let SubtreeManager {
            ctx,
            root,
        } = self;
        update_node(ctx, root);
        root.strategy.clone()
    }
}

/// Which of `[r1, r2]` belongs to the player acting at a node. `r1` is
/// always the root agent's range, whichever seat it occupies.
fn acting_range_index(current_player_index: usize, root_player_index: usize) -> usize {
    (current_player_index + root_player_index) % 2
}

fn rollout<R: Rng>(
    ctx: &Ctx<'_>,
    node: &mut SubtreeNode,
    r1: &[f64],
    r2: &[f64],
    rng: &mut R,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let (v1, v2) = match node.kind {
        NodeKind::Showdown => {
            let scale = node.state.pot as f64 / ctx.avg_pot_size;
            let mut v1 = node.utility.matvec(r2);
            let mut v2 = node.utility.matvec_transposed(r1);
            for v in &mut v1 {
                *v *= scale;
            }
            for v in &mut v2 {
                *v *= -scale;
            }
            (v1, v2)
        }
        NodeKind::Won => {
            let scale = node.state.pot as f64 / ctx.avg_pot_size;
            let winner = node.state.winner_index.expect("WON nodes record a winner");
            let sign = if winner == ctx.root_player_index {
                1.0
            } else {
                -1.0
            };
            (vec![sign * scale; HOLE_PAIRS], vec![-sign * scale; HOLE_PAIRS])
        }
        NodeKind::Terminal => {
            let network = ctx.nets.network(node.state.stage);
            network.predict(r1, r2, &node.state.public_cards, node.state.pot)
        }
        NodeKind::Player => {
            let player_index =
                acting_range_index(node.state.current_player_index, ctx.root_player_index);
            let selected = expand_player_children(
                ctx,
                node,
                rng,
                Some(ctx.resolver.nbr_actions_in_rollout),
            )?;

            let mut v1 = vec![0.0; HOLE_PAIRS];
            let mut v2 = vec![0.0; HOLE_PAIRS];
            let strategy_total = node.strategy.sum();
            for child_index in selected {
                let action = node.children[child_index].0.expect("player children carry actions");
                let a = agent_action_index(&action, ctx.allowed_raises);

                // The actor's range conditions on the action; the
                // opponent's passes through unchanged.
                let column = node.strategy.column(a);
                let p_action = column.iter().sum::<f64>()
                    / strategy_total.max(RANGE_EPSILON)
                    + RANGE_EPSILON;
                let r_p = if player_index == 0 {
                    r1
                } else {
                    r2
                };
                let r_p_a: Vec<f64> =
                    r_p.iter().zip(column.iter()).map(|(r, s)| r * s / p_action).collect();
                let (r1_a, r2_a): (&[f64], &[f64]) = if player_index == 0 {
                    (&r_p_a, r2)
                } else {
                    (r1, &r_p_a)
                };

                let child = &mut node.children[child_index].1;
                let (v1_a, v2_a) = rollout(ctx, child, r1_a, r2_a, rng)?;
                for h in 0..HOLE_PAIRS {
                    let weight = node.strategy.get(h, a);
                    v1[h] += weight * v1_a[h];
                    v2[h] += weight * v2_a[h];
                }
            }
            (v1, v2)
        }
        NodeKind::Chance => {
            expand_chance_children(ctx, node, rng)?;
            let s = node.children.len() as f64;
            assert_gt!(s, 0.0);

            let mut v1 = vec![0.0; HOLE_PAIRS];
            let mut v2 = vec![0.0; HOLE_PAIRS];
            for child_index in 0..node.children.len() {
                // Newly revealed cards knock conflicting hands out of both
                // ranges before descending.
                let public = node.children[child_index].1.state.public_cards.clone();
                let r1_e = update_range_from_public_cards(r1, &public);
                let r2_e = update_range_from_public_cards(r2, &public);

                let child = &mut node.children[child_index].1;
                let (v1_e, v2_e) = rollout(ctx, child, &r1_e, &r2_e, rng)?;
                for h in 0..HOLE_PAIRS {
                    v1[h] += v1_e[h];
                    v2[h] += v2_e[h];
                }
            }
            for v in v1.iter_mut().chain(v2.iter_mut()) {
                *v /= s;
            }
            (v1, v2)
        }
    };

    node.values = [v1.clone(), v2.clone()];
    Ok((v1, v2))
}

/// Ensures children exist for a sampled subset of the legal actions and
/// returns the indices to traverse this rollout. `limit` of `None` expands
/// everything (used once for the root).
fn expand_player_children<R: Rng>(
    ctx: &Ctx<'_>,
    node: &mut SubtreeNode,
    rng: &mut R,
    limit: Option<usize>,
) -> Result<Vec<usize>> {
    let mut pairs = ctx.states.child_states(rng, &node.state, ctx.resolver.nbr_random_events)?;
    pairs.shuffle(rng);

    let take = limit.unwrap_or(pairs.len());
    let mut selected = Vec::with_capacity(take);
    for (action, new_state) in pairs.into_iter().take(take) {
        let action = action.expect("player states expand by action");
        if let Some(at) = node.children.iter().position(|(a, _)| *a == Some(action)) {
            selected.push(at);
            continue;
        }
        let child = make_child(ctx, node, new_state)?;
        node.children.push((Some(action), child));
        selected.push(node.children.len() - 1);
    }
    Ok(selected)
}

/// Chance nodes expand once, to the configured sampling width; later
/// rollouts reuse the same dealt boards.
fn expand_chance_children<R: Rng>(ctx: &Ctx<'_>, node: &mut SubtreeNode, rng: &mut R) -> Result<()> {
    if !node.children.is_empty() {
        return Ok(());
    }
    let pairs = ctx.states.child_states(rng, &node.state, ctx.resolver.nbr_random_events)?;
    for (action, new_state) in pairs {
        debug_assert!(action.is_none());
        let child = make_child(ctx, node, new_state)?;
        node.children.push((None, child));
    }
    Ok(())
}

fn make_child(ctx: &Ctx<'_>, parent: &SubtreeNode, new_state: GameState) -> Result<SubtreeNode> {
    let depth = if parent.stage == new_state.stage {
        parent.depth + 1
    } else {
        0
    };

    let kind = if new_state.stage == Stage::Showdown {
        NodeKind::Showdown
    } else if new_state.kind == StateKind::Winner {
        NodeKind::Won
    } else if new_state.stage > ctx.end_stage
        || (new_state.stage == ctx.end_stage && depth == ctx.end_depth)
    {
        NodeKind::Terminal
    } else if new_state.kind == StateKind::Dealer {
        NodeKind::Chance
    } else {
        NodeKind::Player
    };

    // Terminal and chance nodes sit on their own concrete boards; everyone
    // else shares the parent's matrix.
    let utility = match kind {
        NodeKind::Terminal | NodeKind::Chance => {
            Rc::new(utility_matrix(ctx.evaluator, &new_state.public_cards)?)
        }
        _ => Rc::clone(&parent.utility),
    };

    Ok(SubtreeNode::new(
        new_state,
        depth,
        kind,
        parent.strategy.clone(),
        parent.regrets.clone(),
        utility,
        parent.values.clone(),
    ))
}

fn update_node(ctx: &Ctx<'_>, node: &mut SubtreeNode) {
    for (_, child) in node.children.iter_mut() {
        update_node(ctx, child);
    }
    if node.kind != NodeKind::Player {
        return;
    }

    let player_index = acting_range_index(node.state.current_player_index, ctx.root_player_index);
    {
        let SubtreeNode {
            ref children,
            ref mut regrets,
            ref values,
            ..
        } = *node;
        let node_values = &values[player_index];
        for (action, child) in children {
            let a = agent_action_index(
                action.as_ref().expect("player children carry actions"),
                ctx.allowed_raises,
            );
            let child_values = &child.values[player_index];
            for h in 0..HOLE_PAIRS {
                regrets.add(h, a, child_values[h] - node_values[h]);
            }
        }
    }

    // CFR+ regret matching; rows with no positive regret fall back to the
    // uniform distribution.
    let SubtreeNode {
        ref mut strategy,
        ref regrets,
        ..
    } = *node;
    for h in 0..HOLE_PAIRS {
        let row = regrets.row(h);
        let positive_sum: f64 = row.iter().filter(|r| **r > 0.0).sum();
        let strategy_row = strategy.row_mut(h);
        if positive_sum <= 0.0 {
            strategy_row.fill(1.0 / AGENT_ACTIONS_LEN as f64);
        } else {
            for (s, r) in strategy_row.iter_mut().zip(row.iter()) {
                *s = r.max(0.0) / positive_sum;
            }
        }
    }
}

/// Conditions a range on having taken the given action: each hand's mass
/// is reweighted by the probability its strategy row assigned the action.
pub fn bayesian_range_update(range: &[f64], strategy: &ActionMatrix, action_index: usize) -> Vec<f64> {
    let total = strategy.sum().max(RANGE_EPSILON);
    let p_action = strategy.column_sum(action_index) / total + RANGE_EPSILON;
    range
        .iter()
        .enumerate()
        .map(|(h, r)| r * strategy.get(h, action_index) / p_action)
        .collect()
}

/// Zeroes every hole pair that shares a card with the public board.
pub fn update_range_from_public_cards(range: &[f64], public_cards: &[Card]) -> Vec<f64> {
    let mut r = range.to_vec();
    for card in public_cards {
        let c = card.id();
        for other in 0..DECK_SIZE {
            if other == c {
                continue;
            }
            let idx = if c < other {
                hole_pair_index(c, other)
            } else {
                hole_pair_index(other, c)
            };
            r[idx] = 0.0;
        }
    }
    r
}

#[cfg(test)]
mod tests {

    use more_asserts::{
        assert_gt,
        assert_lt,
    };
    use rand::SeedableRng;
    use wyhash::WyRng;

    use crate::{
        config::PokerConfig,
        poker::card::{
            hole_pair_cards,
            hole_pair_index_of,
            parse_cards,
        },
        poker::test_support::evaluator,
        state::action::Action,
    };

    use super::*;

    fn river_state(current_player_index: usize) -> GameState {
        let mut s = GameState::new(2, 1000);
        s.stage = Stage::River;
        s.current_player_index = current_player_index;
        s.public_cards = parse_cards("Jh 8h 4h 2c 9d");
        s.deck = crate::poker::deck::Deck::new_without(&s.public_cards);
        s.player_bets = vec![20, 20];
        s.player_chips = vec![980, 980];
        s.pot = 40;
        s.bet_to_match = 20;
        s
    }

    fn small_resolver_config() -> ResolverConfig {
        ResolverConfig {
            nbr_random_events: 2,
            nbr_actions_in_rollout: 3,
            nbr_rollouts: 5,
        }
    }

    #[test]
    fn test_acting_range_index_parity() {
        // Hand-traced: r1 is the root agent's range regardless of seat.
        // Root in seat 0: it acts at seat-0 nodes through r1.
        assert_eq!(0, acting_range_index(0, 0));
        assert_eq!(1, acting_range_index(1, 0));
        // Root in seat 1: after it raises, seat 0 (the opponent) acts and
        // must be mapped onto r2; the root's own nodes stay on r1.
        assert_eq!(0, acting_range_index(1, 1));
        assert_eq!(1, acting_range_index(0, 1));
    }

    #[test]
    fn test_bayesian_update_collapses_on_indicator_column() {
        let target = hole_pair_index_of(
            "Ah".parse().unwrap(),
            "As".parse().unwrap(),
        );
        let mut strategy = ActionMatrix::zeros();
        strategy.set(target, 1, 1.0);

        let updated = bayesian_range_update(&uniform_range(), &strategy, 1);
        for (h, mass) in updated.iter().enumerate() {
            if h == target {
                assert_gt!(*mass, 0.0);
            } else {
                assert_eq!(0.0, *mass);
            }
        }
    }

    #[test]
    fn test_range_zeroed_against_public_cards() {
        let jack = "Jh".parse().unwrap();
        let r = update_range_from_public_cards(&uniform_range(), &[jack]);
        for idx in 0..HOLE_PAIRS {
            let (c1, c2) = hole_pair_cards(idx);
            if c1 == jack || c2 == jack {
                assert_eq!(0.0, r[idx], "pair {:?}{:?} should be dead", c1, c2);
            } else {
                assert_gt!(r[idx], 0.0);
            }
        }
    }

    #[test]
    fn test_showdown_values_are_zero_sum() {
        let board = parse_cards("Jh 8h 4h 2c 9d");
        let u = utility_matrix(evaluator(), &board).unwrap();

        let r1 = update_range_from_public_cards(&uniform_range(), &board);
        let mut r2 = r1.clone();
        // Skew r2 so the test is not fooled by symmetry.
        r2[0] *= 3.0;

        let v1 = u.matvec(&r2);
        let v2: Vec<f64> = u.matvec_transposed(&r1).iter().map(|v| -v).collect();

        let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();
        assert_lt!((dot(&r1, &v1) + dot(&r2, &v2)).abs(), 1e-9);
    }

    #[test]
    fn test_won_values_follow_the_root_seat() {
        let mut rng = WyRng::seed_from_u64(31);
        let states = StateManager::new(PokerConfig::default());
        let nets = NetManager::zero();
        let resolver = small_resolver_config();

        // Root is seat 1. If it folds, seat 0 wins and v1 must be negative.
        // Widen per-rollout expansion so the fold child is always visited.
        let resolver = ResolverConfig {
            nbr_actions_in_rollout: AGENT_ACTIONS_LEN,
            ..resolver
        };
        let state = river_state(1);
        let mut tree = SubtreeManager::new(
            evaluator(),
            &nets,
            &states,
            &resolver,
            state,
            Stage::Showdown,
            10,
            ActionMatrix::uniform(),
            &mut rng,
        )
        .unwrap();

        let r = uniform_range();
        tree.traversal_rollout(&mut rng, &r, &r).unwrap();

        let fold_child = tree
            .root()
            .children
            .iter()
            .find(|(a, _)| *a == Some(Action::Fold))
            .map(|(_, c)| c)
            .unwrap();
        assert_eq!(NodeKind::Won, fold_child.kind);
        assert_lt!(fold_child.values[0][0], 0.0);
        assert_gt!(fold_child.values[1][0], 0.0);
    }

    #[test]
    fn test_strategy_rows_sum_to_one_after_update() {
        let mut rng = WyRng::seed_from_u64(32);
        let states = StateManager::new(PokerConfig::default());
        let nets = NetManager::zero();
        let resolver = small_resolver_config();

        let mut tree = SubtreeManager::new(
            evaluator(),
            &nets,
            &states,
            &resolver,
            river_state(0),
            Stage::Showdown,
            10,
            ActionMatrix::uniform(),
            &mut rng,
        )
        .unwrap();

        let r = uniform_range();
        for _ in 0..3 {
            tree.traversal_rollout(&mut rng, &r, &r).unwrap();
            tree.update_strategies();
        }

        fn check(node: &SubtreeNode) {
            if node.kind == NodeKind::Player {
                for h in (0..HOLE_PAIRS).step_by(101) {
                    let sum: f64 = node.strategy.row(h).iter().sum();
                    assert_lt!((sum - 1.0).abs(), 1e-6);
                }
            }
            for (_, child) in &node.children {
                check(child);
            }
        }
        check(tree.root());
    }

    #[test]
    fn test_chance_children_are_sampled_once() {
        let mut rng = WyRng::seed_from_u64(33);
        let states = StateManager::new(PokerConfig::default());
        let nets = NetManager::zero();
        let resolver = small_resolver_config();

        let mut tree = SubtreeManager::new(
            evaluator(),
            &nets,
            &states,
            &resolver,
            river_state(0),
            Stage::Showdown,
            10,
            ActionMatrix::uniform(),
            &mut rng,
        )
        .unwrap();

        // Chance nodes appear once both players have matched; repeated
        // rollouts must reuse their sampled deals instead of widening them.
        let r = uniform_range();
        for _ in 0..20 {
            tree.traversal_rollout(&mut rng, &r, &r).unwrap();
        }

        fn check(node: &SubtreeNode, width: usize, chance_nodes: &mut usize) {
            if node.kind == NodeKind::Chance {
                assert!(node.children.len() == 0 || node.children.len() == width);
                if !node.children.is_empty() {
                    *chance_nodes += 1;
                }
            }
            for (_, child) in &node.children {
                check(child, width, chance_nodes);
            }
        }
        let mut expanded_chance_nodes = 0;
        check(tree.root(), resolver.nbr_random_events, &mut expanded_chance_nodes);
        assert_gt!(expanded_chance_nodes, 0);
    }
}
