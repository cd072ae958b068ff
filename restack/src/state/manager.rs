use std::fmt;

use rand::Rng;

use crate::{
    config::PokerConfig,
    error::Result,
    poker::{
        card::{
            cards_to_str,
            Card,
        },
        deck::Deck,
    },
};

use super::action::Action;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(Default)]
pub enum Stage {
    #[default]
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Stage {
    pub fn next(&self) -> Stage {
        match *self {
            Stage::PreFlop => Stage::Flop,
            Stage::Flop => Stage::Turn,
            Stage::Turn => Stage::River,
            Stage::River => Stage::Showdown,
            Stage::Showdown => {
                panic!("Failed to get the next stage because the hand is at SHOWDOWN.");
            }
        }
    }

    /// Directory tag for on-disk artifacts keyed by stage.
    pub fn tag(&self) -> &'static str {
        match *self {
            Stage::PreFlop => "pre_flop",
            Stage::Flop => "flop",
            Stage::Turn => "turn",
            Stage::River => "river",
            Stage::Showdown => "showdown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Stage::PreFlop => "PreFlop",
            Stage::Flop => "Flop",
            Stage::Turn => "Turn",
            Stage::River => "River",
            Stage::Showdown => "Showdown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// A player must act.
    Player,
    /// Betting closed; the dealer reveals the next street.
    Dealer,
    /// Everyone else folded.
    Winner,
}

/// The public betting state of one hand. Private hole cards never appear
/// here; the resolver reasons about them through range vectors instead.
#[derive(Debug, Clone)]
pub struct GameState {
    pub stage: Stage,
    pub kind: StateKind,
    pub current_player_index: usize,
    pub player_bets: Vec<i32>,
    pub player_chips: Vec<i32>,
    pub player_checks: Vec<bool>,
    pub players_in_game: Vec<bool>,
    pub players_all_in: Vec<bool>,
    pub pot: i32,
    pub bet_to_match: i32,
    pub public_cards: Vec<Card>,
    pub deck: Deck,
    pub winner_index: Option<usize>,
    pub stage_bet_count: u32,
}

impl GameState {
    pub fn new(num_players: usize, starting_chips: i32) -> GameState {
        GameState {
            stage: Stage::PreFlop,
            kind: StateKind::Player,
            current_player_index: 0,
            player_bets: vec![0; num_players],
            player_chips: vec![starting_chips; num_players],
            player_checks: vec![false; num_players],
            players_in_game: vec![true; num_players],
            players_all_in: vec![false; num_players],
            pot: 0,
            bet_to_match: 0,
            public_cards: vec![],
            deck: Deck::new(),
            winner_index: None,
            stage_bet_count: 0,
        }
    }

    /// Restores a fresh pre-flop state for the next hand. Chip stacks are
    /// kept unless `redistribute` hands everyone `starting_chips` again.
    pub fn reset_for_new_round(&mut self, starting_chips: i32, redistribute: bool) {
        let n = self.player_bets.len();
        self.stage = Stage::PreFlop;
        self.kind = StateKind::Player;
        self.player_bets = vec![0; n];
        self.player_checks = vec![false; n];
        self.players_in_game = vec![true; n];
        self.players_all_in = vec![false; n];
        self.pot = 0;
        self.bet_to_match = 0;
        self.public_cards = vec![];
        self.deck = Deck::new();
        self.winner_index = None;
        self.stage_bet_count = 0;
        if redistribute {
            self.player_chips = vec![starting_chips; n];
        }
    }

    pub fn num_players(&self) -> usize {
        self.player_bets.len()
    }

    pub fn players_left(&self) -> usize {
        self.players_in_game.iter().filter(|p| **p).count()
    }

    /// Chips the current player must add to match the table bet.
    pub fn call_amount(&self) -> i32 {
        (self.bet_to_match - self.player_bets[self.current_player_index]).max(0)
    }

    /// Moves the seat pointer to the next player still in the hand.
    pub fn advance_player(&mut self) {
        debug_assert!(self.players_left() >= 1);
        let n = self.num_players();
        for _ in 0..n {
            self.current_player_index = (self.current_player_index + 1) % n;
            if self.players_in_game[self.current_player_index] {
                return;
            }
        }
    }

    pub fn dump(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("{} ({:?})\n", self.stage, self.kind));
        s.push_str(&format!("  Board: {}\n", cards_to_str(&self.public_cards)));
        s.push_str(&format!("  Pot: {}, to match: {}\n", self.pot, self.bet_to_match));
        for i in 0..self.num_players() {
            let marker = if self.current_player_index == i {
                '*'
            } else {
                ' '
            };
            let status = if !self.players_in_game[i] {
                " folded"
            } else if self.players_all_in[i] {
                " all-in"
            } else {
                ""
            };
            s.push_str(&format!(
                "  {}Player {}: bet {}, chips {}{}\n",
                marker, i, self.player_bets[i], self.player_chips[i], status
            ));
        }
        s
    }
}

/// Rule arbiter: legal actions, action application and street progression
/// under limit betting with two fixed raise amounts.
pub struct StateManager {
    poker: PokerConfig,
}

impl StateManager {
    pub fn new(poker: PokerConfig) -> StateManager {
        StateManager {
            poker,
        }
    }

    pub fn poker(&self) -> &PokerConfig {
        &self.poker
    }

    pub fn allowed_raises(&self) -> [i32; 2] {
        self.poker.allowed_raises()
    }

    pub fn legal_actions(&self, s: &GameState) -> Vec<Action> {
        let i = s.current_player_index;
        let diff = s.call_amount();

        let mut actions = vec![Action::Fold];
        if diff == 0 || s.players_all_in[i] {
            actions.push(Action::Check);
        }
        if diff > 0 && s.player_chips[i] >= diff && !s.player_checks[i] {
            actions.push(Action::Call);
        }
        if s.stage_bet_count < self.poker.bet_per_stage_limit {
            for amount in self.allowed_raises() {
                if s.player_chips[i] >= diff + amount {
                    actions.push(Action::Raise(amount));
                }
            }
            if s.player_chips[i] > 0 {
                actions.push(Action::AllIn);
            }
        }
        actions
    }

    /// Transfers `amount` chips from a player into the pot.
    pub fn bet_amount(&self, s: &GameState, player_index: usize, amount: i32) -> GameState {
        let mut s = s.clone();
        bet_on(&mut s, player_index, amount);
        s
    }

    pub fn apply_action(&self, state: &GameState, action: &Action) -> GameState {
        let mut s = state.clone();
        let i = s.current_player_index;
        let mut pot_raised = false;

        match action {
            Action::Fold => {
                s.players_in_game[i] = false;
                s.player_checks[i] = false;
            }
            Action::Call => {
                let diff = s.call_amount();
                if s.player_chips[i] >= diff {
                    bet_on(&mut s, i, diff);
                    s.player_checks[i] = true;
                }
            }
            Action::Check => {
                s.player_checks[i] = true;
            }
            Action::Raise(amount) => {
                let total = s.call_amount() + amount;
                if s.player_chips[i] >= total {
                    bet_on(&mut s, i, total);
                    pot_raised = true;
                }
            }
            Action::AllIn => {
                let amount = s.player_chips[i];
                bet_on(&mut s, i, amount);
                s.players_all_in[i] = true;
                pot_raised = true;
            }
        }

        if pot_raised {
            for check in &mut s.player_checks {
                *check = false;
            }
            s.player_checks[i] = true;
            s.stage_bet_count += 1;
        }

        if s.players_left() == 1 {
            s.kind = StateKind::Winner;
            s.winner_index = s.players_in_game.iter().position(|p| *p);
        } else if s.player_checks == s.players_in_game {
            s.kind = StateKind::Dealer;
        } else {
            s.advance_player();
        }
        s
    }

    /// Deals the next street from `deck` and reopens betting.
    pub fn progress_stage<R: Rng>(
        &self,
        rng: &mut R,
        state: &GameState,
        mut deck: Deck,
    ) -> Result<GameState> {
        let mut s = state.clone();
        for check in &mut s.player_checks {
            *check = false;
        }
        s.stage_bet_count = 0;
        s.kind = StateKind::Player;
        match s.stage {
            Stage::PreFlop => {
                s.stage = Stage::Flop;
                s.public_cards = deck.draw(rng, 3)?;
            }
            Stage::Flop | Stage::Turn => {
                s.stage = s.stage.next();
                s.public_cards.append(&mut deck.draw(rng, 1)?);
            }
            Stage::River => {
                s.stage = Stage::Showdown;
            }
            Stage::Showdown => {
                panic!("Cannot progress a hand past SHOWDOWN.");
            }
        }
        s.deck = deck;
        Ok(s)
    }

    /// Children of a public state: one `(action, state)` per legal action
    /// at PLAYER states, `nbr_random_events` sampled deals at DEALER
    /// states. The chance deck excludes only public information.
    pub fn child_states<R: Rng>(
        &self,
        rng: &mut R,
        state: &GameState,
        nbr_random_events: usize,
    ) -> Result<Vec<(Option<Action>, GameState)>> {
        let mut children = vec![];
        match state.kind {
            StateKind::Player => {
                for action in self.legal_actions(state) {
                    let new_state = self.apply_action(state, &action);
                    children.push((Some(action), new_state));
                }
            }
            StateKind::Dealer => {
                for _ in 0..nbr_random_events {
                    let deck = Deck::new_without(&state.public_cards);
                    children.push((None, self.progress_stage(rng, state, deck)?));
                }
            }
            StateKind::Winner => {}
        }
        Ok(children)
    }
}

fn bet_on(s: &mut GameState, player_index: usize, amount: i32) {
    s.player_chips[player_index] -= amount;
    s.player_bets[player_index] += amount;
    s.pot += amount;
    if s.player_bets[player_index] > s.bet_to_match {
        s.bet_to_match = s.player_bets[player_index];
    }
}

#[cfg(test)]
mod tests {

    use rand::SeedableRng;
    use wyhash::WyRng;

    use super::*;

    fn manager() -> StateManager {
        StateManager::new(PokerConfig::default())
    }

    fn fresh(num_players: usize) -> GameState {
        GameState::new(num_players, 1000)
    }

    #[test]
    fn test_legal_actions_with_no_bet_to_match() {
        let sm = manager();
        let actions = sm.legal_actions(&fresh(2));

        assert!(actions.contains(&Action::Fold));
        assert!(actions.contains(&Action::Check));
        assert!(!actions.contains(&Action::Call));
        assert!(actions.contains(&Action::Raise(10)));
        assert!(actions.contains(&Action::Raise(20)));
        assert!(actions.contains(&Action::AllIn));
    }

    #[test]
    fn test_raise_then_call_closes_the_stage() {
        let sm = manager();
        let s = fresh(2);

        // Player 0 raises by 20.
        let s = sm.apply_action(&s, &Action::Raise(20));
        assert_eq!(20, s.pot);
        assert_eq!(20, s.bet_to_match);
        assert_eq!(1, s.stage_bet_count);
        assert_eq!(vec![true, false], s.player_checks);
        assert_eq!(1, s.current_player_index);
        assert_eq!(StateKind::Player, s.kind);

        // Player 1 calls; everyone has matched, so the dealer is up next.
        let actions = sm.legal_actions(&s);
        assert!(actions.contains(&Action::Call));
        assert!(!actions.contains(&Action::Check));
        let s = sm.apply_action(&s, &Action::Call);
        assert_eq!(40, s.pot);
        assert_eq!(vec![980, 980], s.player_chips);
        assert_eq!(StateKind::Dealer, s.kind);
        // Calling never counts toward the raise cap.
        assert_eq!(1, s.stage_bet_count);
    }

    #[test]
    fn test_raise_cap_removes_raise_and_all_in() {
        let sm = manager();
        let mut s = fresh(2);
        s.stage_bet_count = PokerConfig::default().bet_per_stage_limit;

        let actions = sm.legal_actions(&s);
        assert!(!actions.iter().any(|a| matches!(a, Action::Raise(_))));
        assert!(!actions.contains(&Action::AllIn));
        assert!(actions.contains(&Action::Fold));
    }

    #[test]
    fn test_fold_hands_the_pot_to_the_last_player() {
        let sm = manager();
        let s = fresh(2);
        let s = sm.apply_action(&s, &Action::Raise(20));
        let s = sm.apply_action(&s, &Action::Fold);

        assert_eq!(StateKind::Winner, s.kind);
        assert_eq!(Some(0), s.winner_index);
    }

    #[test]
    fn test_advance_skips_folded_players() {
        let sm = manager();
        let s = fresh(3);
        let s = sm.apply_action(&s, &Action::Fold);
        assert_eq!(1, s.current_player_index);

        let s = sm.apply_action(&s, &Action::Raise(10));
        // Seat 0 folded; action passes from 1 straight to 2.
        assert_eq!(2, s.current_player_index);
        assert_eq!(StateKind::Player, s.kind);
    }

    #[test]
    fn test_all_in_marks_player_and_counts_as_raise() {
        let sm = manager();
        let s = fresh(2);
        let s = sm.apply_action(&s, &Action::AllIn);

        assert!(s.players_all_in[0]);
        assert_eq!(0, s.player_chips[0]);
        assert_eq!(1000, s.pot);
        assert_eq!(1, s.stage_bet_count);
    }

    #[test]
    fn test_stage_progression_deals_the_right_counts() {
        let mut rng = WyRng::seed_from_u64(11);
        let sm = manager();
        let mut s = fresh(2);
        assert_eq!(0, s.public_cards.len());

        s = sm.progress_stage(&mut rng, &s, Deck::new()).unwrap();
        assert_eq!(Stage::Flop, s.stage);
        assert_eq!(3, s.public_cards.len());
        assert_eq!(StateKind::Player, s.kind);

        let deck = Deck::new_without(&s.public_cards);
        s = sm.progress_stage(&mut rng, &s, deck).unwrap();
        assert_eq!(Stage::Turn, s.stage);
        assert_eq!(4, s.public_cards.len());

        let deck = Deck::new_without(&s.public_cards);
        s = sm.progress_stage(&mut rng, &s, deck).unwrap();
        assert_eq!(Stage::River, s.stage);
        assert_eq!(5, s.public_cards.len());

        let deck = Deck::new_without(&s.public_cards);
        s = sm.progress_stage(&mut rng, &s, deck).unwrap();
        assert_eq!(Stage::Showdown, s.stage);
        assert_eq!(5, s.public_cards.len());
    }

    #[test]
    fn test_progress_resets_checks_and_bet_count() {
        let mut rng = WyRng::seed_from_u64(12);
        let sm = manager();
        let s = fresh(2);
        let s = sm.apply_action(&s, &Action::Raise(10));
        let s = sm.apply_action(&s, &Action::Call);
        assert_eq!(StateKind::Dealer, s.kind);

        let s = sm.progress_stage(&mut rng, &s, Deck::new_without(&s.public_cards)).unwrap();
        assert!(s.player_checks.iter().all(|c| !c));
        assert_eq!(0, s.stage_bet_count);
        assert_eq!(StateKind::Player, s.kind);
    }

    #[test]
    fn test_reset_for_new_round_is_idempotent() {
        let sm = manager();
        let mut s = fresh(2);
        s = sm.apply_action(&s, &Action::Raise(20));
        s = sm.apply_action(&s, &Action::Fold);

        s.reset_for_new_round(1000, true);
        let once = s.clone();
        s.reset_for_new_round(1000, true);

        assert_eq!(once.pot, s.pot);
        assert_eq!(once.player_bets, s.player_bets);
        assert_eq!(once.player_chips, s.player_chips);
        assert_eq!(once.players_in_game, s.players_in_game);
        assert_eq!(once.stage, s.stage);
        assert_eq!(once.public_cards, s.public_cards);
        assert_eq!(once.deck.remaining(), s.deck.remaining());
        assert_eq!(StateKind::Player, s.kind);
    }

    #[test]
    fn test_child_states_at_player_and_dealer_nodes() {
        let mut rng = WyRng::seed_from_u64(13);
        let sm = manager();
        let s = fresh(2);

        let children = sm.child_states(&mut rng, &s, 4).unwrap();
        assert_eq!(sm.legal_actions(&s).len(), children.len());
        assert!(children.iter().all(|(a, _)| a.is_some()));

        let s = sm.apply_action(&s, &Action::Check);
        let s = sm.apply_action(&s, &Action::Check);
        assert_eq!(StateKind::Dealer, s.kind);
        let children = sm.child_states(&mut rng, &s, 4).unwrap();
        assert_eq!(4, children.len());
        for (action, child) in &children {
            assert!(action.is_none());
            assert_eq!(3, child.public_cards.len());
        }
    }
}
