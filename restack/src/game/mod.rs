use std::rc::Rc;

use log::{
    info,
    warn,
};
use rand::SeedableRng;
use wyhash::WyRng;

use crate::{
    config::PokerConfig,
    error::Result,
    players::Player,
    poker::{
        card::{
            cards_to_str,
            Card,
        },
        oracle,
    },
    state::{
        action::Action,
        manager::{
            GameState,
            Stage,
            StateKind,
            StateManager,
        },
    },
    Assets,
};

/// Runs hands of limit hold'em between 2 to 6 seated players: blinds,
/// betting, dealing, showdown and chip accounting. Player failures and
/// illegal actions forfeit the hand as a fold.
pub struct Table {
    assets: Rc<Assets>,
    states: StateManager,
    players: Vec<Box<dyn Player>>,
    state: GameState,
    small_blind_seat: usize,
    big_blind_seat: usize,
    stats: Vec<i64>,
    show_private_info: bool,
    rng: WyRng,
}

impl Table {
    pub fn new(
        assets: Rc<Assets>,
        players: Vec<Box<dyn Player>>,
        show_private_info: bool,
        seed: u64,
    ) -> Table {
        assert!(
            (2..=6).contains(&players.len()),
            "A table seats 2 to 6 players, got {}",
            players.len()
        );
        let n = players.len();
        let states = assets.state_manager();
        let state = GameState::new(n, assets.config.poker.starting_chips);
        Table {
            assets,
            states,
            players,
            state,
            small_blind_seat: 1 % n,
            big_blind_seat: 2 % n,
            stats: vec![0; n],
            show_private_info,
            rng: WyRng::seed_from_u64(seed),
        }
    }

    pub fn play(&mut self, rounds: u32) -> Result<()> {
        for round in 1..=rounds {
            println!("\n{}", "-".repeat(24));
            println!("Round {}", round);
            self.play_hand()?;

            let n = self.players.len();
            self.small_blind_seat = (self.small_blind_seat + 1) % n;
            self.big_blind_seat = (self.big_blind_seat + 1) % n;

            if let Some(bust) = self.state.player_chips.iter().position(|c| *c <= 0) {
                println!("{} is out of chips!", self.players[bust].name());
                break;
            }
        }
        self.print_stats();
        Ok(())
    }

    fn play_hand(&mut self) -> Result<()> {
        let poker = self.assets.config.poker.clone();
        self.state.reset_for_new_round(poker.starting_chips, poker.redistribute_chips);
        for player in &mut self.players {
            player.prepare_for_new_round();
        }

        self.claim_blinds(&poker);
        self.deal_hole_cards()?;

        loop {
            self.display();
            match self.state.kind {
                StateKind::Winner => {
                    let seat = self.state.winner_index.expect("winner states record a seat");
                    self.award_pot(seat);
                    return Ok(());
                }
                StateKind::Dealer => {
                    println!("Dealing...");
                    self.state =
                        self.states.progress_stage(&mut self.rng, &self.state, self.state.deck.clone())?;
                    continue;
                }
                StateKind::Player => {}
            }
            if self.state.stage == Stage::Showdown {
                return self.showdown();
            }

            let seat = self.state.current_player_index;
            let action = if self.state.players_all_in[seat] {
                // All-in players are walked through the remaining streets.
                Action::Check
            } else {
                match self.players[seat].get_action(&self.state) {
                    Ok(action) => action,
                    Err(e) => {
                        warn!("{} failed to act ({}), forfeiting", self.players[seat].name(), e);
                        Action::Fold
                    }
                }
            };
            let action = if self.states.legal_actions(&self.state).contains(&action) {
                action
            } else {
                warn!("{} tried an illegal {}, treating it as a fold", self.players[seat].name(), action);
                Action::Fold
            };

            println!("{} plays {}", self.players[seat].name(), action);
            self.state = self.states.apply_action(&self.state, &action);
            for player in &mut self.players {
                player.inform_of_action(&action, seat);
            }
        }
    }

    fn claim_blinds(&mut self, poker: &PokerConfig) {
        info!(
            "Blinds: {} posts {}, {} posts {}",
            self.players[self.small_blind_seat].name(),
            poker.small_blind,
            self.players[self.big_blind_seat].name(),
            poker.big_blind
        );
        self.state = self.states.bet_amount(&self.state, self.small_blind_seat, poker.small_blind);
        self.state = self.states.bet_amount(&self.state, self.big_blind_seat, poker.big_blind);
        self.state.current_player_index = (self.big_blind_seat + 1) % self.players.len();
    }

    fn deal_hole_cards(&mut self) -> Result<()> {
        for i in 0..self.players.len() {
            let cards = self.state.deck.draw(&mut self.rng, 2)?;
            self.players[i].receive_cards(cards);
        }
        Ok(())
    }

    fn showdown(&mut self) -> Result<()> {
        println!("--- Showdown ---");
        let seats: Vec<usize> = (0..self.players.len())
            .filter(|i| self.state.players_in_game[*i])
            .collect();

        let winner_seat = {
            let hands: Vec<&[Card]> =
                seats.iter().map(|s| self.players[*s].hole_cards()).collect();
            let winner = oracle::winner(&self.assets.evaluator, &hands, &self.state.public_cards)?;
            seats[winner]
        };

        for seat in &seats {
            println!(
                "{} shows {}",
                self.players[*seat].name(),
                cards_to_str(self.players[*seat].hole_cards())
            );
        }
        self.award_pot(winner_seat);
        Ok(())
    }

    fn award_pot(&mut self, seat: usize) {
        println!("{} wins the pot of {}", self.players[seat].name(), self.state.pot);
        self.state.player_chips[seat] += self.state.pot;
        self.stats[seat] += self.state.pot as i64;
    }

    fn display(&self) {
        println!();
        print!("{}", self.state.dump());
        if self.show_private_info {
            for player in &self.players {
                println!("  {}: {}", player.name(), cards_to_str(player.hole_cards()));
            }
        }
    }

    fn print_stats(&self) {
        println!("\nGame stats:");
        for (i, player) in self.players.iter().enumerate() {
            println!("  {}: {}", player.name(), self.stats[i]);
        }
    }
}

#[cfg(test)]
mod tests {

    use crate::{
        config::Config,
        net::NetManager,
        players::HybridPlayer,
        poker::{
            evaluator::HandEvaluator,
            oracle::CheatSheet,
            tables::EvalTables,
        },
    };

    use super::*;

    fn test_assets() -> Rc<Assets> {
        let evaluator = HandEvaluator::new(EvalTables::generate());
        let mut rng = WyRng::seed_from_u64(1);
        let cheat_sheet = CheatSheet::generate(&evaluator, &mut rng, 40).unwrap();
        Rc::new(Assets {
            config: Config::default(),
            evaluator,
            nets: NetManager::zero(),
            cheat_sheet,
        })
    }

    #[test]
    fn test_rollout_players_complete_rounds_with_chips_conserved() {
        let assets = test_assets();
        let players: Vec<Box<dyn Player>> = vec![
            Box::new(HybridPlayer::rollout_only("Rollout 1", 0, Rc::clone(&assets), 5)),
            Box::new(HybridPlayer::rollout_only("Rollout 2", 1, Rc::clone(&assets), 6)),
        ];
        let mut table = Table::new(assets, players, false, 42);
        table.play(2).unwrap();

        // Every chip that entered the pot came back out to the winner.
        let total: i32 = table.state.player_chips.iter().sum();
        assert_eq!(2000, total);
        assert!(table.stats.iter().any(|w| *w > 0));
    }

    #[test]
    #[should_panic(expected = "A table seats 2 to 6 players")]
    fn test_table_rejects_a_single_seat() {
        let assets = test_assets();
        let players: Vec<Box<dyn Player>> =
            vec![Box::new(HybridPlayer::rollout_only("Lonely", 0, Rc::clone(&assets), 5))];
        Table::new(assets, players, false, 1);
    }
}
