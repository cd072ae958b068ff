use std::io::{
    self,
    BufRead,
    Write,
};

use crate::{
    error::Result,
    poker::card::{
        cards_to_str,
        Card,
    },
    state::{
        action::Action,
        manager::GameState,
    },
};

use super::Player;

/// Reads actions from stdin: `fold`, `check`, `call`, `allin`, or
/// `raise <amount>`. Re-prompts on anything it cannot parse.
pub struct HumanPlayer {
    name: String,
    hand: Vec<Card>,
}

impl HumanPlayer {
    pub fn new(name: &str) -> HumanPlayer {
        HumanPlayer {
            name: name.to_string(),
            hand: vec![],
        }
    }
}

fn parse_action(line: &str) -> Option<Action> {
    let mut words = line.split_whitespace();
    let action = match words.next()? {
        "fold" | "f" => Action::Fold,
        "check" | "x" => Action::Check,
        "call" | "c" => Action::Call,
        "allin" | "a" => Action::AllIn,
        "raise" | "r" => {
            let amount: i32 = words.next()?.parse().ok()?;
            Action::Raise(amount)
        }
        _ => return None,
    };
    // Trailing junk invalidates the line.
    if words.next().is_some() {
        return None;
    }
    Some(action)
}

impl Player for HumanPlayer {
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
        println!("{}, your hand: {}", self.name, cards_to_str(&self.hand));
        println!("To call: {}", state.call_amount());
        let stdin = io::stdin();
        loop {
            print!("> fold/check/call/allin/raise <amount>: ");
            io::stdout().flush()?;

            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            match parse_action(line.trim()) {
                Some(action) => return Ok(action),
                None => println!("Could not parse '{}'", line.trim()),
            }
        }
    }
}
