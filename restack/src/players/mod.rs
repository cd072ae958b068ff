pub mod human;
pub mod hybrid;
pub mod resolve;

pub use self::{
    human::HumanPlayer,
    hybrid::HybridPlayer,
    resolve::ResolvePlayer,
};

use crate::{
    error::Result,
    poker::card::Card,
    state::{
        action::Action,
        manager::GameState,
    },
};

/// A seat at the table. The game manager only ever talks to players
/// through this capability set.
pub trait Player {
    fn name(&self) -> &str;

    fn hole_cards(&self) -> &[Card];

    fn receive_cards(&mut self, cards: Vec<Card>);

    /// Decide on an action for the given public state. An error forfeits
    /// the hand.
    fn get_action(&mut self, state: &GameState) -> Result<Action>;

    /// Observe an applied action, own actions included.
    fn inform_of_action(&mut self, _action: &Action, _actor_seat: usize) {}

    fn prepare_for_new_round(&mut self) {}
}
