use std::fmt::{
    self,
    Display,
};

/// A betting action. `Raise` carries the raise amount on top of the call;
/// `AllIn` commits whatever the player has left, so it needs no payload.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Action {
    Fold,
    Call,
    Check,
    AllIn,
    Raise(i32),
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Fold => write!(f, "Fold"),
            Action::Call => write!(f, "Call"),
            Action::Check => write!(f, "Check"),
            Action::AllIn => write!(f, "AllIn"),
            Action::Raise(amount) => write!(f, "Raise({})", amount),
        }
    }
}

/// Size of the fixed action menu agents reason over: fold, call, check,
/// all-in, and one raise per allowed amount.
pub const AGENT_ACTIONS_LEN: usize = 6;

/// The menu in index order. Strategy and regret matrices are indexed by
/// position in this list.
pub fn agent_actions(allowed_raises: [i32; 2]) -> [Action; AGENT_ACTIONS_LEN] {
    [
        Action::Fold,
        Action::Call,
        Action::Check,
        Action::AllIn,
        Action::Raise(allowed_raises[0]),
        Action::Raise(allowed_raises[1]),
    ]
}

/// Column of `action` in the agent menu. Raise amounts must be one of the
/// allowed amounts; use [`nearest_raise`] first for observed free-form
/// raises.
pub fn agent_action_index(action: &Action, allowed_raises: [i32; 2]) -> usize {
    match action {
        Action::Fold => 0,
        Action::Call => 1,
        Action::Check => 2,
        Action::AllIn => 3,
        Action::Raise(amount) => {
            let offset = allowed_raises
                .iter()
                .position(|r| r == amount)
                .unwrap_or_else(|| panic!("Invalid raise amount: {}", amount));
            4 + offset
        }
    }
}

pub fn agent_action_from_index(index: usize, allowed_raises: [i32; 2]) -> Action {
    agent_actions(allowed_raises)[index]
}

/// Snaps an observed raise amount onto the closest allowed amount.
pub fn nearest_raise(amount: i32, allowed_raises: [i32; 2]) -> i32 {
    *allowed_raises
        .iter()
        .min_by_key(|r| (amount - **r).abs())
        .expect("allowed raises are never empty")
}

#[cfg(test)]
mod tests {

    use super::*;

    const RAISES: [i32; 2] = [10, 20];

    #[test]
    fn test_index_round_trip() {
        for (i, action) in agent_actions(RAISES).iter().enumerate() {
            assert_eq!(i, agent_action_index(action, RAISES));
            assert_eq!(*action, agent_action_from_index(i, RAISES));
        }
    }

    #[test]
    #[should_panic(expected = "Invalid raise amount")]
    fn test_off_menu_raise_panics() {
        agent_action_index(&Action::Raise(15), RAISES);
    }

    #[test]
    fn test_nearest_raise() {
        assert_eq!(10, nearest_raise(3, RAISES));
        assert_eq!(10, nearest_raise(14, RAISES));
        assert_eq!(20, nearest_raise(16, RAISES));
        assert_eq!(20, nearest_raise(500, RAISES));
    }
}
