use std::rc::Rc;

use crate::{
    poker::{
        card::HOLE_PAIRS,
        oracle::UtilityMatrix,
    },
    state::{
        action::{
            Action,
            AGENT_ACTIONS_LEN,
        },
        manager::{
            GameState,
            Stage,
        },
    },
};

/// Row-major 1326 × |actions| matrix holding per-hand strategies or
/// regrets.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionMatrix {
    data: Vec<f64>,
}

impl ActionMatrix {
    pub fn zeros() -> ActionMatrix {
        ActionMatrix {
            data: vec![0.0; HOLE_PAIRS * AGENT_ACTIONS_LEN],
        }
    }

    /// Every row the uniform distribution over actions.
    pub fn uniform() -> ActionMatrix {
        ActionMatrix {
            data: vec![1.0 / AGENT_ACTIONS_LEN as f64; HOLE_PAIRS * AGENT_ACTIONS_LEN],
        }
    }

    pub fn row(&self, hand: usize) -> &[f64] {
        &self.data[hand * AGENT_ACTIONS_LEN..(hand + 1) * AGENT_ACTIONS_LEN]
    }

    pub fn row_mut(&mut self, hand: usize) -> &mut [f64] {
        &mut self.data[hand * AGENT_ACTIONS_LEN..(hand + 1) * AGENT_ACTIONS_LEN]
    }

    pub fn get(&self, hand: usize, action: usize) -> f64 {
        self.data[hand * AGENT_ACTIONS_LEN + action]
    }

    pub fn add(&mut self, hand: usize, action: usize, delta: f64) {
        self.data[hand * AGENT_ACTIONS_LEN + action] += delta;
    }

    pub fn set(&mut self, hand: usize, action: usize, value: f64) {
        self.data[hand * AGENT_ACTIONS_LEN + action] = value;
    }

    pub fn column(&self, action: usize) -> Vec<f64> {
        (0..HOLE_PAIRS).map(|h| self.get(h, action)).collect()
    }

    pub fn column_sum(&self, action: usize) -> f64 {
        (0..HOLE_PAIRS).map(|h| self.get(h, action)).sum()
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn add_assign(&mut self, other: &ActionMatrix) {
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.data {
            *v *= factor;
        }
    }
}

/// How a node is valued during traversal. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Full board reached; valued exactly through the utility matrix.
    Showdown,
    /// Depth horizon; valued by the stage's value network.
    Terminal,
    /// The dealer reveals cards; valued by averaging sampled deals.
    Chance,
    /// A player acts; valued by mixing child values with the strategy.
    Player,
    /// Everyone else folded.
    Won,
}

/// One public node of the re-solve tree. Parent owns children; the tree
/// only grows during traversal and is dropped when the resolve returns.
pub struct SubtreeNode {
    pub stage: Stage,
    pub state: GameState,
    /// Actions taken within the node's stage; resets when a street deals.
    pub depth: u32,
    pub kind: NodeKind,
    pub strategy: ActionMatrix,
    pub regrets: ActionMatrix,
    pub utility: Rc<UtilityMatrix>,
    /// Counterfactual values from the latest rollout, `[v1, v2]`.
    pub values: [Vec<f64>; 2],
    pub children: Vec<(Option<Action>, SubtreeNode)>,
}

impl SubtreeNode {
    pub fn new(
        state: GameState,
        depth: u32,
        kind: NodeKind,
        strategy: ActionMatrix,
        regrets: ActionMatrix,
        utility: Rc<UtilityMatrix>,
        values: [Vec<f64>; 2],
    ) -> SubtreeNode {
        SubtreeNode {
            stage: state.stage,
            state,
            depth,
            kind,
            strategy,
            regrets,
            utility,
            values,
            children: vec![],
        }
    }

    /// Indented tree outline for debug logs.
    pub fn dump(&self, level: usize) -> String {
        let mut s = format!("{}{:?} ({}, depth {})\n", "\t".repeat(level), self.kind, self.stage, self.depth);
        for (action, child) in &self.children {
            match action {
                Some(a) => s.push_str(&format!("{}{} ->\n", "\t".repeat(level + 1), a)),
                None => s.push_str(&format!("{}deal ->\n", "\t".repeat(level + 1))),
            }
            s.push_str(&child.dump(level + 1));
        }
        s
    }
}
