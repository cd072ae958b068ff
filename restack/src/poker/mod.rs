pub mod card;
pub mod deck;
pub mod evaluator;
pub mod hash;
pub mod oracle;
pub mod tables;

pub use self::{
    card::*,
    deck::*,
    evaluator::*,
    oracle::*,
    tables::EvalTables,
};
