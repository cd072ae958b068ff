use rand::Rng;

use std::fmt;

use crate::error::{
    Error,
    Result,
};

use super::card::{
    Card,
    DECK_SIZE,
};

/// The remaining deck as a probability distribution over card ids.
///
/// Removed cards carry zero mass; all remaining cards carry equal mass and
/// the distribution sums to 1 while any card is left.
#[derive(Clone)]
pub struct Deck {
    distribution: Vec<f64>,
}

impl Default for Deck {
    fn default() -> Deck {
        Deck::new()
    }
}

impl Deck {
    pub fn new() -> Deck {
        Deck {
            distribution: vec![1.0 / DECK_SIZE as f64; DECK_SIZE],
        }
    }

    pub fn new_without(cards: &[Card]) -> Deck {
        let mut deck = Deck::new();
        deck.remove_cards(cards);
        deck
    }

    pub fn distribution(&self) -> &[f64] {
        &self.distribution
    }

    pub fn remaining(&self) -> usize {
        self.distribution.iter().filter(|p| **p > 0.0).count()
    }

    pub fn contains(&self, card: Card) -> bool {
        self.distribution[card.id()] > 0.0
    }

    pub fn remove_cards(&mut self, cards: &[Card]) {
        for card in cards {
            self.distribution[card.id()] = 0.0;
        }
        self.renormalise();
    }

    fn renormalise(&mut self) {
        let sum: f64 = self.distribution.iter().sum();
        if sum > 0.0 {
            for p in &mut self.distribution {
                *p /= sum;
            }
        }
    }

    /// Draws `n` distinct cards according to the distribution, zeroing them.
    pub fn draw<R: Rng>(&mut self, rng: &mut R, n: usize) -> Result<Vec<Card>> {
        let available = self.remaining();
        if available < n {
            return Err(Error::DeckExhausted {
                requested: n,
                available,
            });
        }

        let mut cards = Vec::with_capacity(n);
        for _ in 0..n {
            let id = self.sample_id(rng);
            cards.push(Card::from_id(id));
            self.distribution[id] = 0.0;
            self.renormalise();
        }
        Ok(cards)
    }

    fn sample_id<R: Rng>(&self, rng: &mut R) -> usize {
        let x: f64 = rng.gen();
        let mut acc = 0.0;
        let mut last_alive = 0;
        for (id, p) in self.distribution.iter().enumerate() {
            if *p <= 0.0 {
                continue;
            }
            last_alive = id;
            acc += p;
            if x < acc {
                return id;
            }
        }
        // Rounding in the cumulative walk can leave acc marginally below 1.
        last_alive
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deck({} cards)", self.remaining())
    }
}
