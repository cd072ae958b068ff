use crate::error::{
    Error,
    Result,
};

use super::{
    card::Card,
    hash::RANK_COUNT,
    tables::EvalTables,
};

/// Table-driven 5/6/7-card evaluator. Returns the canonical hand rank in
/// 1..=7462; a smaller rank is a stronger hand.
pub struct HandEvaluator {
    tables: EvalTables,
}

impl HandEvaluator {
    pub fn new(tables: EvalTables) -> HandEvaluator {
        HandEvaluator {
            tables,
        }
    }

    pub fn tables(&self) -> &EvalTables {
        &self.tables
    }

    pub fn evaluate(&self, cards: &[Card]) -> Result<i16> {
        let size = cards.len();
        if !(5..=7).contains(&size) {
            return Err(Error::InvalidHandSize(size));
        }

        let t = &self.tables;
        let suit_hash: usize = cards.iter().map(|c| t.suitbit_by_id[c.id()] as usize).sum();
        let flush_suit = t.suits[suit_hash];
        if flush_suit > 0 {
            let suit = flush_suit as usize - 1;
            let mut binary = 0usize;
            for card in cards {
                if card.suit as usize == suit {
                    binary |= t.binaries_by_id[card.id()] as usize;
                }
            }
            return Ok(t.flush[binary]);
        }

        let mut quinary = [0u8; RANK_COUNT];
        for card in cards {
            quinary[card.id() / 4] += 1;
        }
        let hash = t.hash.hash(&quinary, size);
        let table = match size {
            5 => &t.no_flush_5,
            6 => &t.no_flush_6,
            _ => &t.no_flush_7,
        };
        Ok(table[hash])
    }
}

#[cfg(test)]
mod tests {

    use more_asserts::assert_lt;

    use crate::poker::card::parse_cards;
    use crate::poker::test_support::evaluator;

    use super::*;

    fn rank(s: &str) -> i16 {
        evaluator().evaluate(&parse_cards(s)).unwrap()
    }

    #[test]
    fn test_rejects_bad_hand_sizes() {
        let eval = evaluator();
        for s in ["Ah", "Ah Kh", "Ah Kh Qh Jh", "Ah Kh Qh Jh Th 9h 8h 7h"] {
            match eval.evaluate(&parse_cards(s)) {
                Err(Error::InvalidHandSize(_)) => {}
                other => panic!("Expected InvalidHandSize, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_royal_flush_is_rank_one() {
        assert_eq!(1, rank("Ah Kh Qh Jh Th"));
        assert_eq!(1, rank("Ah Kh Qh Jh Th 2c 3d"));
    }

    #[test]
    fn test_category_ordering() {
        let straight_flush = rank("9h 8h 7h 6h 5h");
        let quads = rank("Ah Ad Ac As Kh");
        let full_house = rank("Ah Ad Ac Ks Kh");
        let flush = rank("Ah Kh 9h 6h 3h");
        let straight = rank("9h 8d 7h 6c 5s");
        let trips = rank("Ah Ad Ac 9s 5h");
        let two_pair = rank("Ah Ad Kc Ks 5h");
        let one_pair = rank("Ah Ad Kc 9s 5h");
        let high_card = rank("Ah Kd Qc 9s 5h");

        // Lower rank is stronger.
        assert_lt!(straight_flush, quads);
        assert_lt!(quads, full_house);
        assert_lt!(full_house, flush);
        assert_lt!(flush, straight);
        assert_lt!(straight, trips);
        assert_lt!(trips, two_pair);
        assert_lt!(two_pair, one_pair);
        assert_lt!(one_pair, high_card);
    }

    #[test]
    fn test_order_invariance() {
        assert_eq!(rank("Ah Kd Qc 9s 5h 3c 2d"), rank("2d 3c 5h 9s Qc Kd Ah"));
        assert_eq!(rank("9h 8h 7h 6h 5h Ad Ac"), rank("Ac Ad 5h 6h 7h 8h 9h"));
    }

    #[test]
    fn test_seven_card_hand_uses_best_five() {
        // The pocket pair is irrelevant next to the board's quads.
        assert_eq!(rank("7d 7s 9s 3c 3d 3h 3s"), rank("8d 8s 9s 3c 3d 3h 3s"));
        // A 6-card flush picks its best five.
        assert_eq!(rank("Ah Kh Qh 9h 6h 3h"), rank("Ah Kh Qh 9h 6h"));
    }

    #[test]
    fn test_wheel_straight_below_six_high() {
        let wheel = rank("5h 4d 3h 2c As");
        let six_high = rank("6h 5d 4h 3c 2s");
        assert_lt!(six_high, wheel);
    }

    #[test]
    fn test_kickers() {
        assert_lt!(rank("Kh Kd Ah 9c 5s"), rank("Kh Kd Qh 9c 5s"));
        assert_lt!(rank("Ah Th 9h 8h 7h"), rank("5h 2h 9h 8h 7h"));
    }
}
