use std::{
    char,
    fmt,
    str,
};

pub type Rank = u8;

pub fn rank_ch(r: Rank) -> char {
    match r {
        10 => 'T',
        11 => 'J',
        12 => 'Q',
        13 => 'K',
        14 => 'A',
        x => (b'0' + x).into(),
    }
}

/// Suits in dense-id order: `id = rank_index * 4 + suit`. The evaluator
/// tables key on this layout, so the order is load-bearing.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

pub const SUITS: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];

pub fn suit_ch(s: Suit) -> char {
    match s {
        Suit::Club => 'c',
        Suit::Diamond => 'd',
        Suit::Heart => 'h',
        Suit::Spade => 's',
    }
}

pub const DECK_SIZE: usize = 52;

/// Number of unordered hole-card pairs, C(52, 2).
pub const HOLE_PAIRS: usize = DECK_SIZE * (DECK_SIZE - 1) / 2;

#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        debug_assert!((2..=14).contains(&rank));
        Card {
            rank,
            suit,
        }
    }

    /// Dense identifier in [0, 52): deuce of clubs is 0, ace of spades 51.
    pub fn id(&self) -> usize {
        (self.rank as usize - 2) * 4 + self.suit as usize
    }

    pub fn from_id(id: usize) -> Card {
        assert!(id < DECK_SIZE, "Bad card id: {}", id);
        Card {
            rank: (id / 4 + 2) as Rank,
            suit: SUITS[id % 4],
        }
    }

    pub fn str(&self) -> String {
        let mut s = String::with_capacity(2);
        s.push(rank_ch(self.rank));
        s.push(suit_ch(self.suit));
        s
    }
}

impl str::FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 {
            return Err(format!("Bad card: {}", s));
        }

        let mut cs = s.chars();
        let rank = cs.next().unwrap();
        let suit = cs.next().unwrap();
        let rank = match rank {
            'T' => 10,
            'J' => 11,
            'Q' => 12,
            'K' => 13,
            'A' => 14,
            x => {
                if !char::is_digit(x, 10) || x < '2' {
                    return Err(format!("Bad rank: {}", s));
                }
                x as u8 - b'0'
            }
        };
        let suit = match suit {
            'c' => Suit::Club,
            'd' => Suit::Diamond,
            'h' => Suit::Heart,
            's' => Suit::Spade,
            _ => return Err(format!("Bad suit: {}", s)),
        };
        Ok(Card {
            rank,
            suit,
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.str())
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.str())
    }
}

pub fn cards_to_str(cards: &[Card]) -> String {
    let mut s = "".to_string();
    for card in cards.iter() {
        s.push_str(&card.to_string());
    }
    s
}

pub fn parse_cards(s: &str) -> Vec<Card> {
    let s = s.replace(' ', "");
    let s = s.replace(',', "");

    assert_eq!(s.len() % 2, 0, "Given string is {}", s);

    let mut cards: Vec<Card> = Vec::default();
    let mut i = 0;
    let size = s.len();
    while i < size {
        let cs: &str = &s[i..i + 2];
        cards.push(cs.parse().unwrap());
        i += 2
    }
    cards
}

/// Index of the unordered pair {i, j} of card ids, i < j, in [0, 1326).
/// Pairs are laid out row by row: (0,1), (0,2), …, (0,51), (1,2), …
pub fn hole_pair_index(i: usize, j: usize) -> usize {
    assert!(i < j && j < DECK_SIZE, "Bad hole pair: ({}, {})", i, j);
    let n = DECK_SIZE;
    n * (n - 1) / 2 - (n - i) * (n - i - 1) / 2 + j - i - 1
}

/// Inverse of [`hole_pair_index`].
pub fn hole_pair_ids(idx: usize) -> (usize, usize) {
    assert!(idx < HOLE_PAIRS, "Bad hole pair index: {}", idx);
    let n = DECK_SIZE;
    let mut row_start = 0;
    for i in 0..n - 1 {
        let row_len = n - 1 - i;
        if idx < row_start + row_len {
            return (i, i + 1 + idx - row_start);
        }
        row_start += row_len;
    }
    unreachable!()
}

pub fn hole_pair_cards(idx: usize) -> (Card, Card) {
    let (i, j) = hole_pair_ids(idx);
    (Card::from_id(i), Card::from_id(j))
}

pub fn hole_pair_index_of(c1: Card, c2: Card) -> usize {
    let (a, b) = (c1.id(), c2.id());
    if a < b {
        hole_pair_index(a, b)
    } else {
        hole_pair_index(b, a)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_id_round_trip() {
        for id in 0..DECK_SIZE {
            assert_eq!(id, Card::from_id(id).id());
        }
        assert_eq!(0, "2c".parse::<Card>().unwrap().id());
        assert_eq!(51, "As".parse::<Card>().unwrap().id());
    }

    #[test]
    fn test_parse_and_display() {
        for s in ["Ah", "Td", "2c", "Ks", "9d"] {
            let card: Card = s.parse().unwrap();
            assert_eq!(s, card.to_string());
        }
        assert!("1h".parse::<Card>().is_err());
        assert!("Ax".parse::<Card>().is_err());
        assert!("Ahh".parse::<Card>().is_err());

        let cards = parse_cards("Ah Td, 2c");
        assert_eq!(3, cards.len());
        assert_eq!("AhTd2c", cards_to_str(&cards));
    }

    #[test]
    fn test_hole_pair_bijection() {
        let mut expected = 0;
        for i in 0..DECK_SIZE {
            for j in i + 1..DECK_SIZE {
                let idx = hole_pair_index(i, j);
                assert_eq!(expected, idx);
                assert_eq!((i, j), hole_pair_ids(idx));
                expected += 1;
            }
        }
        assert_eq!(HOLE_PAIRS, expected);
    }

    #[test]
    fn test_hole_pair_index_of_is_symmetric() {
        let a: Card = "Jh".parse().unwrap();
        let b: Card = "9c".parse().unwrap();
        assert_eq!(hole_pair_index_of(a, b), hole_pair_index_of(b, a));
    }
}
