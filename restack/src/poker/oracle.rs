use std::{
    fs::{
        self,
        File,
    },
    io::Write,
    path::Path,
    time::{
        Duration,
        Instant,
    },
};

use byteorder::{
    LittleEndian,
    WriteBytesExt,
};
use log::info;
use rand::Rng;

use crate::error::{
    Error,
    Result,
};

use super::{
    card::{
        hole_pair_cards,
        Card,
        Rank,
        Suit,
        HOLE_PAIRS,
    },
    deck::Deck,
    evaluator::HandEvaluator,
};

/// Pairwise showdown outcomes for a fixed public board.
///
/// `get(i, j) == 1` means hole pair `i` beats hole pair `j`; `-1` the
/// reverse; `0` a tie or a pair that conflicts with the board (those rows
/// and columns are zeroed entirely). Antisymmetric with a zero diagonal.
pub struct UtilityMatrix {
    data: Vec<i8>,
}

impl UtilityMatrix {
    pub fn get(&self, i: usize, j: usize) -> i8 {
        self.data[i * HOLE_PAIRS + j]
    }

    /// `v[i] = Σ_j U[i, j] · r[j]`
    pub fn matvec(&self, r: &[f64]) -> Vec<f64> {
        debug_assert_eq!(HOLE_PAIRS, r.len());
        let mut v = vec![0.0; HOLE_PAIRS];
        for (i, vi) in v.iter_mut().enumerate() {
            let row = &self.data[i * HOLE_PAIRS..(i + 1) * HOLE_PAIRS];
            let mut acc = 0.0;
            for (u, rj) in row.iter().zip(r.iter()) {
                acc += *u as f64 * rj;
            }
            *vi = acc;
        }
        v
    }

    /// `v[j] = Σ_i U[i, j] · r[i]`
    pub fn matvec_transposed(&self, r: &[f64]) -> Vec<f64> {
        debug_assert_eq!(HOLE_PAIRS, r.len());
        let mut v = vec![0.0; HOLE_PAIRS];
        for (i, ri) in r.iter().enumerate() {
            if *ri == 0.0 {
                continue;
            }
            let row = &self.data[i * HOLE_PAIRS..(i + 1) * HOLE_PAIRS];
            for (vj, u) in v.iter_mut().zip(row.iter()) {
                *vj += *u as f64 * ri;
            }
        }
        v
    }
}

/// Pre-flop ordering used when the board is empty: pairs first by rank,
/// then unpaired hands by their high card. Lower is stronger, matching the
/// evaluator's rank direction.
fn preflop_strength(c1: Card, c2: Card) -> i32 {
    if c1.rank == c2.rank {
        14 - c1.rank as i32
    } else {
        30 - c1.rank.max(c2.rank) as i32
    }
}

pub fn utility_matrix(evaluator: &HandEvaluator, public_cards: &[Card]) -> Result<UtilityMatrix> {
    if ![0, 3, 4, 5].contains(&public_cards.len()) {
        return Err(Error::InvalidBoardSize(public_cards.len()));
    }

    let mut strengths: Vec<Option<i32>> = Vec::with_capacity(HOLE_PAIRS);
    let mut hand = Vec::with_capacity(2 + public_cards.len());
    for idx in 0..HOLE_PAIRS {
        let (c1, c2) = hole_pair_cards(idx);
        if public_cards.contains(&c1) || public_cards.contains(&c2) {
            strengths.push(None);
            continue;
        }
        let strength = if public_cards.is_empty() {
            preflop_strength(c1, c2)
        } else {
            hand.clear();
            hand.push(c1);
            hand.push(c2);
            hand.extend_from_slice(public_cards);
            evaluator.evaluate(&hand)? as i32
        };
        strengths.push(Some(strength));
    }

    let mut data = vec![0i8; HOLE_PAIRS * HOLE_PAIRS];
    for (i, si) in strengths.iter().enumerate() {
        let Some(si) = si else { continue };
        let row = &mut data[i * HOLE_PAIRS..(i + 1) * HOLE_PAIRS];
        for (j, sj) in strengths.iter().enumerate() {
            let Some(sj) = sj else { continue };
            // Smaller strength wins; i beats j exactly when si < sj.
            row[j] = (sj - si).signum() as i8;
        }
        row[i] = 0;
    }
    Ok(UtilityMatrix {
        data,
    })
}

/// Empirical probability that `hole_cards` beats every opponent at a table
/// of `num_players`, completing the board and opponent hands uniformly at
/// random. Ties count as losses.
pub fn win_probability_rollout<R: Rng>(
    evaluator: &HandEvaluator,
    rng: &mut R,
    hole_cards: &[Card],
    public_cards: &[Card],
    num_players: usize,
    num_rollouts: u32,
) -> Result<f64> {
    if hole_cards.len() != 2 {
        return Err(Error::InvalidHoleSize(hole_cards.len()));
    }
    if public_cards.len() > 5 {
        return Err(Error::InvalidBoardSize(public_cards.len()));
    }

    let mut deck = Deck::new_without(hole_cards);
    deck.remove_cards(public_cards);

    let missing_public = 5 - public_cards.len();
    let mut wins = 0u32;
    for _ in 0..num_rollouts {
        let mut d = deck.clone();
        let mut board = public_cards.to_vec();
        board.append(&mut d.draw(rng, missing_public)?);

        let mut hand = hole_cards.to_vec();
        hand.extend_from_slice(&board);
        let own = evaluator.evaluate(&hand)?;

        let mut won = true;
        for _ in 0..num_players - 1 {
            let mut opponent = d.draw(rng, 2)?;
            opponent.extend_from_slice(&board);
            if evaluator.evaluate(&opponent)? <= own {
                won = false;
                break;
            }
        }
        if won {
            wins += 1;
        }
    }
    Ok(wins as f64 / num_rollouts as f64)
}

/// Index of the winning hand on a full board; lower evaluator rank wins.
pub fn winner(evaluator: &HandEvaluator, hands: &[&[Card]], public_cards: &[Card]) -> Result<usize> {
    let mut best = (0, i16::MAX);
    for (i, hole) in hands.iter().enumerate() {
        let mut hand = hole.to_vec();
        hand.extend_from_slice(public_cards);
        let rank = evaluator.evaluate(&hand)?;
        if rank < best.1 {
            best = (i, rank);
        }
    }
    Ok(best.0)
}

/// Number of strategic pre-flop hand types: 13 pairs + 78 unpaired ranks
/// each suited or offsuit.
pub const HAND_TYPES: usize = 169;

/// Opponent-count columns: the table is generated for 2..=6 seated players.
pub const OPPONENT_COLUMNS: usize = 5;

/// Canonical cheat-sheet row for a hole pair: pairs occupy 0..13 in rank
/// order, then unpaired hands ordered by (low rank, high rank, suited).
pub fn hand_type_index(c1: Card, c2: Card) -> usize {
    let lo = c1.rank.min(c2.rank) as usize;
    let hi = c1.rank.max(c2.rank) as usize;
    if lo == hi {
        return lo - 2;
    }
    let lo_offset: usize = 2 * ((15 - lo)..=12).sum::<usize>();
    let hi_offset = 2 * (hi - lo - 1);
    let suited = (c1.suit == c2.suit) as usize;
    13 + lo_offset + hi_offset + suited
}

/// Representative cards for a cheat-sheet row, inverse of
/// [`hand_type_index`] up to suit isomorphism.
fn hand_type_cards(index: usize) -> (Card, Card) {
    if index < 13 {
        let rank = index as Rank + 2;
        return (Card::new(rank, Suit::Club), Card::new(rank, Suit::Diamond));
    }
    let mut at = 13;
    for lo in 2..=14u8 {
        for hi in lo + 1..=14 {
            for suited in [false, true] {
                if at == index {
                    let suit2 = if suited {
                        Suit::Club
                    } else {
                        Suit::Diamond
                    };
                    return (Card::new(lo, Suit::Club), Card::new(hi, suit2));
                }
                at += 1;
            }
        }
    }
    panic!("Bad hand type index: {}", index);
}

/// Pre-flop win probabilities per hand type and table size, precomputed by
/// Monte-Carlo rollout and persisted as a flat little-endian f64 array.
pub struct CheatSheet {
    table: Vec<f64>,
}

impl CheatSheet {
    pub fn generate<R: Rng>(
        evaluator: &HandEvaluator,
        rng: &mut R,
        num_rollouts: u32,
    ) -> Result<CheatSheet> {
        let mut table = vec![0.0; HAND_TYPES * OPPONENT_COLUMNS];
        let mut timer = Instant::now();
        for index in 0..HAND_TYPES {
            let (c1, c2) = hand_type_cards(index);
            for num_players in 2..2 + OPPONENT_COLUMNS {
                table[index * OPPONENT_COLUMNS + num_players - 2] = win_probability_rollout(
                    evaluator,
                    rng,
                    &[c1, c2],
                    &[],
                    num_players,
                    num_rollouts,
                )?;
            }
            if timer.elapsed() > Duration::from_secs(2) {
                info!("Cheat sheet: {}/{} hand types done", index + 1, HAND_TYPES);
                timer = Instant::now();
            }
        }
        Ok(CheatSheet {
            table,
        })
    }

    /// Win probability for the hole pair at a table of `num_players`.
    pub fn get(&self, hole_cards: &[Card], num_players: usize) -> f64 {
        assert_eq!(2, hole_cards.len());
        let row = hand_type_index(hole_cards[0], hole_cards[1]);
        let col = num_players.clamp(2, 1 + OPPONENT_COLUMNS) - 2;
        self.table[row * OPPONENT_COLUMNS + col]
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut buf = Vec::with_capacity(self.table.len() * 8);
        for v in &self.table {
            buf.write_f64::<LittleEndian>(*v)?;
        }
        File::create(path)?.write_all(&buf)?;
        info!("Wrote cheat sheet to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<CheatSheet> {
        let bytes = fs::read(path)?;
        let expected = HAND_TYPES * OPPONENT_COLUMNS * 8;
        if bytes.len() != expected {
            return Err(Error::MalformedBlob {
                path: path.display().to_string(),
                reason: format!("expected {} bytes, found {}", expected, bytes.len()),
            });
        }
        let table = bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Ok(CheatSheet {
            table,
        })
    }

    pub fn load_or_generate<R: Rng>(
        evaluator: &HandEvaluator,
        rng: &mut R,
        path: &Path,
        num_rollouts: u32,
    ) -> Result<CheatSheet> {
        match CheatSheet::load(path) {
            Ok(sheet) => Ok(sheet),
            Err(e) => {
                info!("No cheat sheet at {} ({}), generating", path.display(), e);
                let sheet = CheatSheet::generate(evaluator, rng, num_rollouts)?;
                if let Err(e) = sheet.save(path) {
                    log::warn!("Failed to persist cheat sheet: {}", e);
                }
                Ok(sheet)
            }
        }
    }
}
