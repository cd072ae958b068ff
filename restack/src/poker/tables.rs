use std::{
    collections::HashMap,
    fs::{
        self,
        File,
    },
    io::Write,
    path::Path,
};

use byteorder::{
    LittleEndian,
    WriteBytesExt,
};
use iota::iota;
use itertools::Itertools;
use log::{
    info,
    warn,
};

use crate::error::{
    Error,
    Result,
};

use super::hash::{
    QuinaryHash,
    RANK_COUNT,
};

use super::card::Rank;

/// Number of distinct five-card hand strengths. Canonical ranks run
/// 1..=7462 with 1 the strongest.
pub const HAND_CLASSES: usize = 7462;

pub const FLUSH_LEN: usize = 1 << RANK_COUNT;

/// One bit triplet per suit so that summing over at most 7 cards never
/// carries between suits.
const SUIT_BITS: [u16; 4] = [0x1, 0x8, 0x40, 0x200];
const SUITS_LEN: usize = 7 * 0x200 + 1;

/*
 * Reference score of a 5-card hand, used only while generating the tables.
 * Layout mirrors the canonical comparison order:
 *     <category> <rank> * 5
 * with 4 bits per rank and the decisive cards at the MSB end. For the
 * 5-high straight the ace sits at the LSB.
 */
const RANK_SIZE_BITS: u32 = 4;
const CATEGORY_SHIFT: u32 = RANK_SIZE_BITS * 5;

type Category = u32;
iota! {
    const HIGH_CARD: Category = (iota + 1) << CATEGORY_SHIFT;
        , ONE_PAIR
        , TWO_PAIR
        , THREE_OF_A_KIND
        , STRAIGHT
        , FLUSH
        , FULL_HOUSE
        , FOUR_OF_A_KIND
        , STRAIGHT_FLUSH
}

fn pack(category: Category, ranks: &[Rank]) -> u32 {
    debug_assert_eq!(5, ranks.len());
    let mut value = category;
    let mut shift = RANK_SIZE_BITS * 5;
    for rank in ranks {
        shift -= RANK_SIZE_BITS;
        value |= u32::from(*rank) << shift;
    }
    value
}

/// Detects a straight over 5 distinct ranks sorted descending; returns the
/// packed kicker layout (ace low for the wheel).
fn straight_ranks(sorted: &[Rank]) -> Option<[Rank; 5]> {
    if sorted.len() != 5 {
        return None;
    }
    if sorted[0] - sorted[4] == 4 {
        return Some([sorted[0], sorted[1], sorted[2], sorted[3], sorted[4]]);
    }
    // The wheel: distinct descending ranks A 5 4 3 2, ace counted low.
    if sorted[0] == 14 && sorted[1] == 5 && sorted[4] == 2 {
        return Some([5, 4, 3, 2, 14]);
    }
    None
}

/// Scores five ranks (with or without a shared suit) into a comparable
/// value; greater is stronger.
fn score_five(ranks: &[Rank], flush: bool) -> u32 {
    debug_assert_eq!(5, ranks.len());

    let mut sorted = [0 as Rank; 5];
    sorted.copy_from_slice(ranks);
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    // Rank groups ordered by multiplicity, then by rank.
    let mut groups: Vec<(usize, Rank)> = vec![];
    for &rank in sorted.iter() {
        match groups.last_mut() {
            Some((cnt, r)) if *r == rank => *cnt += 1,
            _ => groups.push((1, rank)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let distinct = groups.len();
    let straight = if distinct == 5 {
        straight_ranks(&sorted)
    } else {
        None
    };

    if flush {
        debug_assert_eq!(5, distinct);
        return match straight {
            Some(s) => pack(STRAIGHT_FLUSH, &s),
            None => pack(FLUSH, &sorted),
        };
    }

    if let Some(s) = straight {
        return pack(STRAIGHT, &s);
    }

    let mut ordered = [0 as Rank; 5];
    let mut at = 0;
    for (cnt, rank) in &groups {
        for _ in 0..*cnt {
            ordered[at] = *rank;
            at += 1;
        }
    }

    let category = match (groups[0].0, distinct) {
        (1, 5) => HIGH_CARD,
        (2, 4) => ONE_PAIR,
        (2, 3) => TWO_PAIR,
        (3, 3) => THREE_OF_A_KIND,
        (3, 2) => FULL_HOUSE,
        (4, 2) => FOUR_OF_A_KIND,
        _ => panic!("Impossible rank grouping: {:?}", groups),
    };
    pack(category, &ordered)
}

/// The immutable evaluator tables. Built once at startup (from blobs or by
/// generation) and shared read-only afterwards.
pub struct EvalTables {
    pub suitbit_by_id: [u16; 52],
    pub binaries_by_id: [u16; 52],
    pub suits: Vec<u8>,
    pub flush: Vec<i16>,
    pub no_flush_5: Vec<i16>,
    pub no_flush_6: Vec<i16>,
    pub no_flush_7: Vec<i16>,
    pub(crate) hash: QuinaryHash,
}

fn suitbit_table() -> [u16; 52] {
    let mut table = [0u16; 52];
    for (id, entry) in table.iter_mut().enumerate() {
        *entry = SUIT_BITS[id % 4];
    }
    table
}

fn binaries_table() -> [u16; 52] {
    let mut table = [0u16; 52];
    for (id, entry) in table.iter_mut().enumerate() {
        *entry = 1 << (id / 4);
    }
    table
}

fn suits_table() -> Vec<u8> {
    let mut table = vec![0u8; SUITS_LEN];
    for c in 0..=7usize {
        for d in 0..=7 - c {
            for h in 0..=7 - c - d {
                for s in 0..=7 - c - d - h {
                    let key = c * 0x1 + d * 0x8 + h * 0x40 + s * 0x200;
                    let counts = [c, d, h, s];
                    for (suit, count) in counts.iter().enumerate() {
                        if *count >= 5 {
                            table[key] = suit as u8 + 1;
                        }
                    }
                }
            }
        }
    }
    table
}

fn all_quinaries(num_cards: usize) -> Vec<[u8; RANK_COUNT]> {
    let mut result = vec![];
    let mut quinary = [0u8; RANK_COUNT];
    fn fill(
        result: &mut Vec<[u8; RANK_COUNT]>,
        quinary: &mut [u8; RANK_COUNT],
        rank: usize,
        remaining: usize,
    ) {
        if rank == RANK_COUNT {
            if remaining == 0 {
                result.push(*quinary);
            }
            return;
        }
        for cnt in 0..=4.min(remaining) {
            quinary[rank] = cnt as u8;
            fill(result, quinary, rank + 1, remaining - cnt);
        }
        quinary[rank] = 0;
    }
    fill(&mut result, &mut quinary, 0, num_cards);
    result
}

fn quinary_to_ranks(quinary: &[u8; RANK_COUNT]) -> Vec<Rank> {
    let mut ranks = vec![];
    for (index, cnt) in quinary.iter().enumerate() {
        for _ in 0..*cnt {
            ranks.push(index as Rank + 2);
        }
    }
    ranks
}

fn mask_to_ranks(mask: usize) -> Vec<Rank> {
    (0..RANK_COUNT).filter(|b| mask & (1 << b) != 0).map(|b| b as Rank + 2).collect()
}

/// Best non-flush score over all five-card sub-hands.
fn best_score(ranks: &[Rank], flush: bool) -> u32 {
    if ranks.len() == 5 {
        return score_five(ranks, flush);
    }
    ranks
        .iter()
        .copied()
        .combinations(5)
        .map(|hand| score_five(&hand, flush))
        .max()
        .expect("at least one 5-card sub-hand")
}

impl EvalTables {
    /// Builds every table from first principles: enumerate the 6175
    /// no-flush and 1287 flush five-card classes, order them, then fill the
    /// perfect-hash spaces with the best-five canonical rank.
    pub fn generate() -> EvalTables {
        let start = std::time::Instant::now();
        let hash = QuinaryHash::new();

        let mut scores: Vec<u32> = vec![];
        for quinary in all_quinaries(5) {
            scores.push(score_five(&quinary_to_ranks(&quinary), false));
        }
        for ranks in (2..=14).map(|r| r as Rank).combinations(5) {
            scores.push(score_five(&ranks, true));
        }
        scores.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(HAND_CLASSES, scores.len());

        let mut rank_of: HashMap<u32, i16> = HashMap::with_capacity(HAND_CLASSES);
        for (i, score) in scores.iter().enumerate() {
            let previous = rank_of.insert(*score, i as i16 + 1);
            assert!(previous.is_none(), "duplicate hand class score {:#x}", score);
        }

        let mut flush = vec![0i16; FLUSH_LEN];
        for (mask, entry) in flush.iter_mut().enumerate() {
            let bits = mask.count_ones();
            if (5..=7).contains(&bits) {
                *entry = rank_of[&best_score(&mask_to_ranks(mask), true)];
            }
        }

        let mut no_flush = [vec![], vec![], vec![]];
        for (i, table) in no_flush.iter_mut().enumerate() {
            let num_cards = i + 5;
            *table = vec![0i16; hash.space(num_cards)];
            for quinary in all_quinaries(num_cards) {
                let ranks = quinary_to_ranks(&quinary);
                table[hash.hash(&quinary, num_cards)] = rank_of[&best_score(&ranks, false)];
            }
        }
        let [no_flush_5, no_flush_6, no_flush_7] = no_flush;

        info!(
            "Generated evaluator tables in {}",
            humantime::format_duration(start.elapsed())
        );

        EvalTables {
            suitbit_by_id: suitbit_table(),
            binaries_by_id: binaries_table(),
            suits: suits_table(),
            flush,
            no_flush_5,
            no_flush_6,
            no_flush_7,
            hash,
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        write_u16_blob(&dir.join("suitbits.bin"), &self.suitbit_by_id)?;
        write_u16_blob(&dir.join("binaries.bin"), &self.binaries_by_id)?;
        fs::write(dir.join("suits.bin"), &self.suits)?;
        write_i16_blob(&dir.join("flush.bin"), &self.flush)?;
        write_i16_blob(&dir.join("no_flush_5.bin"), &self.no_flush_5)?;
        write_i16_blob(&dir.join("no_flush_6.bin"), &self.no_flush_6)?;
        write_i16_blob(&dir.join("no_flush_7.bin"), &self.no_flush_7)?;
        info!("Wrote evaluator tables to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<EvalTables> {
        let hash = QuinaryHash::new();

        let mut suitbit_by_id = [0u16; 52];
        suitbit_by_id.copy_from_slice(&read_u16_blob(&dir.join("suitbits.bin"), 52)?);
        let mut binaries_by_id = [0u16; 52];
        binaries_by_id.copy_from_slice(&read_u16_blob(&dir.join("binaries.bin"), 52)?);

        let suits_path = dir.join("suits.bin");
        let suits = fs::read(&suits_path)?;
        if suits.len() != SUITS_LEN {
            return Err(blob_error(&suits_path, SUITS_LEN, suits.len()));
        }

        let tables = EvalTables {
            suitbit_by_id,
            binaries_by_id,
            suits,
            flush: read_i16_blob(&dir.join("flush.bin"), FLUSH_LEN)?,
            no_flush_5: read_i16_blob(&dir.join("no_flush_5.bin"), hash.space(5))?,
            no_flush_6: read_i16_blob(&dir.join("no_flush_6.bin"), hash.space(6))?,
            no_flush_7: read_i16_blob(&dir.join("no_flush_7.bin"), hash.space(7))?,
            hash,
        };
        info!("Loaded evaluator tables from {}", dir.display());
        Ok(tables)
    }

    pub fn load_or_generate(dir: &Path) -> EvalTables {
        match EvalTables::load(dir) {
            Ok(tables) => tables,
            Err(e) => {
                info!("No evaluator tables at {} ({}), generating", dir.display(), e);
                let tables = EvalTables::generate();
                if let Err(e) = tables.save(dir) {
                    warn!("Failed to persist evaluator tables: {}", e);
                }
                tables
            }
        }
    }
}

fn blob_error(path: &Path, expected: usize, actual: usize) -> Error {
    Error::MalformedBlob {
        path: path.display().to_string(),
        reason: format!("expected {} entries, found {}", expected, actual),
    }
}

fn write_i16_blob(path: &Path, data: &[i16]) -> Result<()> {
    let mut f = File::create(path)?;
    let mut buf = Vec::with_capacity(data.len() * 2);
    for v in data {
        buf.write_i16::<LittleEndian>(*v)?;
    }
    f.write_all(&buf)?;
    Ok(())
}

fn write_u16_blob(path: &Path, data: &[u16]) -> Result<()> {
    let mut f = File::create(path)?;
    let mut buf = Vec::with_capacity(data.len() * 2);
    for v in data {
        buf.write_u16::<LittleEndian>(*v)?;
    }
    f.write_all(&buf)?;
    Ok(())
}

fn read_i16_blob(path: &Path, expected: usize) -> Result<Vec<i16>> {
    let bytes = fs::read(path)?;
    if bytes.len() != expected * 2 {
        return Err(blob_error(path, expected, bytes.len() / 2));
    }
    Ok(bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect())
}

fn read_u16_blob(path: &Path, expected: usize) -> Result<Vec<u16>> {
    let bytes = fs::read(path)?;
    if bytes.len() != expected * 2 {
        return Err(blob_error(path, expected, bytes.len() / 2));
    }
    Ok(bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
}
