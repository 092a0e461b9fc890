// Draw randomness: seed sources, weighted selection and replay verification
use arrayref::array_ref;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Mutex;

use crate::raffle_state::{DrawRecord, EntryId, Selection};

/// Produces the 32-byte seed each draw runs on
pub trait RandomSource: Send + Sync {
    fn next_seed(&self) -> [u8; 32];
}

/// Operating system entropy, for production draws
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl RandomSource for OsEntropy {
    fn next_seed(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        seed
    }
}

/// Deterministic seed stream, for reproducible tests
pub struct SeededSource {
    rng: Mutex<StdRng>,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededSource {
    fn next_seed(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        match self.rng.lock() {
            Ok(mut rng) => rng.fill_bytes(&mut seed),
            Err(poisoned) => poisoned.into_inner().fill_bytes(&mut seed),
        }
        seed
    }
}

/// Entry taking part in a draw. Its weight is the number of entry numbers it holds.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entry_id: EntryId,
    pub entry_numbers: &'a [u64],
}

impl Candidate<'_> {
    fn weight(&self) -> u64 {
        self.entry_numbers.len() as u64
    }
}

/// Short form of a seed for logs
pub fn seed_fingerprint(seed: &[u8; 32]) -> u64 {
    u64::from_le_bytes(*array_ref![seed, 0, 8])
}

/// Weighted selection without replacement.
///
/// Each event picks one entry number uniformly among those still in the pool;
/// the entry holding it is selected and all of its numbers leave the pool.
/// `candidates` must be in a stable order (ascending entry id) for replays to
/// match.
pub fn weighted_draw(seed: [u8; 32], candidates: &[Candidate<'_>], count: usize) -> Vec<Selection> {
    let mut rng = StdRng::from_seed(seed);
    let mut pool: Vec<Candidate<'_>> = candidates
        .iter()
        .filter(|c| c.weight() > 0)
        .copied()
        .collect();
    let mut total: u64 = pool.iter().map(Candidate::weight).sum();
    let mut selections = Vec::with_capacity(count.min(pool.len()));

    while selections.len() < count && total > 0 {
        let mut ticket = rng.gen_range(0..total);
        let mut index = 0;
        while ticket >= pool[index].weight() {
            ticket -= pool[index].weight();
            index += 1;
        }

        let picked = pool.remove(index);
        total -= picked.weight();
        selections.push(Selection {
            entry_id: picked.entry_id,
            winning_number: picked.entry_numbers[ticket as usize],
        });
    }
    selections
}

/// Replay a recorded draw over the same candidates
pub fn verify_draw(record: &DrawRecord, candidates: &[Candidate<'_>]) -> bool {
    let total: u64 = candidates.iter().map(Candidate::weight).sum();
    total == record.total_weight
        && weighted_draw(record.seed, candidates, record.selections.len()) == record.selections
}
