//! Randomness
//!
//! Every random decision in a match (caster classes, obstacle cells, the
//! bot's unit pick) draws from a [`RandomSource`]. Rooms and the offline
//! controller use the seeded [`DeterministicRng`]; tests can script the
//! exact draws with [`ScriptedRng`].

use sha2::{Sha256, Digest};

/// Source of randomness for match setup and the bot.
///
/// Only `next_int` is required; shuffling and choosing are built on it.
pub trait RandomSource {
    /// Random integer in `[0, max)`. Returns 0 when `max` is 0.
    fn next_int(&mut self, max: u32) -> u32;

    /// Random integer in `[min, max]`.
    fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let span = (max - min + 1) as u32;
        min + self.next_int(span) as i32
    }

    /// Fisher-Yates shuffle, from the back.
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let pick = self.next_int((i + 1) as u32) as usize;
            items.swap(i, pick);
        }
    }

    /// Uniform pick, `None` on an empty slice.
    fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let pick = self.next_int(items.len() as u32) as usize;
        items.get(pick)
    }
}

// =============================================================================
// SEEDED GENERATOR
// =============================================================================

/// Xorshift128+ seeded through SplitMix64.
///
/// The same seed yields the same match on every platform.
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    lanes: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Seeded generator.
    pub fn new(seed: u64) -> Self {
        let mut cursor = seed;
        let lanes = [splitmix64(&mut cursor), splitmix64(&mut cursor)];
        // xorshift is stuck at all-zero
        let lanes = if lanes == [0, 0] { [1, 1] } else { lanes };
        Self { lanes }
    }

    /// Next raw 64-bit output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let [a, mut b] = self.lanes;
        let out = a.wrapping_add(b);

        b ^= a;
        self.lanes = [a.rotate_left(24) ^ b ^ (b << 16), b.rotate_left(37)];
        out
    }
}

impl RandomSource for DeterministicRng {
    #[inline]
    fn next_int(&mut self, max: u32) -> u32 {
        match max {
            0 => 0,
            _ => (self.next_u64() % u64::from(max)) as u32,
        }
    }
}

fn splitmix64(cursor: &mut u64) -> u64 {
    *cursor = cursor.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *cursor;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// =============================================================================
// SCRIPTED SOURCE
// =============================================================================

/// Replays a fixed list of draws, cycling when exhausted.
///
/// Each draw is reduced modulo the requested bound, so a script of
/// zeros always picks the first option.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRng {
    draws: Vec<u32>,
    cursor: usize,
}

impl ScriptedRng {
    /// Create a source that replays `draws`.
    pub fn new(draws: Vec<u32>) -> Self {
        Self { draws, cursor: 0 }
    }
}

impl RandomSource for ScriptedRng {
    fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 || self.draws.is_empty() {
            return 0;
        }
        let value = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        value % max
    }
}

// =============================================================================
// ROOM SEEDS
// =============================================================================

/// Derive a room's match seed.
///
/// - `entropy`: unpredictable bytes (clock-derived on the server)
/// - `match_id`: unique per match
/// - `room_id`: the room the match belongs to
pub fn derive_match_seed(entropy: &[u8; 32], match_id: &[u8; 16], room_id: &str) -> u64 {
    let digest = Sha256::new()
        .chain_update(b"ARCANE_SIEGE_SEED_V1")
        .chain_update(entropy)
        .chain_update(match_id)
        .chain_update(room_id.as_bytes())
        .finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}
