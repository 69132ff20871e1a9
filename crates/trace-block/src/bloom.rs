use std::hash::BuildHasher;

use ahash::RandomState;
use trace_types::{BloomParams, TraceId};

/// Split-block bloom filter keyed on the 16-byte trace-id (spec.md §4.3):
/// "one split-block bloom filter per block ... keyed on the 16-byte
/// trace-id." Layout follows the well-known split-block design: the bit
/// array is divided into 256-bit blocks (eight `u32` words each); a key
/// selects one block from its high hash bits and sets one bit per word from
/// its low hash bits, so a query touches exactly one cache line.
const WORDS_PER_BLOCK: usize = 8;

/// Odd 32-bit constants used to spread a key's hash across the eight words
/// of its block — the same salts used by Parquet's own SBBF implementation,
/// chosen for good bit dispersion.
const SALT: [u32; WORDS_PER_BLOCK] = [
    0x47b6137b, 0x44974d91, 0x8824ad5b, 0xa2b7289d, 0x705495c7, 0x2df1424b, 0x9efc4947, 0x5c6bfb31,
];

/// Fixed seed so a filter rebuilt from its serialized bytes hashes queries
/// the same way the writer hashed inserts — `ahash::RandomState::default()`
/// would reseed per process and silently break every read.
fn hasher() -> RandomState {
    RandomState::with_seeds(0x9e3779b97f4a7c15, 0xbf58476d1ce4e5b9, 0x94d049bb133111eb, 0x2545f4914f6cdd1d)
}

fn block_mask(hash_lo: u32) -> [u32; WORDS_PER_BLOCK] {
    let mut mask = [0u32; WORDS_PER_BLOCK];
    for (word, salt) in mask.iter_mut().zip(SALT.iter()) {
        let bit = (hash_lo.wrapping_mul(*salt)) >> 27;
        *word = 1u32 << bit;
    }
    mask
}

pub struct BloomFilter {
    blocks: Vec<[u32; WORDS_PER_BLOCK]>,
}

impl BloomFilter {
    pub fn new(num_blocks: u32) -> Self {
        Self {
            blocks: vec![[0u32; WORDS_PER_BLOCK]; num_blocks.max(1) as usize],
        }
    }

    /// Computes `BloomParams` for `record_count` rows targeting
    /// `target_false_positive_rate`, using the standard optimal-bits
    /// formula and rounding up to whole 256-bit blocks (spec.md §9: "specify
    /// the target, let the implementation pick the bit-count").
    pub fn params_for(record_count: u64, target_false_positive_rate: f64) -> BloomParams {
        let n = record_count.max(1) as f64;
        let p = target_false_positive_rate.clamp(1e-6, 0.5);
        let optimal_bits = (-(n * p.ln()) / (std::f64::consts::LN_2 * std::f64::consts::LN_2)).ceil();
        let bits_per_block = (WORDS_PER_BLOCK as u32) * 32;
        let num_blocks = ((optimal_bits as u64).div_ceil(bits_per_block as u64)).max(1) as u32;
        BloomParams {
            target_false_positive_rate: p,
            bits_per_block,
            num_blocks,
        }
    }

    pub fn from_params(params: BloomParams) -> Self {
        Self::new(params.num_blocks)
    }

    fn block_index(&self, hash: u64) -> usize {
        // Parquet SBBF trick: multiply the high 32 bits by the block count
        // and take the high 32 bits of that product, for a uniform index
        // without a division.
        let hi = (hash >> 32) as u32;
        (((hi as u64) * (self.blocks.len() as u64)) >> 32) as usize
    }

    pub fn insert(&mut self, id: TraceId) {
        let hash = hasher().hash_one(id.0);
        let idx = self.block_index(hash);
        let mask = block_mask(hash as u32);
        let block = &mut self.blocks[idx];
        for (word, bits) in block.iter_mut().zip(mask.iter()) {
            *word |= bits;
        }
    }

    /// Never false-negative (spec.md §8 invariant 5): if `id` was inserted,
    /// this always returns `true`.
    pub fn may_contain(&self, id: TraceId) -> bool {
        let hash = hasher().hash_one(id.0);
        let idx = self.block_index(hash);
        let mask = block_mask(hash as u32);
        let block = &self.blocks[idx];
        block.iter().zip(mask.iter()).all(|(word, bits)| word & bits == *bits)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.blocks.len() * WORDS_PER_BLOCK * 4);
        for block in &self.blocks {
            for word in block {
                out.extend_from_slice(&word.to_le_bytes());
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8], num_blocks: u32) -> Self {
        let mut blocks = vec![[0u32; WORDS_PER_BLOCK]; num_blocks.max(1) as usize];
        for (block, chunk) in blocks.iter_mut().zip(bytes.chunks_exact(WORDS_PER_BLOCK * 4)) {
            for (word, word_bytes) in block.iter_mut().zip(chunk.chunks_exact(4)) {
                *word = u32::from_le_bytes(word_bytes.try_into().expect("4-byte chunk"));
            }
        }
        Self { blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_key_is_always_found() {
        let params = BloomFilter::params_for(10_000, 0.01);
        let mut filter = BloomFilter::from_params(params);
        let ids: Vec<TraceId> = (0u8..200).map(|i| TraceId([i; 16])).collect();
        for id in &ids {
            filter.insert(*id);
        }
        for id in &ids {
            assert!(filter.may_contain(*id), "no false negatives allowed");
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let params = BloomFilter::params_for(1_000, 0.01);
        let mut filter = BloomFilter::from_params(params);
        let id = TraceId([7; 16]);
        filter.insert(id);
        let bytes = filter.to_bytes();
        let reloaded = BloomFilter::from_bytes(&bytes, params.num_blocks);
        assert!(reloaded.may_contain(id));
    }

    #[test]
    fn false_positive_rate_is_roughly_on_target() {
        let params = BloomFilter::params_for(5_000, 0.01);
        let mut filter = BloomFilter::from_params(params);
        let inserted: Vec<TraceId> = (0u32..5_000).map(id_for).collect();
        for id in &inserted {
            filter.insert(*id);
        }
        let mut false_positives = 0;
        let probes = 20_000u32;
        for i in 0..probes {
            let candidate = id_for(i + 10_000_000);
            if filter.may_contain(candidate) {
                false_positives += 1;
            }
        }
        let rate = false_positives as f64 / probes as f64;
        assert!(rate < 0.05, "false positive rate {rate} far exceeds target");
    }

    fn id_for(i: u32) -> TraceId {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&i.to_le_bytes());
        TraceId(bytes)
    }
}
