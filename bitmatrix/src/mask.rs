//! Operations on packed bit masks (`&[u64]` cells).
//!
//! Masks combined by the binary operations must have the same number of
//! words; the shorter length wins otherwise.

use crate::BITS_PER_WORD;

/// Number of words needed to hold `bits` flags.
pub fn words_for(bits: usize) -> usize {
    bits.div_ceil(BITS_PER_WORD)
}

pub fn count_bits(mask: &[u64]) -> u32 {
    mask.iter().map(|w| w.count_ones()).sum()
}

pub fn check_bit(mask: &[u64], index: usize) -> bool {
    match mask.get(index / BITS_PER_WORD) {
        Some(word) => word & (1u64 << (index % BITS_PER_WORD)) != 0,
        None => false,
    }
}

/// Sets bit `index`. Returns `true` if the bit was previously clear.
///
/// # Panics
///
/// Panics if `index` lies beyond the mask.
pub fn set_bit(mask: &mut [u64], index: usize) -> bool {
    let word = &mut mask[index / BITS_PER_WORD];
    let flag = 1u64 << (index % BITS_PER_WORD);
    let was_clear = *word & flag == 0;
    *word |= flag;
    was_clear
}

pub fn and(mask1: &[u64], mask2: &[u64]) -> Vec<u64> {
    mask1.iter().zip(mask2).map(|(a, b)| a & b).collect()
}

pub fn or(mask1: &[u64], mask2: &[u64]) -> Vec<u64> {
    mask1.iter().zip(mask2).map(|(a, b)| a | b).collect()
}

/// Number of bits set in both masks.
pub fn overlap_bits(mask1: &[u64], mask2: &[u64]) -> u32 {
    mask1
        .iter()
        .zip(mask2)
        .map(|(a, b)| (a & b).count_ones())
        .sum()
}

/// Indices of all set bits, in ascending order.
pub fn set_indices(mask: &[u64]) -> Vec<usize> {
    let mut out = Vec::with_capacity(count_bits(mask) as usize);
    for (w, &word) in mask.iter().enumerate() {
        let mut rest = word;
        while rest != 0 {
            let bit = rest.trailing_zeros() as usize;
            out.push(w * BITS_PER_WORD + bit);
            rest &= rest - 1;
        }
    }
    out
}
