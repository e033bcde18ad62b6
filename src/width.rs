//! Element width computation and masking primitives

use crate::MAX_BITS_PER_ELEMENT;

/// Number of bits needed to represent `n`
///
/// Returns `floor(log2(n)) + 1` for `n >= 1`. A zero maximum degenerates the
/// scheme but still costs one bit per element, so `bit_length(0) == 1` and a
/// warning is emitted.
#[inline]
pub fn bit_length(n: u64) -> u8 {
    if n == 0 {
        tracing::warn!("maximum input number is zero");
        return 1;
    }
    significant_bits(n)
}

/// Bit length of a value being stored; zero counts as one bit, silently
#[inline]
pub(crate) fn significant_bits(n: u64) -> u8 {
    if n == 0 {
        1
    } else {
        MAX_BITS_PER_ELEMENT - n.leading_zeros() as u8
    }
}

/// Keep only the `n` lowest bits of `value`
#[inline]
pub fn low_bits(value: u64, n: u8) -> u64 {
    if n >= MAX_BITS_PER_ELEMENT {
        value
    } else {
        value & ((1u64 << n) - 1)
    }
}

/// Whether `bits` is a usable element width
#[inline]
pub const fn is_valid_width(bits: u8) -> bool {
    bits >= 1 && bits <= MAX_BITS_PER_ELEMENT
}
