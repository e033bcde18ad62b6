//! Codec configuration shared by encoders and decoders

use crate::error::{Error, Result};
use crate::width::{bit_length, significant_bits};
use crate::DELIMITER;

/// Immutable configuration of one encoded unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Declared upper bound on input values (soft limit)
    pub max_value: u64,
    /// Elements per sequence; 0 selects delimiter mode
    pub sequence_length: u32,
    /// Whether stored values are shifted by +1 to free the delimiter
    pub contains_zero: bool,
    effective_max: u64,
    bits_per_element: u8,
}

impl CodecConfig {
    /// Create a configuration for batch encoding
    pub fn batch(max_value: u64, sequence_length: u32, contains_zero: bool) -> Result<Self> {
        let effective_max = if contains_zero {
            max_value.checked_add(1).ok_or(Error::InvalidConfiguration(
                "maximum value overflows when remapping zero",
            ))?
        } else {
            max_value
        };

        Ok(Self {
            max_value,
            sequence_length,
            contains_zero,
            effective_max,
            bits_per_element: bit_length(effective_max),
        })
    }

    /// Create a delimiter-mode batch configuration
    #[inline]
    pub fn delimited(max_value: u64, contains_zero: bool) -> Result<Self> {
        Self::batch(max_value, 0, contains_zero)
    }

    /// Create a stream configuration (always delimiter-terminated)
    #[inline]
    pub fn stream(max_value: u64, contains_zero: bool) -> Result<Self> {
        Self::batch(max_value, 0, contains_zero)
    }

    /// Width of every packed element
    #[inline]
    pub const fn bits_per_element(&self) -> u8 {
        self.bits_per_element
    }

    /// Maximum after remapping
    #[inline]
    pub const fn effective_max(&self) -> u64 {
        self.effective_max
    }

    /// Whether sequences are delimiter-terminated
    #[inline]
    pub const fn is_delimited(&self) -> bool {
        self.sequence_length == 0
    }

    /// Map an input value to its stored representation
    ///
    /// A value whose remapped form does not fit in 64 bits is over the
    /// maximum too: it is logged like any other overflow, then rejected.
    #[inline]
    pub fn remap(&self, value: u64) -> Result<u64> {
        if !self.contains_zero {
            return Ok(value);
        }
        value.checked_add(1).ok_or_else(|| {
            tracing::warn!(
                value,
                max_value = self.effective_max,
                "trying to store value above the declared maximum"
            );
            Error::ValueTooLarge {
                value,
                bits: self.bits_per_element,
            }
        })
    }

    /// Map a stored value back to the input domain
    #[inline]
    pub fn unmap(&self, raw: u64) -> u64 {
        unmap(raw, self.contains_zero)
    }

    /// Remap `value` and reject it if it would read back as the delimiter
    #[inline]
    pub fn remap_non_delimiter(&self, value: u64) -> Result<u64> {
        let stored = self.remap(value)?;
        if stored == DELIMITER {
            return Err(Error::ReservedValueUsed { value });
        }
        Ok(stored)
    }

    /// Apply the overflow policy to a stored value
    ///
    /// Returns `Ok(true)` when the value exceeds the declared maximum but still
    /// fits the element width (a warning has been emitted), `Ok(false)` when it
    /// is within bounds.
    pub fn check_stored(&self, stored: u64) -> Result<bool> {
        if stored <= self.effective_max {
            return Ok(false);
        }

        tracing::warn!(
            value = stored,
            max_value = self.effective_max,
            "trying to store value above the declared maximum"
        );
        if significant_bits(stored) > self.bits_per_element {
            return Err(Error::ValueTooLarge {
                value: stored,
                bits: self.bits_per_element,
            });
        }
        Ok(true)
    }
}

/// Map a decoded raw value back to the input domain
#[inline]
pub const fn unmap(raw: u64, contains_zero: bool) -> u64 {
    if contains_zero {
        raw.saturating_sub(1)
    } else {
        raw
    }
}
