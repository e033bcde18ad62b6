//! Batch and stream header structures

use crate::error::{Error, Result};
use crate::width::is_valid_width;
use crate::{BATCH_HEADER_SIZE, STREAM_HEADER_SIZE};

/// Batch header (9 bytes, big-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchHeader {
    /// Width of every packed element
    pub bits_per_element: u8,
    /// Elements per sequence; 0 means delimiter mode
    pub sequence_length: u32,
    /// Number of sequences in the batch
    pub sequence_count: u32,
}

impl BatchHeader {
    /// Header size in bytes (fixed)
    pub const SIZE: usize = BATCH_HEADER_SIZE;

    /// Byte offset of the back-patched count field
    pub const COUNT_OFFSET: usize = 5;

    /// Create a new batch header
    #[inline]
    pub fn new(bits_per_element: u8, sequence_length: u32, sequence_count: u32) -> Self {
        Self {
            bits_per_element,
            sequence_length,
            sequence_count,
        }
    }

    /// Whether sequences are delimiter-terminated
    #[inline]
    pub fn is_delimited(&self) -> bool {
        self.sequence_length == 0
    }

    /// Validate header fields
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if !is_valid_width(self.bits_per_element) {
            return Err(Error::InvalidHeader(self.bits_per_element));
        }
        Ok(())
    }

    /// Encode header to bytes
    #[inline]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.bits_per_element;
        buf[1..5].copy_from_slice(&self.sequence_length.to_be_bytes());
        buf[5..9].copy_from_slice(&self.sequence_count.to_be_bytes());
        buf
    }

    /// Decode header from bytes
    #[inline]
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::TruncatedInput);
        }

        let header = Self {
            bits_per_element: buf[0],
            sequence_length: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
            sequence_count: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
        };

        header.validate()?;
        Ok(header)
    }

    /// Overwrite the count field of an already encoded header
    #[inline]
    pub fn patch_count(buf: &mut [u8], sequence_count: u32) -> Result<()> {
        if buf.len() < Self::SIZE {
            return Err(Error::TruncatedInput);
        }
        buf[Self::COUNT_OFFSET..Self::SIZE].copy_from_slice(&sequence_count.to_be_bytes());
        Ok(())
    }
}

/// Stream header (1 byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Width of every packed element
    pub bits_per_element: u8,
}

impl StreamHeader {
    /// Header size in bytes (fixed)
    pub const SIZE: usize = STREAM_HEADER_SIZE;

    /// Encode header to bytes
    #[inline]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        [self.bits_per_element]
    }

    /// Decode header from bytes
    #[inline]
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let bits_per_element = *buf.first().ok_or(Error::TruncatedInput)?;
        if !is_valid_width(bits_per_element) {
            return Err(Error::InvalidHeader(bits_per_element));
        }
        Ok(Self { bits_per_element })
    }
}
