//! Bit cursors for MSB-first, gap-free element packing
//!
//! [`BitWriter`] appends fixed-width elements to a growing byte buffer. Every
//! new byte starts zeroed and is only ever combined into with bitwise OR, so
//! the byte under the cursor always holds its written bits in the high-order
//! positions and zeros below them.
//!
//! [`BitReader`] mirrors the cursor on the decode side, pulling bytes from any
//! [`std::io::Read`] source one block at a time.

use std::io::{ErrorKind, Read};

use crate::error::Result;
use crate::width::low_bits;
use crate::BLOCK_SIZE;

/// Bit-level writer over an owned byte buffer
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    free_bits: u8,
}

impl BitWriter {
    /// Create an empty writer
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer whose buffer starts with already finalized bytes
    #[inline]
    pub fn with_prefix(prefix: &[u8], capacity: usize) -> Self {
        let mut bytes = Vec::with_capacity(prefix.len() + capacity);
        bytes.extend_from_slice(prefix);
        Self {
            bytes,
            free_bits: 0,
        }
    }

    /// Append the `width` lowest bits of `element`, most significant first
    pub fn put(&mut self, element: u64, width: u8) {
        let mut bits_left = width;
        let mut element = low_bits(element, width);

        while bits_left > 0 {
            if self.free_bits == 0 {
                self.bytes.push(0);
                self.free_bits = 8;
            }
            let last = self.bytes.len() - 1;

            if bits_left > self.free_bits {
                bits_left -= self.free_bits;
                self.bytes[last] |= (element >> bits_left) as u8;
                self.free_bits = 0;
                element = low_bits(element, bits_left);
            } else {
                self.bytes[last] |= (element << (self.free_bits - bits_left)) as u8;
                self.free_bits -= bits_left;
                bits_left = 0;
            }
        }
    }

    /// Reserve room for `elements` more elements of `width` bits
    #[inline]
    pub fn reserve(&mut self, elements: usize, width: u8) {
        self.bytes
            .reserve(elements.saturating_mul(width as usize) / 8 + 1);
    }

    /// Number of bytes that will not be touched by later writes
    #[inline]
    pub fn complete_len(&self) -> usize {
        if self.free_bits == 0 {
            self.bytes.len()
        } else {
            self.bytes.len() - 1
        }
    }

    /// Remove and return all complete bytes, keeping a partial byte in place
    #[inline]
    pub fn take_complete(&mut self) -> Vec<u8> {
        let complete = self.complete_len();
        let rest = self.bytes.split_off(complete);
        std::mem::replace(&mut self.bytes, rest)
    }

    /// Free low-order bits in the byte under the cursor
    #[inline]
    pub fn free_bits(&self) -> u8 {
        self.free_bits
    }

    /// Everything written so far, including a trailing partial byte
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the writer and return its buffer
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Bit-level reader over a pull-based byte source
#[derive(Debug)]
pub struct BitReader<R> {
    source: R,
    block: Vec<u8>,
    len: usize,
    pos: usize,
    current: u8,
    unread_bits: u8,
}

impl<R: Read> BitReader<R> {
    /// Create a reader that pulls [`BLOCK_SIZE`] bytes at a time
    #[inline]
    pub fn new(source: R) -> Self {
        Self::with_block_size(source, BLOCK_SIZE)
    }

    /// Create a reader with a custom block size (at least one byte)
    #[inline]
    pub fn with_block_size(source: R, block_size: usize) -> Self {
        Self {
            source,
            block: vec![0u8; block_size.max(1)],
            len: 0,
            pos: 0,
            current: 0,
            unread_bits: 0,
        }
    }

    /// Read whole bytes into `buf`, returning how many were available
    ///
    /// Only meaningful while the cursor is byte-aligned (before any call to
    /// [`BitReader::read_bits`]).
    pub fn read_aligned(&mut self, buf: &mut [u8]) -> Result<usize> {
        debug_assert_eq!(self.unread_bits, 0);
        for (filled, slot) in buf.iter_mut().enumerate() {
            match self.next_byte()? {
                Some(byte) => *slot = byte,
                None => return Ok(filled),
            }
        }
        Ok(buf.len())
    }

    /// Read one `width`-bit element, or `None` if the source ran dry first
    pub fn read_bits(&mut self, width: u8) -> Result<Option<u64>> {
        let mut value = 0u64;
        let mut bits_left = width;

        while bits_left > 0 {
            if self.unread_bits == 0 {
                match self.next_byte()? {
                    Some(byte) => {
                        self.current = byte;
                        self.unread_bits = 8;
                    }
                    None => return Ok(None),
                }
            }

            let take = bits_left.min(self.unread_bits);
            let shift = self.unread_bits - take;
            let chunk = (self.current >> shift) & (((1u16 << take) - 1) as u8);
            value = (value << take) | chunk as u64;

            self.unread_bits -= take;
            bits_left -= take;
        }

        Ok(Some(value))
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.pos >= self.len && !self.refill()? {
            return Ok(None);
        }
        let byte = self.block[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    fn refill(&mut self) -> Result<bool> {
        loop {
            match self.source.read(&mut self.block) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.len = n;
                    self.pos = 0;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
