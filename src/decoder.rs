//! Batch and stream decoders
//!
//! Both decoders pull bytes lazily from a [`std::io::Read`] source in
//! fixed-size blocks, so a byte slice, a file or a pipe all work the same way.

use std::io::Read;

use crate::bits::BitReader;
use crate::config::unmap;
use crate::error::{Error, Result};
use crate::header::{BatchHeader, StreamHeader};
use crate::DELIMITER;

/// Upper bound on up-front allocation for a fixed-length sequence
const MAX_PREALLOCATED_ELEMENTS: usize = 4096;

/// Decoder for buffers produced by [`crate::BatchEncoder`]
#[derive(Debug)]
pub struct BatchDecoder<R> {
    reader: BitReader<R>,
    header: BatchHeader,
    contains_zero: bool,
    remaining: u32,
}

impl<R: Read> BatchDecoder<R> {
    /// Read and validate the batch header
    ///
    /// `contains_zero` must match the setting the batch was encoded with; it
    /// is not part of the wire format.
    pub fn new(source: R, contains_zero: bool) -> Result<Self> {
        let mut reader = BitReader::new(source);
        let mut buf = [0u8; BatchHeader::SIZE];
        if reader.read_aligned(&mut buf)? < BatchHeader::SIZE {
            return Err(Error::TruncatedInput);
        }
        let header = BatchHeader::decode(&buf)?;

        Ok(Self {
            reader,
            header,
            contains_zero,
            remaining: header.sequence_count,
        })
    }

    /// Decoded batch header
    #[inline]
    pub fn header(&self) -> BatchHeader {
        self.header
    }

    /// Sequences not yet decoded
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Decode the next sequence, or `None` once the declared count is reached
    pub fn next_sequence(&mut self) -> Result<Option<Vec<u64>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let bits = self.header.bits_per_element;
        let sequence = if self.header.is_delimited() {
            let mut sequence = Vec::new();
            loop {
                match self.next_raw(bits)? {
                    DELIMITER => break,
                    raw => sequence.push(unmap(raw, self.contains_zero)),
                }
            }
            sequence
        } else {
            let len = self.header.sequence_length as usize;
            let mut sequence = Vec::with_capacity(len.min(MAX_PREALLOCATED_ELEMENTS));
            for _ in 0..len {
                let raw = self.next_raw(bits)?;
                sequence.push(unmap(raw, self.contains_zero));
            }
            sequence
        };

        self.remaining -= 1;
        Ok(Some(sequence))
    }

    /// Decode every remaining sequence
    pub fn decode_all(&mut self) -> Result<Vec<Vec<u64>>> {
        let capacity = (self.remaining as usize).min(MAX_PREALLOCATED_ELEMENTS);
        let mut sequences = Vec::with_capacity(capacity);
        while let Some(sequence) = self.next_sequence()? {
            sequences.push(sequence);
        }
        Ok(sequences)
    }

    /// Decode every remaining sequence into one flat byte array
    pub fn decode_bytes(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        while let Some(sequence) = self.next_sequence()? {
            for value in sequence {
                let byte =
                    u8::try_from(value).map_err(|_| Error::ValueTooLarge { value, bits: 8 })?;
                bytes.push(byte);
            }
        }
        Ok(bytes)
    }

    fn next_raw(&mut self, bits: u8) -> Result<u64> {
        self.reader.read_bits(bits)?.ok_or(Error::TruncatedInput)
    }
}

impl<R: Read> Iterator for BatchDecoder<R> {
    type Item = Result<Vec<u64>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_sequence() {
            Ok(Some(sequence)) => Some(Ok(sequence)),
            Ok(None) => None,
            Err(e) => {
                // stop iterating after a fatal error
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Decoder for streams produced by [`crate::StreamEncoder`]
#[derive(Debug)]
pub struct StreamDecoder<R> {
    reader: BitReader<R>,
    header: StreamHeader,
    contains_zero: bool,
}

impl<R: Read> StreamDecoder<R> {
    /// Read and validate the 1-byte stream header
    pub fn new(source: R, contains_zero: bool) -> Result<Self> {
        let mut reader = BitReader::new(source);
        let mut buf = [0u8; StreamHeader::SIZE];
        let read = reader.read_aligned(&mut buf)?;
        let header = StreamHeader::decode(&buf[..read])?;

        Ok(Self {
            reader,
            header,
            contains_zero,
        })
    }

    /// Element width announced by the header
    #[inline]
    pub fn bits_per_element(&self) -> u8 {
        self.header.bits_per_element
    }

    /// Deliver every value to `sink` until the end marker
    ///
    /// Returns the number of delivered values.
    pub fn decode<F>(mut self, mut sink: F) -> Result<u64>
    where
        F: FnMut(u64),
    {
        let bits = self.header.bits_per_element;
        let mut delivered = 0u64;

        loop {
            match self.reader.read_bits(bits)? {
                None => return Err(Error::MissingEndMarker),
                Some(DELIMITER) => break,
                Some(raw) => {
                    sink(unmap(raw, self.contains_zero));
                    delivered += 1;
                }
            }
        }

        tracing::debug!(values = delivered, bits, "stream decoding finished");
        Ok(delivered)
    }

    /// Collect every value until the end marker
    pub fn decode_to_vec(self) -> Result<Vec<u64>> {
        let mut values = Vec::new();
        self.decode(|value| values.push(value))?;
        Ok(values)
    }
}
