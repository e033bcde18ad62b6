//! DenseBit: variable-bit-width integer packing codec
//!
//! This crate packs sequences of non-negative integers into a dense bitstream
//! using the minimum number of bits needed for a declared maximum value, and
//! unpacks them again. Elements are laid out MSB-first and back-to-back across
//! byte boundaries; only the last byte of an encoded unit may carry unused
//! (zero) low-order bits.
//!
//! # Batch Format
//!
//! ```text
//! +--------+----------------------+---------------------+
//! | Bits u8| SeqLen u32 (BE)      | SeqCount u32 (BE)   |
//! +--------+----------------------+---------------------+
//! | Packed elements, `Bits` bits each, gap-free         |
//! | (delimiter mode: every sequence ends with raw 0)    |
//! +-----------------------------------------------------+
//! ```
//!
//! A sequence length of zero selects delimiter mode. The sequence count is
//! back-patched when the encoder is finished.
//!
//! # Stream Format
//!
//! ```text
//! +--------+--------------------------------------------+
//! | Bits u8| Packed elements ... | raw 0 end marker     |
//! +--------+--------------------------------------------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use densebit::{BatchDecoder, BatchEncoder};
//!
//! let mut encoder = BatchEncoder::new(7, 0, false)?;
//! encoder.encode_sequence(&[5, 3])?;
//! encoder.encode_sequence(&[7])?;
//! let bytes = encoder.finish()?;
//!
//! let mut decoder = BatchDecoder::new(&bytes[..], false)?;
//! assert_eq!(decoder.header().sequence_count, 2);
//! assert_eq!(decoder.decode_all()?, vec![vec![5, 3], vec![7]]);
//! # Ok::<(), densebit::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod bits;
pub mod config;
pub mod crc32c;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;
pub mod pipe;
pub mod width;

// Re-export main types
pub use archive::{Archive, ArchiveEntryEncoder, DirArchive, MemoryArchive};
pub use config::CodecConfig;
pub use decoder::{BatchDecoder, StreamDecoder};
pub use encoder::{BatchEncoder, StreamEncoder};
pub use error::{Error, Result};
pub use header::{BatchHeader, StreamHeader};
pub use width::bit_length;

/// Raw wire value that ends a delimited sequence or a whole stream
pub const DELIMITER: u64 = 0;

/// Batch header size (bits + sequence length + sequence count)
pub const BATCH_HEADER_SIZE: usize = 9;

/// Stream header size (bits only)
pub const STREAM_HEADER_SIZE: usize = 1;

/// Widest supported element
pub const MAX_BITS_PER_ELEMENT: u8 = 64;

/// Block size used when moving bytes to a sink or pulling them from a source
pub const BLOCK_SIZE: usize = 4096;

/// Default number of in-flight blocks a [`pipe::pipe`] holds before the
/// writer blocks
pub const DEFAULT_PIPE_CAPACITY: usize = 16;
