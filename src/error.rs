//! Error types for the DenseBit codec

/// Errors that can occur while configuring, encoding or decoding
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The declared maximum cannot be represented with the configured remapping
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    /// A fixed-length sequence had the wrong number of elements
    #[error("given sequence is of length {actual}, but should be {expected}")]
    LengthMismatch {
        /// Configured sequence length
        expected: u32,
        /// Length of the rejected input
        actual: usize,
    },
    /// An input value collides with the delimiter after remapping
    #[error("cannot store {value}: it is identical to the delimiter after remapping")]
    ReservedValueUsed {
        /// The rejected input value
        value: u64,
    },
    /// A value needs more bits than the configured element width
    #[error("cannot store {value} in {bits} bits")]
    ValueTooLarge {
        /// The rejected value
        value: u64,
        /// Configured element width
        bits: u8,
    },
    /// The byte source ended before the declared content was read
    #[error("input ended before all declared sequences were read")]
    TruncatedInput,
    /// The byte source ended without an end marker
    #[error("stream ended without an end marker")]
    MissingEndMarker,
    /// Header carries an element width outside `1..=64`
    #[error("invalid element width {0} in header")]
    InvalidHeader(u8),
    /// More sequences than the header count field can hold
    #[error("sequence count exceeds u32::MAX")]
    CountOverflow,
    /// The encoder hit a fatal error or was already finished
    #[error("encoder was aborted or already finished")]
    EncoderAborted,
    /// No entry with this name in the archive
    #[error("no entry '{0}' in archive")]
    EntryNotFound(String),
    /// Entry name is not a plain file name
    #[error("invalid entry name '{0}'")]
    InvalidEntryName(String),
    /// Stored entry checksum does not match its contents
    #[error("checksum mismatch for entry '{0}'")]
    ChecksumMismatch(String),
    /// Stored entry could not be unsealed
    #[error("entry '{0}' is corrupt")]
    CorruptEntry(String),
    /// The thread draining a stream into an archive failed
    #[error("archive drain thread failed: {0}")]
    DrainFailed(String),
    /// Underlying byte source or sink failure
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for DenseBit operations
pub type Result<T> = core::result::Result<T, Error>;
