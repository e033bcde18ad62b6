//! Batch and stream encoders
//!
//! [`BatchEncoder`] accumulates any number of sequences in memory behind a
//! 9-byte header and back-patches the sequence count when finished.
//! [`StreamEncoder`] writes one delimiter-terminated stream behind a 1-byte
//! header, handing complete blocks to a [`std::io::Write`] sink as they fill.

use std::io::Write;

use crate::bits::BitWriter;
use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::header::{BatchHeader, StreamHeader};
use crate::{BLOCK_SIZE, DELIMITER};

/// Encoder packing many sequences into one self-describing buffer
#[derive(Debug)]
pub struct BatchEncoder {
    config: CodecConfig,
    writer: BitWriter,
    sequence_count: u32,
    overflow_warnings: u64,
    aborted: bool,
}

impl BatchEncoder {
    /// Create an encoder and write its header
    ///
    /// A `sequence_length` of 0 selects delimiter mode.
    #[inline]
    pub fn new(max_value: u64, sequence_length: u32, contains_zero: bool) -> Result<Self> {
        Ok(Self::with_config(CodecConfig::batch(
            max_value,
            sequence_length,
            contains_zero,
        )?))
    }

    /// Create an encoder from an existing configuration
    pub fn with_config(config: CodecConfig) -> Self {
        let header = BatchHeader::new(config.bits_per_element(), config.sequence_length, 0);
        Self {
            config,
            writer: BitWriter::with_prefix(&header.encode(), 0),
            sequence_count: 0,
            overflow_warnings: 0,
            aborted: false,
        }
    }

    /// Append one sequence
    ///
    /// Any error is fatal: the encoder refuses all later calls with
    /// [`Error::EncoderAborted`].
    pub fn encode_sequence(&mut self, values: &[u64]) -> Result<()> {
        self.guarded(|encoder| encoder.try_encode(values.iter().copied()))
    }

    /// Append a flat byte array
    ///
    /// In fixed-length mode the array must hold a whole number of sequences
    /// and is split accordingly. In delimiter mode it is one sequence.
    pub fn encode_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.guarded(|encoder| {
            if encoder.config.is_delimited() {
                return encoder.try_encode(bytes.iter().map(|&b| b as u64));
            }

            let sequence_length = encoder.config.sequence_length as usize;
            if bytes.len() % sequence_length != 0 {
                return Err(Error::LengthMismatch {
                    expected: encoder.config.sequence_length,
                    actual: bytes.len(),
                });
            }
            for chunk in bytes.chunks_exact(sequence_length) {
                encoder.try_encode(chunk.iter().map(|&b| b as u64))?;
            }
            Ok(())
        })
    }

    /// Patch the sequence count into the header and return the buffer
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.aborted {
            return Err(Error::EncoderAborted);
        }

        let mut bytes = self.writer.into_bytes();
        BatchHeader::patch_count(&mut bytes, self.sequence_count)?;

        tracing::debug!(
            sequences = self.sequence_count,
            bytes = bytes.len(),
            overflow_warnings = self.overflow_warnings,
            "batch encoding finished"
        );
        Ok(bytes)
    }

    /// Sequences encoded so far
    #[inline]
    pub fn sequence_count(&self) -> u32 {
        self.sequence_count
    }

    /// Values seen above the declared maximum, stored or rejected (each one
    /// logged as a warning)
    #[inline]
    pub fn overflow_warnings(&self) -> u64 {
        self.overflow_warnings
    }

    /// Current encoded size including the header
    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.writer.as_bytes().len()
    }

    /// Configuration of this encoder
    #[inline]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn guarded<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if self.aborted {
            return Err(Error::EncoderAborted);
        }
        let result = op(self);
        if result.is_err() {
            self.aborted = true;
        }
        result
    }

    fn try_encode<I>(&mut self, values: I) -> Result<()>
    where
        I: ExactSizeIterator<Item = u64> + Clone,
    {
        let delimited = self.config.is_delimited();
        if !delimited && values.len() != self.config.sequence_length as usize {
            return Err(Error::LengthMismatch {
                expected: self.config.sequence_length,
                actual: values.len(),
            });
        }
        if delimited {
            for value in values.clone() {
                let checked = self.config.remap_non_delimiter(value);
                count_overflow(checked, &mut self.overflow_warnings)?;
            }
        }
        let next_count = self
            .sequence_count
            .checked_add(1)
            .ok_or(Error::CountOverflow)?;

        let bits = self.config.bits_per_element();
        self.writer.reserve(values.len() + delimited as usize, bits);

        for value in values {
            let stored = count_overflow(self.config.remap(value), &mut self.overflow_warnings)?;
            let checked = self.config.check_stored(stored);
            if count_overflow(checked, &mut self.overflow_warnings)? {
                self.overflow_warnings += 1;
            }
            self.writer.put(stored, bits);
        }
        if delimited {
            self.writer.put(DELIMITER, bits);
        }

        self.sequence_count = next_count;
        Ok(())
    }
}

/// Count a value rejected for exceeding the element width as an overflow
fn count_overflow<T>(result: Result<T>, overflow_warnings: &mut u64) -> Result<T> {
    if let Err(Error::ValueTooLarge { .. }) = result {
        *overflow_warnings += 1;
    }
    result
}

/// Encoder writing one delimiter-terminated stream to a byte sink
///
/// The sink is released (dropped) once the stream is finished or aborted,
/// which closes pipe-like sinks. Dropping an unfinished encoder finishes it.
#[derive(Debug)]
pub struct StreamEncoder<W: Write> {
    config: CodecConfig,
    writer: BitWriter,
    sink: Option<W>,
    values_written: u64,
    bytes_written: u64,
    overflow_warnings: u64,
    aborted: bool,
}

impl<W: Write> StreamEncoder<W> {
    /// Create an encoder writing to `sink`
    #[inline]
    pub fn new(sink: W, max_value: u64, contains_zero: bool) -> Result<Self> {
        Self::with_config(sink, CodecConfig::stream(max_value, contains_zero)?)
    }

    /// Create an encoder from an existing delimiter-mode configuration
    pub fn with_config(sink: W, config: CodecConfig) -> Result<Self> {
        if !config.is_delimited() {
            return Err(Error::InvalidConfiguration(
                "streams are always delimiter-terminated",
            ));
        }

        let header = StreamHeader {
            bits_per_element: config.bits_per_element(),
        };
        Ok(Self {
            config,
            writer: BitWriter::with_prefix(&header.encode(), BLOCK_SIZE),
            sink: Some(sink),
            values_written: 0,
            bytes_written: 0,
            overflow_warnings: 0,
            aborted: false,
        })
    }

    /// Append one value
    ///
    /// Any error aborts the stream: the sink is released without an end
    /// marker so readers see an unterminated stream.
    pub fn push(&mut self, value: u64) -> Result<()> {
        if self.sink.is_none() {
            return Err(Error::EncoderAborted);
        }
        let result = self.try_push(value);
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Append every value of `values`
    pub fn extend<I: IntoIterator<Item = u64>>(&mut self, values: I) -> Result<()> {
        values.into_iter().try_for_each(|value| self.push(value))
    }

    /// Write the end marker, flush everything and release the sink
    ///
    /// Calling this again after a successful finish is a no-op. After an
    /// abort it fails with [`Error::EncoderAborted`].
    pub fn finish(&mut self) -> Result<()> {
        if self.aborted {
            return Err(Error::EncoderAborted);
        }
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };

        self.writer.put(DELIMITER, self.config.bits_per_element());
        let tail = std::mem::take(&mut self.writer).into_bytes();
        sink.write_all(&tail)?;
        sink.flush()?;
        self.bytes_written += tail.len() as u64;

        tracing::debug!(
            values = self.values_written,
            bytes = self.bytes_written,
            overflow_warnings = self.overflow_warnings,
            "stream encoding finished"
        );
        Ok(())
    }

    /// Whether the sink has been released
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.sink.is_none()
    }

    /// Whether a fatal error aborted the stream
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Values pushed so far
    #[inline]
    pub fn values_written(&self) -> u64 {
        self.values_written
    }

    /// Bytes handed to the sink so far
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Values seen above the declared maximum, stored or rejected (each one
    /// logged as a warning)
    #[inline]
    pub fn overflow_warnings(&self) -> u64 {
        self.overflow_warnings
    }

    /// Configuration of this encoder
    #[inline]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn try_push(&mut self, value: u64) -> Result<()> {
        let remapped = self.config.remap_non_delimiter(value);
        let stored = count_overflow(remapped, &mut self.overflow_warnings)?;
        let checked = self.config.check_stored(stored);
        if count_overflow(checked, &mut self.overflow_warnings)? {
            self.overflow_warnings += 1;
        }
        self.writer.put(stored, self.config.bits_per_element());
        self.values_written += 1;

        if self.writer.complete_len() >= BLOCK_SIZE {
            self.flush_complete()?;
        }
        Ok(())
    }

    fn flush_complete(&mut self) -> Result<()> {
        let block = self.writer.take_complete();
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(&block)?;
            self.bytes_written += block.len() as u64;
            tracing::trace!(bytes = block.len(), "flushed block to sink");
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
        if let Some(mut sink) = self.sink.take() {
            self.writer = BitWriter::new();
            if let Err(error) = sink.flush() {
                tracing::warn!(%error, "failed to flush sink of aborted stream");
            }
            tracing::debug!(
                values = self.values_written,
                bytes = self.bytes_written,
                "stream encoding aborted"
            );
        }
    }
}

impl<W: Write> Drop for StreamEncoder<W> {
    fn drop(&mut self) {
        if self.sink.is_none() {
            return;
        }
        if let Err(error) = self.finish() {
            tracing::error!(%error, "failed to finish stream on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BATCH_HEADER_SIZE;

    #[test]
    fn test_batch_header_fixed_mode() {
        let mut encoder = BatchEncoder::new(15, 4, false).unwrap();
        encoder.encode_sequence(&[1, 2, 3, 4]).unwrap();
        encoder.encode_sequence(&[15, 0, 15, 0]).unwrap();
        let bytes = encoder.finish().unwrap();

        assert_eq!(
            &bytes[..BATCH_HEADER_SIZE],
            &[0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x02]
        );
        assert_eq!(&bytes[BATCH_HEADER_SIZE..], &[0x12, 0x34, 0xF0, 0xF0]);
    }

    #[test]
    fn test_batch_delimiter_layout() {
        let mut encoder = BatchEncoder::new(7, 0, false).unwrap();
        encoder.encode_sequence(&[5, 3]).unwrap();
        encoder.encode_sequence(&[7]).unwrap();
        assert_eq!(encoder.sequence_count(), 2);
        let bytes = encoder.finish().unwrap();

        // 101 011 000 | 111 000 -> 1010_1100 0111_0000
        assert_eq!(bytes[0], 3);
        assert_eq!(&bytes[5..9], &[0, 0, 0, 2]);
        assert_eq!(&bytes[BATCH_HEADER_SIZE..], &[0b1010_1100, 0b0111_0000]);
    }

    #[test]
    fn test_batch_zero_remapping() {
        let mut encoder = BatchEncoder::new(3, 0, true).unwrap();
        encoder.encode_sequence(&[0]).unwrap();
        let bytes = encoder.finish().unwrap();

        // width 3: raw 1 then delimiter -> 001 000
        assert_eq!(bytes[0], 3);
        assert_eq!(&bytes[BATCH_HEADER_SIZE..], &[0b0010_0000]);
    }

    #[test]
    fn test_batch_length_mismatch_is_fatal() {
        let mut encoder = BatchEncoder::new(15, 4, false).unwrap();
        assert!(matches!(
            encoder.encode_sequence(&[1, 2, 3]),
            Err(Error::LengthMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            encoder.encode_sequence(&[1, 2, 3, 4]),
            Err(Error::EncoderAborted)
        ));
        assert!(matches!(encoder.finish(), Err(Error::EncoderAborted)));
    }

    #[test]
    fn test_batch_reserved_value() {
        let mut encoder = BatchEncoder::new(7, 0, false).unwrap();
        let before = encoder.encoded_len();
        assert!(matches!(
            encoder.encode_sequence(&[3, 0, 2]),
            Err(Error::ReservedValueUsed { value: 0 })
        ));
        // nothing of the rejected sequence was packed
        assert_eq!(encoder.encoded_len(), before);
    }

    #[test]
    fn test_batch_fixed_mode_allows_zero() {
        let mut encoder = BatchEncoder::new(3, 2, false).unwrap();
        encoder.encode_sequence(&[0, 0]).unwrap();
        assert_eq!(encoder.finish().unwrap().len(), BATCH_HEADER_SIZE + 1);
    }

    #[test]
    fn test_batch_overflow_policy() {
        let mut encoder = BatchEncoder::new(10, 2, false).unwrap();
        encoder.encode_sequence(&[12, 15]).unwrap();
        assert_eq!(encoder.overflow_warnings(), 2);
        assert!(matches!(
            encoder.encode_sequence(&[1, 16]),
            Err(Error::ValueTooLarge { value: 16, bits: 4 })
        ));
    }

    #[test]
    fn test_batch_encode_bytes() {
        let mut encoder = BatchEncoder::new(255, 2, false).unwrap();
        encoder.encode_bytes(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(encoder.sequence_count(), 3);
        let bytes = encoder.finish().unwrap();
        assert_eq!(&bytes[BATCH_HEADER_SIZE..], &[1, 2, 3, 4, 5, 6]);

        let mut encoder = BatchEncoder::new(255, 4, false).unwrap();
        assert!(matches!(
            encoder.encode_bytes(&[1, 2, 3]),
            Err(Error::LengthMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_batch_empty() {
        let bytes = BatchEncoder::new(100, 0, true).unwrap().finish().unwrap();
        assert_eq!(bytes, vec![7, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_stream_layout() {
        let mut out = Vec::new();
        {
            let mut encoder = StreamEncoder::new(&mut out, 3, true).unwrap();
            encoder.push(0).unwrap();
            encoder.push(3).unwrap();
            encoder.finish().unwrap();
            assert!(encoder.is_finished());
            assert_eq!(encoder.values_written(), 2);
        }
        // width 3: 001 100 000
        assert_eq!(out, vec![3, 0b0011_0000, 0b0000_0000]);
    }

    #[test]
    fn test_stream_double_finish() {
        let mut out = Vec::new();
        {
            let mut encoder = StreamEncoder::new(&mut out, 1, false).unwrap();
            encoder.push(1).unwrap();
            encoder.finish().unwrap();
            encoder.finish().unwrap();
            assert!(matches!(encoder.push(1), Err(Error::EncoderAborted)));
        }
        assert_eq!(out, vec![1, 0b1000_0000]);
    }

    #[test]
    fn test_stream_finishes_on_drop() {
        let mut out = Vec::new();
        {
            let mut encoder = StreamEncoder::new(&mut out, 255, false).unwrap();
            encoder.push(42).unwrap();
        }
        assert_eq!(out, vec![8, 42, 0]);
    }

    #[test]
    fn test_stream_abort_leaves_no_end_marker() {
        let mut out = Vec::new();
        {
            let mut encoder = StreamEncoder::new(&mut out, 255, false).unwrap();
            encoder.push(7).unwrap();
            assert!(matches!(
                encoder.push(0),
                Err(Error::ReservedValueUsed { value: 0 })
            ));
            assert!(encoder.is_finished());
            assert!(encoder.is_aborted());
            assert!(matches!(encoder.finish(), Err(Error::EncoderAborted)));
            assert!(matches!(encoder.push(1), Err(Error::EncoderAborted)));
        }
        // the buffered block was discarded, no end marker written
        assert!(out.is_empty());
    }

    #[test]
    fn test_stream_aborts_after_flushed_blocks() {
        let mut out = Vec::new();
        {
            let mut encoder = StreamEncoder::new(&mut out, 255, false).unwrap();
            encoder.extend((0..BLOCK_SIZE as u64).map(|i| i % 255 + 1)).unwrap();
            assert!(encoder.push(256).is_err());
            assert!(matches!(encoder.finish(), Err(Error::EncoderAborted)));
        }
        // flushed blocks stay, the end marker never follows
        assert_eq!(out.len(), BLOCK_SIZE);
        assert!(matches!(
            crate::StreamDecoder::new(&out[..], false)
                .unwrap()
                .decode(|_| {}),
            Err(Error::MissingEndMarker)
        ));
    }

    #[test]
    fn test_remap_overflow_counts_as_warning() {
        let mut sink = Vec::new();
        let mut stream = StreamEncoder::new(&mut sink, 10, true).unwrap();
        assert!(matches!(
            stream.push(u64::MAX),
            Err(Error::ValueTooLarge { value: u64::MAX, .. })
        ));
        assert_eq!(stream.overflow_warnings(), 1);

        let mut batch = BatchEncoder::new(10, 0, true).unwrap();
        assert!(matches!(
            batch.encode_sequence(&[1, u64::MAX]),
            Err(Error::ValueTooLarge { value: u64::MAX, .. })
        ));
        assert_eq!(batch.overflow_warnings(), 1);

        let mut fixed = BatchEncoder::new(10, 2, true).unwrap();
        assert!(fixed.encode_sequence(&[u64::MAX, 1]).is_err());
        assert_eq!(fixed.overflow_warnings(), 1);
    }

    #[test]
    fn test_stream_flushes_blocks() {
        let mut out = Vec::new();
        {
            let mut encoder = StreamEncoder::new(&mut out, 255, false).unwrap();
            encoder.extend((0..BLOCK_SIZE as u64).map(|i| i % 255 + 1)).unwrap();
            assert_eq!(encoder.bytes_written(), BLOCK_SIZE as u64);
            encoder.finish().unwrap();
            assert_eq!(encoder.bytes_written(), BLOCK_SIZE as u64 + 2);
        }
        assert_eq!(out.len(), BLOCK_SIZE + 2);
        assert_eq!(out[0], 8);
        assert_eq!(out[BLOCK_SIZE + 1], 0);
    }

    #[test]
    fn test_stream_rejects_fixed_config() {
        let config = CodecConfig::batch(10, 3, false).unwrap();
        assert!(matches!(
            StreamEncoder::with_config(Vec::new(), config),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
