//! Named-entry archives holding encoded payloads
//!
//! An [`Archive`] stores byte payloads under names and hands them back as
//! readers. Every stored entry is streamed through a CRC32C checksum and,
//! with the `lz4` feature (on by default), an LZ4 frame compressor:
//!
//! ```text
//! +-------------------------------------+--------------------+
//! | payload (LZ4 frame, or raw)         | CRC32C u32 (LE)    |
//! +-------------------------------------+--------------------+
//! ```
//!
//! The checksum covers the uncompressed bytes and trails the payload, so an
//! entry can be written before its length is known. Archives synchronize
//! internally and a failed write stores nothing.
//!
//! [`ArchiveEntryEncoder`] streams values into a named entry through a
//! bounded [`crate::pipe`] drained by a dedicated thread.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::CodecConfig;
use crate::crc32c::{self, Crc32c};
use crate::decoder::{BatchDecoder, StreamDecoder};
use crate::encoder::StreamEncoder;
use crate::error::{Error, Result};
use crate::pipe::{pipe, AbortHandle, PipeWriter};
use crate::{BLOCK_SIZE, DEFAULT_PIPE_CAPACITY};

const CHECKSUM_SIZE: usize = 4;

/// Directory inside a [`DirArchive`] holding entries still being written
const STAGING_DIR: &str = ".staging";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// A container of named byte entries
///
/// Methods take `&self`; implementations synchronize internally so that
/// several entries can be written at once.
pub trait Archive {
    /// Store everything `source` yields as entry `name`, replacing any
    /// existing entry; returns the number of bytes stored
    ///
    /// If `source` fails, nothing is stored.
    fn write_entry(&self, name: &str, source: &mut dyn Read) -> Result<u64>;

    /// Open entry `name` for reading
    fn read_entry(&self, name: &str) -> Result<Box<dyn Read + '_>>;

    /// Whether entry `name` exists
    fn contains(&self, name: &str) -> bool;

    /// Names of all entries, sorted
    fn entry_names(&self) -> Vec<String>;
}

/// Archive kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArchive {
    /// Create an empty archive
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the archive has no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // entries are only replaced whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Archive for MemoryArchive {
    #[tracing::instrument(level = "debug", skip(self, source))]
    fn write_entry(&self, name: &str, source: &mut dyn Read) -> Result<u64> {
        validate_name(name)?;
        let mut sealed = Vec::new();
        let len = seal(source, &mut sealed)?;
        self.entries().insert(name.to_owned(), sealed);
        tracing::debug!(bytes = len, "entry stored");
        Ok(len)
    }

    fn read_entry(&self, name: &str) -> Result<Box<dyn Read + '_>> {
        let entries = self.entries();
        let sealed = entries
            .get(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_owned()))?;
        Ok(Box::new(Cursor::new(unseal(name, sealed)?)))
    }

    fn contains(&self, name: &str) -> bool {
        self.entries().contains_key(name)
    }

    fn entry_names(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }
}

/// Archive storing one file per entry inside a directory
///
/// Entries are written to a staging file first and renamed into place once
/// complete, so readers never see a partial entry.
#[derive(Debug, Clone)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    /// Open (creating if needed) the archive directory at `root`
    ///
    /// With `delete_existing`, any previous archive at `root` is removed first.
    pub fn open(root: impl AsRef<Path>, delete_existing: bool) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if delete_existing && root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(root.join(STAGING_DIR))?;
        Ok(Self { root })
    }

    /// Directory holding the entries
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        if name == STAGING_DIR {
            return Err(Error::InvalidEntryName(name.to_owned()));
        }
        Ok(self.root.join(name))
    }

    fn staging_path(&self, name: &str) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(STAGING_DIR)
            .join(format!("{name}.{}.{seq}", std::process::id()))
    }
}

impl Archive for DirArchive {
    #[tracing::instrument(level = "debug", skip(self, source))]
    fn write_entry(&self, name: &str, source: &mut dyn Read) -> Result<u64> {
        let path = self.entry_path(name)?;
        let staging = self.staging_path(name);

        match write_staged(&staging, &path, source) {
            Ok(len) => {
                tracing::debug!(bytes = len, path = %path.display(), "entry stored");
                Ok(len)
            }
            Err(error) => {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    tracing::warn!(%cleanup, path = %staging.display(), "failed to remove staging file");
                }
                Err(error)
            }
        }
    }

    fn read_entry(&self, name: &str) -> Result<Box<dyn Read + '_>> {
        let path = self.entry_path(name)?;
        let sealed = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::EntryNotFound(name.to_owned()),
            _ => Error::Io(e),
        })?;
        Ok(Box::new(Cursor::new(unseal(name, &sealed)?)))
    }

    fn contains(&self, name: &str) -> bool {
        self.entry_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn entry_names(&self) -> Vec<String> {
        let Ok(dir) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

fn write_staged(staging: &Path, path: &Path, source: &mut dyn Read) -> Result<u64> {
    let mut out = BufWriter::new(File::create(staging)?);
    let len = seal(source, &mut out)?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    fs::rename(staging, path)?;
    Ok(len)
}

/// Stream encoder writing into a named archive entry
///
/// Values are packed on the caller's thread and moved through a bounded pipe
/// to a drain thread that writes the entry. [`ArchiveEntryEncoder::finish`]
/// closes the pipe and joins the drain thread; dropping the encoder does the
/// same and logs any failure. A fatal error aborts the pipe, so the entry is
/// never stored.
#[derive(Debug)]
pub struct ArchiveEntryEncoder {
    encoder: StreamEncoder<PipeWriter>,
    abort: Option<AbortHandle>,
    drain: Option<JoinHandle<Result<u64>>>,
    name: String,
}

impl ArchiveEntryEncoder {
    /// Start streaming into entry `name` of `archive`
    pub fn create<A>(
        archive: Arc<A>,
        name: impl Into<String>,
        max_value: u64,
        contains_zero: bool,
    ) -> Result<Self>
    where
        A: Archive + Send + Sync + 'static,
    {
        let config = CodecConfig::stream(max_value, contains_zero)?;
        let name = name.into();
        validate_name(&name)?;

        let (writer, mut reader) = pipe(DEFAULT_PIPE_CAPACITY);
        let abort = writer.abort_handle();
        let encoder = StreamEncoder::with_config(writer, config)?;

        let entry = name.clone();
        let drain = thread::Builder::new()
            .name(format!("densebit-drain-{name}"))
            .spawn(move || archive.write_entry(&entry, &mut reader))?;

        Ok(Self {
            encoder,
            abort,
            drain: Some(drain),
            name,
        })
    }

    /// Append one value
    ///
    /// A fatal error aborts the entry; the drain thread is joined before the
    /// error is returned.
    pub fn push(&mut self, value: u64) -> Result<()> {
        let result = self.encoder.push(value);
        if result.is_err() {
            self.abort_drain();
        }
        result
    }

    /// Append every value of `values`
    pub fn extend<I: IntoIterator<Item = u64>>(&mut self, values: I) -> Result<()> {
        values.into_iter().try_for_each(|value| self.push(value))
    }

    /// Finish the stream and wait until the entry is stored
    ///
    /// Returns the number of bytes stored in the entry. Fails with
    /// [`Error::EncoderAborted`] if an earlier push aborted the entry.
    pub fn finish(mut self) -> Result<u64> {
        if let Err(error) = self.encoder.finish() {
            self.abort_drain();
            return Err(error);
        }
        self.close_drain()
    }

    /// Name of the entry being written
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values pushed so far
    #[inline]
    pub fn values_written(&self) -> u64 {
        self.encoder.values_written()
    }

    /// Let the drain see end of input and wait for the entry to be stored
    fn close_drain(&mut self) -> Result<u64> {
        drop(self.abort.take());
        self.join_drain()
    }

    /// Make the drain fail so that nothing is stored, then wait for it
    fn abort_drain(&mut self) {
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
        if let Err(error) = self.join_drain() {
            tracing::debug!(%error, entry = %self.name, "entry discarded");
        }
    }

    fn join_drain(&mut self) -> Result<u64> {
        match self.drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::DrainFailed("drain thread panicked".to_owned()))?,
            None => Ok(0),
        }
    }
}

impl Drop for ArchiveEntryEncoder {
    fn drop(&mut self) {
        if self.drain.is_none() {
            return;
        }
        match self.encoder.finish() {
            Ok(()) => {
                if let Err(error) = self.close_drain() {
                    tracing::error!(%error, entry = %self.name, "failed to store entry on drop");
                }
            }
            Err(error) => {
                tracing::error!(%error, entry = %self.name, "failed to finish entry on drop");
                self.abort_drain();
            }
        }
    }
}

/// Decode stream entry `name`, delivering every value to `sink`
///
/// Returns the number of delivered values.
pub fn decode_entry<A, F>(archive: &A, name: &str, contains_zero: bool, sink: F) -> Result<u64>
where
    A: Archive + ?Sized,
    F: FnMut(u64),
{
    StreamDecoder::new(archive.read_entry(name)?, contains_zero)?.decode(sink)
}

/// Open batch entry `name` for decoding
pub fn open_batch<'a, A>(
    archive: &'a A,
    name: &str,
    contains_zero: bool,
) -> Result<BatchDecoder<Box<dyn Read + 'a>>>
where
    A: Archive + ?Sized,
{
    BatchDecoder::new(archive.read_entry(name)?, contains_zero)
}

/// Store an encoded batch as the next numbered entry (`0.bin`, `1.bin`, ...)
///
/// Returns the name of the new entry.
#[tracing::instrument(level = "debug", skip(archive, bytes), fields(bytes = bytes.len()))]
pub fn store_batch<A>(archive: &A, bytes: &[u8]) -> Result<String>
where
    A: Archive + ?Sized,
{
    let mut index = archive.entry_names().len();
    let name = loop {
        let candidate = format!("{index}.bin");
        if !archive.contains(&candidate) {
            break candidate;
        }
        index += 1;
    };

    archive.write_entry(&name, &mut &bytes[..])?;
    Ok(name)
}

/// Copy entry `from` of `source` to entry `to` of `target`
///
/// Returns `false` when `source` has no entry `from`.
#[tracing::instrument(level = "debug", skip(source, target))]
pub fn copy_entry<S, T>(source: &S, target: &T, from: &str, to: &str) -> Result<bool>
where
    S: Archive + ?Sized,
    T: Archive + ?Sized,
{
    if !source.contains(from) {
        return Ok(false);
    }
    let mut reader = source.read_entry(from)?;
    target.write_entry(to, &mut reader)?;
    Ok(true)
}

fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::InvalidEntryName(name.to_owned())),
    }
}

/// Stream `source` into `sink` as a payload followed by the checksum trailer;
/// returns the unsealed length
fn seal<W: Write>(source: &mut dyn Read, sink: W) -> Result<u64> {
    let mut hasher = Crc32c::new();
    let mut payload = compressor(sink);
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut len = 0u64;
    loop {
        let n = match source.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&block[..n]);
        payload.write_all(&block[..n])?;
        len += n as u64;
    }

    let mut sink = finish_payload(payload)?;
    sink.write_all(&hasher.value().to_le_bytes())?;
    sink.flush()?;
    Ok(len)
}

fn unseal(name: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < CHECKSUM_SIZE {
        return Err(Error::CorruptEntry(name.to_owned()));
    }
    let (payload, trailer) = sealed.split_at(sealed.len() - CHECKSUM_SIZE);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);

    let raw = decompress(payload).map_err(|_| Error::CorruptEntry(name.to_owned()))?;
    if crc32c::checksum(&raw) != stored {
        return Err(Error::ChecksumMismatch(name.to_owned()));
    }
    Ok(raw)
}

#[cfg(feature = "lz4")]
fn compressor<W: Write>(sink: W) -> lz4_flex::frame::FrameEncoder<W> {
    lz4_flex::frame::FrameEncoder::new(sink)
}

#[cfg(feature = "lz4")]
fn finish_payload<W: Write>(payload: lz4_flex::frame::FrameEncoder<W>) -> io::Result<W> {
    payload.finish().map_err(io::Error::other)
}

#[cfg(feature = "lz4")]
fn decompress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    lz4_flex::frame::FrameDecoder::new(payload).read_to_end(&mut raw)?;
    Ok(raw)
}

#[cfg(not(feature = "lz4"))]
fn compressor<W: Write>(sink: W) -> W {
    sink
}

#[cfg(not(feature = "lz4"))]
fn finish_payload<W: Write>(payload: W) -> io::Result<W> {
    Ok(payload)
}

#[cfg(not(feature = "lz4"))]
fn decompress(payload: &[u8]) -> io::Result<Vec<u8>> {
    Ok(payload.to_vec())
}
