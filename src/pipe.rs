//! Bounded in-process byte pipe
//!
//! Connects a push-style producer (a [`crate::StreamEncoder`]) to a pull-style
//! consumer running on another thread. Bytes arrive in write order; a full
//! pipe blocks the writer. Dropping the writer closes the pipe, after which
//! the reader drains what is left and then reports end of input. Aborting the
//! pipe instead makes the reader fail once it has drained the bytes written
//! before the abort.

use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

#[derive(Debug)]
enum Message {
    Chunk(Vec<u8>),
    Abort,
}

/// Create a pipe holding at most `capacity` in-flight chunks
///
/// A capacity of zero makes every write rendezvous with a read.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (sender, receiver) = sync_channel(capacity);
    (
        PipeWriter {
            sender: Some(sender),
        },
        PipeReader {
            receiver,
            chunk: Vec::new(),
            pos: 0,
            aborted: false,
        },
    )
}

/// Writing end of a [`pipe`]
#[derive(Debug)]
pub struct PipeWriter {
    sender: Option<SyncSender<Message>>,
}

impl PipeWriter {
    /// Close the pipe; equivalent to dropping the writer
    #[inline]
    pub fn close(&mut self) {
        self.sender = None;
    }

    /// Close the pipe so that the reader fails instead of seeing end of input
    pub fn abort(&mut self) {
        if let Some(sender) = self.sender.take() {
            // a vanished reader has nothing left to fail
            let _ = sender.send(Message::Abort);
        }
    }

    /// Handle that can abort the pipe after the writer itself is gone
    ///
    /// The pipe stays open while the handle is alive, so it must be dropped
    /// or used before the reader can see end of input.
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.sender.as_ref().map(|sender| AbortHandle {
            sender: sender.clone(),
        })
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pipe already closed"))?;
        sender
            .send(Message::Chunk(buf.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader is gone"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Aborts a [`pipe`] independently of its [`PipeWriter`]
#[derive(Debug)]
pub struct AbortHandle {
    sender: SyncSender<Message>,
}

impl AbortHandle {
    /// Abort the pipe; the reader fails after draining earlier bytes
    pub fn abort(self) {
        let _ = self.sender.send(Message::Abort);
    }
}

/// Reading end of a [`pipe`]
#[derive(Debug)]
pub struct PipeReader {
    receiver: Receiver<Message>,
    chunk: Vec<u8>,
    pos: usize,
    aborted: bool,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.aborted {
            return Err(aborted());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            match self.receiver.recv() {
                Ok(Message::Chunk(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(Message::Abort) => {
                    self.aborted = true;
                    return Err(aborted());
                }
                // writer closed and everything was consumed
                Err(_) => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "pipe aborted by writer")
}
