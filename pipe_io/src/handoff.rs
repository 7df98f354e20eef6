//! Synchronous handoff channel between two pipe stages
//!
//! A rendezvous-style byte conduit where:
//! - One Writer offers a chunk and blocks until the Reader has taken all of it
//! - One Reader takes bytes from the offered chunk at its own pace
//! - Closing the Writer signals end-of-data, closing the Reader aborts the Writer
//!
//! At most one chunk is in flight, so a slow Reader throttles the Writer.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::error::broken_pipe;

/// Shared state between Writer and Reader
struct SharedChunk {
    chunk: Vec<u8>,
    pos: usize,
    writer_closed: bool,
    reader_closed: bool,
}

impl SharedChunk {
    fn new() -> Self {
        Self {
            chunk: Vec::new(),
            pos: 0,
            writer_closed: false,
            reader_closed: false,
        }
    }

    fn pending(&self) -> usize {
        self.chunk.len() - self.pos
    }
}

struct Shared {
    state: Mutex<SharedChunk>,
    cond: Condvar,
}

/// Create a connected Writer/Reader pair.
#[must_use]
pub fn handoff() -> (Writer, Reader) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SharedChunk::new()),
        cond: Condvar::new(),
    });
    (
        Writer {
            shared: Arc::clone(&shared),
            closed: false,
        },
        Reader {
            shared,
            closed: false,
        },
    )
}

/// Producing end of the handoff channel
///
/// # Thread Safety
///
/// Writer is `Send` and is normally moved into the worker thread of a stage.
/// `write()` takes `&mut self`, so there is never more than one chunk in
/// flight. The lock is released while waiting for the Reader.
pub struct Writer {
    shared: Arc<Shared>,
    closed: bool,
}

impl Writer {
    /// Close the writer and wake the reader.
    ///
    /// The reader sees end-of-data once it has consumed everything already
    /// handed over.
    pub fn close(&mut self) {
        if self.closed {
            log::warn!("Writer::close() called on already closed writer: {self:?}");
            return;
        }
        self.closed = true;
        self.shared.state.lock().writer_closed = true;
        self.shared.cond.notify_all();
    }

    /// Check if writer is closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Check if the reader has gone away
    #[must_use]
    pub fn is_reader_closed(&self) -> bool {
        self.shared.state.lock().reader_closed
    }
}

impl io::Write for Writer {
    /// Offer `data` to the reader and wait until it is consumed.
    ///
    /// Returns the number of bytes taken by the reader. If the reader closes
    /// before taking anything, the write fails with `BrokenPipe`; if it closes
    /// midway, the consumed prefix is reported and the next write fails.
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(broken_pipe("write on closed handoff writer"));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.state.lock();
        if state.reader_closed {
            return Err(broken_pipe("handoff reader is closed"));
        }

        state.chunk.clear();
        state.chunk.extend_from_slice(data);
        state.pos = 0;
        self.shared.cond.notify_all();

        while state.pending() > 0 && !state.reader_closed {
            self.shared.cond.wait(&mut state);
        }

        let consumed = state.pos;
        state.chunk.clear();
        state.pos = 0;
        drop(state);

        if consumed == 0 {
            return Err(broken_pipe("handoff reader is closed"));
        }
        Ok(consumed)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        write!(
            f,
            "Handoff.Writer(closed={}, pending={}, reader_closed={})",
            self.closed,
            state.pending(),
            state.reader_closed
        )
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.close();
        }
    }
}

/// Consuming end of the handoff channel
///
/// Blocks in `read()` until the writer offers data or closes.
pub struct Reader {
    shared: Arc<Shared>,
    closed: bool,
}

impl Reader {
    /// Close the reader.
    ///
    /// A writer blocked in `write()` is woken and fails with `BrokenPipe`.
    pub fn close(&mut self) {
        if self.closed {
            log::warn!("Reader::close() called on already closed reader: {self:?}");
            return;
        }
        self.closed = true;
        self.shared.state.lock().reader_closed = true;
        self.shared.cond.notify_all();
    }

    /// Check if reader is closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl io::Read for Reader {
    /// Returns 0 once the writer is closed and everything has been consumed,
    /// or if this reader was closed.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed || buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.state.lock();
        loop {
            let pending = state.pending();
            if pending > 0 {
                let n = pending.min(buf.len());
                let start = state.pos;
                buf[..n].copy_from_slice(&state.chunk[start..start + n]);
                state.pos += n;
                if state.pending() == 0 {
                    self.shared.cond.notify_all();
                }
                return Ok(n);
            }
            if state.writer_closed {
                return Ok(0);
            }
            self.shared.cond.wait(&mut state);
        }
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        write!(
            f,
            "Handoff.Reader(closed={}, pending={}, writer_closed={})",
            self.closed,
            state.pending(),
            state.writer_closed
        )
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.close();
        }
    }
}
