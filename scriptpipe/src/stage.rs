//! Stage executor: turns a transform into a new Pipe fed by a worker thread.
//!
//! ```text
//!   Pipe A ──read──▶ [worker: process(A, w)] ──w──▶ handoff ──▶ Pipe B
//!                         │ on failure
//!                         └──────────────▶ B.set_error(..)
//! ```
//!
//! The worker owns Pipe A for its whole run and drops it when done, which
//! closes A's stream and releases the stage feeding A. Pipe B owns the
//! consuming end of the handoff. Every write by the transform waits for B's
//! reader, so a chain never runs ahead of its slowest consumer.

use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use pipe_io::{handoff, ReadAutoCloser};
use tracing::{debug, trace};

use crate::error::PipeError;
use crate::idgen::STAGE_IDS;
use crate::lines::{write_line, LineScanner};
use crate::pipe::Pipe;

impl Pipe {
    /// Run `process` on a worker thread, reading this Pipe and writing the
    /// returned Pipe.
    ///
    /// If this Pipe already has an error, no worker is started and the
    /// returned Pipe is empty and carries the same error. An error returned
    /// by `process` is recorded on the returned Pipe before its stream ends.
    ///
    /// # Example
    ///
    /// ```
    /// use std::io::{Read, Write};
    ///
    /// let upper = scriptpipe::echo("hello\n")
    ///     .filter(|r, w| {
    ///         let mut text = String::new();
    ///         r.read_to_string(&mut text)?;
    ///         w.write_all(text.to_uppercase().as_bytes())?;
    ///         Ok(())
    ///     })
    ///     .string()
    ///     .unwrap();
    /// assert_eq!(upper, "HELLO\n");
    /// ```
    #[must_use]
    pub fn filter<F>(self, process: F) -> Pipe
    where
        F: FnOnce(&mut (dyn Read + Send), &mut (dyn Write + Send)) -> Result<(), PipeError>
            + Send
            + 'static,
    {
        if let Some(err) = self.error() {
            trace!(%err, "upstream failed, stage not started");
            let next = self.successor(ReadAutoCloser::empty());
            next.set_error(err);
            return next;
        }

        let (mut writer, reader) = handoff();
        let next = self.successor(ReadAutoCloser::new(reader));
        let slot = next.err.clone();
        let name = format!("{}-{}", self.config.stage_name, STAGE_IDS.get_next());
        let mut upstream = self;

        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            trace!(stage = %name, "stage started");
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                process(&mut upstream, &mut writer)
            }))
            .unwrap_or_else(|_| Err(PipeError::msg(format!("stage {name} panicked"))));
            drop(upstream);
            match result {
                Ok(()) => trace!(stage = %name, "stage finished"),
                Err(err) if err.is_broken_pipe() && writer.is_reader_closed() => {
                    trace!(stage = %name, "consumer went away, stage stopped");
                }
                Err(err) => {
                    debug!(stage = %name, %err, "stage failed");
                    slot.set(err);
                }
            }
            writer.close();
        });

        if let Err(err) = spawned {
            debug!(%err, "cannot start stage worker");
            next.set_error(err.into());
        }
        next
    }

    /// Call `f` for every input line; `f` writes zero or more output records.
    ///
    /// Lines are passed without their `\n` or `\r\n` terminator. A line that
    /// is not UTF-8 fails the stage with `InvalidData`.
    #[must_use]
    pub fn filter_scan<F>(self, mut f: F) -> Pipe
    where
        F: FnMut(&str, &mut (dyn Write + Send)) -> Result<(), PipeError> + Send + 'static,
    {
        let max_line_len = self.config.max_line_len;
        self.filter(move |r, w| {
            let mut lines = LineScanner::new(r, max_line_len);
            while let Some(line) = lines.next_line()? {
                f(&line, w)?;
            }
            Ok(())
        })
    }

    /// Replace every line with `f(line)`.
    #[must_use]
    pub fn filter_line<F>(self, mut f: F) -> Pipe
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        self.filter_scan(move |line, w| Ok(write_line(w, &f(line))?))
    }

    /// Keep only the lines for which `pred` returns true.
    #[must_use]
    pub fn retain<F>(self, mut pred: F) -> Pipe
    where
        F: FnMut(&str) -> bool + Send + 'static,
    {
        self.filter_scan(move |line, w| {
            if pred(line) {
                write_line(w, line)?;
            }
            Ok(())
        })
    }
}
