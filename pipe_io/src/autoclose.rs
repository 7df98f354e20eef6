//! Read from a source that releases itself when exhausted.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use pipe_io::ReadAutoCloser;
//!
//! let mut reader = ReadAutoCloser::new(&b"hello"[..]);
//!
//! let mut data = String::new();
//! reader.read_to_string(&mut data).unwrap();
//! assert_eq!(data, "hello");
//! assert!(reader.is_closed());
//! ```

use std::fmt;
use std::io::{self, Read};

type Release = Box<dyn FnOnce() -> io::Result<()> + Send>;

pub struct ReadAutoCloser {
    source: Option<Box<dyn Read + Send>>,
    release: Option<Release>,
}

impl ReadAutoCloser {
    /// Wrap a source. Closing drops it, which releases whatever it owns
    /// (file descriptor, handoff reader, ...).
    #[must_use]
    pub fn new<R>(source: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            source: Some(Box::new(source)),
            release: None,
        }
    }

    /// Wrap a source with an extra release action, run after the source is
    /// dropped.
    #[must_use]
    pub fn with_release<R, F>(source: R, release: F) -> Self
    where
        R: Read + Send + 'static,
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        Self {
            source: Some(Box::new(source)),
            release: Some(Box::new(release)),
        }
    }

    /// A handle over nothing: reads return 0, closing does nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            source: None,
            release: None,
        }
    }

    /// Close the stream.
    /// Can be called multiple times.
    /// "read" and "drop" will call "close" automatically.
    ///
    /// # Errors
    /// Returns the error of the release action, on the call that ran it.
    pub fn close(&mut self) -> io::Result<()> {
        self.source = None;
        match self.release.take() {
            Some(release) => release(),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }
}

impl Default for ReadAutoCloser {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for ReadAutoCloser {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Read for ReadAutoCloser {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(source) = self.source.as_mut() else {
            return Ok(0);
        };

        let n = source.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.close()?;
        }
        Ok(n)
    }
}

impl fmt::Debug for ReadAutoCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadAutoCloser")
            .field("closed", &self.is_closed())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}
