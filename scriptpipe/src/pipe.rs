//! The Pipe value: a stream handle plus error state and chain settings.
//!
//! All chain operations consume a Pipe and return the next one. The previous
//! Pipe, and with it ownership of its stream, moves into the worker that
//! drains it.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read, Write};

use pipe_io::ReadAutoCloser;

use crate::config::PipeConfig;
use crate::error::{ErrorSlot, PipeError};
use crate::output::Output;

pub struct Pipe {
    pub(crate) reader: ReadAutoCloser,
    pub(crate) err: ErrorSlot,
    pub(crate) stdout: Output,
    /// Destination for external commands' stderr; interleaved into the
    /// content when unset.
    pub(crate) stderr: Option<Output>,
    /// Created on first use when unset.
    pub(crate) http_client: Option<reqwest::blocking::Client>,
    /// Replacement environment for external commands.
    pub(crate) env: Option<Vec<(OsString, OsString)>>,
    pub(crate) config: PipeConfig,
}

impl Pipe {
    /// An empty Pipe: reading it yields end-of-data immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: ReadAutoCloser::empty(),
            err: ErrorSlot::new(),
            stdout: Output::stdout(),
            stderr: None,
            http_client: None,
            env: None,
            config: PipeConfig::default(),
        }
    }

    /// A Pipe over `reader` that inherits this Pipe's settings but not its
    /// error.
    pub(crate) fn successor(&self, reader: ReadAutoCloser) -> Self {
        Self {
            reader,
            err: ErrorSlot::new(),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            http_client: self.http_client.clone(),
            env: self.env.clone(),
            config: self.config.clone(),
        }
    }

    /// Replace the Pipe's stream. The previous stream is closed.
    #[must_use]
    pub fn with_reader<R>(mut self, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        self.reader = ReadAutoCloser::new(reader);
        self
    }

    /// Like [`Pipe::with_reader`], with a release action run exactly once
    /// when the stream is exhausted or closed.
    #[must_use]
    pub fn with_closing_reader(mut self, reader: ReadAutoCloser) -> Self {
        self.reader = reader;
        self
    }

    /// Destination for [`Pipe::stdout`] and [`Pipe::tee`].
    #[must_use]
    pub fn with_stdout<W>(mut self, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.stdout = Output::new(writer);
        self
    }

    /// Destination for the stderr of external commands run by this chain.
    #[must_use]
    pub fn with_stderr<W>(mut self, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.stderr = Some(Output::new(writer));
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Run external commands with exactly these environment variables.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PipeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    /// Overwrite the Pipe's error, whatever was set before.
    #[must_use]
    pub fn with_error(self, err: PipeError) -> Self {
        self.err.replace(Some(err));
        self
    }

    /// Forget the Pipe's error so its stream can be read again.
    #[must_use]
    pub fn clear_error(self) -> Self {
        self.err.replace(None);
        self
    }

    /// Current error, if any stage feeding this Pipe failed.
    #[must_use]
    pub fn error(&self) -> Option<PipeError> {
        self.err.get()
    }

    /// Record `err` unless an error is already set. Returns the error that is
    /// in effect afterwards.
    pub fn set_error(&self, err: PipeError) -> PipeError {
        self.err.set(err)
    }

    /// Close the Pipe's stream without draining it.
    ///
    /// Can be called multiple times. Dropping the Pipe closes it as well.
    /// An upstream stage blocked on this Pipe is released and stops.
    ///
    /// # Errors
    /// Returns the error of the stream's release action.
    pub fn close(&mut self) -> Result<(), PipeError> {
        self.reader.close().map_err(PipeError::from)
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for Pipe {
    /// Reads fail with the Pipe's error once it is set. End-of-data from the
    /// stream is re-checked against the error slot, since the producing
    /// stage records its failure before closing its end.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.error() {
            return Err(err.into());
        }
        match self.reader.read(buf) {
            Ok(0) if !buf.is_empty() => match self.error() {
                Some(err) => Err(err.into()),
                None => Ok(0),
            },
            Ok(n) => Ok(n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Err(err),
            Err(err) => Err(self.set_error(err.into()).into()),
        }
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("reader", &self.reader)
            .field("error", &self.error())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
