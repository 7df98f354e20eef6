//! Pipe errors and the per-pipe error slot.
//!
//! Stages run on separate threads and may fail at about the same time.
//! Each Pipe owns one `ErrorSlot`, shared only with the worker feeding it;
//! the first error stored there is the one every reader observes.

use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Error recorded on a Pipe.
///
/// Cloneable because the same first error is handed to every caller that
/// asks for it; non-cloneable sources are kept behind `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipeError {
    #[error("{0}")]
    Io(Arc<io::Error>),

    #[error("{}: {source}", path.display())]
    Path {
        path: PathBuf,
        source: Arc<io::Error>,
    },

    #[error("line longer than {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("unexpected HTTP response status: {status}")]
    HttpStatus { status: reqwest::StatusCode },

    #[error("HTTP request failed: {0}")]
    Http(Arc<reqwest::Error>),

    /// Non-zero exit of an external command, with its captured stderr.
    #[error("exit status {code}")]
    Exit { code: i32, stderr: String },

    #[error("cannot split command line {0:?}")]
    CommandLine(String),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("{0}")]
    Walk(Arc<walkdir::Error>),

    #[error("{0}")]
    Message(String),
}

impl PipeError {
    /// Free-form error for user-supplied stages.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn path(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Path {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// True if the stage failed because its consumer went away.
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            Self::Io(err) => pipe_io::is_broken_pipe(err),
            _ => false,
        }
    }
}

impl From<io::Error> for PipeError {
    /// A `PipeError` that traveled through a `Read` implementation as an
    /// `io::Error` is unwrapped, so the first error in a chain keeps its
    /// identity all the way to the terminal operation.
    fn from(err: io::Error) -> Self {
        match err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<PipeError>())
        {
            Some(inner) => inner.clone(),
            None => Self::Io(Arc::new(err)),
        }
    }
}

impl From<PipeError> for io::Error {
    fn from(err: PipeError) -> Self {
        let kind = match &err {
            PipeError::Io(inner) => inner.kind(),
            PipeError::Path { source, .. } => source.kind(),
            PipeError::LineTooLong { .. } => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

impl From<reqwest::Error> for PipeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

impl From<walkdir::Error> for PipeError {
    fn from(err: walkdir::Error) -> Self {
        Self::Walk(Arc::new(err))
    }
}

/// Lock-guarded first-error-wins cell.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot(Arc<Mutex<Option<PipeError>>>);

impl ErrorSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current error, if any.
    #[must_use]
    pub fn get(&self) -> Option<PipeError> {
        self.0.lock().clone()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.lock().is_some()
    }

    /// Store `err` unless an error is already set; return the error that is
    /// set afterwards.
    pub fn set(&self, err: PipeError) -> PipeError {
        self.0.lock().get_or_insert(err).clone()
    }

    /// Unconditionally overwrite (or clear) the stored error.
    pub fn replace(&self, err: Option<PipeError>) -> Option<PipeError> {
        std::mem::replace(&mut *self.0.lock(), err)
    }
}
