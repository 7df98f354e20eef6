//! Shared buffer with internal locking
//!
//! A capture destination for pipe output that can be handed to a Pipe and
//! inspected afterwards.

use parking_lot::{Mutex, MutexGuard};
use std::io;
use std::ops::Deref;
use std::sync::Arc;

/// Read-only guard to buffer contents
///
/// Holds the lock and provides read-only access to the underlying data.
/// The lock is released when the guard is dropped.
pub struct BufferReadGuard<'a>(MutexGuard<'a, Vec<u8>>);

impl Deref for BufferReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for BufferReadGuard<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Shared buffer with internal locking
///
/// A thread-safe buffer backed by `Arc<Mutex<Vec<u8>>>`. Multiple clones
/// share the same underlying data, so one clone can be given to a Pipe as
/// its standard output while another is kept for reading.
///
/// # Example
///
/// ```
/// use scriptpipe::Buffer;
///
/// let captured = Buffer::new();
/// scriptpipe::echo("hello\n")
///     .with_stdout(captured.clone())
///     .stdout()
///     .unwrap();
///
/// assert_eq!(&*captured.lock(), b"hello\n");
/// ```
#[derive(Clone, Default)]
pub struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    /// Create a new empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append data to the buffer
    pub fn append(&self, data: &[u8]) {
        self.0.lock().extend_from_slice(data);
    }

    /// Get the current length of the buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Check if the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Lock the buffer for reading
    ///
    /// Returns a guard that provides read-only access to the contents.
    /// Writers through other clones block until the guard is dropped.
    #[must_use]
    pub fn lock(&self) -> BufferReadGuard<'_> {
        BufferReadGuard(self.0.lock())
    }

    /// Contents as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Buffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.append(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buffer(len={})", self.len())
    }
}
