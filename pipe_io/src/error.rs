//! Error helpers shared by the stream plumbing.
//!
//! Stages talk to each other through `std::io` traits, so failures are
//! `std::io::Error` values. These helpers build and classify the few kinds the
//! plumbing itself produces.

use std::io;

/// Build a `BrokenPipe` error with a short description.
#[must_use]
pub fn broken_pipe(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, msg)
}

/// True if the error means the other end of a stream went away.
///
/// A stage that fails this way was abandoned by its consumer.
#[must_use]
pub fn is_broken_pipe(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionAborted
    )
}
