//! Shell-style streaming pipelines.
//!
//! A [`Pipe`] is a byte stream plus an error slot. Chain operations consume a
//! Pipe and return a new one whose content is produced by a worker thread
//! reading the old one:
//!
//! ```no_run
//! let top = scriptpipe::file("access.log")
//!     .column(1)
//!     .freq()
//!     .first(10)
//!     .string()?;
//! # Ok::<(), scriptpipe::PipeError>(())
//! ```
//!
//! Stages hand data over synchronously, so a chain holds at most one chunk
//! per stage in flight. The first error anywhere in a chain reaches the
//! terminal operation; later errors are dropped.

pub mod buffer;
pub mod config;
pub mod error;
pub mod exec;
pub mod filters;
pub mod http;
mod idgen;
mod lines;
pub mod output;
pub mod pipe;
pub mod sink;
pub mod source;
pub mod stage;

// Re-export core types for convenience
pub use config::PipeConfig;
pub use error::{ErrorSlot, PipeError};
pub use pipe::Pipe;
pub use pipe_io::ReadAutoCloser;

// Re-export Buffer type for convenience
pub use buffer::{Buffer, BufferReadGuard};
pub use output::Output;

// Re-export sources
pub use exec::{exec, split_command};
pub use http::{do_request, get, post};
pub use source::{args, echo, file, find_files, if_exists, list_files, new_pipe, slice, stdin};
