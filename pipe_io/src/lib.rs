pub mod autoclose;
mod error;
pub mod handoff;

pub use autoclose::ReadAutoCloser;
pub use error::{broken_pipe, is_broken_pipe};
pub use handoff::{handoff, Reader, Writer};
