//! Terminal operations: drain a Pipe and report its first error.
//!
//! Every sink checks the error before reading and again after the stream
//! ends, so a failure anywhere upstream is reported instead of a result.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::error::PipeError;
use crate::filters::sha256_hex;
use crate::lines::LineScanner;
use crate::pipe::Pipe;

impl Pipe {
    /// Copy the whole stream into `w`, returning the byte count.
    fn copy_into(&mut self, w: &mut dyn Write) -> Result<u64, PipeError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        match io::copy(&mut *self, w) {
            Ok(n) => self.error().map_or(Ok(n), Err),
            Err(err) => Err(self.set_error(err.into())),
        }
    }

    /// Run the chain to completion, discarding its output.
    ///
    /// # Errors
    /// The first error of the chain.
    pub fn wait(mut self) -> Result<(), PipeError> {
        self.copy_into(&mut io::sink()).map(|_| ())
    }

    /// The whole content.
    ///
    /// # Errors
    /// The first error of the chain.
    pub fn bytes(mut self) -> Result<Vec<u8>, PipeError> {
        let mut data = Vec::new();
        self.copy_into(&mut data)?;
        Ok(data)
    }

    /// The whole content as text.
    ///
    /// # Errors
    /// The first error of the chain, or `InvalidData` if the content is not
    /// UTF-8.
    pub fn string(self) -> Result<String, PipeError> {
        let data = self.bytes()?;
        String::from_utf8(data)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
    }

    /// The content split into lines, terminators removed.
    ///
    /// # Errors
    /// The first error of the chain, or `InvalidData` for a line that is not
    /// UTF-8.
    pub fn lines(mut self) -> Result<Vec<String>, PipeError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        let max_line_len = self.config.max_line_len;
        let mut lines = Vec::new();
        let mut scanner = LineScanner::new(&mut self, max_line_len);
        loop {
            match scanner.next_line() {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break,
                Err(err) => {
                    drop(scanner);
                    return Err(self.set_error(err));
                }
            }
        }
        drop(scanner);
        self.error().map_or(Ok(lines), Err)
    }

    /// Number of lines in the content.
    ///
    /// # Errors
    /// The first error of the chain.
    pub fn count_lines(self) -> Result<usize, PipeError> {
        self.lines().map(|lines| lines.len())
    }

    /// Hex SHA-256 of the content.
    ///
    /// # Errors
    /// The first error of the chain.
    pub fn sha256_sum(mut self) -> Result<String, PipeError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        match sha256_hex(&mut self) {
            Ok(digest) => self.error().map_or(Ok(digest), Err),
            Err(err) => Err(self.set_error(err.into())),
        }
    }

    /// Copy the content to the Pipe's standard output destination, returning
    /// the byte count.
    ///
    /// # Errors
    /// The first error of the chain. Output written before the failure is
    /// not taken back.
    pub fn stdout(mut self) -> Result<u64, PipeError> {
        let mut out = self.stdout.clone();
        let copied = self.copy_into(&mut out);
        out.flush()?;
        copied
    }

    /// Write the content to `path`, truncating it. Returns the byte count.
    ///
    /// # Errors
    /// The first error of the chain, or the error opening `path`.
    pub fn write_file(self, path: impl AsRef<Path>) -> Result<u64, PipeError> {
        self.to_file(path.as_ref(), false)
    }

    /// Append the content to `path`, creating it if needed. Returns the byte
    /// count.
    ///
    /// # Errors
    /// The first error of the chain, or the error opening `path`.
    pub fn append_file(self, path: impl AsRef<Path>) -> Result<u64, PipeError> {
        self.to_file(path.as_ref(), true)
    }

    fn to_file(mut self, path: &Path, append: bool) -> Result<u64, PipeError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|err| self.set_error(PipeError::path(path, err)))?;
        let written = self.copy_into(&mut f)?;
        f.flush()?;
        Ok(written)
    }

    /// Everything the stream delivers, together with the Pipe's error.
    ///
    /// Unlike the other sinks, content delivered before a failure is kept,
    /// e.g. the body of an HTTP response with a non-success status.
    #[must_use]
    pub fn drain(mut self) -> (Vec<u8>, Option<PipeError>) {
        let mut data = Vec::new();
        let result = self.copy_into(&mut data);
        (data, result.err())
    }

    /// Exit code of the external command that failed this Pipe, or 0 if the
    /// error (if any) is not a non-zero exit.
    #[must_use]
    pub fn exit_status(&self) -> i32 {
        match self.error() {
            Some(PipeError::Exit { code, .. }) => code,
            _ => 0,
        }
    }
}
