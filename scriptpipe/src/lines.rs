//! Line splitting for the line-oriented stages.

use std::io::{self, BufRead, BufReader, Read, Write};

use crate::error::PipeError;

/// Reads `\n`- or `\r\n`-terminated lines, refusing lines longer than a
/// fixed limit instead of truncating them.
pub(crate) struct LineScanner<R> {
    reader: BufReader<R>,
    max_len: usize,
    line: Vec<u8>,
}

impl<R: Read> LineScanner<R> {
    pub(crate) fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_len,
            line: Vec::new(),
        }
    }

    /// Next record without its terminator, or `None` at end of input.
    ///
    /// Bytes are passed through as they are. A final record without a
    /// terminator is still returned.
    pub(crate) fn next_record(&mut self) -> Result<Option<Vec<u8>>, PipeError> {
        self.line.clear();
        // Room for a `\r` that is stripped below.
        let max_raw = self.max_len.saturating_add(1);
        loop {
            let (consumed, done) = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    if self.line.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
                let (take, consumed, done) = match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (i, i + 1, true),
                    None => (available.len(), available.len(), false),
                };
                if self.line.len() + take > max_raw {
                    return Err(PipeError::LineTooLong {
                        limit: self.max_len,
                    });
                }
                self.line.extend_from_slice(&available[..take]);
                (consumed, done)
            };
            self.reader.consume(consumed);
            if done {
                break;
            }
        }

        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        if self.line.len() > self.max_len {
            return Err(self.too_long());
        }
        Ok(Some(std::mem::take(&mut self.line)))
    }

    /// Next line as text.
    ///
    /// Fails with `InvalidData` on a line that is not UTF-8 rather than
    /// altering its bytes.
    pub(crate) fn next_line(&mut self) -> Result<Option<String>, PipeError> {
        match self.next_record()? {
            Some(record) => String::from_utf8(record)
                .map(Some)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into()),
            None => Ok(None),
        }
    }

    fn too_long(&self) -> PipeError {
        PipeError::LineTooLong {
            limit: self.max_len,
        }
    }
}

/// Write `record` followed by `\n` as a single write.
pub(crate) fn write_record(w: &mut (dyn Write + Send), record: &[u8]) -> io::Result<()> {
    let mut buf = Vec::with_capacity(record.len() + 1);
    buf.extend_from_slice(record);
    buf.push(b'\n');
    w.write_all(&buf)
}

pub(crate) fn write_line(w: &mut (dyn Write + Send), line: &str) -> io::Result<()> {
    write_record(w, line.as_bytes())
}
