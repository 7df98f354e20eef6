//! Named line transforms built on the stage executor.
//!
//! Stages that only reorder, select or count whole lines (`first`, `last`,
//! `sort`, `freq`, `join`) pass bytes through untouched. Stages that look
//! inside a line need it to be UTF-8 and fail with `InvalidData` otherwise.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, Read, Write};

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::PipeError;
use crate::lines::{write_line, write_record, LineScanner};
use crate::output::Output;
use crate::pipe::Pipe;

const CHUNK_SIZE: usize = 8 * 1024;

impl Pipe {
    /// Last path element of every line, like `basename(1)`.
    #[must_use]
    pub fn basename(self) -> Pipe {
        self.filter_line(base_name)
    }

    /// Every line without its last path element, like `dirname(1)`.
    #[must_use]
    pub fn dirname(self) -> Pipe {
        self.filter_line(dir_name)
    }

    /// The `n`th whitespace-separated field of every line, counting from 1.
    /// Lines with fewer fields are dropped.
    #[must_use]
    pub fn column(self, n: usize) -> Pipe {
        self.filter_scan(move |line, w| {
            if let Some(field) = n.checked_sub(1).and_then(|i| line.split_whitespace().nth(i)) {
                write_line(w, field)?;
            }
            Ok(())
        })
    }

    /// Treat every line as a file path and output the files' contents in
    /// order, like `cat`.
    ///
    /// Files that cannot be opened or read are skipped; the Pipe's error is
    /// only set if the list itself cannot be read or the output is lost.
    #[must_use]
    pub fn concat(self) -> Pipe {
        self.filter_scan(|path, w| {
            let mut f = match File::open(path) {
                Ok(f) => f,
                Err(err) => {
                    debug!(path, %err, "concat: skipping unreadable file");
                    return Ok(());
                }
            };
            let mut chunk = [0u8; CHUNK_SIZE];
            loop {
                let n = match f.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(n) => n,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!(path, %err, "concat: read failed, skipping rest of file");
                        return Ok(());
                    }
                };
                w.write_all(&chunk[..n])?;
            }
        })
    }

    /// The first `n` lines. Upstream stages are released as soon as they are
    /// read.
    #[must_use]
    pub fn first(self, n: usize) -> Pipe {
        let max_line_len = self.config.max_line_len;
        self.filter(move |r, w| {
            if n == 0 {
                return Ok(());
            }
            let mut lines = LineScanner::new(r, max_line_len);
            let mut written = 0;
            while let Some(line) = lines.next_record()? {
                write_record(w, &line)?;
                written += 1;
                if written == n {
                    break;
                }
            }
            Ok(())
        })
    }

    /// The last `n` lines.
    #[must_use]
    pub fn last(self, n: usize) -> Pipe {
        let max_line_len = self.config.max_line_len;
        self.filter(move |r, w| {
            let mut lines = LineScanner::new(r, max_line_len);
            let mut tail = VecDeque::with_capacity(n);
            while let Some(line) = lines.next_record()? {
                if n == 0 {
                    continue;
                }
                if tail.len() == n {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            for line in tail {
                write_record(w, &line)?;
            }
            Ok(())
        })
    }

    /// Count identical lines and output `count line`, most frequent first,
    /// ties in ascending order. Counts are right-aligned.
    #[must_use]
    pub fn freq(self) -> Pipe {
        let max_line_len = self.config.max_line_len;
        self.filter(move |r, w| {
            let mut lines = LineScanner::new(r, max_line_len);
            let mut counts: HashMap<Vec<u8>, usize> = HashMap::new();
            while let Some(line) = lines.next_record()? {
                *counts.entry(line).or_default() += 1;
            }
            let mut counts: Vec<_> = counts.into_iter().collect();
            counts.sort_by(|(a, x), (b, y)| y.cmp(x).then_with(|| a.cmp(b)));
            let width = counts.first().map_or(0, |(_, count)| count.to_string().len());
            for (line, count) in counts {
                let mut record = format!("{count:>width$} ").into_bytes();
                record.extend_from_slice(&line);
                write_record(w, &record)?;
            }
            Ok(())
        })
    }

    /// All lines joined by single spaces, followed by one newline.
    #[must_use]
    pub fn join(self) -> Pipe {
        let max_line_len = self.config.max_line_len;
        self.filter(move |r, w| {
            let mut lines = LineScanner::new(r, max_line_len);
            let mut joined = Vec::new();
            while let Some(line) = lines.next_record()? {
                joined.push(line);
            }
            write_record(w, &joined.join(&b' '))?;
            Ok(())
        })
    }

    /// Lines containing `needle`.
    #[must_use]
    pub fn match_str(self, needle: impl Into<String>) -> Pipe {
        let needle = needle.into();
        self.retain(move |line| line.contains(needle.as_str()))
    }

    /// Lines matching `re`.
    #[must_use]
    pub fn match_regex(self, re: Regex) -> Pipe {
        self.retain(move |line| re.is_match(line))
    }

    /// Lines not containing `needle`.
    #[must_use]
    pub fn reject(self, needle: impl Into<String>) -> Pipe {
        let needle = needle.into();
        self.retain(move |line| !line.contains(needle.as_str()))
    }

    /// Lines not matching `re`.
    #[must_use]
    pub fn reject_regex(self, re: Regex) -> Pipe {
        self.retain(move |line| !re.is_match(line))
    }

    /// Replace every occurrence of `search` in every line.
    #[must_use]
    pub fn replace(self, search: impl Into<String>, replacement: impl Into<String>) -> Pipe {
        let search = search.into();
        let replacement = replacement.into();
        self.filter_line(move |line| line.replace(search.as_str(), &replacement))
    }

    /// Replace every match of `re` in every line; `replacement` may refer to
    /// capture groups as `$1` or `${name}`.
    #[must_use]
    pub fn replace_regex(self, re: Regex, replacement: impl Into<String>) -> Pipe {
        let replacement = replacement.into();
        self.filter_line(move |line| re.replace_all(line, replacement.as_str()).into_owned())
    }

    /// Lines in ascending byte order.
    #[must_use]
    pub fn sort(self) -> Pipe {
        let max_line_len = self.config.max_line_len;
        self.filter(move |r, w| {
            let mut lines = LineScanner::new(r, max_line_len);
            let mut sorted = Vec::new();
            while let Some(line) = lines.next_record()? {
                sorted.push(line);
            }
            sorted.sort();
            for line in sorted {
                write_record(w, &line)?;
            }
            Ok(())
        })
    }

    /// Treat every line as a file path and output the hex SHA-256 of each
    /// file. Unlike [`Pipe::concat`], a file that cannot be read fails the
    /// stage.
    #[must_use]
    pub fn hash_sums(self) -> Pipe {
        self.filter_scan(|path, w| {
            let digest = File::open(path)
                .and_then(|mut f| sha256_hex(&mut f))
                .map_err(|err| PipeError::path(path, err))?;
            write_line(w, &digest)?;
            Ok(())
        })
    }

    /// Pass the content through unchanged while copying it to the Pipe's
    /// standard output destination.
    #[must_use]
    pub fn tee(self) -> Pipe {
        let out = self.stdout.clone();
        self.tee_to(out)
    }

    /// Pass the content through unchanged while copying it to `writer`.
    #[must_use]
    pub fn tee_to<W>(self, writer: W) -> Pipe
    where
        W: Write + Send + 'static,
    {
        let mut copy = Output::new(writer);
        self.filter(move |r, w| {
            let mut chunk = [0u8; CHUNK_SIZE];
            loop {
                let n = match r.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(n) => n,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err.into()),
                };
                w.write_all(&chunk[..n])?;
                copy.write_all(&chunk[..n])?;
            }
        })
    }
}

/// Hex SHA-256 of everything `r` yields.
pub(crate) fn sha256_hex(r: &mut dyn Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        match r.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => hasher.update(&chunk[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn base_name(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        Some(i) => trimmed[i + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

fn dir_name(path: &str) -> String {
    let path = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    match path.rfind('/') {
        None => ".".to_string(),
        Some(i) => {
            let dir = path[..i].trim_end_matches('/');
            if dir.is_empty() {
                "/".to_string()
            } else {
                dir.to_string()
            }
        }
    }
}
