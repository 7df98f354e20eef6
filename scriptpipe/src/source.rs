//! Operations that originate a Pipe.
//!
//! A source that cannot be opened returns a Pipe whose error is already set
//! and whose stream is empty; no worker is started for it.

use std::env;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::Path;

use walkdir::WalkDir;

use crate::error::PipeError;
use crate::lines::write_line;
use crate::pipe::Pipe;

/// An empty Pipe.
#[must_use]
pub fn new_pipe() -> Pipe {
    Pipe::new()
}

/// A Pipe containing exactly `text`.
#[must_use]
pub fn echo(text: impl Into<String>) -> Pipe {
    Pipe::new().with_reader(Cursor::new(text.into().into_bytes()))
}

/// A Pipe containing each item on its own line.
#[must_use]
pub fn slice<I, S>(items: I) -> Pipe
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for item in items {
        text.push_str(item.as_ref());
        text.push('\n');
    }
    echo(text)
}

/// The program's command-line arguments, without the program name, one per
/// line.
#[must_use]
pub fn args() -> Pipe {
    slice(env::args().skip(1))
}

/// The process's standard input.
#[must_use]
pub fn stdin() -> Pipe {
    Pipe::new().with_reader(io::stdin())
}

/// The contents of the file at `path`.
#[must_use]
pub fn file(path: impl AsRef<Path>) -> Pipe {
    let path = path.as_ref();
    match File::open(path) {
        Ok(f) => Pipe::new().with_reader(f),
        Err(err) => Pipe::new().with_error(PipeError::path(path, err)),
    }
}

/// An empty Pipe, errored if `path` does not exist.
///
/// Useful as the head of a chain that should only run when a file exists.
#[must_use]
pub fn if_exists(path: impl AsRef<Path>) -> Pipe {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(_) => Pipe::new(),
        Err(err) => Pipe::new().with_error(PipeError::path(path, err)),
    }
}

/// A file lists itself; a directory lists its entries as `dir/name`, sorted.
#[must_use]
pub fn list_files(path: impl AsRef<Path>) -> Pipe {
    let path = path.as_ref();
    match list_entries(path) {
        Ok(entries) => slice(entries),
        Err(err) => Pipe::new().with_error(PipeError::path(path, err)),
    }
}

fn list_entries(path: &Path) -> io::Result<Vec<String>> {
    if !fs::metadata(path)?.is_dir() {
        return Ok(vec![path.display().to_string()]);
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        entries.push(path.join(entry?.file_name()).display().to_string());
    }
    entries.sort();
    Ok(entries)
}

/// Every file (not directory) under `dir`, recursively, in lexical order.
///
/// The walk runs as a stage, so paths stream out as they are found. A walk
/// failure (including a missing `dir`) sets the Pipe's error.
#[must_use]
pub fn find_files(dir: impl AsRef<Path>) -> Pipe {
    let root = dir.as_ref().to_path_buf();
    Pipe::new().filter(move |_, w| {
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                write_line(w, &entry.path().display().to_string())?;
            }
        }
        Ok(())
    })
}
