//! External commands as pipe stages.
//!
//! A command line is split into arguments with shell quoting rules; there is
//! no other shell grammar. The command's stdout and stderr both become the
//! stage's output unless the Pipe has a diagnostic destination, in which case
//! stderr goes there. A non-zero exit fails the stage with
//! [`PipeError::Exit`] after all output has been delivered.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::PipeError;
use crate::output::Output;
use crate::pipe::Pipe;

const CHUNK_SIZE: usize = 8 * 1024;

/// Upper bound on the stderr kept for [`PipeError::Exit`].
const MAX_CAPTURED_STDERR: usize = 4 * 1024;

/// Marker replaced by the input line in [`Pipe::exec_for_each`] templates.
pub const LINE_PLACEHOLDER: &str = "{{.}}";

/// Output of the command `cmdline`, run with empty standard input.
#[must_use]
pub fn exec(cmdline: impl AsRef<str>) -> Pipe {
    Pipe::new().exec(cmdline)
}

impl Pipe {
    /// Run `cmdline` with this Pipe's content as its standard input.
    #[must_use]
    pub fn exec(self, cmdline: impl AsRef<str>) -> Pipe {
        let cmdline = cmdline.as_ref().to_owned();
        let runner = CommandRunner::for_pipe(&self);
        self.filter(move |r, w| {
            let argv = split_command(&cmdline)?;
            runner.run(&argv, r, w)
        })
    }

    /// Run one command per input line, with every `{{.}}` in `template`
    /// replaced by the line, and concatenate their output.
    ///
    /// Commands run one after another. The first command that cannot be
    /// started or exits non-zero fails the stage.
    #[must_use]
    pub fn exec_for_each(self, template: impl Into<String>) -> Pipe {
        let template = template.into();
        let runner = CommandRunner::for_pipe(&self);
        self.filter_scan(move |line, w| {
            let argv = split_command(&template.replace(LINE_PLACEHOLDER, line))?;
            runner.run(&argv, &mut io::empty(), w)
        })
    }
}

/// Split a command line into program and arguments.
///
/// # Errors
/// `PipeError::CommandLine` for unbalanced quotes or an empty line.
pub fn split_command(cmdline: &str) -> Result<Vec<String>, PipeError> {
    match shlex::split(cmdline) {
        Some(argv) if !argv.is_empty() => Ok(argv),
        _ => Err(PipeError::CommandLine(cmdline.to_owned())),
    }
}

/// Settings a stage needs to start commands, taken from the Pipe that
/// creates the stage.
struct CommandRunner {
    env: Option<Vec<(OsString, OsString)>>,
    diagnostics: Option<Output>,
}

impl CommandRunner {
    fn for_pipe(pipe: &Pipe) -> Self {
        Self {
            env: pipe.env.clone(),
            diagnostics: pipe.stderr.clone(),
        }
    }

    fn spawn(&self, argv: &[String]) -> Result<Child, PipeError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PipeError::CommandLine(String::new()))?;
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(vars) = &self.env {
            command.env_clear().envs(vars.iter().map(|(k, v)| (k, v)));
        }
        debug!(?argv, "starting command");
        command.spawn().map_err(|err| PipeError::path(program, err))
    }

    /// Run `argv` to completion, feeding it `input` and forwarding its output
    /// to `output`.
    fn run(
        &self,
        argv: &[String],
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> Result<(), PipeError> {
        let mut child = self.spawn(argv)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let sink = Mutex::new(output);
        let diagnostics = self.diagnostics.clone();

        let (forwarded, fed, captured) = thread::scope(|s| {
            let feeder = stdin.map(|stdin| s.spawn(move || feed(input, stdin)));
            let stderr_reader = s.spawn(|| forward_stderr(stderr, diagnostics, &sink));
            let forwarded = match stdout {
                Some(mut stdout) => forward(&mut stdout, &sink),
                None => Ok(()),
            };
            if forwarded.is_err() {
                // Nobody takes the output any more; don't wait for the
                // command to finish on its own.
                let _ = child.kill();
            }
            let captured = stderr_reader
                .join()
                .unwrap_or_else(|_| Err(PipeError::msg("stderr reader panicked")));
            let fed = feeder.map_or(Ok(()), |feeder| {
                feeder
                    .join()
                    .unwrap_or_else(|_| Err(PipeError::msg("stdin feeder panicked")))
            });
            (forwarded, fed, captured)
        });

        let status = child.wait()?;
        forwarded?;
        fed?;
        let captured = captured?;
        if status.success() {
            return Ok(());
        }
        let code = status.code().unwrap_or(-1);
        debug!(?argv, code, "command failed");
        Err(PipeError::Exit {
            code,
            stderr: String::from_utf8_lossy(&captured).trim_end().to_owned(),
        })
    }
}

/// Copy the stage input to the command's stdin.
///
/// A command that exits without reading all of its input is not a failure;
/// a failure reading the input is.
fn feed(input: &mut (dyn Read + Send), mut stdin: ChildStdin) -> Result<(), PipeError> {
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if let Err(err) = stdin.write_all(&chunk[..n]) {
            if pipe_io::is_broken_pipe(&err) {
                trace!(%err, "command stopped reading its input");
                return Ok(());
            }
            return Err(err.into());
        }
    }
}

/// Copy the command's stdout to the stage output, chunk by chunk.
fn forward(from: &mut dyn Read, sink: &Mutex<&mut (dyn Write + Send)>) -> Result<(), PipeError> {
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = match from.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        sink.lock().write_all(&chunk[..n])?;
    }
}

/// Copy the command's stderr to the diagnostic destination, or interleave it
/// with stdout, keeping the first bytes for the exit error.
///
/// Keeps reading after the destination fails so the command never blocks on
/// a full stderr pipe.
fn forward_stderr(
    stderr: Option<impl Read>,
    mut diagnostics: Option<Output>,
    sink: &Mutex<&mut (dyn Write + Send)>,
) -> Result<Vec<u8>, PipeError> {
    let mut captured = Vec::new();
    let Some(mut stderr) = stderr else {
        return Ok(captured);
    };
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut failed: Option<io::Error> = None;
    loop {
        let n = match stderr.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        let keep = n.min(MAX_CAPTURED_STDERR.saturating_sub(captured.len()));
        captured.extend_from_slice(&chunk[..keep]);
        if failed.is_some() {
            continue;
        }
        let written = match diagnostics.as_mut() {
            Some(out) => out.write_all(&chunk[..n]),
            None => sink.lock().write_all(&chunk[..n]),
        };
        if let Err(err) = written {
            failed = Some(err);
        }
    }
    match failed {
        Some(err) => Err(err.into()),
        None => Ok(captured),
    }
}
