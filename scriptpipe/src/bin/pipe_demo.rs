//! Pipe CLI Demo
//!
//! Prints the ten most frequent lines containing PATTERN, read from FILE or
//! standard input. Set `RUST_LOG=debug` to watch stages start and stop.
//!
//! Usage: pipe_demo PATTERN [FILE]

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(pattern) = args.next() else {
        eprintln!("usage: pipe_demo PATTERN [FILE]");
        return ExitCode::from(2);
    };
    let input = match args.next() {
        Some(path) => scriptpipe::file(path),
        None => scriptpipe::stdin(),
    };

    match input.match_str(pattern).freq().first(10).stdout() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("pipe_demo: {err}");
            ExitCode::FAILURE
        }
    }
}
