use scriptpipe::{echo, ErrorSlot, Pipe, PipeConfig, PipeError, ReadAutoCloser};
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Show stage events with `RUST_LOG=scriptpipe=trace cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[test]
fn test_sort_scenario() {
    let sorted = echo("b\na\nc\n").sort().string().unwrap();
    assert_eq!(sorted, "a\nb\nc\n");
}

#[test]
fn test_empty_pipe() {
    let mut pipe = Pipe::new();
    let mut data = String::new();
    pipe.read_to_string(&mut data).unwrap();

    assert!(data.is_empty());
    assert!(pipe.error().is_none());
}

#[test]
fn test_pipe_is_read() {
    let mut pipe = echo("one\ntwo\n").sort();
    let mut data = String::new();
    pipe.read_to_string(&mut data).unwrap();
    assert_eq!(data, "one\ntwo\n");
}

#[test]
fn test_chain_matches_direct_computation() {
    let input = "apple\nbanana\ncherry\navocado\nblueberry\n";

    let chained = echo(input)
        .match_str("a")
        .replace("a", "A")
        .sort()
        .lines()
        .unwrap();

    let mut direct: Vec<String> = input
        .lines()
        .filter(|line| line.contains('a'))
        .map(|line| line.replace('a', "A"))
        .collect();
    direct.sort();

    assert_eq!(chained, direct);
}

#[test]
fn test_error_short_circuits_stage() {
    let ran = Arc::new(AtomicBool::new(false));
    let ran_in_stage = Arc::clone(&ran);

    let next = Pipe::new()
        .with_error(PipeError::msg("boom"))
        .filter(move |_, _| {
            ran_in_stage.store(true, Ordering::SeqCst);
            Ok(())
        });

    assert!(matches!(next.error(), Some(PipeError::Message(m)) if m == "boom"));
    let (data, err) = next.drain();
    assert!(data.is_empty());
    assert!(err.is_some());
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_upstream_error_reaches_terminal_operation() {
    init_tracing();
    let result = echo("a\nb\n")
        .filter(|_, _| Err(PipeError::msg("first failure")))
        .sort()
        .first(1)
        .string();

    match result {
        Err(PipeError::Message(m)) => assert_eq!(m, "first failure"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_stage_error_after_partial_output() {
    let mut pipe = echo("a\nb\n").filter(|r, w| {
        io::copy(r, w)?;
        Err(PipeError::msg("late"))
    });

    let mut data = Vec::new();
    let err = pipe.read_to_end(&mut data).unwrap_err();

    assert_eq!(data, b"a\nb\n");
    assert!(matches!(PipeError::from(err), PipeError::Message(m) if m == "late"));
    assert!(pipe.error().is_some());
}

#[test]
fn test_panicking_stage_sets_error() {
    init_tracing();
    let err = echo("x\n")
        .filter(|_, _| panic!("stage bug"))
        .wait()
        .unwrap_err();
    assert!(err.to_string().contains("panicked"));
}

#[test]
fn test_with_error_overrides() {
    let pipe = Pipe::new()
        .with_error(PipeError::msg("first"))
        .with_error(PipeError::msg("second"));
    assert_eq!(pipe.error().unwrap().to_string(), "second");
}

#[test]
fn test_set_error_keeps_first() {
    let pipe = Pipe::new();
    pipe.set_error(PipeError::msg("first"));
    let in_effect = pipe.set_error(PipeError::msg("second"));

    assert_eq!(in_effect.to_string(), "first");
    assert_eq!(pipe.error().unwrap().to_string(), "first");
}

#[test]
fn test_clear_error_allows_reading() {
    let data = Pipe::new()
        .with_reader(Cursor::new("data"))
        .with_error(PipeError::msg("stale"))
        .clear_error()
        .string()
        .unwrap();
    assert_eq!(data, "data");
}

#[test]
fn test_error_slot_first_error_wins_across_threads() {
    let slot = ErrorSlot::new();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let slot = slot.clone();
            thread::spawn(move || slot.set(PipeError::msg(format!("error {i}"))).to_string())
        })
        .collect();
    let seen: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winner = slot.get().unwrap().to_string();
    assert!(seen.iter().all(|s| *s == winner));
}

#[test]
fn test_error_slot_replace() {
    let slot = ErrorSlot::new();
    assert!(!slot.is_set());

    slot.set(PipeError::msg("a"));
    let old = slot.replace(None);

    assert_eq!(old.unwrap().to_string(), "a");
    assert!(!slot.is_set());
}

#[test]
fn test_close_is_idempotent() {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&released);
    let mut pipe = Pipe::new().with_closing_reader(ReadAutoCloser::with_release(
        Cursor::new("unread"),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    ));

    pipe.close().unwrap();
    pipe.close().unwrap();
    drop(pipe);

    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dropping_pipe_stops_producer() {
    init_tracing();
    let (done_tx, done_rx) = mpsc::channel();

    let pipe = Pipe::new().filter(move |_, w| {
        let result = (|| -> io::Result<()> {
            loop {
                w.write_all(b"tick\n")?;
            }
        })();
        done_tx.send(()).unwrap();
        Ok(result?)
    });

    thread::sleep(Duration::from_millis(20));
    drop(pipe);

    assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
}

#[test]
fn test_backpressure_bounds_producer() {
    let produced = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&produced);

    let pipe = Pipe::new().filter(move |_, w| {
        for i in 0..1000 {
            counter.fetch_add(1, Ordering::SeqCst);
            writeln!(w, "line {i}")?;
        }
        Ok(())
    });

    thread::sleep(Duration::from_millis(100));
    assert!(produced.load(Ordering::SeqCst) <= 2);

    assert_eq!(pipe.count_lines().unwrap(), 1000);
    assert_eq!(produced.load(Ordering::SeqCst), 1000);
}

#[test]
fn test_line_too_long() {
    let config = PipeConfig::default().with_max_line_len(8);

    let err = echo("short\nthis line is too long\n")
        .with_config(config)
        .sort()
        .string()
        .unwrap_err();

    assert!(matches!(err, PipeError::LineTooLong { limit: 8 }));
}

#[test]
fn test_crlf_line_at_limit() {
    let config = PipeConfig::default().with_max_line_len(4);

    let out = echo("abcd\r\nef\r\n").with_config(config).sort().string().unwrap();
    assert_eq!(out, "abcd\nef\n");
}

#[test]
fn test_config_is_inherited() {
    let config = PipeConfig::default().with_stage_name("custom");

    let pipe = echo("x\n").with_config(config.clone()).sort().first(1);

    assert_eq!(pipe.config(), &config);
}

#[test]
fn test_stage_thread_name() {
    let name = echo("")
        .with_config(PipeConfig::default().with_stage_name("worker"))
        .filter(|_, w| {
            let name = thread::current().name().unwrap_or_default().to_string();
            w.write_all(name.as_bytes())?;
            Ok(())
        })
        .string()
        .unwrap();

    assert!(name.starts_with("worker-"), "{name}");
}

#[test]
fn test_first_releases_endless_upstream() {
    let head = Pipe::new()
        .filter(|_, w| loop {
            w.write_all(b"y\n")?;
        })
        .first(3)
        .string()
        .unwrap();

    assert_eq!(head, "y\ny\ny\n");
}

#[test]
fn test_io_error_keeps_pipe_error_identity() {
    let original = PipeError::LineTooLong { limit: 3 };
    let as_io: io::Error = original.into();
    assert_eq!(as_io.kind(), io::ErrorKind::InvalidData);

    let back = PipeError::from(as_io);
    assert!(matches!(back, PipeError::LineTooLong { limit: 3 }));
}
