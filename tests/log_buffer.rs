use std::error::Error;

use devloop::logbuf::{LogBuffer, LogEntry, StreamKind, extract_errors};
use devloop::pipeline::Stage;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn appends_beyond_capacity_evict_oldest_first() -> TestResult {
    let mut buffer = LogBuffer::with_capacity(5);

    for i in 0..8 {
        buffer.append(LogEntry::line(
            StreamKind::Stdout,
            Some(Stage::Build),
            format!("line {i}"),
        ));
    }

    assert_eq!(buffer.len(StreamKind::Stdout), 5);

    let snapshot = buffer.snapshot();
    let texts: Vec<&str> = snapshot.std_out.iter().map(|e| e.text.as_str()).collect();
    // FIFO eviction: the five most recent entries survive, in order.
    assert_eq!(texts, vec!["line 3", "line 4", "line 5", "line 6", "line 7"]);

    Ok(())
}

#[test]
fn streams_are_bounded_independently() -> TestResult {
    let mut buffer = LogBuffer::with_capacity(2);

    buffer.append(LogEntry::line(StreamKind::Stdout, None, "out"));
    buffer.append(LogEntry::status(None, "log 1"));
    buffer.append(LogEntry::status(None, "log 2"));
    buffer.append(LogEntry::status(None, "log 3"));

    assert_eq!(buffer.len(StreamKind::Stdout), 1);
    assert_eq!(buffer.len(StreamKind::Stdlog), 2);
    assert_eq!(buffer.len(StreamKind::Stderr), 0);

    let snapshot = buffer.snapshot();
    assert_eq!(snapshot.std_log[0].text, "log 2");
    assert_eq!(snapshot.std_log[1].text, "log 3");

    Ok(())
}

#[test]
fn stderr_lines_carry_extracted_diagnostics() -> TestResult {
    let entry = LogEntry::line(
        StreamKind::Stderr,
        Some(Stage::Build),
        "main.go:10:5: undefined: frobnicate",
    );
    assert_eq!(entry.errors, vec!["main.go:10:5: undefined: frobnicate"]);

    let plain = LogEntry::line(StreamKind::Stderr, Some(Stage::Build), "exit status 2");
    assert!(plain.errors.is_empty());

    // stdout never gets diagnostics extraction.
    let out = LogEntry::line(
        StreamKind::Stdout,
        Some(Stage::Build),
        "main.go:10:5: looks like an error but is not stderr",
    );
    assert!(out.errors.is_empty());

    Ok(())
}

#[test]
fn extract_errors_handles_missing_column() -> TestResult {
    assert_eq!(
        extract_errors("util.go:3: unused variable x"),
        vec!["util.go:3: unused variable x"]
    );
    assert!(extract_errors("not a diagnostic").is_empty());
    assert!(extract_errors("10:20: missing file part").is_empty());
    Ok(())
}

#[test]
fn snapshot_is_a_clone_not_a_view() -> TestResult {
    let mut buffer = LogBuffer::with_capacity(4);
    buffer.append(LogEntry::status(None, "before"));

    let snapshot = buffer.snapshot();
    buffer.append(LogEntry::status(None, "after"));

    assert_eq!(snapshot.std_log.len(), 1);
    assert_eq!(buffer.len(StreamKind::Stdlog), 2);
    Ok(())
}
